use crate::data::Store;
use crate::error::{AppError, StoreError};
use crate::role::Role;
use crate::security::CredentialVerifier;

use super::Account;

#[derive(Clone, FromForm)]
pub struct SignupData {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SignupData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SignupData:{}", self.username)
    }
}

#[cfg(feature = "validation-regex")]
fn is_email(value: &str) -> bool {
    use regex::Regex;
    use std::sync::OnceLock;

    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern must compile")
        })
        .is_match(value)
}

#[cfg(not(feature = "validation-regex"))]
fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

impl SignupData {
    pub fn validate(&self) -> Result<(), AppError> {
        if !is_email(&self.email) {
            return Err(AppError::validation("email", "Not a valid e-mail address."));
        }

        if self.username.contains('@') {
            return Err(AppError::validation(
                "username",
                "Username can't contain '@'.",
            ));
        }

        if self.username.trim().len() < 3 {
            return Err(AppError::validation(
                "username",
                "Username must be at least 3 characters (bytes) long.",
            ));
        }

        if self.username.len() > 32 {
            return Err(AppError::validation(
                "username",
                "Username can't be longer than 32 (bytes) characters.",
            ));
        }

        if self.password.len() < 8 {
            return Err(AppError::validation(
                "password",
                "Password must be at least 8 characters (bytes) long.",
            ));
        }

        if self.password.len() > 1024 {
            return Err(AppError::validation(
                "password",
                "Passwords longer than 1024 characters aren't supported.",
            ));
        }

        Ok(())
    }
}

#[derive(Clone, FromForm)]
pub struct LoginData {
    /// Username, or email when it contains '@'.
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginData:{}", self.username)
    }
}

impl LoginData {
    pub fn is_email(&self) -> bool {
        self.username.contains('@')
    }
}

/// The conflict `signup` runs into in `role`, if any.
async fn existing_identity(
    db: &dyn Store,
    role: Role,
    signup: &SignupData,
) -> Result<Option<AppError>, AppError> {
    if db
        .find_account_by_username(role, &signup.username)
        .await?
        .is_some()
    {
        return Ok(Some(AppError::DuplicateIdentity {
            field: "username",
            value: signup.username.clone(),
        }));
    }

    if db.find_account_by_email(role, &signup.email).await?.is_some() {
        return Ok(Some(AppError::DuplicateIdentity {
            field: "email",
            value: signup.email.clone(),
        }));
    }

    Ok(None)
}

/// Error for an insert the unique indexes rejected. The clashing key is looked up again; when
/// the other record can't be seen the conflict is reported against the account as a whole.
async fn rejected_insert(db: &dyn Store, role: Role, signup: &SignupData) -> AppError {
    match existing_identity(db, role, signup).await {
        Ok(Some(duplicate)) => duplicate,
        Ok(None) => AppError::DuplicateIdentity {
            field: "account",
            value: signup.username.clone(),
        },
        Err(e) => e,
    }
}

/// Creates a new account for `role`. Username and email are unique per role.
pub async fn register(
    db: &dyn Store,
    verifier: &dyn CredentialVerifier,
    role: Role,
    signup: &SignupData,
) -> Result<Account, AppError> {
    signup.validate()?;

    if let Some(duplicate) = existing_identity(db, role, signup).await? {
        return Err(duplicate);
    }

    let account = Account::new(&signup.username, &signup.email, verifier.hash(&signup.password)?);

    // Unique indexes catch a concurrent registration that slipped past the lookups above.
    match db.insert_account(role, &account).await {
        Ok(()) => Ok(account),
        Err(StoreError::Duplicate) => Err(rejected_insert(db, role, signup).await),
        Err(other) => Err(other.into()),
    }
}

/// Checks credentials. Unknown identifiers and wrong passwords are indistinguishable.
pub async fn authenticate(
    db: &dyn Store,
    verifier: &dyn CredentialVerifier,
    role: Role,
    login: &LoginData,
) -> Result<Account, AppError> {
    let found = if login.is_email() {
        db.find_account_by_email(role, &login.username).await?
    } else {
        db.find_account_by_username(role, &login.username).await?
    };

    match found {
        Some(account) if verifier.verify(&login.password, &account.pw_hash) => Ok(account),
        _ => {
            tracing::info!("failed {} login for '{}'", role, login.username);
            Err(AppError::AuthenticationFailure { role })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::MemoryStore;
    use crate::security::cheap_verifier;

    fn signup(user: &str) -> SignupData {
        SignupData {
            username: user.to_string(),
            email: format!("{}@example.com", user),
            password: user.replace('o', "0") + "_pass",
        }
    }

    fn login(identifier: &str, password: &str) -> LoginData {
        LoginData {
            username: identifier.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn validation_rejects_bad_input() {
        let mut data = signup("robin");
        assert!(data.validate().is_ok());

        data.email = "robin.example.com".to_string();
        assert!(matches!(
            data.validate(),
            Err(AppError::Validation { field: "email", .. })
        ));

        let mut data = signup("ro");
        assert!(matches!(
            data.validate(),
            Err(AppError::Validation {
                field: "username",
                ..
            })
        ));

        data = signup("robin");
        data.password = "short".to_string();
        assert!(matches!(
            data.validate(),
            Err(AppError::Validation {
                field: "password",
                ..
            })
        ));
    }

    #[rocket::async_test]
    async fn registered_account_is_retrievable_and_verifies() {
        let db = MemoryStore::default();
        let verifier = cheap_verifier();
        let data = signup("retrievable");

        let account = register(&db, &verifier, Role::Teacher, &data)
            .await
            .expect("registration should succeed");

        let found = db
            .find_account_by_username(Role::Teacher, "retrievable")
            .await
            .expect("store works")
            .expect("account must exist");
        assert_eq!(found.id, account.id);
        assert!(verifier.verify(&data.password, &found.pw_hash));
        assert!(!verifier.verify("something else", &found.pw_hash));
    }

    #[rocket::async_test]
    async fn duplicate_username_is_rejected_without_second_record() {
        let db = MemoryStore::default();
        let verifier = cheap_verifier();

        register(&db, &verifier, Role::Student, &signup("twice"))
            .await
            .expect("first registration succeeds");

        let mut again = signup("twice");
        again.email = "other@example.com".to_string();
        let result = register(&db, &verifier, Role::Student, &again).await;

        assert!(matches!(
            result,
            Err(AppError::DuplicateIdentity {
                field: "username",
                ..
            })
        ));
        assert_eq!(db.account_count(Role::Student), 1);
    }

    #[rocket::async_test]
    async fn duplicate_email_is_rejected() {
        let db = MemoryStore::default();
        let verifier = cheap_verifier();

        register(&db, &verifier, Role::Teacher, &signup("first"))
            .await
            .expect("first registration succeeds");

        let mut other = signup("second");
        other.email = "first@example.com".to_string();
        let result = register(&db, &verifier, Role::Teacher, &other).await;

        assert!(matches!(
            result,
            Err(AppError::DuplicateIdentity { field: "email", .. })
        ));
    }

    #[rocket::async_test]
    async fn rejected_insert_names_the_clashing_key() {
        let db = MemoryStore::default();
        let verifier = cheap_verifier();

        let winner = Account::new(
            "winner",
            "shared@example.com",
            verifier.hash("winner_pass").expect("hashing works"),
        );
        db.insert_account(Role::Student, &winner)
            .await
            .expect("insert works");

        let mut late = signup("late");
        late.email = "shared@example.com".to_string();
        assert!(matches!(
            rejected_insert(&db, Role::Student, &late).await,
            AppError::DuplicateIdentity { field: "email", .. }
        ));

        assert!(matches!(
            rejected_insert(&db, Role::Teacher, &late).await,
            AppError::DuplicateIdentity { field: "account", .. }
        ));
    }

    #[rocket::async_test]
    async fn same_username_may_exist_in_both_roles() {
        let db = MemoryStore::default();
        let verifier = cheap_verifier();

        register(&db, &verifier, Role::Teacher, &signup("shared"))
            .await
            .expect("teacher registration succeeds");
        register(&db, &verifier, Role::Student, &signup("shared"))
            .await
            .expect("student registration succeeds");
    }

    #[rocket::async_test]
    async fn authenticate_by_username_or_email() {
        let db = MemoryStore::default();
        let verifier = cheap_verifier();
        let data = signup("loginable");
        let account = register(&db, &verifier, Role::Student, &data)
            .await
            .expect("registration succeeds");

        let by_name = authenticate(&db, &verifier, Role::Student, &login("loginable", &data.password))
            .await
            .expect("username login works");
        assert_eq!(by_name.id, account.id);

        let by_email = authenticate(
            &db,
            &verifier,
            Role::Student,
            &login("loginable@example.com", &data.password),
        )
        .await
        .expect("email login works");
        assert_eq!(by_email.id, account.id);
    }

    #[rocket::async_test]
    async fn authenticate_rejects_bad_credentials() {
        let db = MemoryStore::default();
        let verifier = cheap_verifier();
        let data = signup("guarded");
        register(&db, &verifier, Role::Teacher, &data)
            .await
            .expect("registration succeeds");

        let wrong_password =
            authenticate(&db, &verifier, Role::Teacher, &login("guarded", "nope-nope")).await;
        assert!(matches!(
            wrong_password,
            Err(AppError::AuthenticationFailure {
                role: Role::Teacher
            })
        ));

        let wrong_role =
            authenticate(&db, &verifier, Role::Student, &login("guarded", &data.password)).await;
        assert!(matches!(
            wrong_role,
            Err(AppError::AuthenticationFailure {
                role: Role::Student
            })
        ));
    }
}
