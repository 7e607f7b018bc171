use rocket::form::Form;
use rocket::fs::NamedFile;
use rocket::response::Redirect;
use rocket::State;

use crate::config::Config;
use crate::data::user::db::{self as user_db, LoginData, SignupData};
use crate::data::DynStore;
use crate::error::AppError;
use crate::role::Role;
use crate::route::files::static_page;
use crate::security::DynVerifier;
use crate::session::{Identity, Session};

pub const TEACHER_LANDING: &str = "/videos/dashboard";

/// Teachers always land on their dashboard. Students go back to wherever they were turned
/// away from, or the index.
fn landing(role: Role, session: &Session<'_>) -> String {
    let return_to = session.take_return_to();
    match role {
        Role::Teacher => TEACHER_LANDING.to_string(),
        Role::Student => return_to.unwrap_or_else(|| "/".to_string()),
    }
}

#[get("/auth/login/<role>")]
pub async fn login_form(role: Role, c: &State<Config>) -> Result<NamedFile, AppError> {
    static_page(c, &format!("auth/login/{}.html", role)).await
}

#[get("/auth/register/<role>")]
pub async fn register_form(role: Role, c: &State<Config>) -> Result<NamedFile, AppError> {
    static_page(c, &format!("auth/register/{}.html", role)).await
}

#[post("/auth/login/<role>", data = "<login>")]
#[tracing::instrument(skip(session, db, verifier))]
pub async fn login_submit(
    role: Role,
    login: Form<LoginData>,
    session: Session<'_>,
    db: &State<DynStore>,
    verifier: &State<DynVerifier>,
) -> Result<Redirect, AppError> {
    let account =
        match user_db::authenticate(db.inner().as_ref(), verifier.inner().as_ref(), role, &login)
            .await
        {
            Ok(account) => account,
            Err(e) => {
                session.clear_identity();
                return Err(e);
            }
        };

    session.sign_in(Identity::new(role, account.id));
    tracing::info!("{} '{}' signed in", role, account.username);

    Ok(Redirect::to(landing(role, &session)))
}

#[post("/auth/register/<role>", data = "<signup>")]
#[tracing::instrument(skip(session, db, verifier))]
pub async fn register_submit(
    role: Role,
    signup: Form<SignupData>,
    session: Session<'_>,
    db: &State<DynStore>,
    verifier: &State<DynVerifier>,
) -> Result<Redirect, AppError> {
    let account =
        user_db::register(db.inner().as_ref(), verifier.inner().as_ref(), role, &signup).await?;

    session.sign_in(Identity::new(role, account.id));
    tracing::info!("{} '{}' registered", role, account.username);

    Ok(Redirect::to(landing(role, &session)))
}

#[get("/logout")]
pub async fn logout(session: Session<'_>) -> Redirect {
    session.sign_out();
    Redirect::to("/")
}
