use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod db;

/// Stored credential in PHC string format. Never leaves the server.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn from_phc(phc: impl Into<String>) -> PasswordHash {
        PasswordHash(phc.into())
    }

    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PasswordHash(..)")
    }
}

/// Identity record shared by both roles. Teacher documents additionally carry the ids of
/// their uploaded videos, which are read and appended through the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub pw_hash: PasswordHash,
}

impl Account {
    pub fn new(username: impl ToString, email: impl ToString, pw_hash: PasswordHash) -> Account {
        let id = Uuid::new_v4();
        tracing::info!("Creating a new account with UUID: {}", id);

        Account {
            id,
            username: username.to_string(),
            email: email.to_string(),
            pw_hash,
        }
    }
}
