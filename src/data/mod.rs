use uuid::Uuid;

use crate::error::StoreError;
use crate::middleware::paging::PageState;
use crate::role::Role;

use self::user::Account;
use self::video::{Video, VideoMetadata};

pub mod memory;
pub mod mongo;
pub mod user;
pub mod video;

pub type DynStore = Box<dyn Store>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WatchOutcome {
    Added,
    AlreadyWatched,
    VideoMissing,
}

/// Persistence for accounts and videos.
///
/// Implementations must make `insert_account` reject duplicate usernames and emails within a
/// role, and `add_watcher`/`push_owned_video` must be atomic with respect to concurrent calls
/// on the same record.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the username or email is taken in `role`.
    async fn insert_account(&self, role: Role, account: &Account) -> Result<(), StoreError>;

    async fn find_account_by_username(
        &self,
        role: Role,
        username: &str,
    ) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_email(
        &self,
        role: Role,
        email: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Students with the given ids. Unknown ids are left out.
    async fn get_students(&self, ids: &[Uuid]) -> Result<Vec<Account>, StoreError>;

    /// `None` when the teacher doesn't exist.
    async fn owned_video_ids(&self, teacher: Uuid) -> Result<Option<Vec<Uuid>>, StoreError>;

    /// Appends to the teacher's videos. `false` when the teacher doesn't exist.
    async fn push_owned_video(&self, teacher: Uuid, video: Uuid) -> Result<bool, StoreError>;

    async fn insert_video(&self, video: &Video) -> Result<(), StoreError>;

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, StoreError>;

    /// Deletes a video record. `false` when it didn't exist.
    async fn remove_video(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Newest first.
    async fn list_videos(&self, page: PageState) -> Result<Vec<Video>, StoreError>;

    /// Replaces title and description, returning the updated video.
    async fn update_video(
        &self,
        id: Uuid,
        metadata: &VideoMetadata,
    ) -> Result<Option<Video>, StoreError>;

    /// Adds the student to the video's watchers unless already present.
    async fn add_watcher(&self, video: Uuid, student: Uuid) -> Result<WatchOutcome, StoreError>;
}

/// Stores a list of UUIDs as BSON binaries of the UUID subtype, the same representation
/// `bson::serde_helpers::uuid_1_as_binary` uses for single values.
pub mod uuid_vec_as_binary {
    use bson::spec::BinarySubtype;
    use bson::Binary;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(ids: &[Uuid], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(ids.len()))?;
        for id in ids {
            seq.serialize_element(&Binary {
                subtype: BinarySubtype::Uuid,
                bytes: id.as_bytes().to_vec(),
            })?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Uuid>, D::Error> {
        Vec::<Binary>::deserialize(deserializer)?
            .into_iter()
            .map(|bin| Uuid::from_slice(&bin.bytes).map_err(serde::de::Error::custom))
            .collect()
    }
}
