use bson::spec::BinarySubtype;
use bson::{doc, Binary, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use rocket::futures::TryStreamExt;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::middleware::paging::PageState;
use crate::role::Role;

use super::user::Account;
use super::video::{Video, VideoMetadata};
use super::{Store, WatchOutcome};

pub static VIDEO_COLLECTION_NAME: &str = "videos";

const DUPLICATE_KEY: i32 = 11000;

mod filter {
    use super::*;

    #[inline]
    pub fn uuid(id: Uuid) -> Bson {
        Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes: id.as_bytes().to_vec(),
        })
    }

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": uuid(id) }
    }

    #[inline]
    pub fn by_ids(ids: &[Uuid]) -> Document {
        let ids: Vec<Bson> = ids.iter().copied().map(uuid).collect();
        doc! { "_id": { "$in": ids } }
    }

    #[inline]
    pub fn by_username(username: &str) -> Document {
        doc! { "username": username }
    }

    #[inline]
    pub fn by_email(email: &str) -> Document {
        doc! { "email": email }
    }
}

#[derive(Debug, Deserialize)]
struct OwnedVideos {
    #[serde(default, with = "super::uuid_vec_as_binary")]
    video_ids: Vec<Uuid>,
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) => failure.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<MongoStore, StoreError> {
        tracing::info!("Connecting to MongoDB: {}", uri);
        let client = Client::with_uri_str(uri).await?;

        tracing::info!("Using MongoDB database: {}", db_name);
        let store = MongoStore::new(client.database(db_name));

        store.db.run_command(doc! { "ping": 1 }, None).await?;
        store.ensure_indexes().await?;

        Ok(store)
    }

    pub fn new(db: Database) -> MongoStore {
        MongoStore { db }
    }

    fn accounts(&self, role: Role) -> Collection<Account> {
        self.db.collection(role.collection_name())
    }

    fn videos(&self) -> Collection<Video> {
        self.db.collection(VIDEO_COLLECTION_NAME)
    }

    /// Unique username and email per role collection.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        for role in [Role::Teacher, Role::Student] {
            for key in ["username", "email"] {
                let mut keys = Document::new();
                keys.insert(key, 1);

                let index = IndexModel::builder()
                    .keys(keys)
                    .options(IndexOptions::builder().unique(true).build())
                    .build();
                self.accounts(role).create_index(index, None).await?;
            }
        }

        let uploaded = IndexModel::builder()
            .keys(doc! { "uploaded_at": -1 })
            .build();
        self.videos().create_index(uploaded, None).await?;

        Ok(())
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_account(&self, role: Role, account: &Account) -> Result<(), StoreError> {
        match self.accounts(role).insert_one(account, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_account_by_username(
        &self,
        role: Role,
        username: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts(role)
            .find_one(filter::by_username(username), None)
            .await?)
    }

    async fn find_account_by_email(
        &self,
        role: Role,
        email: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts(role)
            .find_one(filter::by_email(email), None)
            .await?)
    }

    async fn get_students(&self, ids: &[Uuid]) -> Result<Vec<Account>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut found: Vec<Account> = self
            .accounts(Role::Student)
            .find(filter::by_ids(ids), None)
            .await?
            .try_collect()
            .await?;

        // $in doesn't preserve the order of the watcher list
        found.sort_by_key(|account| ids.iter().position(|id| *id == account.id));
        Ok(found)
    }

    async fn owned_video_ids(&self, teacher: Uuid) -> Result<Option<Vec<Uuid>>, StoreError> {
        let owned = self
            .db
            .collection::<OwnedVideos>(Role::Teacher.collection_name())
            .find_one(filter::by_id(teacher), None)
            .await?;

        Ok(owned.map(|it| it.video_ids))
    }

    async fn push_owned_video(&self, teacher: Uuid, video: Uuid) -> Result<bool, StoreError> {
        let result = self
            .accounts(Role::Teacher)
            .update_one(
                filter::by_id(teacher),
                doc! { "$push": { "video_ids": filter::uuid(video) } },
                None,
            )
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn insert_video(&self, video: &Video) -> Result<(), StoreError> {
        match self.videos().insert_one(video, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        Ok(self.videos().find_one(filter::by_id(id), None).await?)
    }

    async fn remove_video(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = self.videos().delete_one(filter::by_id(id), None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn list_videos(&self, page: PageState) -> Result<Vec<Video>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "uploaded_at": -1 })
            .skip(page.skip())
            .limit(page.page_length as i64)
            .build();

        Ok(self
            .videos()
            .find(None, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn update_video(
        &self,
        id: Uuid,
        metadata: &VideoMetadata,
    ) -> Result<Option<Video>, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .videos()
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": {
                    "title": metadata.title.as_str(),
                    "description": metadata.description.as_str(),
                } },
                options,
            )
            .await?)
    }

    async fn add_watcher(&self, video: Uuid, student: Uuid) -> Result<WatchOutcome, StoreError> {
        // $addToSet keeps concurrent watchers from overwriting each other
        let result = self
            .videos()
            .update_one(
                filter::by_id(video),
                doc! { "$addToSet": { "watch_ids": filter::uuid(student) } },
                None,
            )
            .await?;

        Ok(if result.matched_count == 0 {
            WatchOutcome::VideoMissing
        } else if result.modified_count == 0 {
            WatchOutcome::AlreadyWatched
        } else {
            WatchOutcome::Added
        })
    }
}
