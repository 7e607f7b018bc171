use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::error::StoreError;
use crate::middleware::paging::PageState;
use crate::role::Role;

use super::user::Account;
use super::video::{Video, VideoMetadata};
use super::{Store, WatchOutcome};

#[derive(Debug, Default)]
struct Tables {
    teachers: HashMap<Uuid, (Account, Vec<Uuid>)>,
    students: HashMap<Uuid, Account>,
    videos: HashMap<Uuid, Video>,
}

impl Tables {
    fn accounts(&self, role: Role) -> Box<dyn Iterator<Item = &Account> + '_> {
        match role {
            Role::Teacher => Box::new(self.teachers.values().map(|(account, _)| account)),
            Role::Student => Box::new(self.students.values()),
        }
    }
}

/// Process-local store. Every operation runs under one lock, which makes uniqueness checks
/// and watcher updates atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn account_count(&self, role: Role) -> usize {
        self.tables().accounts(role).count()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_account(&self, role: Role, account: &Account) -> Result<(), StoreError> {
        let mut tables = self.tables();

        let taken = tables
            .accounts(role)
            .any(|it| it.username == account.username || it.email == account.email);
        if taken {
            return Err(StoreError::Duplicate);
        }

        match role {
            Role::Teacher => {
                tables
                    .teachers
                    .insert(account.id, (account.clone(), vec![]));
            }
            Role::Student => {
                tables.students.insert(account.id, account.clone());
            }
        }

        Ok(())
    }

    async fn find_account_by_username(
        &self,
        role: Role,
        username: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .tables()
            .accounts(role)
            .find(|it| it.username == username)
            .cloned())
    }

    async fn find_account_by_email(
        &self,
        role: Role,
        email: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .tables()
            .accounts(role)
            .find(|it| it.email == email)
            .cloned())
    }

    async fn get_students(&self, ids: &[Uuid]) -> Result<Vec<Account>, StoreError> {
        let tables = self.tables();
        Ok(ids
            .iter()
            .filter_map(|id| tables.students.get(id).cloned())
            .collect())
    }

    async fn owned_video_ids(&self, teacher: Uuid) -> Result<Option<Vec<Uuid>>, StoreError> {
        Ok(self
            .tables()
            .teachers
            .get(&teacher)
            .map(|(_, videos)| videos.clone()))
    }

    async fn push_owned_video(&self, teacher: Uuid, video: Uuid) -> Result<bool, StoreError> {
        Ok(match self.tables().teachers.get_mut(&teacher) {
            Some((_, videos)) => {
                videos.push(video);
                true
            }
            None => false,
        })
    }

    async fn insert_video(&self, video: &Video) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if tables.videos.contains_key(&video.id) {
            return Err(StoreError::Duplicate);
        }
        tables.videos.insert(video.id, video.clone());
        Ok(())
    }

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        Ok(self.tables().videos.get(&id).cloned())
    }

    async fn remove_video(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables().videos.remove(&id).is_some())
    }

    async fn list_videos(&self, page: PageState) -> Result<Vec<Video>, StoreError> {
        let tables = self.tables();
        let mut videos: Vec<&Video> = tables.videos.values().collect();
        videos.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));

        Ok(videos
            .into_iter()
            .skip(page.skip() as usize)
            .take(page.page_length as usize)
            .cloned()
            .collect())
    }

    async fn update_video(
        &self,
        id: Uuid,
        metadata: &VideoMetadata,
    ) -> Result<Option<Video>, StoreError> {
        Ok(self.tables().videos.get_mut(&id).map(|video| {
            video.title = metadata.title.clone();
            video.description = metadata.description.clone();
            video.clone()
        }))
    }

    async fn add_watcher(&self, video: Uuid, student: Uuid) -> Result<WatchOutcome, StoreError> {
        Ok(match self.tables().videos.get_mut(&video) {
            None => WatchOutcome::VideoMissing,
            Some(video) if video.watch_ids.contains(&student) => WatchOutcome::AlreadyWatched,
            Some(video) => {
                video.watch_ids.push(student);
                WatchOutcome::Added
            }
        })
    }
}
