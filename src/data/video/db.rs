use rocket::fs::TempFile;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::{Store, WatchOutcome};
use crate::error::AppError;
use crate::media::MediaStorage;

use super::{Video, VideoDetail, VideoMetadata, VideoSummary, VideoView, Viewer};

#[derive(Debug, FromForm)]
pub struct VideoUpload<'r> {
    pub video: VideoMetadata,
    pub file: Option<TempFile<'r>>,
}

#[derive(Debug, FromForm)]
pub struct VideoEdit {
    pub video: VideoMetadata,
}

/// Body of `POST /vidWatch`, sent either as JSON or as a form.
#[derive(Debug, Clone, Copy, Deserialize, FromForm, ToSchema)]
pub struct WatchRequest {
    #[serde(rename = "vidId")]
    #[field(name = "vidId")]
    pub vid_id: Uuid,
}

/// Teacher's videos in upload order. Ids that no longer resolve are skipped.
pub async fn owned_videos(db: &dyn Store, teacher: Uuid) -> Result<Vec<VideoSummary>, AppError> {
    let ids = db
        .owned_video_ids(teacher)
        .await?
        .ok_or_else(|| AppError::not_found("teacher", teacher))?;

    let mut videos = Vec::with_capacity(ids.len());
    for id in ids {
        match db.get_video(id).await? {
            Some(video) => videos.push(VideoSummary::from(&video)),
            None => tracing::warn!("teacher {} references missing video {}", teacher, id),
        }
    }

    Ok(videos)
}

/// Stores the uploaded file and records a new video owned by `teacher`.
pub async fn upload(
    db: &dyn Store,
    media: &dyn MediaStorage,
    teacher: Uuid,
    upload: &mut VideoUpload<'_>,
) -> Result<Video, AppError> {
    let metadata = upload.video.clone().validated()?;

    let file = match upload.file.as_mut() {
        Some(file) if file.len() > 0 => file,
        _ => return Err(AppError::Upload("No video file was submitted.".to_string())),
    };

    let source_url = media.store(file).await?;
    let video = Video::new(metadata, source_url);

    if let Err(e) = record_upload(db, teacher, &video).await {
        media.discard(&video.source_url).await;
        return Err(e);
    }

    Ok(video)
}

/// Inserts the video and appends it to the teacher. A video the teacher couldn't take is
/// removed again.
async fn record_upload(db: &dyn Store, teacher: Uuid, video: &Video) -> Result<(), AppError> {
    db.insert_video(video).await?;

    let failure = match db.push_owned_video(teacher, video.id).await {
        Ok(true) => return Ok(()),
        Ok(false) => {
            tracing::warn!("uploader {} of video {} no longer exists", teacher, video.id);
            AppError::not_found("teacher", teacher)
        }
        Err(e) => e.into(),
    };

    if let Err(e) = db.remove_video(video.id).await {
        tracing::error!("unable to remove unowned video {}: {}", video.id, e);
    }
    Err(failure)
}

/// Video and the table of students that watched it.
pub async fn detail(db: &dyn Store, id: Uuid) -> Result<VideoDetail, AppError> {
    let video = db
        .get_video(id)
        .await?
        .ok_or_else(|| AppError::not_found("video", id))?;

    let viewers = db
        .get_students(&video.watch_ids)
        .await?
        .into_iter()
        .map(|student| Viewer {
            username: student.username,
            email: student.email,
        })
        .collect();

    Ok(VideoDetail {
        video: VideoView::from(video),
        viewers,
    })
}

pub async fn update(db: &dyn Store, id: Uuid, edit: VideoMetadata) -> Result<Video, AppError> {
    let metadata = edit.validated()?;
    db.update_video(id, &metadata)
        .await?
        .ok_or_else(|| AppError::not_found("video", id))
}

/// Adds `student` to the watchers of `video`. Repeated calls leave a single entry.
pub async fn record_watch(db: &dyn Store, video: Uuid, student: Uuid) -> Result<bool, AppError> {
    match db.add_watcher(video, student).await? {
        WatchOutcome::Added => {
            tracing::debug!("student {} watched video {}", student, video);
            Ok(true)
        }
        WatchOutcome::AlreadyWatched => Ok(false),
        WatchOutcome::VideoMissing => Err(AppError::not_found("video", video)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::MemoryStore;
    use crate::data::user::{Account, PasswordHash};
    use crate::role::Role;
    use std::sync::Arc;

    fn video(title: &str) -> Video {
        Video::new(
            VideoMetadata {
                title: title.to_string(),
                description: String::new(),
            },
            format!("/media/{}.mp4", title),
        )
    }

    async fn teacher(db: &MemoryStore) -> Uuid {
        let account = Account::new("teach", "teach@example.com", PasswordHash::from_phc("x"));
        db.insert_account(Role::Teacher, &account)
            .await
            .expect("insert works");
        account.id
    }

    #[rocket::async_test]
    async fn unowned_upload_is_rolled_back() {
        let db = MemoryStore::default();
        let orphan = video("orphan");

        let result = record_upload(&db, Uuid::new_v4(), &orphan).await;
        assert!(matches!(
            result,
            Err(AppError::NotFound { kind: "teacher", .. })
        ));
        assert!(db.get_video(orphan.id).await.expect("store works").is_none());

        let owner = teacher(&db).await;
        let kept = video("kept");
        record_upload(&db, owner, &kept).await.expect("upload is recorded");
        assert_eq!(
            db.owned_video_ids(owner).await.expect("store works"),
            Some(vec![kept.id])
        );
    }

    #[rocket::async_test]
    async fn owned_videos_keep_upload_order_and_skip_missing() {
        let db = MemoryStore::default();
        let teacher = teacher(&db).await;

        let first = video("first");
        let second = video("second");
        for v in [&first, &second] {
            db.insert_video(v).await.expect("insert works");
        }
        db.push_owned_video(teacher, first.id).await.expect("push works");
        db.push_owned_video(teacher, Uuid::new_v4())
            .await
            .expect("push works");
        db.push_owned_video(teacher, second.id)
            .await
            .expect("push works");

        let listed = owned_videos(&db, teacher).await.expect("listing works");
        let titles: Vec<_> = listed.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
        assert_eq!(listed[0].thumbnail_url, "/media/first.jpg");
    }

    #[rocket::async_test]
    async fn owned_videos_of_unknown_teacher_is_not_found() {
        let db = MemoryStore::default();
        let result = owned_videos(&db, Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound { kind: "teacher", .. })));
    }

    #[rocket::async_test]
    async fn record_watch_is_idempotent() {
        let db = MemoryStore::default();
        let v = video("idempotent");
        db.insert_video(&v).await.expect("insert works");
        let student = Uuid::new_v4();

        assert!(record_watch(&db, v.id, student).await.expect("recorded"));
        assert!(!record_watch(&db, v.id, student).await.expect("recorded"));

        let stored = db.get_video(v.id).await.expect("get works").expect("exists");
        assert_eq!(stored.watch_ids, vec![student]);
    }

    #[rocket::async_test]
    async fn record_watch_on_missing_video_is_not_found() {
        let db = MemoryStore::default();
        let result = record_watch(&db, Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound { kind: "video", .. })));
    }

    #[rocket::async_test]
    async fn concurrent_watches_are_all_recorded() {
        let db = Arc::new(MemoryStore::default());
        let v = video("popular");
        db.insert_video(&v).await.expect("insert works");
        let video_id = v.id;

        let students: Vec<Uuid> = (0..16).map(|_| Uuid::new_v4()).collect();
        let tasks: Vec<_> = students
            .iter()
            .copied()
            .map(|student| {
                let db = Arc::clone(&db);
                tokio::spawn(async move { record_watch(db.as_ref(), video_id, student).await })
            })
            .collect();

        for task in tasks {
            assert!(task
                .await
                .expect("task completes")
                .expect("watch recorded"));
        }

        let stored = db.get_video(v.id).await.expect("get works").expect("exists");
        assert_eq!(stored.watch_ids.len(), students.len());
        for student in &students {
            assert!(stored.watch_ids.contains(student));
        }
    }

    #[rocket::async_test]
    async fn detail_lists_known_viewers() {
        let db = MemoryStore::default();
        let v = video("detailed");
        db.insert_video(&v).await.expect("insert works");

        let student = Account::new("viewer", "viewer@example.com", PasswordHash::from_phc("x"));
        db.insert_account(Role::Student, &student)
            .await
            .expect("insert works");
        record_watch(&db, v.id, student.id).await.expect("recorded");
        record_watch(&db, v.id, Uuid::new_v4()).await.expect("recorded");

        let detail = detail(&db, v.id).await.expect("detail works");
        assert_eq!(detail.video.watch_count, 2);
        assert_eq!(detail.viewers.len(), 1);
        assert_eq!(detail.viewers[0].username, "viewer");
    }

    #[rocket::async_test]
    async fn update_validates_and_reports_missing() {
        let db = MemoryStore::default();
        let v = video("editable");
        db.insert_video(&v).await.expect("insert works");

        let updated = update(
            &db,
            v.id,
            VideoMetadata {
                title: " Renamed ".to_string(),
                description: "new".to_string(),
            },
        )
        .await
        .expect("update works");
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.source_url, v.source_url);

        let missing = update(
            &db,
            Uuid::new_v4(),
            VideoMetadata {
                title: "x".to_string(),
                description: String::new(),
            },
        )
        .await;
        assert!(matches!(missing, Err(AppError::NotFound { kind: "video", .. })));
    }
}
