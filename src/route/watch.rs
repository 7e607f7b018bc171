use rocket::form::Form;
use rocket::http::uri::Origin;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::video::db::{self as video_db, WatchRequest};
use crate::data::video::VideoView;
use crate::data::{DynStore, Store};
use crate::error::AppError;
use crate::middleware::access::require_viewer;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::session::{Identity, Session};

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct WatchRecorded {
    /// `true` only when this call added the student to the video's viewers.
    pub recorded: bool,
}

/// Play a video
#[utoipa::path(
    params(
        ("id", description = "video ID")
    ),
    responses(
        (status = 200, description = "Playable video", body = VideoView),
        (status = 303, description = "Not signed in"),
        (status = 404, description = "Video doesn't exist", body = Problem),
    )
)]
#[get("/watch/<id>")]
#[tracing::instrument(skip(db))]
pub async fn watch_video(
    id: Uuid,
    session: Session<'_>,
    origin: &Origin<'_>,
    db: &State<DynStore>,
) -> Result<Json<VideoView>, AppError> {
    require_viewer(&session, origin)?;

    let video = db
        .get_video(id)
        .await?
        .ok_or_else(|| AppError::not_found("video", id))?;
    Ok(Json(VideoView::from(video)))
}

/// Record that the signed in student watched a video
#[utoipa::path(
    request_body = WatchRequest,
    responses(
        (status = 200, description = "Whether a new viewer was recorded", body = WatchRecorded),
        (status = 303, description = "Not signed in"),
        (status = 404, description = "Video doesn't exist", body = Problem),
    )
)]
#[post("/vidWatch", format = "json", data = "<request>")]
#[tracing::instrument(skip(db))]
pub async fn vid_watch(
    request: Json<WatchRequest>,
    session: Session<'_>,
    db: &State<DynStore>,
) -> Result<Json<WatchRecorded>, AppError> {
    track_watch(request.vid_id, &session, db.inner().as_ref()).await
}

#[post("/vidWatch", format = "form", data = "<request>")]
#[tracing::instrument(skip(db))]
pub async fn vid_watch_form(
    request: Form<WatchRequest>,
    session: Session<'_>,
    db: &State<DynStore>,
) -> Result<Json<WatchRecorded>, AppError> {
    track_watch(request.vid_id, &session, db.inner().as_ref()).await
}

async fn track_watch(
    video: Uuid,
    session: &Session<'_>,
    db: &dyn Store,
) -> Result<Json<WatchRecorded>, AppError> {
    let recorded = match session.identity() {
        Identity::Anonymous => {
            return Err(AppError::Unauthenticated {
                role: Role::Student,
            })
        }
        Identity::Student(student) => video_db::record_watch(db, video, student).await?,
        Identity::Teacher(_) => {
            if db.get_video(video).await?.is_none() {
                return Err(AppError::not_found("video", video));
            }
            false
        }
    };

    Ok(Json(WatchRecorded { recorded }))
}
