use rocket::form::Form;
use rocket::fs::NamedFile;
use rocket::http::uri::Origin;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::data::video::db::{self as video_db, VideoEdit, VideoUpload};
use crate::data::video::{VideoDetail, VideoSummary, VideoView};
use crate::data::DynStore;
use crate::error::AppError;
use crate::media::DynMedia;
use crate::middleware::access::require_teacher;
use crate::middleware::paging::PageState;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::route::files::static_page;
use crate::session::Session;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionStatus {
    pub signed_in: bool,
    pub role: Option<Role>,
}

/// Landing page
#[utoipa::path(
    responses(
        (status = 200, description = "Role the current session is signed in as", body = SessionStatus),
    )
)]
#[get("/")]
#[tracing::instrument]
pub async fn index(session: Session<'_>) -> Json<SessionStatus> {
    let role = session.identity().role();
    Json(SessionStatus {
        signed_in: role.is_some(),
        role,
    })
}

#[get("/videos/about")]
pub async fn about(c: &State<Config>) -> Result<NamedFile, AppError> {
    static_page(c, "videos/about.html").await
}

/// Videos uploaded by the signed in teacher, in upload order
#[utoipa::path(
    responses(
        (status = 200, description = "Own videos", body = Vec<VideoSummary>),
        (status = 303, description = "Not signed in as a teacher"),
    )
)]
#[get("/videos/dashboard")]
#[tracing::instrument(skip(db))]
pub async fn dashboard(
    session: Session<'_>,
    origin: &Origin<'_>,
    db: &State<DynStore>,
) -> Result<Json<Vec<VideoSummary>>, AppError> {
    let teacher = require_teacher(&session, origin)?;
    Ok(Json(video_db::owned_videos(db.inner().as_ref(), teacher).await?))
}

/// All videos, newest first
#[utoipa::path(
    params(
        ("page" = Option<u32>, Query, description = "Page number, alias `p`"),
        ("len" = Option<u32>, Query, description = "Page length, alias `l`"),
    ),
    responses(
        (status = 200, description = "One page of videos", body = Vec<VideoSummary>),
        (status = 303, description = "Not signed in as a teacher"),
    )
)]
#[get("/videos")]
#[tracing::instrument(skip(db))]
pub async fn video_list(
    page: PageState,
    session: Session<'_>,
    origin: &Origin<'_>,
    db: &State<DynStore>,
) -> Result<Json<Vec<VideoSummary>>, AppError> {
    require_teacher(&session, origin)?;

    let videos = db.list_videos(page).await?;
    Ok(Json(videos.iter().map(VideoSummary::from).collect()))
}

#[get("/videos/new")]
pub async fn new_form(
    session: Session<'_>,
    origin: &Origin<'_>,
    c: &State<Config>,
) -> Result<NamedFile, AppError> {
    require_teacher(&session, origin)?;
    static_page(c, "videos/new.html").await
}

#[post("/videos", data = "<upload>")]
#[tracing::instrument(skip(db, media))]
pub async fn video_create(
    mut upload: Form<VideoUpload<'_>>,
    session: Session<'_>,
    origin: &Origin<'_>,
    db: &State<DynStore>,
    media: &State<DynMedia>,
) -> Result<Redirect, AppError> {
    let teacher = require_teacher(&session, origin)?;

    let video = video_db::upload(
        db.inner().as_ref(),
        media.inner().as_ref(),
        teacher,
        &mut upload,
    )
    .await?;
    tracing::info!("teacher {} uploaded video {}", teacher, video.id);

    Ok(Redirect::to(format!("/videos/{}", video.id)))
}

/// Video with the students that watched it
#[utoipa::path(
    params(
        ("id", description = "video ID")
    ),
    responses(
        (status = 200, description = "Video and its viewers", body = VideoDetail),
        (status = 303, description = "Not signed in as a teacher"),
        (status = 404, description = "Video doesn't exist", body = Problem),
    )
)]
#[get("/videos/<id>")]
#[tracing::instrument(skip(db))]
pub async fn video_detail(
    id: Uuid,
    session: Session<'_>,
    origin: &Origin<'_>,
    db: &State<DynStore>,
) -> Result<Json<VideoDetail>, AppError> {
    require_teacher(&session, origin)?;
    Ok(Json(video_db::detail(db.inner().as_ref(), id).await?))
}

/// Current metadata, used to fill the edit form
#[utoipa::path(
    params(
        ("id", description = "video ID")
    ),
    responses(
        (status = 200, description = "Video to edit", body = VideoView),
        (status = 303, description = "Not signed in as a teacher"),
        (status = 404, description = "Video doesn't exist", body = Problem),
    )
)]
#[get("/videos/<id>/edit")]
#[tracing::instrument(skip(db))]
pub async fn edit_form(
    id: Uuid,
    session: Session<'_>,
    origin: &Origin<'_>,
    db: &State<DynStore>,
) -> Result<Json<VideoView>, AppError> {
    require_teacher(&session, origin)?;

    let video = db
        .get_video(id)
        .await?
        .ok_or_else(|| AppError::not_found("video", id))?;
    Ok(Json(VideoView::from(video)))
}

#[put("/videos/<id>", data = "<edit>")]
#[tracing::instrument(skip(db))]
pub async fn video_update(
    id: Uuid,
    edit: Form<VideoEdit>,
    session: Session<'_>,
    origin: &Origin<'_>,
    db: &State<DynStore>,
) -> Result<Redirect, AppError> {
    require_teacher(&session, origin)?;

    let video = video_db::update(db.inner().as_ref(), id, edit.into_inner().video).await?;
    Ok(Redirect::to(format!("/videos/{}", video.id)))
}
