use rocket::http::uri::Origin;
use rocket::serde::json::Json;
use rocket::{Build, Rocket, Route};

pub mod auth;
pub mod files;
pub mod videos;
pub mod watch;

#[cfg(test)]
pub mod testing;

use auth::*;
use files::*;
use videos::*;
use watch::*;

use utoipa::OpenApi;

use crate::{
    config::Config,
    data::video::{db::WatchRequest, VideoDetail, VideoSummary, VideoView, Viewer},
    resp::problem::Problem,
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        index,
        dashboard,
        video_list,
        video_detail,
        edit_form,
        watch_video,
        vid_watch
    ),
    components(schemas(
        Role,
        SessionStatus,
        VideoSummary,
        VideoView,
        VideoDetail,
        Viewer,
        WatchRequest,
        WatchRecorded,
        Problem
    ))
)]
pub struct ApiDoc;

#[get("/api-docs/openapi.json")]
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn pages() -> Vec<Route> {
    routes![
        index,
        about,
        dashboard,
        video_list,
        new_form,
        video_create,
        video_detail,
        edit_form,
        video_update,
        watch_video,
        vid_watch,
        vid_watch_form,
        login_form,
        login_submit,
        register_form,
        register_submit,
        logout,
        openapi
    ]
}

/// Base the media route is mounted on, if `media_url` is a local path.
fn media_base(c: &Config) -> Option<String> {
    if !c.media_url.starts_with('/') {
        return None;
    }

    let base = match c.media_url.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    Origin::parse(base).ok().map(|it| it.path().to_string())
}

pub fn mount_routes(rocket: Rocket<Build>, c: &Config) -> Rocket<Build> {
    let rocket = rocket.mount("/", pages());

    match media_base(c) {
        Some(base) => rocket.mount(base, routes![media_file]),
        None => {
            tracing::warn!(
                "media_url '{}' isn't a local path, uploaded media won't be served",
                c.media_url
            );
            rocket
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::testing::client;
    use rocket::http::Status;

    #[test]
    fn media_base_requires_local_path() {
        let mut c = Config::default();

        c.media_url = "/media/".to_string();
        assert_eq!(media_base(&c).as_deref(), Some("/media"));

        c.media_url = "https://cdn.example.com/videos".to_string();
        assert_eq!(media_base(&c), None);
    }

    #[rocket::async_test]
    async fn openapi_document_lists_json_endpoints() {
        let (client, _media) = client().await;

        let response = client.get("/api-docs/openapi.json").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let doc: serde_json::Value = response.into_json().await.expect("openapi is json");
        assert!(doc["paths"]["/vidWatch"].is_object());
        assert!(doc["paths"]["/videos/dashboard"].is_object());
    }

    #[rocket::async_test]
    async fn form_pages_are_served() {
        let (client, _media) = client().await;

        for page in [
            "/auth/login/teacher",
            "/auth/login/student",
            "/auth/register/teacher",
            "/auth/register/student",
        ] {
            let response = client.get(page).dispatch().await;
            assert_eq!(response.status(), Status::Ok, "{} is served", page);
            assert_eq!(response.content_type(), Some(rocket::http::ContentType::HTML));
        }
    }
}
