//! Shared setup for endpoint tests: an in-memory store, media in a throwaway directory and
//! cheap password hashing.

use std::path::{Path, PathBuf};

use rocket::http::ContentType;
use rocket::local::asynchronous::{Client, LocalResponse};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::data::memory::MemoryStore;
use crate::media::LocalMedia;
use crate::security::cheap_verifier;

const BOUNDARY: &str = "vidify-test-boundary";

/// Media directory removed when the test ends.
pub struct TempMedia(PathBuf);

impl TempMedia {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempMedia {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub async fn client() -> (Client, TempMedia) {
    let media_dir = std::env::temp_dir().join(format!("vidify-test-{}", Uuid::new_v4().simple()));

    let mut config = Config::default();
    config.store = StoreBackend::Memory;
    config.public_content = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public");
    config.media_dir = media_dir.clone();
    config.media_url = "/media".to_string();

    let media = LocalMedia::new(&config.media_dir, &config.media_url).expect("temp dir is writable");
    let rocket = crate::build(
        config,
        Box::new(MemoryStore::default()),
        Box::new(media),
        Box::new(cheap_verifier()),
    )
    .expect("valid test backend");

    let client = Client::tracked(rocket).await.expect("invalid backend");
    (client, TempMedia(media_dir))
}

pub fn form_signup(name: &str) -> String {
    format!(
        "username={}&email={}%40example.com&password={}-password",
        name, name, name
    )
}

pub fn form_login(identifier: &str, name: &str) -> String {
    format!("username={}&password={}-password", identifier, name)
}

pub async fn register<'c>(client: &'c Client, role: &str, name: &str) -> LocalResponse<'c> {
    client
        .post(format!("/auth/register/{}", role))
        .header(ContentType::Form)
        .body(form_signup(name))
        .dispatch()
        .await
}

/// Role reported by the index for the client's current session.
pub async fn landing_role(client: &Client) -> Option<String> {
    let status: Value = client.get("/").dispatch().await.into_json().await?;
    status["role"].as_str().map(str::to_string)
}

/// Multipart upload form. `file` is the content type of a small attached file.
pub fn upload_body(title: &str, file: Option<&str>) -> (ContentType, Vec<u8>) {
    let mut body = Vec::new();
    let mut field = |name: &str, value: &str| {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    };
    field("video.title", title);
    field("video.description", "Recorded in class");

    if let Some(content_type) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"lesson.bin\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[0u8, 0, 0, 24, 102, 116, 121, 112]);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let content_type =
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY));
    (content_type, body)
}

pub async fn upload_video<'c>(
    client: &'c Client,
    title: &str,
    file_type: &str,
) -> LocalResponse<'c> {
    let (content_type, body) = upload_body(title, Some(file_type));
    client
        .post("/videos")
        .header(content_type)
        .body(body)
        .dispatch()
        .await
}
