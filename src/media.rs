//! Storage for uploaded video files.
//!
//! Stored files keep a three character extension and their URLs carry no query string, which
//! is what [`crate::data::video::thumbnail_url`] relies on.

use std::fs;
use std::path::{Path, PathBuf};

use rocket::fs::TempFile;
use rocket::http::ContentType;
use uuid::Uuid;

use crate::error::AppError;

#[rocket::async_trait]
pub trait MediaStorage: Send + Sync {
    /// Persists the file and returns the URL it is served under.
    async fn store(&self, file: &mut TempFile<'_>) -> Result<String, AppError>;

    /// Deletes a file previously returned by `store`. Failures are only logged.
    async fn discard(&self, url: &str);
}

pub type DynMedia = Box<dyn MediaStorage>;

/// Three character extension for a video content type, if it's one we accept.
pub fn video_extension(content_type: &ContentType) -> Option<&'static str> {
    if !content_type.top().as_str().eq_ignore_ascii_case("video") {
        return None;
    }

    let sub = content_type.sub().as_str().to_ascii_lowercase();
    match sub.as_str() {
        "mp4" => Some("mp4"),
        "quicktime" => Some("mov"),
        "x-msvideo" => Some("avi"),
        "x-matroska" => Some("mkv"),
        "ogg" => Some("ogv"),
        "mpeg" => Some("mpg"),
        _ => None,
    }
}

/// Writes uploads to a local directory that is served under `base_url`.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    root: PathBuf,
    base_url: String,
}

impl LocalMedia {
    pub fn new(root: impl AsRef<Path>, base_url: impl AsRef<str>) -> std::io::Result<LocalMedia> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        tracing::info!("Storing media in '{}'", root.display());

        Ok(LocalMedia {
            root,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url, file_name)
    }

    /// Path of a stored file, if `url` is one of ours.
    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let file_name = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return None;
        }
        Some(self.root.join(file_name))
    }
}

#[rocket::async_trait]
impl MediaStorage for LocalMedia {
    async fn store(&self, file: &mut TempFile<'_>) -> Result<String, AppError> {
        let extension = match file.content_type() {
            Some(content_type) => video_extension(content_type).ok_or_else(|| {
                AppError::validation(
                    "file",
                    format!("Unsupported video type '{}'.", content_type),
                )
            })?,
            None => {
                return Err(AppError::validation(
                    "file",
                    "The uploaded file has no content type.",
                ))
            }
        };

        let file_name = format!("{}.{}", Uuid::new_v4().simple(), extension);
        let path = self.root.join(&file_name);

        file.copy_to(&path).await.map_err(|e| {
            tracing::error!("unable to write upload to '{}': {}", path.display(), e);
            AppError::Upload("Unable to store the uploaded file.".to_string())
        })?;
        tracing::info!("Stored {} bytes in '{}'", file.len(), path.display());

        Ok(self.url_for(&file_name))
    }

    async fn discard(&self, url: &str) {
        let path = match self.path_for(url) {
            Some(path) => path,
            None => {
                tracing::warn!("not discarding '{}', it isn't stored here", url);
                return;
            }
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!("Discarded '{}'", path.display()),
            Err(e) => tracing::error!("unable to discard '{}': {}", path.display(), e),
        }
    }
}
