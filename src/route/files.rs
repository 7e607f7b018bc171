use std::path::PathBuf;

use rocket::fs::NamedFile;
use rocket::State;

use crate::config::Config;
use crate::error::AppError;

/// A page from the public content directory, e.g. `auth/login/teacher.html`.
pub async fn static_page(c: &Config, page: &str) -> Result<NamedFile, AppError> {
    let path = c.public_content.join(page);
    NamedFile::open(&path).await.map_err(|e| {
        tracing::warn!("'{}' can't be served: {}", path.display(), e);
        AppError::not_found("page", page)
    })
}

/// Uploaded media, mounted under the configured media URL.
#[get("/<path..>")]
pub async fn media_file(path: PathBuf, c: &State<Config>) -> Option<NamedFile> {
    NamedFile::open(c.media_dir.join(path)).await.ok()
}
