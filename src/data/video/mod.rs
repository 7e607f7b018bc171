use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

pub mod db;

/// Extension every thumbnail URL ends in.
pub const THUMBNAIL_EXTENSION: &str = "jpg";

const MAX_TITLE_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub source_url: String,
    pub thumbnail_url: String,
    /// Students that watched the video at least once. No duplicates.
    #[serde(default, with = "crate::data::uuid_vec_as_binary")]
    pub watch_ids: Vec<Uuid>,
    #[serde(default = "Utc::now")]
    pub uploaded_at: DateTime<Utc>,
}

impl Video {
    pub fn new(metadata: VideoMetadata, source_url: String) -> Video {
        let id = Uuid::new_v4();
        tracing::info!("Creating a new video with UUID: {}", id);

        Video {
            id,
            title: metadata.title,
            description: metadata.description,
            thumbnail_url: thumbnail_url(&source_url),
            source_url,
            watch_ids: vec![],
            uploaded_at: Utc::now(),
        }
    }
}

/// Derives the thumbnail URL by overwriting the last three characters of `source_url` with
/// `jpg`.
///
/// This is a contract with media storage rather than a general extension rewrite: stored files
/// are always named with a three character extension and their URLs carry no query string,
/// and the storage serves the thumbnail under the same name. URLs shorter than three characters
/// are returned unchanged.
pub fn thumbnail_url(source_url: &str) -> String {
    let chars = source_url.chars().count();
    if chars < THUMBNAIL_EXTENSION.len() {
        return source_url.to_string();
    }

    source_url
        .chars()
        .take(chars - THUMBNAIL_EXTENSION.len())
        .chain(THUMBNAIL_EXTENSION.chars())
        .collect()
}

/// Title and description as submitted by upload and edit forms.
#[derive(Debug, Clone, Default, FromForm, Deserialize, ToSchema)]
pub struct VideoMetadata {
    #[field(default = String::new())]
    pub title: String,
    #[field(default = String::new())]
    #[serde(default)]
    pub description: String,
}

impl VideoMetadata {
    /// Trims both fields and checks their bounds.
    pub fn validated(self) -> Result<VideoMetadata, AppError> {
        let title = self.title.trim().to_string();
        let description = self.description.trim().to_string();

        if title.is_empty() {
            return Err(AppError::validation("title", "Title can't be empty."));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::validation(
                "title",
                format!("Title can't be longer than {} characters.", MAX_TITLE_LEN),
            ));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::validation(
                "description",
                format!(
                    "Description can't be longer than {} characters.",
                    MAX_DESCRIPTION_LEN
                ),
            ));
        }

        Ok(VideoMetadata { title, description })
    }
}

/// Dashboard projection of a video.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
}

impl From<&Video> for VideoSummary {
    fn from(video: &Video) -> Self {
        VideoSummary {
            id: video.id,
            title: video.title.clone(),
            description: video.description.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
        }
    }
}

/// A video as shown to anyone allowed to play it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub source_url: String,
    pub thumbnail_url: String,
    pub watch_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Video> for VideoView {
    fn from(video: Video) -> Self {
        VideoView {
            id: video.id,
            watch_count: video.watch_ids.len(),
            title: video.title,
            description: video.description,
            source_url: video.source_url,
            thumbnail_url: video.thumbnail_url,
            uploaded_at: video.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Viewer {
    pub username: String,
    pub email: String,
}

/// A video together with the students that watched it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoDetail {
    pub video: VideoView,
    pub viewers: Vec<Viewer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_replaces_extension_in_place() {
        let source = "https://media.example.com/video/upload/v1/vidify/abc.mp4";
        let thumb = thumbnail_url(source);

        assert_eq!(thumb, "https://media.example.com/video/upload/v1/vidify/abc.jpg");
        assert_eq!(thumb.len(), source.len());
        assert_eq!(thumbnail_url("/media/abc.mov"), "/media/abc.jpg");
    }

    #[test]
    fn thumbnail_of_tiny_url_is_unchanged() {
        assert_eq!(thumbnail_url("ab"), "ab");
        assert_eq!(thumbnail_url(""), "");
        assert_eq!(thumbnail_url("mp4"), "jpg");
    }

    #[test]
    fn thumbnail_handles_multibyte_characters() {
        assert_eq!(thumbnail_url("/media/čćž.mp4"), "/media/čćž.jpg");
    }

    #[test]
    fn new_video_derives_thumbnail() {
        let video = Video::new(
            VideoMetadata {
                title: "Fractions".to_string(),
                description: "Part one".to_string(),
            },
            "/media/abc.mp4".to_string(),
        );

        assert_eq!(video.thumbnail_url, "/media/abc.jpg");
        assert!(video.watch_ids.is_empty());
    }

    #[test]
    fn metadata_validation() {
        let ok = VideoMetadata {
            title: "  Algebra  ".to_string(),
            description: " basics ".to_string(),
        }
        .validated()
        .expect("valid metadata");
        assert_eq!(ok.title, "Algebra");
        assert_eq!(ok.description, "basics");

        let empty = VideoMetadata {
            title: "   ".to_string(),
            description: String::new(),
        }
        .validated();
        assert!(matches!(
            empty,
            Err(AppError::Validation { field: "title", .. })
        ));

        let long = VideoMetadata {
            title: "t".repeat(MAX_TITLE_LEN + 1),
            description: String::new(),
        }
        .validated();
        assert!(matches!(
            long,
            Err(AppError::Validation { field: "title", .. })
        ));
    }
}
