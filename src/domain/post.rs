use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::domain::engagement::Comment;
use crate::domain::text::reject_nul;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_EXCERPT_LEN: usize = 500;
pub const MAX_CONTENT_LEN: usize = 100_000;
pub const MAX_IMAGES: usize = 20;
pub const MAX_LABELS: usize = 20;
pub const MAX_LABEL_LEN: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub author: PostAuthor,
    pub author_name: String,
    pub featured_image: String,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub likes: Vec<Uuid>,
    pub comments: Vec<Comment>,
    pub status: PostStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BlogPost {
    /// Drafts are only readable by their author and by admins.
    pub fn is_visible_to(&self, viewer_id: Option<Uuid>, viewer_is_admin: bool) -> bool {
        match self.status {
            PostStatus::Published => true,
            PostStatus::Draft => viewer_is_admin || viewer_id == Some(self.author.id),
        }
    }
}

/// Author profile joined onto a post at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostAuthor {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

/// A validated post ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: String,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub status: PostStatus,
}

/// Partial update. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub images: Option<Vec<String>>,
    pub video_url: Option<String>,
    pub categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
}

/// Filters shared by the public listing, the per-user listing and the admin listing.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub author_id: Option<Uuid>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

pub fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("title is required".into());
    }
    reject_nul("title", title)?;
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("title must be at most {} characters", MAX_TITLE_LEN));
    }
    Ok(title.to_string())
}

pub fn validate_content(content: &str) -> Result<String, String> {
    if content.trim().is_empty() {
        return Err("content is required".into());
    }
    reject_nul("content", content)?;
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(format!(
            "content must be at most {} characters",
            MAX_CONTENT_LEN
        ));
    }
    Ok(content.to_string())
}

pub fn validate_excerpt(excerpt: &str) -> Result<String, String> {
    let excerpt = excerpt.trim();
    if excerpt.is_empty() {
        return Err("excerpt is required".into());
    }
    reject_nul("excerpt", excerpt)?;
    if excerpt.chars().count() > MAX_EXCERPT_LEN {
        return Err(format!(
            "excerpt must be at most {} characters",
            MAX_EXCERPT_LEN
        ));
    }
    Ok(excerpt.to_string())
}

/// Media references must be absolute http(s) URLs.
pub fn validate_media_url(field: &str, value: &str) -> Result<String, String> {
    let value = value.trim();
    reject_nul(field, value)?;
    let parsed = Url::parse(value).map_err(|_| format!("{} must be a valid URL", field))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("{} must be an http or https URL", field));
    }
    Ok(value.to_string())
}

pub fn validate_images(images: Vec<String>) -> Result<Vec<String>, String> {
    if images.len() > MAX_IMAGES {
        return Err(format!("at most {} images are allowed", MAX_IMAGES));
    }
    images
        .iter()
        .map(|image| validate_media_url("images", image))
        .collect()
}

/// Trims labels, drops blanks and repeats, keeps first-seen order.
pub fn normalize_labels(field: &str, labels: Vec<String>) -> Result<Vec<String>, String> {
    let mut normalized: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim();
        if label.is_empty() || normalized.iter().any(|seen| seen == label) {
            continue;
        }
        reject_nul(field, label)?;
        if label.chars().count() > MAX_LABEL_LEN {
            return Err(format!(
                "{} entries must be at most {} characters",
                field, MAX_LABEL_LEN
            ));
        }
        normalized.push(label.to_string());
    }
    if normalized.len() > MAX_LABELS {
        return Err(format!("at most {} {} are allowed", MAX_LABELS, field));
    }
    Ok(normalized)
}
