use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::text::reject_nul;

pub const MAX_COMMENT_LEN: usize = 1000;

/// A comment stored inside its post's `comments` document array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeState {
    pub likes: i64,
    pub is_liked: bool,
}

pub fn validate_comment(content: &str) -> Result<String, String> {
    let content = content.trim();
    if content.is_empty() {
        return Err("comment content cannot be empty".into());
    }
    reject_nul("comment content", content)?;
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(format!(
            "comment content exceeds {} characters",
            MAX_COMMENT_LEN
        ));
    }
    Ok(content.to_string())
}
