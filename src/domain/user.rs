use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::text::reject_nul;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            avatar: user.avatar,
            bio: user.bio,
            created_at: user.created_at,
        }
    }
}

/// The identity a mutation is performed on behalf of.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    /// Owner-or-admin rule used for posts and comments.
    pub fn may_modify(&self, owner_id: Uuid) -> bool {
        self.is_admin || self.user_id == owner_id
    }
}

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 30;
pub const MAX_BIO_LEN: usize = 500;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

pub fn validate_username(username: &str) -> Result<String, String> {
    let username = username.trim();
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(format!(
            "username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        ));
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err("username may only contain letters, digits and underscores".into());
    }
    Ok(username.to_string())
}

pub fn validate_email(email: &str) -> Result<String, String> {
    let email = email.trim().to_lowercase();
    reject_nul("email", &email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err("email is invalid".into()),
    }
}

/// Length is counted in characters on the password exactly as submitted.
pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(format!(
            "password must be at most {} characters",
            MAX_PASSWORD_LEN
        ));
    }
    Ok(())
}

pub fn validate_bio(bio: &str) -> Result<(), String> {
    reject_nul("bio", bio)?;
    if bio.chars().count() > MAX_BIO_LEN {
        return Err(format!("bio must be at most {} characters", MAX_BIO_LEN));
    }
    Ok(())
}
