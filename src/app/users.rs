use anyhow::Result;
use uuid::Uuid;

use crate::app::auth::user_from_row;
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, avatar, bio, is_admin, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Grants or revokes the admin role.
    ///
    /// Admin routes check the stored role on every request. Owner-or-admin
    /// checks on posts and comments read the token's `adm` claim, so there a
    /// change applies from the next login or refresh, at most
    /// `ACCESS_TTL_MINUTES` later.
    pub async fn set_admin(&self, user_id: Uuid, is_admin: bool) -> Result<Option<User>> {
        let row = sqlx::query(
            "UPDATE users SET is_admin = $2 WHERE id = $1 \
             RETURNING id, username, email, avatar, bio, is_admin, created_at",
        )
        .bind(user_id)
        .bind(is_admin)
        .fetch_optional(self.db.pool())
        .await?;

        let user = row.as_ref().map(user_from_row);
        if let Some(user) = &user {
            tracing::info!(user_id = %user.id, is_admin, "changed admin role");
        }
        Ok(user)
    }
}
