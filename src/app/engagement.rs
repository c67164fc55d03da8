use anyhow::Result;
use sqlx::types::Json;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::engagement::{Comment, LikeState};
use crate::domain::user::Actor;
use crate::infra::db::Db;

#[derive(Debug)]
pub enum CommentRemoval {
    Removed,
    PostNotFound,
    CommentNotFound,
    Forbidden,
}

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Flips the caller's membership in the post's like set. Returns `None`
    /// when the post does not exist or is a draft the actor may not see.
    pub async fn toggle_like(&self, post_id: Uuid, actor: Actor) -> Result<Option<LikeState>> {
        // Single statement so the presence check and the write share the row lock.
        let row = sqlx::query(
            "UPDATE blog_posts \
             SET likes = CASE \
                     WHEN $2 = ANY(likes) THEN array_remove(likes, $2) \
                     ELSE array_append(likes, $2) \
                 END \
             WHERE id = $1 \
               AND (status = 'published' OR author_id = $2 OR $3) \
             RETURNING cardinality(likes)::bigint AS like_count, $2 = ANY(likes) AS is_liked",
        )
        .bind(post_id)
        .bind(actor.user_id)
        .bind(actor.is_admin)
        .fetch_optional(self.db.pool())
        .await?;

        let state = row.map(|row| LikeState {
            likes: row.get("like_count"),
            is_liked: row.get("is_liked"),
        });

        Ok(state)
    }

    /// Appends a comment to the post's embedded list. Returns `None` when the
    /// post does not exist or is hidden from the actor.
    pub async fn add_comment(
        &self,
        post_id: Uuid,
        actor: Actor,
        username: &str,
        content: String,
    ) -> Result<Option<Comment>> {
        let comment = Comment {
            id: Uuid::new_v4(),
            user_id: actor.user_id,
            username: username.to_string(),
            content,
            created_at: OffsetDateTime::now_utc(),
        };

        let result = sqlx::query(
            "UPDATE blog_posts \
             SET comments = comments || jsonb_build_array($2::jsonb), updated_at = now() \
             WHERE id = $1 \
               AND (status = 'published' OR author_id = $3 OR $4)",
        )
        .bind(post_id)
        .bind(Json(&comment))
        .bind(actor.user_id)
        .bind(actor.is_admin)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(comment))
    }

    /// Removes one embedded comment if the actor wrote it or is an admin.
    pub async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        actor: Actor,
    ) -> Result<CommentRemoval> {
        let mut tx = self.db.pool().begin().await?;
        let comments: Option<Json<Vec<Comment>>> = sqlx::query_scalar(
            "SELECT comments FROM blog_posts \
             WHERE id = $1 AND (status = 'published' OR author_id = $2 OR $3) \
             FOR UPDATE",
        )
        .bind(post_id)
        .bind(actor.user_id)
        .bind(actor.is_admin)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(Json(mut comments)) = comments else {
            tx.rollback().await?;
            return Ok(CommentRemoval::PostNotFound);
        };

        let Some(position) = comments.iter().position(|comment| comment.id == comment_id) else {
            tx.rollback().await?;
            return Ok(CommentRemoval::CommentNotFound);
        };
        if !actor.may_modify(comments[position].user_id) {
            tx.rollback().await?;
            return Ok(CommentRemoval::Forbidden);
        }

        comments.remove(position);
        sqlx::query("UPDATE blog_posts SET comments = $2, updated_at = now() WHERE id = $1")
            .bind(post_id)
            .bind(Json(&comments))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(CommentRemoval::Removed)
    }
}
