use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgExecutor, Row};
use uuid::Uuid;

use crate::domain::engagement::Comment;
use crate::domain::page::PageRequest;
use crate::domain::post::{BlogPost, NewPost, PostAuthor, PostChanges, PostFilter, PostStatus};
use crate::domain::user::Actor;
use crate::infra::db::Db;

macro_rules! post_select {
    () => {
        "SELECT p.id, p.title, p.content, p.excerpt, p.author_id, p.author_name, \
                p.featured_image, p.images, p.video_url, p.categories, p.tags, p.likes, \
                p.comments, p.status::text AS status, p.created_at, p.updated_at, \
                u.username AS author_username, u.avatar AS author_avatar, u.bio AS author_bio \
         FROM blog_posts p \
         JOIN users u ON u.id = p.author_id"
    };
}

// Unset filters bind NULL and drop out of the predicate.
macro_rules! post_filters {
    () => {
        " WHERE ($1::post_status IS NULL OR p.status = $1::post_status) \
           AND ($2::uuid IS NULL OR p.author_id = $2) \
           AND ($3::text IS NULL OR $3 = ANY(p.categories)) \
           AND ($4::text IS NULL OR $4 = ANY(p.tags)) \
           AND ($5::text IS NULL OR p.search_vector @@ websearch_to_tsquery('english', $5))"
    };
}

/// Outcome of an owner-or-admin guarded mutation.
#[derive(Debug)]
pub enum PostMutation<T> {
    Applied(T),
    NotFound,
    Forbidden,
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        author_name: &str,
        post: NewPost,
    ) -> Result<BlogPost> {
        let mut tx = self.db.pool().begin().await?;
        let post_id: Uuid = sqlx::query_scalar(
            "INSERT INTO blog_posts \
                (title, content, excerpt, author_id, author_name, featured_image, images, \
                 video_url, categories, tags, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11::post_status) \
             RETURNING id",
        )
        .bind(post.title)
        .bind(post.content)
        .bind(post.excerpt)
        .bind(author_id)
        .bind(author_name)
        .bind(post.featured_image)
        .bind(post.images)
        .bind(post.video_url)
        .bind(post.categories)
        .bind(post.tags)
        .bind(post.status.as_db())
        .fetch_one(&mut *tx)
        .await?;

        let created = fetch_post(&mut *tx, post_id)
            .await?
            .ok_or_else(|| anyhow!("created post {} not readable", post_id))?;
        tx.commit().await?;

        Ok(created)
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<BlogPost>> {
        fetch_post(self.db.pool(), post_id).await
    }

    /// Newest first, with the total number of matches for the envelope.
    pub async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<(Vec<BlogPost>, i64)> {
        let rows = sqlx::query(concat!(
            post_select!(),
            post_filters!(),
            " ORDER BY p.created_at DESC, p.id DESC LIMIT $6 OFFSET $7"
        ))
        .bind(filter.status.map(|status| status.as_db()))
        .bind(filter.author_id)
        .bind(filter.category.as_deref())
        .bind(filter.tag.as_deref())
        .bind(filter.search.as_deref())
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.db.pool());

        let total = sqlx::query_scalar::<_, i64>(concat!(
            "SELECT COUNT(*) FROM blog_posts p",
            post_filters!()
        ))
        .bind(filter.status.map(|status| status.as_db()))
        .bind(filter.author_id)
        .bind(filter.category.as_deref())
        .bind(filter.tag.as_deref())
        .bind(filter.search.as_deref())
        .fetch_one(self.db.pool());

        let (rows, total) = futures::try_join!(rows, total)?;

        let posts = rows
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((posts, total))
    }

    /// Applies a partial update after the owner-or-admin check, under a row lock.
    pub async fn update_post(
        &self,
        post_id: Uuid,
        actor: Actor,
        changes: PostChanges,
    ) -> Result<PostMutation<BlogPost>> {
        let mut tx = self.db.pool().begin().await?;
        let author_id: Option<Uuid> =
            sqlx::query_scalar("SELECT author_id FROM blog_posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(author_id) = author_id else {
            tx.rollback().await?;
            return Ok(PostMutation::NotFound);
        };
        if !actor.may_modify(author_id) {
            tx.rollback().await?;
            return Ok(PostMutation::Forbidden);
        }

        sqlx::query(
            "UPDATE blog_posts \
             SET title = COALESCE($2, title), \
                 content = COALESCE($3, content), \
                 excerpt = COALESCE($4, excerpt), \
                 featured_image = COALESCE($5, featured_image), \
                 images = COALESCE($6, images), \
                 video_url = COALESCE($7, video_url), \
                 categories = COALESCE($8, categories), \
                 tags = COALESCE($9, tags), \
                 status = COALESCE($10::post_status, status), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(post_id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.excerpt)
        .bind(changes.featured_image)
        .bind(changes.images)
        .bind(changes.video_url)
        .bind(changes.categories)
        .bind(changes.tags)
        .bind(changes.status.map(|status| status.as_db()))
        .execute(&mut *tx)
        .await?;

        let updated = fetch_post(&mut *tx, post_id)
            .await?
            .ok_or_else(|| anyhow!("updated post {} not readable", post_id))?;
        tx.commit().await?;

        if actor.user_id != author_id {
            tracing::info!(post_id = %post_id, admin_id = %actor.user_id, "admin edited post");
        }
        Ok(PostMutation::Applied(updated))
    }

    pub async fn delete_post(&self, post_id: Uuid, actor: Actor) -> Result<PostMutation<()>> {
        let mut tx = self.db.pool().begin().await?;
        let author_id: Option<Uuid> =
            sqlx::query_scalar("SELECT author_id FROM blog_posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(author_id) = author_id else {
            tx.rollback().await?;
            return Ok(PostMutation::NotFound);
        };
        if !actor.may_modify(author_id) {
            tx.rollback().await?;
            return Ok(PostMutation::Forbidden);
        }

        sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if actor.user_id != author_id {
            tracing::info!(post_id = %post_id, admin_id = %actor.user_id, "admin removed post");
        }
        Ok(PostMutation::Applied(()))
    }

    pub async fn list_categories(&self) -> Result<Vec<String>> {
        let categories = sqlx::query_scalar(
            "SELECT DISTINCT category \
             FROM blog_posts, unnest(categories) AS category \
             WHERE status = 'published' \
             ORDER BY category",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(categories)
    }

    pub async fn list_tags(&self) -> Result<Vec<String>> {
        let tags = sqlx::query_scalar(
            "SELECT DISTINCT tag \
             FROM blog_posts, unnest(tags) AS tag \
             WHERE status = 'published' \
             ORDER BY tag",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(tags)
    }
}

async fn fetch_post<'e, E>(executor: E, post_id: Uuid) -> Result<Option<BlogPost>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(concat!(post_select!(), " WHERE p.id = $1"))
        .bind(post_id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(post_from_row).transpose()
}

fn post_from_row(row: &PgRow) -> Result<BlogPost> {
    let status: String = row.try_get("status")?;
    let status = PostStatus::from_db(&status)
        .ok_or_else(|| anyhow!("unknown post status: {}", status))?;
    let Json(comments): Json<Vec<Comment>> = row.try_get("comments")?;

    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        excerpt: row.try_get("excerpt")?,
        author: PostAuthor {
            id: row.try_get("author_id")?,
            username: row.try_get("author_username")?,
            avatar: row.try_get("author_avatar")?,
            bio: row.try_get("author_bio")?,
        },
        author_name: row.try_get("author_name")?,
        featured_image: row.try_get("featured_image")?,
        images: row.try_get("images")?,
        video_url: row.try_get("video_url")?,
        categories: row.try_get("categories")?,
        tags: row.try_get("tags")?,
        likes: row.try_get("likes")?,
        comments,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
