use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::{AuthService, TokenPair};
use crate::app::engagement::{CommentRemoval, EngagementService};
use crate::app::posts::{PostMutation, PostService};
use crate::app::users::UserService;
use crate::domain::engagement::{validate_comment, Comment, LikeState};
use crate::domain::page::{PageRequest, PostPage};
use crate::domain::post::{
    normalize_labels, validate_content, validate_excerpt, validate_images, validate_media_url,
    validate_title, BlogPost, NewPost, PostChanges, PostFilter, PostStatus,
};
use crate::domain::text::reject_nul;
use crate::domain::user::{
    validate_bio, validate_email, validate_password, validate_username, PublicUser, User,
    MAX_PASSWORD_LEN,
};
use crate::http::{AdminToken, AdminUser, AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.db.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!(error = ?err, "database ping failed");
            "degraded"
        }
    };

    Json(HealthResponse { status })
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<TokenPair> for AuthTokenResponse {
    fn from(tokens: TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: AuthTokenResponse,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let username = validate_username(&payload.username).map_err(AppError::bad_request)?;
    let email = validate_email(&payload.email).map_err(AppError::bad_request)?;
    validate_password(&payload.password).map_err(AppError::bad_request)?;
    let avatar = non_blank(payload.avatar)
        .map(|avatar| validate_media_url("avatar", &avatar))
        .transpose()
        .map_err(AppError::bad_request)?;
    let bio = non_blank(payload.bio);
    if let Some(bio) = &bio {
        validate_bio(bio).map_err(AppError::bad_request)?;
    }

    let (user, tokens) = AuthService::from_state(&state)
        .register(username, email, payload.password, avatar, bio)
        .await
        .map_err(|err| {
            match unique_violation(&err).as_deref() {
                Some("users_username_key") => {
                    return AppError::conflict("username already taken");
                }
                Some("users_email_key") => return AppError::conflict("email already registered"),
                _ => {}
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user").with_detail(err)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user,
            tokens: tokens.into(),
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.chars().count() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }
    reject_nul("email", &payload.email).map_err(AppError::bad_request)?;

    let tokens = AuthService::from_state(&state)
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login").with_detail(err)
        })?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = AuthService::from_state(&state)
        .refresh(payload.refresh_token.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token").with_detail(err)
        })?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let revoked = AuthService::from_state(&state)
        .revoke_refresh_token(payload.refresh_token.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token").with_detail(err)
        })?;

    // Unknown or already revoked tokens are not reported back to the caller.
    tracing::debug!(revoked, "logout");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = AuthService::from_state(&state)
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to fetch current user").with_detail(err)
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let user = UserService::new(state.db.clone())
        .get_user(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
            AppError::internal("failed to fetch user").with_detail(err)
        })?;

    match user {
        Some(user) => Ok(Json(user.into())),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn list_user_posts(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostPage<BlogPost>>, AppError> {
    let page = PageRequest::new(query.page, query.limit).map_err(AppError::bad_request)?;

    let user = UserService::new(state.db.clone())
        .get_user(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
            AppError::internal("failed to fetch user").with_detail(err)
        })?;
    if user.is_none() {
        return Err(AppError::not_found("user not found"));
    }

    let filter = PostFilter {
        status: Some(PostStatus::Published),
        author_id: Some(id),
        ..PostFilter::default()
    };
    list_page(&state, &filter, page).await.map(Json)
}

// ============================================================================
// Posts
// ============================================================================

#[derive(Deserialize)]
pub struct ListPostsQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PostPage<BlogPost>>, AppError> {
    let page = PageRequest::new(query.page, query.limit).map_err(AppError::bad_request)?;
    let filter = PostFilter {
        status: Some(PostStatus::Published),
        author_id: None,
        category: filter_param("category", query.category).map_err(AppError::bad_request)?,
        tag: filter_param("tag", query.tag).map_err(AppError::bad_request)?,
        search: filter_param("search", query.search).map_err(AppError::bad_request)?,
    };

    list_page(&state, &filter, page).await.map(Json)
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<BlogPost>, AppError> {
    let post = PostService::new(state.db.clone())
        .get_post(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to fetch post");
            AppError::internal("failed to fetch post").with_detail(err)
        })?;

    let viewer_id = auth.as_ref().map(|user| user.user_id);
    let viewer_is_admin = auth.as_ref().is_some_and(|user| user.is_admin);
    match post {
        Some(post) if post.is_visible_to(viewer_id, viewer_is_admin) => Ok(Json(post)),
        _ => Err(AppError::not_found("post not found")),
    }
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub images: Option<Vec<String>>,
    pub video_url: Option<String>,
    pub categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<BlogPost>), AppError> {
    let post = new_post_from_request(payload).map_err(AppError::bad_request)?;

    let post = PostService::new(state.db.clone())
        .create_post(auth.user_id, &auth.username, post)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post").with_detail(err)
        })?;

    tracing::info!(post_id = %post.id, author_id = %auth.user_id, "created post");
    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub images: Option<Vec<String>>,
    pub video_url: Option<String>,
    pub categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<BlogPost>, AppError> {
    let changes = changes_from_request(payload).map_err(AppError::bad_request)?;

    let outcome = PostService::new(state.db.clone())
        .update_post(id, auth.actor(), changes)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post").with_detail(err)
        })?;

    match outcome {
        PostMutation::Applied(post) => Ok(Json(post)),
        PostMutation::NotFound => Err(AppError::not_found("post not found")),
        PostMutation::Forbidden => Err(AppError::forbidden("not authorized")),
    }
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let outcome = PostService::new(state.db.clone())
        .delete_post(id, auth.actor())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to delete post");
            AppError::internal("failed to delete post").with_detail(err)
        })?;

    match outcome {
        PostMutation::Applied(()) => Ok(StatusCode::NO_CONTENT),
        PostMutation::NotFound => Err(AppError::not_found("post not found")),
        PostMutation::Forbidden => Err(AppError::forbidden("not authorized")),
    }
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let categories = PostService::new(state.db.clone())
        .list_categories()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list categories");
            AppError::internal("failed to list categories").with_detail(err)
        })?;

    Ok(Json(categories))
}

pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let tags = PostService::new(state.db.clone())
        .list_tags()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list tags");
            AppError::internal("failed to list tags").with_detail(err)
        })?;

    Ok(Json(tags))
}

// ============================================================================
// Likes & comments
// ============================================================================

pub async fn toggle_like(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeState>, AppError> {
    let like = EngagementService::new(state.db.clone())
        .toggle_like(id, auth.actor())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to toggle like");
            AppError::internal("failed to toggle like").with_detail(err)
        })?;

    match like {
        Some(like) => Ok(Json(like)),
        None => Err(AppError::not_found("post not found")),
    }
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: Option<String>,
}

pub async fn add_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let content = validate_comment(payload.content.as_deref().unwrap_or(""))
        .map_err(AppError::bad_request)?;

    let comment = EngagementService::new(state.db.clone())
        .add_comment(id, auth.actor(), &auth.username, content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to comment");
            AppError::internal("failed to comment").with_detail(err)
        })?;

    match comment {
        Some(comment) => Ok((StatusCode::CREATED, Json(comment))),
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn delete_comment(
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let outcome = EngagementService::new(state.db.clone())
        .delete_comment(post_id, comment_id, auth.actor())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, user_id = %auth.user_id, "failed to delete comment");
            AppError::internal("failed to delete comment").with_detail(err)
        })?;

    match outcome {
        CommentRemoval::Removed => Ok(StatusCode::NO_CONTENT),
        CommentRemoval::PostNotFound => Err(AppError::not_found("post not found")),
        CommentRemoval::CommentNotFound => Err(AppError::not_found("comment not found")),
        CommentRemoval::Forbidden => Err(AppError::forbidden("not authorized")),
    }
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Deserialize)]
pub struct AdminPostsQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn admin_list_posts(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AdminPostsQuery>,
) -> Result<Json<PostPage<BlogPost>>, AppError> {
    let page = PageRequest::new(query.page, query.limit).map_err(AppError::bad_request)?;
    let status = parse_status(query.status).map_err(AppError::bad_request)?;
    tracing::debug!(admin_id = %admin.user_id, "admin post listing");

    let filter = PostFilter {
        status,
        ..PostFilter::default()
    };
    list_page(&state, &filter, page).await.map(Json)
}

#[derive(Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

pub async fn set_admin(
    Path(id): Path<Uuid>,
    _token: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<SetAdminRequest>,
) -> Result<Json<User>, AppError> {
    let user = UserService::new(state.db.clone())
        .set_admin(id, payload.is_admin)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to change admin role");
            AppError::internal("failed to change admin role").with_detail(err)
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn list_page(
    state: &AppState,
    filter: &PostFilter,
    page: PageRequest,
) -> Result<PostPage<BlogPost>, AppError> {
    let (posts, total) = PostService::new(state.db.clone())
        .list_posts(filter, page)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list posts");
            AppError::internal("failed to list posts").with_detail(err)
        })?;

    Ok(PostPage::new(posts, total, page))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn filter_param(field: &str, value: Option<String>) -> Result<Option<String>, String> {
    let value = non_blank(value);
    if let Some(value) = &value {
        reject_nul(field, value)?;
    }
    Ok(value)
}

fn parse_status(value: Option<String>) -> Result<Option<PostStatus>, String> {
    match non_blank(value) {
        None => Ok(None),
        Some(value) => PostStatus::from_db(&value)
            .map(Some)
            .ok_or_else(|| "status must be draft or published".to_string()),
    }
}

fn new_post_from_request(payload: CreatePostRequest) -> Result<NewPost, String> {
    let title = validate_title(payload.title.as_deref().unwrap_or(""))?;
    let content = validate_content(payload.content.as_deref().unwrap_or(""))?;
    let excerpt = validate_excerpt(payload.excerpt.as_deref().unwrap_or(""))?;
    let featured_image = match non_blank(payload.featured_image) {
        Some(url) => validate_media_url("featured_image", &url)?,
        None => String::new(),
    };
    let video_url = non_blank(payload.video_url)
        .map(|url| validate_media_url("video_url", &url))
        .transpose()?;

    Ok(NewPost {
        title,
        content,
        excerpt,
        featured_image,
        images: validate_images(payload.images.unwrap_or_default())?,
        video_url,
        categories: normalize_labels("categories", payload.categories.unwrap_or_default())?,
        tags: normalize_labels("tags", payload.tags.unwrap_or_default())?,
        status: parse_status(payload.status)?.unwrap_or(PostStatus::Published),
    })
}

/// Blank strings keep the stored value; lists that are present replace it.
fn changes_from_request(payload: UpdatePostRequest) -> Result<PostChanges, String> {
    Ok(PostChanges {
        title: non_blank(payload.title)
            .map(|title| validate_title(&title))
            .transpose()?,
        content: payload
            .content
            .filter(|content| !content.trim().is_empty())
            .map(|content| validate_content(&content))
            .transpose()?,
        excerpt: non_blank(payload.excerpt)
            .map(|excerpt| validate_excerpt(&excerpt))
            .transpose()?,
        featured_image: non_blank(payload.featured_image)
            .map(|url| validate_media_url("featured_image", &url))
            .transpose()?,
        images: payload.images.map(validate_images).transpose()?,
        video_url: non_blank(payload.video_url)
            .map(|url| validate_media_url("video_url", &url))
            .transpose()?,
        categories: payload
            .categories
            .map(|labels| normalize_labels("categories", labels))
            .transpose()?,
        tags: payload
            .tags
            .map(|labels| normalize_labels("tags", labels))
            .transpose()?,
        status: parse_status(payload.status)?,
    })
}

/// Name of the unique constraint a failed insert tripped, if any.
fn unique_violation(err: &anyhow::Error) -> Option<String> {
    let db_err = err.downcast_ref::<sqlx::Error>()?.as_database_error()?;
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    db_err.constraint().map(str::to_string)
}
