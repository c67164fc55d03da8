use axum::{routing::delete, routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/posts", get(handlers::list_user_posts))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", get(handlers::list_posts).post(handlers::create_post))
        .route("/posts/categories/all", get(handlers::list_categories))
        .route("/posts/tags/all", get(handlers::list_tags))
        .route(
            "/posts/:id",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route("/posts/:id/like", post(handlers::toggle_like))
        .route("/posts/:id/comment", post(handlers::add_comment))
        .route(
            "/posts/:id/comment/:comment_id",
            delete(handlers::delete_comment),
        )
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/posts", get(handlers::admin_list_posts))
        .route("/admin/users/:id/admin", put(handlers::set_admin))
}
