//! Admin Tests
//!
//! Moderation listing for admins and operator-token role changes.

mod common;

use axum::http::StatusCode;
use common::{app, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn admin_listing_includes_drafts() {
    let app = app().await;
    let author = app.create_user("adm_list_author").await;
    let admin = app.create_admin("adm_list_admin").await;

    let mut draft = TestApp::post_body("Hidden draft", "Europe");
    draft["status"] = json!("draft");
    let draft_id = app.create_post(&author, draft).await;

    let resp = app
        .get("/admin/posts?status=draft&limit=100", Some(&admin.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let posts = body["posts"].as_array().unwrap();
    assert!(posts.iter().all(|post| post["status"] == "draft"));
    assert!(posts.iter().any(|post| post["id"] == draft_id.to_string()));
}

#[tokio::test]
async fn admin_listing_rejects_unknown_status() {
    let app = app().await;
    let admin = app.create_admin("adm_list_badstatus").await;

    let resp = app
        .get("/admin/posts?status=pending", Some(&admin.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_admin_cannot_list() {
    let app = app().await;
    let user = app.create_user("adm_list_regular").await;

    let resp = app.get("/admin/posts", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "admin access required");

    let resp = app.get("/admin/posts", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn operator_promotes_user() {
    let app = app().await;
    let user = app.create_user("adm_promote").await;

    let resp = app
        .put_operator(
            &format!("/admin/users/{}/admin", user.id),
            json!({ "is_admin": true }),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["is_admin"], true);

    // The role lands in the next token issued for the user.
    let resp = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    let token = resp.json()["access_token"].as_str().unwrap().to_string();
    let resp = app.get("/admin/posts", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn operator_token_required() {
    let app = app().await;
    let user = app.create_user("adm_promote_denied").await;
    let path = format!("/admin/users/{}/admin", user.id);

    let resp = app
        .put_operator(&path, json!({ "is_admin": true }), None)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "missing admin token");

    let resp = app
        .put_operator(&path, json!({ "is_admin": true }), Some("wrong-token"))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "invalid admin token");

    let is_admin: bool = sqlx::query_scalar("SELECT is_admin FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(!is_admin);
}

#[tokio::test]
async fn operator_unknown_user() {
    let app = app().await;

    let resp = app
        .put_operator(
            &format!("/admin/users/{}/admin", Uuid::new_v4()),
            json!({ "is_admin": true }),
            Some(app.admin_token()),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

#[tokio::test]
async fn demoted_admin_loses_admin_routes_immediately() {
    let app = app().await;
    let admin = app.create_admin("adm_demoted").await;

    let resp = app.get("/admin/posts", Some(&admin.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .put_operator(
            &format!("/admin/users/{}/admin", admin.id),
            json!({ "is_admin": false }),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["is_admin"], false);

    // Same access token, still carrying the old claim.
    let resp = app.get("/admin/posts", Some(&admin.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "admin access required");
}
