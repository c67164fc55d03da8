//! HTTP Layer Tests
//!
//! Body size limit, request ids and CORS applied around every route.

mod common;

use axum::http::{Method, StatusCode};
use common::{app, TestApp, TEST_MAX_BODY_BYTES};
use serde_json::json;

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = app().await;
    let user = app.create_user("http_big_body").await;

    let mut body = TestApp::post_body("Very long diary", "Europe");
    body["content"] = json!("x".repeat(TEST_MAX_BODY_BYTES + 1));
    let length = serde_json::to_string(&body).unwrap().len().to_string();
    let auth = format!("Bearer {}", user.access_token);

    let resp = app
        .request(
            Method::POST,
            "/posts",
            Some(body),
            &[("Authorization", auth.as_str()), ("content-length", length.as_str())],
        )
        .await;

    assert_eq!(resp.status, StatusCode::PAYLOAD_TOO_LARGE);

    let resp = app
        .get("/posts?category=Europe&search=diary", None)
        .await;
    assert_eq!(resp.json()["total"], 0);
}

#[tokio::test]
async fn body_within_limit_is_accepted() {
    let app = app().await;
    let user = app.create_user("http_small_body").await;

    let mut body = TestApp::post_body("Long but fine", "Europe");
    body["content"] = json!("y".repeat(TEST_MAX_BODY_BYTES / 2));

    let resp = app.post_json("/posts", body, Some(&user.access_token)).await;

    assert_eq!(resp.status, StatusCode::CREATED);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = app().await;

    let resp = app
        .request(Method::GET, "/health", None, &[("x-request-id", "trip-log-42")])
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("x-request-id"), Some("trip-log-42"));
}

#[tokio::test]
async fn request_id_is_generated_when_absent() {
    let app = app().await;

    let resp = app.get("/posts/tags/all", None).await;

    let id = resp.header("x-request-id").expect("x-request-id missing");
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn cors_preflight_allows_bearer_writes() {
    let app = app().await;

    let resp = app
        .request(
            Method::OPTIONS,
            "/posts",
            None,
            &[
                ("origin", "https://blog.example.com"),
                ("access-control-request-method", "POST"),
                ("access-control-request-headers", "authorization,content-type"),
            ],
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
    let methods = resp
        .header("access-control-allow-methods")
        .unwrap_or_default()
        .to_ascii_uppercase();
    assert!(methods.contains("POST"));
    assert!(methods.contains("DELETE"));
    let headers = resp
        .header("access-control-allow-headers")
        .unwrap_or_default()
        .to_ascii_lowercase();
    assert!(headers.contains("authorization"));
}

#[tokio::test]
async fn cors_headers_on_simple_requests() {
    let app = app().await;

    let resp = app
        .request(
            Method::GET,
            "/posts",
            None,
            &[("origin", "https://blog.example.com")],
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
}
