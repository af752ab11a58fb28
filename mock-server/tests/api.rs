use std::sync::Arc;

use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with, Canned, Db, ListKind, MockApi, User};
use serde_json::json;
use tokio::sync::RwLock;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn get_with_key(uri: &str, key: &str) -> Request<String> {
    Request::builder()
        .uri(uri)
        .header("X-API-Key", key)
        .body(String::new())
        .unwrap()
}

fn demo_db() -> Db {
    Arc::new(RwLock::new(MockApi::demo()))
}

// --- health ---

#[tokio::test]
async fn health_reports_healthy() {
    let resp = app().oneshot(get("/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn health_requires_configured_key() {
    let db: Db = Arc::new(RwLock::new(MockApi {
        api_key: Some("secret".to_string()),
        ..MockApi::default()
    }));

    let resp = app_with(db.clone()).oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app_with(db.clone())
        .oneshot(get_with_key("/health", "secret"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(db.read().await.hits("/health"), 2);
}

// --- users ---

#[tokio::test]
async fn list_users_empty() {
    let resp = app().oneshot(get("/api/users")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let users: Vec<User> = body_json(resp).await;
    assert!(users.is_empty());
}

#[tokio::test]
async fn list_users_demo() {
    let resp = app_with(demo_db()).oneshot(get("/api/users")).await.unwrap();

    let users: Vec<User> = body_json(resp).await;
    assert_eq!(users, vec![User::new("1", "Alice"), User::new("2", "Bob")]);
}

#[tokio::test]
async fn list_users_override() {
    let db = demo_db();
    db.write().await.users_override = Some(Canned::json(500, json!({"detail": "db down"})));

    let resp = app_with(db).oneshot(get("/api/users")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["detail"], "db down");
}

// --- lists ---

#[tokio::test]
async fn canned_recommendations_are_served() {
    let resp = app_with(demo_db())
        .oneshot(get("/api/recommendations/1"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 2);
    assert_eq!(body["generated_at"], mock_server::GENERATED_AT);
}

#[tokio::test]
async fn canned_text_keeps_content_type() {
    let resp = app_with(demo_db()).oneshot(get("/api/recent/2")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(ct.starts_with("text/plain"));
    assert_eq!(&body_bytes(resp).await[..], b"Alien\nAliens\n");
}

#[tokio::test]
async fn known_user_without_fixture_gets_empty_list() {
    let resp = app_with(demo_db())
        .oneshot(get("/api/recommendations/2"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["user_id"], "2");
    assert_eq!(body["recommendations"], json!([]));
}

#[tokio::test]
async fn unknown_user_returns_404() {
    let resp = app_with(demo_db()).oneshot(get("/api/recent/99")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_hits_are_counted_per_path() {
    let db = demo_db();
    db.write()
        .await
        .set_list(ListKind::Recent, "1", Canned::text(503, "busy"));

    let resp = app_with(db.clone()).oneshot(get("/api/recent/1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(db.read().await.hits("/api/recent/1"), 1);
    assert_eq!(db.read().await.hits("/api/recommendations/1"), 0);
}
