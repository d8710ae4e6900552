//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle against the development mailbox.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mailbox_cache::{
    api::create_router,
    cache::CacheStore,
    mailbox::{InMemoryMailbox, SharedMailbox},
    AppState, Config, MailService,
};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> (Router, Arc<InMemoryMailbox>) {
    let mailbox = Arc::new(InMemoryMailbox::sample());
    let connector = Arc::new(SharedMailbox::new(mailbox.clone()));
    let config = Config::default();
    let store = CacheStore::memory(config.max_entries, config.eviction_percent);
    let state = AppState::new(MailService::new(&config, connector, store));
    (create_router(state), mailbox)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// == Listing ==

#[tokio::test]
async fn test_list_cold_then_hot() {
    let (app, mailbox) = create_test_app();

    let (status, cold) = send(&app, get("/emails?folder=INBOX&limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cold["cached"], false);
    assert_eq!(cold["data"]["items"].as_array().unwrap().len(), 4);
    assert_eq!(cold["data"]["total"], 4);

    let (_, hot) = send(&app, get("/emails?folder=INBOX&limit=10")).await;
    assert_eq!(hot["cached"], true);
    assert_eq!(hot["data"], cold["data"]);
    assert_eq!(mailbox.calls().list_emails, 1);
}

#[tokio::test]
async fn test_list_pages_are_cached_separately() {
    let (app, mailbox) = create_test_app();

    send(&app, get("/emails?limit=2&offset=0")).await;
    let (_, second_page) = send(&app, get("/emails?limit=2&offset=2")).await;
    let (_, ascending) = send(&app, get("/emails?limit=2&offset=0&sort=asc")).await;

    assert_eq!(second_page["cached"], false);
    assert_eq!(ascending["cached"], false);
    assert_eq!(mailbox.calls().list_emails, 3);
}

#[tokio::test]
async fn test_list_use_cache_false_bypasses_cache() {
    let (app, mailbox) = create_test_app();

    send(&app, get("/emails")).await;
    let (_, fresh) = send(&app, get("/emails?use_cache=false")).await;

    assert_eq!(fresh["cached"], false);
    assert_eq!(mailbox.calls().list_emails, 2);
}

#[tokio::test]
async fn test_list_invalid_limit() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, get("/emails?limit=0")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn test_unknown_folder_is_not_found() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, get("/emails?folder=Nowhere")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Nowhere"));
}

// == Single Email ==

#[tokio::test]
async fn test_get_email_cold_then_hot() {
    let (app, mailbox) = create_test_app();

    let (status, cold) = send(&app, get("/emails/1?folder=INBOX")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cold["cached"], false);
    assert_eq!(cold["email"]["subject"], "Welcome aboard");
    assert!(cold.get("summary").is_none());

    let (_, hot) = send(&app, get("/emails/1?folder=INBOX&include_summary=true")).await;
    assert_eq!(hot["cached"], true);
    assert_eq!(mailbox.calls().get_email, 1);
}

#[tokio::test]
async fn test_get_missing_email() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, get("/emails/999")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.get("error").is_some());
}

// == Operations ==

#[tokio::test]
async fn test_operation_invalidates_folder() {
    let (app, mailbox) = create_test_app();
    send(&app, get("/emails")).await;
    send(&app, get("/emails/3")).await;

    let (status, result) = send(
        &app,
        post_json(
            "/operations",
            json!({"type": "mark_read", "folder": "INBOX", "uids": ["3"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["success"], true);
    assert_eq!(result["processed"], 1);

    let (_, list) = send(&app, get("/emails")).await;
    assert_eq!(list["cached"], false);
    let item = list["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["uid"] == "3")
        .unwrap();
    assert_eq!(item["seen"], true);

    let (_, email) = send(&app, get("/emails/3")).await;
    assert_eq!(email["cached"], false);
    assert_eq!(email["email"]["seen"], true);
    assert_eq!(mailbox.calls().list_emails, 2);
}

#[tokio::test]
async fn test_move_invalidates_destination_and_folders() {
    let (app, _) = create_test_app();
    send(&app, get("/emails?folder=Archive")).await;
    send(&app, get("/folders")).await;

    let (status, _) = send(
        &app,
        post_json(
            "/operations",
            json!({"type": "move", "folder": "INBOX", "uids": ["1"], "destination": "Archive"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, archive) = send(&app, get("/emails?folder=Archive")).await;
    assert_eq!(archive["cached"], false);
    assert_eq!(archive["data"]["items"].as_array().unwrap().len(), 1);

    let (_, folders) = send(&app, get("/folders")).await;
    assert_eq!(folders["cached"], false);
}

#[tokio::test]
async fn test_operation_without_destination_rejected() {
    let (app, mailbox) = create_test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/operations",
            json!({"type": "move", "folder": "INBOX", "uids": ["1"]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("error").is_some());
    assert_eq!(mailbox.calls().perform_operation, 0);
}

// == Search ==

#[tokio::test]
async fn test_search_cached_when_policy_allows() {
    let (app, mailbox) = create_test_app();
    let body = json!({"folder": "INBOX", "filter": {"from": "ci@"}});

    let (status, first) = send(&app, post_json("/search", body.clone())).await;
    let (_, second) = send(&app, post_json("/search", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(first["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(mailbox.calls().search_emails, 1);
}

#[tokio::test]
async fn test_read_status_search_never_cached() {
    let (app, mailbox) = create_test_app();
    let body = json!({"filter": {"seen": false}});

    send(&app, post_json("/search", body.clone())).await;
    let (_, second) = send(&app, post_json("/search", body)).await;

    assert_eq!(second["cached"], false);
    assert_eq!(mailbox.calls().search_emails, 2);
}

#[tokio::test]
async fn test_invalid_json_request() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/search")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"invalid json"#))
                .unwrap(),
        )
        .await
        .unwrap();

    // Axum returns 400 or 422 for JSON rejections
    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

// == Prefetch ==

#[tokio::test]
async fn test_prefetch_warms_email_cache() {
    let (app, mailbox) = create_test_app();
    let (_, list) = send(&app, get("/emails")).await;

    let (status, body) = send(
        &app,
        post_json(
            "/prefetch",
            json!({
                "folder": "INBOX",
                "current_uid": "4",
                "candidates": list["data"]["items"],
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // Default top-K is 3 and the current message is excluded
    assert_eq!(body["prefetched"], 3);
    assert_eq!(mailbox.calls().get_email, 3);

    let (_, email) = send(&app, get("/emails/1")).await;
    assert_eq!(email["cached"], true);
}

// == Cache Administration ==

#[tokio::test]
async fn test_clear_account_cache() {
    let (app, _) = create_test_app();
    send(&app, get("/emails")).await;
    send(&app, get("/folders")).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/cache/accounts/default")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["removed"], 2);

    let (_, list) = send(&app, get("/emails")).await;
    assert_eq!(list["cached"], false);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, _) = create_test_app();
    send(&app, get("/folders")).await;
    send(&app, get("/folders")).await;

    let (status, stats) = send(&app, get("/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["backend"], "memory");
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);
    assert_eq!(stats["size"], 1);
    assert_eq!(stats["hit_rate"], 0.5);
    assert_eq!(stats["pool"]["max_size"], 5);
    assert_eq!(stats["pool"]["in_use"], 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body.get("timestamp").is_some());
}
