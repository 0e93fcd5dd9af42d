//! Integration tests for the HTTP routes
//!
//! Tests: liveness, room creation, key lookup, history, stats, store failures

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use packet_relay::hub::BroadcastHub;
use packet_relay::rooms::{ChatMessage, MemoryStore, Room, RoomStore, StoreError};
use packet_relay::server::{build_router, AppState};
use packet_relay::stats::PipelineStats;

fn app_with(store: Arc<dyn RoomStore>) -> (Router, AppState) {
    let state = AppState::new(
        Arc::new(BroadcastHub::new()),
        store,
        Arc::new(PipelineStats::new()),
    );
    (build_router(state.clone()), state)
}

fn test_app() -> (Router, AppState) {
    app_with(Arc::new(MemoryStore::new()))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> axum::body::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap_or(json!({}))
}

/// Store whose backing medium is gone
struct BrokenStore;

#[async_trait]
impl RoomStore for BrokenStore {
    async fn create_room(&self, _room: Room) -> Result<Room, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk gone")))
    }

    async fn room(&self, name: &str) -> Result<Option<Room>, StoreError> {
        Ok(Some(Room::new(name, "k1")))
    }

    async fn room_by_key(&self, _key: &str) -> Result<Option<Room>, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk gone")))
    }

    async fn append_message(&self, _message: ChatMessage) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk gone")))
    }

    async fn messages(&self, _room: &str) -> Result<Vec<ChatMessage>, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk gone")))
    }
}

#[tokio::test]
async fn test_liveness() {
    let (app, _) = test_app();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"Server is running...");
}

#[tokio::test]
async fn test_find_room_with_bad_key_is_forbidden_with_empty_body() {
    let (app, _) = test_app();

    let response = app
        .oneshot(post_json("/rooms", json!({"key": "bad"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_create_then_find_room() {
    let (app, _) = test_app();

    let response = app
        .clone()
        .oneshot(post_json("/createRoom", json!({"name": "ops", "key": "k1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_json(response).await,
        json!({"name": "ops", "key": "k1"})
    );

    let response = app
        .oneshot(post_json("/rooms", json!({"key": "k1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["name"], "ops");
}

#[tokio::test]
async fn test_create_duplicate_room_conflicts() {
    let (app, _) = test_app();

    let first = app
        .clone()
        .oneshot(post_json("/createRoom", json!({"name": "ops", "key": "k1"})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_json("/createRoom", json!({"name": "ops", "key": "k2"})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(second).await["error"], "CONFLICT");
}

#[tokio::test]
async fn test_create_room_with_empty_name_rejected() {
    let (app, _) = test_app();

    let response = app
        .oneshot(post_json("/createRoom", json!({"name": "", "key": "k1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_in_timestamp_order() {
    let (app, state) = test_app();
    let store = state.gateway.store();
    store.create_room(Room::new("ops", "k1")).await.unwrap();

    for (text, ts) in [
        ("second", "2024-05-01T12:00:02Z"),
        ("first", "2024-05-01T12:00:01Z"),
    ] {
        store
            .append_message(ChatMessage {
                username: "alice".into(),
                message: text.into(),
                room: "ops".into(),
                timestamp: ts.parse().unwrap(),
            })
            .await
            .unwrap();
    }

    let response = app
        .oneshot(post_json("/messages", json!({"room": "ops", "key": "k1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let messages: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["first", "second"]);
    assert_eq!(body[0]["timestamp"], "2024-05-01T12:00:01Z");
}

#[tokio::test]
async fn test_history_with_wrong_key_forbidden() {
    let (app, state) = test_app();
    state
        .gateway
        .create_room("ops", "k1")
        .await
        .unwrap();

    let wrong_key = app
        .clone()
        .oneshot(post_json("/messages", json!({"room": "ops", "key": "nope"})))
        .await
        .unwrap();
    assert_eq!(wrong_key.status(), StatusCode::FORBIDDEN);

    let unknown_room = app
        .oneshot(post_json("/messages", json!({"room": "dev", "key": "k1"})))
        .await
        .unwrap();
    assert_eq!(unknown_room.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_store_failures_are_internal_errors() {
    let (app, _) = app_with(Arc::new(BrokenStore));

    let history = app
        .clone()
        .oneshot(post_json("/messages", json!({"room": "ops", "key": "k1"})))
        .await
        .unwrap();
    assert_eq!(history.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let create = app
        .oneshot(post_json("/createRoom", json!({"name": "ops", "key": "k1"})))
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response_json(create).await["error"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn test_stats_reports_counters() {
    let (app, state) = test_app();
    let (_id, _rx) = state.hub.connect().await.unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/stats")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["pipeline"]["records"], 0);
    assert_eq!(body["hub"]["active_connections"], 1);
    assert_eq!(body["hub"]["total_connections"], 1);
}
