//! Integration tests for the URL shortener API
//!
//! These tests drive the full router: request-id middleware, request
//! parsing, the shorten service and the redb-backed store.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use linkmap::config::Config;
use linkmap::model::{NewMapping, UrlMapping};
use linkmap::route::create_app;
use linkmap::state::AppState;
use linkmap::store::{MappingStore, StoreError};

/// Helper function to create a test application with a temporary database
fn setup_test_app() -> (Router, AppState, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let config = Config {
        database_path: temp_db.path().to_str().unwrap().to_string(),
        app_version: "test-1.0".to_string(),
        max_short_key_length: 32,
        ..Config::default()
    };

    let state = AppState::open(config).expect("Failed to initialize test database");
    (create_app(state.clone()), state, temp_db)
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

fn shorten_request(custom: Option<&str>, payload: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/shorten_url")
        .header("content-type", "application/json");
    if let Some(flag) = custom {
        builder = builder.header("x-custom-shorten", flag);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn mapping_count(state: &AppState) -> u64 {
    state.service.store().count().await.unwrap()
}

#[tokio::test]
async fn test_ping_reports_version() {
    let (app, _state, _temp_db) = setup_test_app();

    let response = send(&app, get_request("/ping")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["version"], "test-1.0");
}

#[tokio::test]
async fn test_shorten_generated_key() {
    let (app, state, _temp_db) = setup_test_app();

    let payload = json!({
        "target_url": "https://example.com/a",
        "short_key_length": 5
    });
    let response = send(&app, shorten_request(None, &payload)).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("missing x-request-id header")
        .to_str()
        .unwrap()
        .to_string();

    let body = response_json(response.into_body()).await;
    assert_eq!(body["meta"]["successful"], true);
    assert_eq!(body["meta"]["request_id"], request_id.as_str());

    let data = &body["data"];
    let short_key = data["short_key"].as_str().unwrap();
    assert_eq!(short_key.len(), 5);
    assert!(short_key.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(data["target_url"], "https://example.com/a");
    assert_eq!(data["hits"], 0);
    assert_eq!(data["is_active"], true);
    assert_eq!(data["is_custom_key"], false);
    assert_eq!(data["app_version"], "test-1.0");
    assert_eq!(data["tags"], json!([]));
    assert!(!data["mapping_id"].as_str().unwrap().is_empty());

    assert_eq!(mapping_count(&state).await, 1);
}

#[tokio::test]
async fn test_shorten_is_idempotent_per_target() {
    let (app, state, _temp_db) = setup_test_app();

    let payload = json!({
        "target_url": "https://example.com/same",
        "short_key_length": 6
    });

    let first = send(&app, shorten_request(None, &payload)).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = response_json(first.into_body()).await;

    let second = send(&app, shorten_request(None, &payload)).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second = response_json(second.into_body()).await;

    assert_eq!(first["data"]["short_key"], second["data"]["short_key"]);
    assert_eq!(first["data"]["mapping_id"], second["data"]["mapping_id"]);
    assert_eq!(
        second["meta"]["message"],
        "a mapping between a key and this target_url already exists"
    );
    assert_eq!(mapping_count(&state).await, 1);
}

#[tokio::test]
async fn test_existing_mapping_wins_over_custom_key() {
    let (app, state, _temp_db) = setup_test_app();

    let generated = json!({
        "target_url": "https://example.com/dup-target",
        "short_key_length": 5
    });
    let first = send(&app, shorten_request(None, &generated)).await;
    let first = response_json(first.into_body()).await;

    let custom = json!({
        "target_url": "https://example.com/dup-target",
        "custom_key": "another"
    });
    let second = send(&app, shorten_request(Some("true"), &custom)).await;

    assert_eq!(second.status(), StatusCode::OK);
    let second = response_json(second.into_body()).await;
    assert_eq!(second["data"]["short_key"], first["data"]["short_key"]);
    assert_eq!(mapping_count(&state).await, 1);
}

#[tokio::test]
async fn test_shorten_custom_key_with_tags() {
    let (app, _state, _temp_db) = setup_test_app();

    let payload = json!({
        "target_url": "https://example.com/promo",
        "tags": ["spring", "sale"],
        "custom_key": "promo"
    });
    let response = send(&app, shorten_request(Some("true"), &payload)).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["data"]["short_key"], "promo");
    assert_eq!(body["data"]["is_custom_key"], true);
    assert_eq!(body["data"]["tags"], json!(["spring", "sale"]));
    assert_eq!(
        body["meta"]["message"],
        "a mapping between a promo and this https://example.com/promo created"
    );
}

#[tokio::test]
async fn test_shorten_custom_key_collision() {
    let (app, state, _temp_db) = setup_test_app();

    let first = json!({
        "target_url": "https://example.com/first",
        "custom_key": "promo"
    });
    let response = send(&app, shorten_request(Some("true"), &first)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let second = json!({
        "target_url": "https://example.com/second",
        "custom_key": "promo"
    });
    let response = send(&app, shorten_request(Some("true"), &second)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["meta"]["successful"], false);
    assert_eq!(body["detail"], "duplicate short key error");
    assert!(body["meta"]["message"]
        .as_str()
        .unwrap()
        .contains("duplicate short key"));

    assert_eq!(mapping_count(&state).await, 1);
}

#[tokio::test]
async fn test_redirect_counts_hits() {
    let (app, _state, _temp_db) = setup_test_app();

    let payload = json!({
        "target_url": "https://example.com/a",
        "short_key_length": 5
    });
    let response = send(&app, shorten_request(None, &payload)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response.into_body()).await;
    let short_key = body["data"]["short_key"].as_str().unwrap().to_string();

    let response = send(&app, get_request(&format!("/{}", short_key))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://example.com/a"
    );

    // Shortening again returns the existing mapping with the updated counter
    let response = send(&app, shorten_request(None, &payload)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["data"]["short_key"], short_key.as_str());
    assert_eq!(body["data"]["hits"], 1);
}

#[tokio::test]
async fn test_redirect_unknown_key() {
    let (app, state, _temp_db) = setup_test_app();

    let response = send(&app, get_request("/nonexistent")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["detail"], "invalid short key");
    assert_eq!(body["meta"]["successful"], false);
    assert_eq!(mapping_count(&state).await, 0);
}

#[tokio::test]
async fn test_shorten_validation_errors() {
    let (app, state, _temp_db) = setup_test_app();

    let cases = vec![
        (None, json!({ "target_url": "https://example.com/v" })),
        (
            None,
            json!({ "target_url": "https://example.com/v", "short_key_length": 0 }),
        ),
        (
            None,
            json!({ "target_url": "https://example.com/v", "short_key_length": 33 }),
        ),
        (
            None,
            json!({ "target_url": "https://example.com/v", "short_key_length": -3 }),
        ),
        (
            Some("true"),
            json!({ "target_url": "https://example.com/v", "short_key_length": 5 }),
        ),
        (
            Some("true"),
            json!({ "target_url": "https://example.com/v", "custom_key": "" }),
        ),
        (
            Some("sometimes"),
            json!({ "target_url": "https://example.com/v", "custom_key": "ok" }),
        ),
        (None, json!({ "target_url": "", "short_key_length": 5 })),
    ];

    for (flag, payload) in cases {
        let response = send(&app, shorten_request(flag, &payload)).await;
        assert_eq!(
            response.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "payload {} with flag {:?}",
            payload,
            flag
        );
        let body = response_json(response.into_body()).await;
        assert_eq!(body["meta"]["message"], "invalid input data");
        assert!(!body["data"].is_null());
    }

    assert_eq!(mapping_count(&state).await, 0);
}

#[tokio::test]
async fn test_shorten_rejects_target_that_cannot_redirect() {
    let (app, state, _temp_db) = setup_test_app();

    let payload = json!({
        "target_url": "https://example.com/a\nb",
        "custom_key": "ctl"
    });
    let response = send(&app, shorten_request(Some("true"), &payload)).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["meta"]["message"], "invalid input data");
    assert_eq!(mapping_count(&state).await, 0);

    // Nothing was stored, so the key does not resolve
    let response = send(&app, get_request("/ctl")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shorten_rejects_unroutable_custom_keys() {
    let (app, state, _temp_db) = setup_test_app();

    for key in ["ping", "shorten_url", "a/b", "q?x"] {
        let payload = json!({
            "target_url": format!("https://example.com/{}", key.len()),
            "custom_key": key
        });
        let response = send(&app, shorten_request(Some("true"), &payload)).await;
        assert_eq!(
            response.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "custom key {:?}",
            key
        );
    }
    assert_eq!(mapping_count(&state).await, 0);

    // The fixed route still answers
    let response = send(&app, get_request("/ping")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_shorten_malformed_json() {
    let (app, _state, _temp_db) = setup_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/shorten_url")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redirects_count_every_hit() {
    let (app, state, _temp_db) = setup_test_app();

    let payload = json!({
        "target_url": "https://example.com/hot",
        "custom_key": "hot"
    });
    let response = send(&app, shorten_request(Some("true"), &payload)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { app.oneshot(get_request("/hot")).await.unwrap().status() })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::TEMPORARY_REDIRECT);
    }

    let mapping = state.service.store().find_by_key("hot").await.unwrap().unwrap();
    assert_eq!(mapping.hits, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_shorten_of_same_target_creates_one_mapping() {
    let (app, state, _temp_db) = setup_test_app();

    let payload = json!({
        "target_url": "https://example.com/race",
        "short_key_length": 8
    });

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let app = app.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                let response = app.oneshot(shorten_request(None, &payload)).await.unwrap();
                let status = response.status();
                (status, response_json(response.into_body()).await)
            })
        })
        .collect();

    let mut created = 0;
    let mut keys = std::collections::HashSet::new();
    for task in tasks {
        let (status, body) = task.await.unwrap();
        match status {
            StatusCode::CREATED => created += 1,
            StatusCode::OK => {}
            other => panic!("unexpected status {}", other),
        }
        keys.insert(body["data"]["short_key"].as_str().unwrap().to_string());
    }

    assert_eq!(created, 1);
    assert_eq!(keys.len(), 1);
    assert_eq!(mapping_count(&state).await, 1);
}

/// Store whose every insert collides, to exercise the generated-key path.
struct CollidingStore;

#[async_trait]
impl MappingStore for CollidingStore {
    async fn find_active_by_target(&self, _: &str) -> Result<Option<UrlMapping>, StoreError> {
        Ok(None)
    }

    async fn insert_new(&self, new_mapping: NewMapping) -> Result<UrlMapping, StoreError> {
        Err(StoreError::DuplicateKey {
            short_key: new_mapping.short_key,
        })
    }

    async fn find_by_key(&self, _: &str) -> Result<Option<UrlMapping>, StoreError> {
        Ok(None)
    }

    async fn record_hit(&self, mapping: &UrlMapping) -> Result<UrlMapping, StoreError> {
        Err(StoreError::NotFound {
            short_key: mapping.short_key.clone(),
        })
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_generated_key_collision_is_server_error() {
    let state = AppState::new(Config::default(), Arc::new(CollidingStore));
    let app = create_app(state);

    let payload = json!({
        "target_url": "https://example.com/unlucky",
        "short_key_length": 1
    });
    let response = send(&app, shorten_request(Some("false"), &payload)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["detail"], "duplicate short key error");
}
