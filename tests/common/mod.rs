// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use running_tracker::config::Config;
use running_tracker::db::{FirestoreDb, MemoryDb};
use running_tracker::routes::create_router;
use running_tracker::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app backed by in-memory storage.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::with_store(Config::test_default(), MemoryDb::new()));
    (create_router(state.clone()), state)
}

/// Create a test app whose store is unreachable.
#[allow(dead_code)]
pub fn create_offline_app() -> axum::Router {
    let state = Arc::new(AppState::with_store(
        Config::test_default(),
        FirestoreDb::new_mock(),
    ));
    create_router(state)
}

/// Send one request and decode the JSON response body (Null when empty).
#[allow(dead_code)]
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Create a user through the API and return its id.
#[allow(dead_code)]
pub async fn create_user(app: &axum::Router) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/users",
        Some(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Runner",
            "birthDate": "1990-04-12",
            "sex": "F",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

/// Start a run through the API and return its id.
#[allow(dead_code)]
pub async fn start_run(
    app: &axum::Router,
    user_id: &str,
    latitude: f64,
    longitude: f64,
    at: &str,
) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/runs",
        Some(serde_json::json!({
            "userId": user_id,
            "startLatitude": latitude,
            "startLongitude": longitude,
            "startDatetime": at,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "start failed: {}", json);
    json["id"].as_str().unwrap().to_string()
}

/// Finish a run through the API and return the response.
#[allow(dead_code)]
pub async fn finish_run(
    app: &axum::Router,
    run_id: &str,
    latitude: f64,
    longitude: f64,
    at: &str,
    distance: Option<f64>,
) -> (StatusCode, Value) {
    let mut body = serde_json::json!({
        "finishLatitude": latitude,
        "finishLongitude": longitude,
        "finishDatetime": at,
    });
    if let Some(distance) = distance {
        body["distance"] = serde_json::json!(distance);
    }
    send(
        app,
        "PUT",
        &format!("/api/runs/{}/finish", run_id),
        Some(body),
    )
    .await
}
