//! API integration tests.
//!
//! These tests verify the complete API flow end-to-end using axum's test
//! utilities against a plugin backed by the simulated sensor.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use thermometer_bridge::api::{create_router, AppState};
use thermometer_bridge::sensor::SamplingRate;
use thermometer_bridge::{SessionOptions, SimulatorSettings};
use tower::ServiceExt;

/// Helper to create a JSON request.
fn json_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::empty())
        .unwrap()
}

/// Helper to extract body as string.
async fn response_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).to_string()
}

/// Helper to extract JSON from response.
async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

fn app_with(settings: SimulatorSettings, options: SessionOptions) -> Router {
    create_router(AppState::simulated(settings, options))
}

fn default_app() -> Router {
    app_with(SimulatorSettings::default(), SessionOptions::default())
}

/// A simulator that warms up quickly and samples fast.
fn quick_app() -> Router {
    let settings = SimulatorSettings {
        warmup: Duration::from_millis(5),
        ..SimulatorSettings::default()
    };
    app_with(
        settings,
        SessionOptions::default().sampling_rate(SamplingRate::Game),
    )
}

async fn status(app: &Router) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/v1/thermometer"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await
}

// ============================================================================
// Health & Info Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = default_app();

    let response = app
        .oneshot(json_request(Method::GET, "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "OK");
}

#[tokio::test]
async fn test_api_info_endpoint() {
    let app = default_app();

    let response = app
        .oneshot(json_request(Method::GET, "/api/v1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["name"], "thermometer-bridge");
    assert_eq!(json["service"], "Thermometer");
    assert_eq!(json["status"], "running");
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_initial_status_is_stopped() {
    let app = default_app();

    let json = status(&app).await;
    assert_eq!(json["service"], "Thermometer");
    assert_eq!(json["status"], "stopped");
    assert_eq!(json["status_code"], 0);
    assert_eq!(json["listeners"], 0);
    assert!(json.get("last_reading").is_none());
}

#[tokio::test]
async fn test_start_is_accepted_and_starting() {
    let app = default_app();

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/start"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = response_json(response).await;
    assert_eq!(json["action"], "start");
    assert_eq!(json["status"], "starting");
    assert_eq!(json["status_code"], 1);
}

#[tokio::test]
async fn test_start_reaches_running_with_reading() {
    let app = quick_app();

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/start"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let json = status(&app).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["status_code"], 2);
    assert_eq!(json["accuracy"], 3);
    assert!(json["last_reading"]["value"].is_number());
}

#[tokio::test]
async fn test_stop_returns_no_content() {
    let app = quick_app();

    app.clone()
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/start"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/stop"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let json = status(&app).await;
    assert_eq!(json["status"], "stopped");
    assert!(json.get("last_reading").is_none());
}

#[tokio::test]
async fn test_stop_when_already_stopped() {
    let app = default_app();

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/stop"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(status(&app).await["status"], "stopped");
}

#[tokio::test]
async fn test_start_without_sensor_fails() {
    let app = app_with(SimulatorSettings::absent(), SessionOptions::default());

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/start"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = response_json(response).await;
    assert_eq!(json["status"], "failed_to_start");
    assert_eq!(json["status_code"], 3);
}

#[tokio::test]
async fn test_start_rejected_subscribe_fails() {
    let settings = SimulatorSettings {
        reject_subscribe: true,
        ..SimulatorSettings::default()
    };
    let app = app_with(settings, SessionOptions::default());

    let response = app
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/start"))
        .await
        .unwrap();

    let json = response_json(response).await;
    assert_eq!(json["status"], "failed_to_start");
}

#[tokio::test]
async fn test_start_times_out_without_reading() {
    let settings = SimulatorSettings {
        warmup: Duration::from_secs(60),
        ..SimulatorSettings::default()
    };
    let options = SessionOptions::default().start_timeout(Duration::from_millis(50));
    let app = app_with(settings, options);

    app.clone()
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/start"))
        .await
        .unwrap();
    assert_eq!(status(&app).await["status"], "starting");

    tokio::time::sleep(Duration::from_millis(250)).await;

    let json = status(&app).await;
    assert_eq!(json["status"], "failed_to_start");
    assert_eq!(json["status_code"], 3);
}

// ============================================================================
// Current Reading Tests
// ============================================================================

#[tokio::test]
async fn test_current_returns_reading_and_stops() {
    let app = quick_app();

    let response = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/v1/thermometer/current"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert!(json["val"].is_number());
    assert!(json["timestamp"].as_i64().unwrap() > 0);

    let json = status(&app).await;
    assert_eq!(json["status"], "stopped");
    assert_eq!(json["listeners"], 0);
}

#[tokio::test]
async fn test_current_keeps_held_sensor_running() {
    let app = quick_app();

    app.clone()
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/start"))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/v1/thermometer/current"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(status(&app).await["status"], "running");
}

#[tokio::test]
async fn test_current_without_sensor_is_unavailable() {
    let app = app_with(SimulatorSettings::absent(), SessionOptions::default());

    let response = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/v1/thermometer/current"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = response_json(response).await;
    assert_eq!(json["code"], "FAILED_TO_START");
    assert_eq!(json["message"], "No sensors found");

    assert_eq!(status(&app).await["status"], "stopped");
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[tokio::test]
async fn test_unsupported_action() {
    let app = default_app();

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/calibrate"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["code"], "UNSUPPORTED_ACTION");
    assert!(json["message"].as_str().unwrap().contains("calibrate"));

    // No state change.
    assert_eq!(status(&app).await["status"], "stopped");
}

#[tokio::test]
async fn test_action_names_are_case_sensitive() {
    let app = default_app();

    let response = app
        .oneshot(json_request(Method::POST, "/api/v1/thermometer/START"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_method_not_allowed() {
    let app = default_app();

    let response = app
        .oneshot(json_request(Method::DELETE, "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_not_found_route() {
    let app = default_app();

    let response = app
        .oneshot(json_request(Method::GET, "/nonexistent"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
