//! REST API handlers.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::types::{ErrorResponse, ExecResponse, StatusResponse};
use crate::callback::{PluginResult, Temperature};
use crate::error::BridgeError;
use crate::listeners::ListenerHub;
use crate::plugin::{Action, SERVICE_NAME};
use crate::runtime::{self, SessionHandle};
use crate::sensor::SessionOptions;
use crate::simulator::{SimulatedSensorService, SimulatorSettings};

/// How long `GET /current` waits for a reading or failure.
pub const CURRENT_READING_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub plugin: SessionHandle,
    pub listeners: ListenerHub,
}

impl AppState {
    /// Wrap a running plugin and spawn its listener hub. Must be called
    /// within a tokio runtime.
    pub fn new(plugin: SessionHandle) -> Self {
        let (listeners, _task) = ListenerHub::spawn(plugin.clone());
        Self { plugin, listeners }
    }

    /// State backed by a simulated sensor. Must be called within a tokio
    /// runtime.
    pub fn simulated(settings: SimulatorSettings, options: SessionOptions) -> Self {
        let (plugin, _task) = runtime::spawn(
            move |sink| SimulatedSensorService::new(settings, sink),
            options,
        );
        Self::new(plugin)
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn map_error(err: BridgeError) -> ApiError {
    match err {
        BridgeError::UnsupportedAction(action) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::unsupported_action(&action)),
        ),
        BridgeError::ChannelClosed => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::unavailable()),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal_error(other.to_string())),
        ),
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "thermometer-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "service": SERVICE_NAME,
        "status": "running"
    }))
}

/// Current thermometer status.
pub async fn thermometer_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    // The hub finishes any pending detach before it answers.
    let listeners = state.listeners.listener_count().await.map_err(map_error)?;
    let snapshot = state.plugin.snapshot().await.map_err(map_error)?;
    Ok(Json(StatusResponse {
        service: SERVICE_NAME,
        listeners,
        snapshot,
    }))
}

/// Dispatch an action over REST.
///
/// `start` places a hold on the sensor so it keeps running without a
/// listener; `stop` releases it. The sensor stops once neither a hold nor
/// a listener remains. Readings are read from the status endpoint, from
/// `GET /current`, or streamed over the WebSocket.
pub async fn exec_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
) -> Result<Response, ApiError> {
    let action: Action = action.parse().map_err(map_error)?;

    match action {
        Action::Start => {
            state.listeners.hold().await.map_err(map_error)?;
            let snapshot = state.plugin.snapshot().await.map_err(map_error)?;
            Ok((
                StatusCode::ACCEPTED,
                Json(ExecResponse::new(action, &snapshot)),
            )
                .into_response())
        }
        Action::Stop => {
            state.listeners.release().await.map_err(map_error)?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}

/// Wait for the next accepted reading, starting the sensor if needed.
pub async fn current_temperature(
    State(state): State<AppState>,
) -> Result<Json<Temperature>, ApiError> {
    let result = tokio::time::timeout(CURRENT_READING_TIMEOUT, state.listeners.get_current())
        .await
        .map_err(|_| {
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(ErrorResponse::reading_timeout()),
            )
        })?
        .map_err(map_error)?;

    reading_or_error(&result)
}

fn reading_or_error(result: &PluginResult) -> Result<Json<Temperature>, ApiError> {
    if let Some(reading) = result.temperature() {
        return Ok(Json(*reading));
    }
    let message = result
        .failure_info()
        .map(|info| info.message.clone())
        .unwrap_or_default();
    Err((
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::failed_to_start(message)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::FailureInfo;

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(health().await, "OK");
    }

    #[tokio::test]
    async fn test_api_info_endpoint() {
        let json = api_info().await.0;
        assert_eq!(json["name"], "thermometer-bridge");
        assert_eq!(json["service"], "Thermometer");
        assert_eq!(json["status"], "running");
    }

    #[test]
    fn test_map_error_statuses() {
        let (status, body) = map_error(BridgeError::UnsupportedAction("x".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0.code, "UNSUPPORTED_ACTION");

        let (status, _) = map_error(BridgeError::ChannelClosed);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = map_error(BridgeError::SubscribeFailed("x".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_failure_result_maps_to_unavailable() {
        let result = PluginResult::failure(FailureInfo::failed_to_start("No sensors found"));
        let (status, body) = reading_or_error(&result).err().unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.0.code, "FAILED_TO_START");
        assert_eq!(body.0.message, "No sensors found");
    }

    #[tokio::test]
    async fn test_status_of_fresh_plugin() {
        let state = AppState::simulated(SimulatorSettings::default(), SessionOptions::default());
        let Json(status) = thermometer_status(State(state)).await.ok().unwrap();
        assert_eq!(status.snapshot.status_code, 0);
        assert_eq!(status.listeners, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_temperature_reads_once() {
        let state = AppState::simulated(SimulatorSettings::default(), SessionOptions::default());
        let Json(reading) = current_temperature(State(state.clone())).await.ok().unwrap();
        assert!((reading.val - 21.5).abs() < 1.0);

        assert_eq!(state.listeners.listener_count().await.unwrap(), 0);
        let snapshot = state.plugin.snapshot().await.unwrap();
        assert_eq!(snapshot.status_code, 0);
    }
}
