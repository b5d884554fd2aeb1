//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::callback::{PluginResult, ResultStatus};
use crate::listeners::ListenerId;
use crate::plugin::{Action, PluginSnapshot};

/// Response for a status query.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Plugin service name.
    pub service: &'static str,
    /// Registered listeners, not counting a REST hold.
    pub listeners: usize,
    #[serde(flatten)]
    pub snapshot: PluginSnapshot,
}

/// Response for an action dispatched over REST.
#[derive(Debug, Clone, Serialize)]
pub struct ExecResponse {
    pub action: String,
    /// Session status after the action was applied.
    pub status: String,
    pub status_code: i32,
}

impl ExecResponse {
    pub fn new(action: Action, snapshot: &PluginSnapshot) -> Self {
        Self {
            action: action.to_string(),
            status: snapshot.status.to_string(),
            status_code: snapshot.status_code,
        }
    }
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "UNSUPPORTED_ACTION").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_action(action: &str) -> Self {
        Self::new(
            "UNSUPPORTED_ACTION",
            format!("Action '{}' is not supported", action),
        )
    }

    pub fn unavailable() -> Self {
        Self::new("PLUGIN_UNAVAILABLE", "Thermometer plugin is not running")
    }

    pub fn failed_to_start(message: impl Into<String>) -> Self {
        Self::new("FAILED_TO_START", message)
    }

    pub fn reading_timeout() -> Self {
        Self::new("READING_TIMEOUT", "No reading arrived in time")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

/// WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Client asks the plugin to run an action.
    Exec { action: String },
    /// Client asks for the next reading only.
    GetCurrent,
    /// Client asks for the latest reading every `frequency_ms`.
    Watch {
        #[serde(default)]
        frequency_ms: Option<u64>,
    },
    /// Server acknowledges a watch.
    Watching { id: ListenerId },
    /// Client cancels a watch.
    ClearWatch { id: ListenerId },
    /// Server acknowledges a cleared watch.
    Cleared { id: ListenerId, removed: bool },
    /// Server forwards a plugin result.
    Result {
        status: ResultStatus,
        keep_callback: bool,
        message: serde_json::Value,
    },
    /// Error message.
    Error { code: String, message: String },
    /// Ping for keepalive.
    Ping,
    /// Pong response.
    Pong,
}

impl WsMessage {
    /// Wrap a plugin result for the socket.
    pub fn from_result(result: &PluginResult) -> serde_json::Result<Self> {
        Ok(WsMessage::Result {
            status: result.status,
            keep_callback: result.keep_callback,
            message: serde_json::to_value(&result.message)?,
        })
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        WsMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}
