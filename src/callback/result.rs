//! Result payloads delivered to waiting callers.

use serde::{Deserialize, Serialize};

use crate::sensor::SensorStatus;

/// Message shown when no ambient temperature sensor is present.
pub const NO_SENSORS_MESSAGE: &str = "No sensors found";

/// Message shown when a start attempt produced no reading in time.
pub const START_TIMEOUT_MESSAGE: &str = "Thermometer could not be started.";

/// Message shown to a caller replaced by a newer start request.
pub const SUPERSEDED_MESSAGE: &str = "Superseded by a newer start request.";

/// Outcome class of a delivered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Acknowledgement with no payload.
    NoResult,
    Ok,
    Error,
}

/// An accepted temperature reading as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature {
    /// Degrees Celsius.
    pub val: f32,
    /// Milliseconds since the Unix epoch when the reading was accepted.
    pub timestamp: i64,
}

/// Failure payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureInfo {
    pub code: i32,
    pub message: String,
}

impl FailureInfo {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A start failure with the given message.
    pub fn failed_to_start(message: impl Into<String>) -> Self {
        Self::new(SensorStatus::FailedToStart.code(), message)
    }
}

/// Payload carried by a [`PluginResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultMessage {
    Temperature(Temperature),
    Failure(FailureInfo),
    Empty,
}

/// A single result sent to a caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginResult {
    pub status: ResultStatus,
    pub keep_callback: bool,
    pub message: ResultMessage,
}

impl PluginResult {
    /// An acknowledgement that carries nothing and keeps the channel open.
    pub fn no_result() -> Self {
        Self {
            status: ResultStatus::NoResult,
            keep_callback: true,
            message: ResultMessage::Empty,
        }
    }

    /// A reading; more may follow.
    pub fn success(reading: Temperature) -> Self {
        Self {
            status: ResultStatus::Ok,
            keep_callback: true,
            message: ResultMessage::Temperature(reading),
        }
    }

    /// A failure; the channel stays open so a later start can reuse it.
    pub fn failure(info: FailureInfo) -> Self {
        Self {
            status: ResultStatus::Error,
            keep_callback: true,
            message: ResultMessage::Failure(info),
        }
    }

    /// Override whether more results may follow.
    pub fn with_keep_callback(mut self, keep: bool) -> Self {
        self.keep_callback = keep;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == ResultStatus::Error
    }

    pub fn temperature(&self) -> Option<&Temperature> {
        match &self.message {
            ResultMessage::Temperature(t) => Some(t),
            _ => None,
        }
    }

    pub fn failure_info(&self) -> Option<&FailureInfo> {
        match &self.message {
            ResultMessage::Failure(f) => Some(f),
            _ => None,
        }
    }
}
