//! Error types for thermometer-bridge.

use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host asked the plugin to run an action it does not know.
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// No sensor of the requested kind is present on the device.
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// The platform rejected the sensor subscription.
    #[error("sensor subscription failed: {0}")]
    SubscribeFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The plugin loop or listener hub is gone.
    #[error("channel closed")]
    ChannelClosed,
}

/// Convenience Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
