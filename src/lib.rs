//! # thermometer-bridge
//!
//! Ambient temperature sensor bridge for web-view hosted applications.
//!
//! A host page sends `start` and `stop` actions through the bridge; the
//! plugin subscribes to the device's ambient temperature sensor, waits for
//! a first reading within a start window, and keeps streaming accepted
//! readings to the most recent caller until the sensor is stopped.
//!
//! ## Features
//!
//! - **Lifecycle state machine**: stopped, starting, running, failed to start
//! - **Accuracy gate**: only readings at medium accuracy or better are reported
//! - **Start timeout**: stale timer fires are ignored via session epochs
//! - **Serialized runtime**: one tokio task owns the plugin, all events queue to it
//! - **Listener hub**: one-shot reads, watches and streams share one sensor
//!   session, which stops when the last listener leaves
//! - **HTTP/WebSocket API**: exec channel for the embedding web view
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use thermometer_bridge::{runtime, ChannelCallback, SessionOptions};
//! use thermometer_bridge::simulator::{SimulatedSensorService, SimulatorSettings};
//!
//! #[tokio::main]
//! async fn main() -> thermometer_bridge::Result<()> {
//!     thermometer_bridge::logging::try_init().ok();
//!
//!     let (handle, _task) = runtime::spawn(
//!         |sink| SimulatedSensorService::new(SimulatorSettings::default(), sink),
//!         SessionOptions::default(),
//!     );
//!
//!     let (callback, mut results) = ChannelCallback::new();
//!     handle.execute("start", Arc::new(callback)).await?;
//!
//!     while let Some(result) = results.recv().await {
//!         if let Some(reading) = result.temperature() {
//!             println!("{:.1} C at {}", reading.val, reading.timestamp);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod callback;
pub mod cli;
pub mod config;
pub mod error;
pub mod listeners;
pub mod logging;
pub mod plugin;
pub mod runtime;
pub mod sensor;
pub mod simulator;

// Re-export commonly used types
pub use callback::{CallbackContext, CallbackId, ChannelCallback, PluginResult, ResultStatus};
pub use error::{BridgeError, Result};
pub use listeners::{ListenerHub, ListenerId, ListenerMode};
pub use plugin::{Action, PluginSnapshot, ThermometerPlugin};
pub use runtime::{SensorEventSink, SessionHandle};
pub use sensor::{
    Accuracy, SensorService, SensorSession, SensorStatus, SessionOptions, SupersedePolicy,
};
pub use simulator::{SimulatedSensorService, SimulatorSettings};
