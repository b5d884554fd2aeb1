//! Caller-facing result delivery.
//!
//! Each caller waiting on the plugin owns a [`CallbackContext`]. Results are
//! long-lived: a start may produce any number of readings on the same
//! channel, so every result carries a keep-callback flag.

mod context;
mod id;
mod result;

pub use context::{CallbackContext, ChannelCallback};
pub use id::CallbackId;
pub use result::{
    FailureInfo, PluginResult, ResultMessage, ResultStatus, Temperature, NO_SENSORS_MESSAGE,
    START_TIMEOUT_MESSAGE, SUPERSEDED_MESSAGE,
};
