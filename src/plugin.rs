//! Host-facing thermometer plugin.
//!
//! The host dispatches named actions with a callback for each; this type
//! turns them into calls on the [`SensorSession`] and acknowledges every
//! recognised action with a keep-callback `NoResult`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::callback::{CallbackContext, PluginResult};
use crate::error::BridgeError;
use crate::sensor::{
    Accuracy, Clock, Reading, SensorKind, SensorListener, SensorService, SensorSession,
    SensorStatus, SystemClock, TimerService,
};
use crate::Result;

/// Name the web-view side uses to address this plugin.
pub const SERVICE_NAME: &str = "Thermometer";

/// Actions the plugin understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
}

impl FromStr for Action {
    type Err = BridgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            other => Err(BridgeError::UnsupportedAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Start => f.write_str("start"),
            Action::Stop => f.write_str("stop"),
        }
    }
}

/// Point-in-time view of the session for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSnapshot {
    pub status: SensorStatus,
    pub status_code: i32,
    pub accuracy: Accuracy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reading: Option<Reading>,
}

/// The thermometer plugin as registered with the host.
pub struct ThermometerPlugin<S, T, C = SystemClock> {
    session: SensorSession<S, T, C>,
}

impl<S, T, C> ThermometerPlugin<S, T, C>
where
    S: SensorService,
    T: TimerService,
    C: Clock,
{
    pub fn new(session: SensorSession<S, T, C>) -> Self {
        Self { session }
    }

    /// Run `action` on behalf of `callback`.
    ///
    /// Unknown actions are rejected without sending anything to the caller.
    pub fn execute(&mut self, action: &str, callback: Arc<dyn CallbackContext>) -> Result<Action> {
        let action: Action = match action.parse() {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, "rejecting plugin action");
                return Err(e);
            }
        };
        debug!(%action, callback = %callback.id(), "executing plugin action");

        match action {
            Action::Start => self.session.start(Arc::clone(&callback)),
            Action::Stop => self.session.stop(),
        }

        callback.send(PluginResult::no_result());
        Ok(action)
    }

    /// The embedding view navigated or reloaded.
    pub fn on_reset(&mut self) {
        self.session.on_host_reset();
    }

    /// The host is tearing the plugin down.
    pub fn on_destroy(&mut self) {
        self.session.on_host_destroy();
    }

    pub fn snapshot(&self) -> PluginSnapshot {
        let status = self.session.status();
        PluginSnapshot {
            status,
            status_code: status.code(),
            accuracy: self.session.accuracy(),
            last_reading: self.session.last_reading(),
        }
    }

    pub fn session(&self) -> &SensorSession<S, T, C> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SensorSession<S, T, C> {
        &mut self.session
    }
}

impl<S, T, C> SensorListener for ThermometerPlugin<S, T, C>
where
    S: SensorService,
    T: TimerService,
    C: Clock,
{
    fn on_accuracy_changed(&mut self, kind: SensorKind, accuracy: Accuracy) {
        self.session.on_accuracy_changed(kind, accuracy);
    }

    fn on_reading_changed(&mut self, kind: SensorKind, value: f32, platform_timestamp: u64) {
        self.session.on_reading_changed(kind, value, platform_timestamp);
    }
}
