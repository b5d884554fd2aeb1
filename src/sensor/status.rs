//! Sensor session status.

use serde::Serialize;

/// Represents the lifecycle status of the sensor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    /// No subscription is active.
    #[default]
    Stopped,
    /// A subscription was requested and no reading has arrived yet.
    Starting,
    /// At least one reading arrived since the last start.
    Running,
    /// The last start attempt found no sensor or timed out.
    FailedToStart,
}

impl SensorStatus {
    /// Numeric code used by the web-view side for this status.
    ///
    /// `FailedToStart` doubles as the error code in failure payloads.
    pub fn code(&self) -> i32 {
        match self {
            SensorStatus::Stopped => 0,
            SensorStatus::Starting => 1,
            SensorStatus::Running => 2,
            SensorStatus::FailedToStart => 3,
        }
    }

    /// Check whether a new start request must open a fresh subscription.
    ///
    /// `Starting` and `Running` already have one in flight, so a start
    /// only replaces the pending caller.
    pub fn needs_start(&self) -> bool {
        matches!(self, SensorStatus::Stopped | SensorStatus::FailedToStart)
    }

    /// Check whether sensor callbacks should be processed.
    pub fn accepts_events(&self) -> bool {
        !matches!(self, SensorStatus::Stopped)
    }
}

impl std::fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SensorStatus::Stopped => "stopped",
            SensorStatus::Starting => "starting",
            SensorStatus::Running => "running",
            SensorStatus::FailedToStart => "failed_to_start",
        };
        f.write_str(name)
    }
}
