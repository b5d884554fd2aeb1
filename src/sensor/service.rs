//! Platform sensor service contract.
//!
//! These traits describe what the session consumes from the host platform:
//! a registry that can list and subscribe to sensors, and the listener
//! interface the platform calls back into.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Accuracy;
use crate::Result;

/// Kind of hardware sensor an event or registry query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    AmbientTemperature,
    Accelerometer,
    Light,
    Pressure,
    RelativeHumidity,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::AmbientTemperature => "ambient_temperature",
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::Light => "light",
            SensorKind::Pressure => "pressure",
            SensorKind::RelativeHumidity => "relative_humidity",
        };
        f.write_str(name)
    }
}

/// A sensor as listed by the platform registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorInfo {
    pub kind: SensorKind,
    pub name: String,
    pub vendor: String,
}

impl SensorInfo {
    pub fn new(kind: SensorKind, name: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            vendor: vendor.into(),
        }
    }
}

/// Requested delivery rate for sensor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingRate {
    /// As fast as the hardware allows.
    Fastest,
    /// Suitable for games.
    Game,
    /// Suitable for user interface updates.
    #[default]
    Ui,
    /// Suitable for screen orientation changes.
    Normal,
}

impl SamplingRate {
    /// Nominal interval between events at this rate.
    pub fn interval(&self) -> Duration {
        match self {
            SamplingRate::Fastest => Duration::ZERO,
            SamplingRate::Game => Duration::from_millis(20),
            SamplingRate::Ui => Duration::from_millis(60),
            SamplingRate::Normal => Duration::from_millis(200),
        }
    }
}

impl FromStr for SamplingRate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastest" => Ok(SamplingRate::Fastest),
            "game" => Ok(SamplingRate::Game),
            "ui" => Ok(SamplingRate::Ui),
            "normal" => Ok(SamplingRate::Normal),
            _ => Err(format!("unknown sampling rate: {}", s)),
        }
    }
}

/// Sensor registry and subscription management offered by the platform.
///
/// A service delivers events for an active subscription to whatever
/// [`SensorListener`] it was wired to when constructed; the session only
/// controls when the subscription exists.
pub trait SensorService: Send {
    /// List all sensors of the given kind. An empty list means the device
    /// has none.
    fn list_sensors(&self, kind: SensorKind) -> Vec<SensorInfo>;

    /// Subscribe to events from `sensor` at the requested rate.
    fn subscribe(&mut self, sensor: &SensorInfo, rate: SamplingRate) -> Result<()>;

    /// Drop the active subscription, if any. Must be idempotent.
    fn unsubscribe(&mut self);
}

/// Callbacks delivered by the platform sensor service.
pub trait SensorListener {
    /// The reliability of a sensor's readings changed.
    fn on_accuracy_changed(&mut self, kind: SensorKind, accuracy: Accuracy);

    /// A sensor produced a new reading. `platform_timestamp` is the
    /// platform's own event time in nanoseconds and is informational only.
    fn on_reading_changed(&mut self, kind: SensorKind, value: f32, platform_timestamp: u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_intervals_are_ordered() {
        assert!(SamplingRate::Fastest.interval() < SamplingRate::Game.interval());
        assert!(SamplingRate::Game.interval() < SamplingRate::Ui.interval());
        assert!(SamplingRate::Ui.interval() < SamplingRate::Normal.interval());
    }

    #[test]
    fn test_default_rate_is_ui() {
        assert_eq!(SamplingRate::default(), SamplingRate::Ui);
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!("UI".parse::<SamplingRate>().unwrap(), SamplingRate::Ui);
        assert_eq!("game".parse::<SamplingRate>().unwrap(), SamplingRate::Game);
        assert!("warp".parse::<SamplingRate>().is_err());
    }

    #[test]
    fn test_rate_serde() {
        let json = serde_json::to_string(&SamplingRate::Normal).unwrap();
        assert_eq!(json, "\"normal\"");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SensorKind::AmbientTemperature.to_string(), "ambient_temperature");
    }
}
