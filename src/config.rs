//! Configuration management for thermometer-bridge.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::cli::Args;
use crate::sensor::{Accuracy, SamplingRate, SessionOptions, SupersedePolicy};
use crate::simulator::SimulatorSettings;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub sensor: SensorSection,
    pub simulator: SimulatorSection,
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Sensor session section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    /// Window for a start attempt to produce a reading.
    pub start_timeout_ms: u64,
    pub sampling_rate: SamplingRate,
    pub supersede: SupersedePolicy,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            start_timeout_ms: 2000,
            sampling_rate: SamplingRate::Ui,
            supersede: SupersedePolicy::Replace,
        }
    }
}

/// Simulated sensor section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSection {
    pub present: bool,
    pub reject_subscribe: bool,
    pub base_celsius: f32,
    pub amplitude: f32,
    pub period_secs: u64,
    pub warmup_ms: u64,
    /// Accuracy name (unreliable, low, medium, high) or raw level.
    pub initial_accuracy: String,
}

impl Default for SimulatorSection {
    fn default() -> Self {
        let defaults = SimulatorSettings::default();
        Self {
            present: defaults.present,
            reject_subscribe: defaults.reject_subscribe,
            base_celsius: defaults.base_celsius,
            amplitude: defaults.amplitude,
            period_secs: defaults.period.as_secs(),
            warmup_ms: defaults.warmup.as_millis() as u64,
            initial_accuracy: defaults.initial_accuracy.to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("THERMOMETER_BRIDGE_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("THERMOMETER_BRIDGE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(ms) = std::env::var("THERMOMETER_BRIDGE_START_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.sensor.start_timeout_ms = ms;
            }
        }

        if let Ok(level) = std::env::var("THERMOMETER_BRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ms) = args.timeout_ms {
            self.sensor.start_timeout_ms = ms;
        }

        if let Some(rate) = args.rate {
            self.sensor.sampling_rate = rate;
        }

        if args.fail_superseded {
            self.sensor.supersede = SupersedePolicy::FailPrevious;
        }

        if args.no_sensor {
            self.simulator.present = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to ServerConfig for the bridge server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        Ok(ServerConfig::new(host.to_string(), self.server.port))
    }

    /// Session tunables from the sensor section.
    pub fn session_options(&self) -> Result<SessionOptions, ConfigError> {
        if self.sensor.start_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(0));
        }
        Ok(SessionOptions::default()
            .start_timeout(Duration::from_millis(self.sensor.start_timeout_ms))
            .sampling_rate(self.sensor.sampling_rate)
            .supersede(self.sensor.supersede))
    }

    /// Simulator behaviour from the simulator section.
    pub fn simulator_settings(&self) -> Result<SimulatorSettings, ConfigError> {
        let sim = &self.simulator;
        let initial_accuracy: Accuracy = sim
            .initial_accuracy
            .parse()
            .map_err(|_| ConfigError::InvalidAccuracy(sim.initial_accuracy.clone()))?;

        Ok(SimulatorSettings {
            present: sim.present,
            reject_subscribe: sim.reject_subscribe,
            base_celsius: sim.base_celsius,
            amplitude: sim.amplitude,
            period: Duration::from_secs(sim.period_secs),
            warmup: Duration::from_millis(sim.warmup_ms),
            initial_accuracy,
            ..SimulatorSettings::default()
        })
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Start timeout must be positive.
    InvalidTimeout(u64),
    /// Unknown accuracy level.
    InvalidAccuracy(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidTimeout(ms) => write!(f, "invalid start timeout: {}ms", ms),
            Self::InvalidAccuracy(level) => write!(f, "invalid accuracy level: {}", level),
        }
    }
}

impl std::error::Error for ConfigError {}
