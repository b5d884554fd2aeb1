//! Software ambient temperature sensor.
//!
//! Used on hosts without a hardware thermometer, and for demos. Readings
//! follow a slow sine drift around a base temperature so the web view sees
//! values change without any randomness.

use std::f32::consts::TAU;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::BridgeError;
use crate::runtime::SensorEventSink;
use crate::sensor::{Accuracy, SamplingRate, SensorInfo, SensorKind, SensorService};
use crate::Result;

/// Shortest interval the simulator will emit at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Behaviour of the simulated sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorSettings {
    /// Whether the registry reports a sensor at all.
    pub present: bool,
    /// Whether subscriptions are refused.
    pub reject_subscribe: bool,
    pub name: String,
    pub vendor: String,
    /// Centre of the drift, in degrees Celsius.
    pub base_celsius: f32,
    /// Peak deviation from the base.
    pub amplitude: f32,
    /// Length of one full drift cycle.
    pub period: Duration,
    /// Delay after subscribing before the first event.
    pub warmup: Duration,
    /// Accuracy announced right after warm-up.
    pub initial_accuracy: Accuracy,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            present: true,
            reject_subscribe: false,
            name: "Simulated ambient thermometer".to_string(),
            vendor: "thermometer-bridge".to_string(),
            base_celsius: 21.5,
            amplitude: 0.5,
            period: Duration::from_secs(60),
            warmup: Duration::from_millis(250),
            initial_accuracy: Accuracy::HIGH,
        }
    }
}

impl SimulatorSettings {
    /// A device without an ambient temperature sensor.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Default::default()
        }
    }

    /// Temperature at `elapsed` since subscription.
    pub fn value_at(&self, elapsed: Duration) -> f32 {
        let period = self.period.as_secs_f32();
        if period <= 0.0 {
            return self.base_celsius;
        }
        let phase = TAU * (elapsed.as_secs_f32() / period);
        self.base_celsius + self.amplitude * phase.sin()
    }

    fn info(&self) -> SensorInfo {
        SensorInfo::new(SensorKind::AmbientTemperature, &self.name, &self.vendor)
    }
}

/// [`SensorService`] that emits simulated ambient temperature events.
pub struct SimulatedSensorService {
    settings: SimulatorSettings,
    sink: SensorEventSink,
    task: Option<JoinHandle<()>>,
}

impl SimulatedSensorService {
    pub fn new(settings: SimulatorSettings, sink: SensorEventSink) -> Self {
        Self {
            settings,
            sink,
            task: None,
        }
    }

    pub fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    /// Whether an emitter task is currently running.
    pub fn is_emitting(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl SensorService for SimulatedSensorService {
    fn list_sensors(&self, kind: SensorKind) -> Vec<SensorInfo> {
        if self.settings.present && kind == SensorKind::AmbientTemperature {
            vec![self.settings.info()]
        } else {
            Vec::new()
        }
    }

    fn subscribe(&mut self, sensor: &SensorInfo, rate: SamplingRate) -> Result<()> {
        if !self.settings.present || sensor.kind != SensorKind::AmbientTemperature {
            return Err(BridgeError::SensorUnavailable(sensor.name.clone()));
        }
        if self.settings.reject_subscribe {
            return Err(BridgeError::SubscribeFailed(sensor.name.clone()));
        }
        self.unsubscribe();

        let settings = self.settings.clone();
        let sink = self.sink.clone();
        let interval = rate.interval().max(MIN_INTERVAL);
        info!(sensor = %sensor.name, interval_ms = interval.as_millis() as u64, "simulated sensor subscribed");

        self.task = Some(tokio::spawn(async move {
            let subscribed_at = Instant::now();
            tokio::time::sleep(settings.warmup).await;

            if !sink.accuracy_changed(SensorKind::AmbientTemperature, settings.initial_accuracy) {
                return;
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let elapsed = subscribed_at.elapsed();
                let value = settings.value_at(elapsed);
                if !sink.reading_changed(
                    SensorKind::AmbientTemperature,
                    value,
                    elapsed.as_nanos() as u64,
                ) {
                    debug!("plugin loop gone, simulated sensor exiting");
                    break;
                }
            }
        }));
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("simulated sensor unsubscribed");
        }
    }
}

impl Drop for SimulatedSensorService {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
