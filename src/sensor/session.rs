//! Ambient temperature session state machine.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::{
    Accuracy, Clock, SamplingRate, SensorKind, SensorListener, SensorService, SensorStatus,
    SessionEpoch, SystemClock, TimerHandle, TimerService,
};
use crate::callback::{
    CallbackContext, CallbackId, FailureInfo, PluginResult, Temperature, NO_SENSORS_MESSAGE,
    START_TIMEOUT_MESSAGE, SUPERSEDED_MESSAGE,
};

/// Default window in which a start attempt must produce a reading.
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_millis(2000);

/// What happens to a waiting caller when another start request replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersedePolicy {
    /// Overwrite the previous caller silently. It may never hear back.
    #[default]
    Replace,
    /// Send the previous caller a final failure before replacing it.
    FailPrevious,
}

impl FromStr for SupersedePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(SupersedePolicy::Replace),
            "fail_previous" | "fail-previous" => Ok(SupersedePolicy::FailPrevious),
            _ => Err(format!("unknown supersede policy: {}", s)),
        }
    }
}

/// Tunables for a [`SensorSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub start_timeout: Duration,
    pub sampling_rate: SamplingRate,
    pub supersede: SupersedePolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            start_timeout: DEFAULT_START_TIMEOUT,
            sampling_rate: SamplingRate::Ui,
            supersede: SupersedePolicy::Replace,
        }
    }
}

impl SessionOptions {
    pub fn start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn sampling_rate(mut self, rate: SamplingRate) -> Self {
        self.sampling_rate = rate;
        self
    }

    pub fn supersede(mut self, policy: SupersedePolicy) -> Self {
        self.supersede = policy;
        self
    }
}

/// Most recent reading that passed the accuracy gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub value: f32,
    pub timestamp_millis: i64,
}

/// Owns the subscription to the ambient temperature sensor and reports
/// readings to the single waiting caller.
///
/// All methods must be called from one serialized thread or task; the
/// session holds no locks.
pub struct SensorSession<S, T, C = SystemClock> {
    service: S,
    timer: T,
    clock: C,
    options: SessionOptions,
    status: SensorStatus,
    accuracy: Accuracy,
    last_reading: Option<Reading>,
    pending: Option<Arc<dyn CallbackContext>>,
    timeout: Option<TimerHandle>,
    epoch: SessionEpoch,
    subscribed: bool,
}

impl<S, T> SensorSession<S, T, SystemClock>
where
    S: SensorService,
    T: TimerService,
{
    /// Create a stopped session using the system clock.
    pub fn new(service: S, timer: T, options: SessionOptions) -> Self {
        Self::with_clock(service, timer, SystemClock, options)
    }
}

impl<S, T, C> SensorSession<S, T, C>
where
    S: SensorService,
    T: TimerService,
    C: Clock,
{
    /// Create a stopped session with a custom clock.
    pub fn with_clock(service: S, timer: T, clock: C, options: SessionOptions) -> Self {
        Self {
            service,
            timer,
            clock,
            options,
            status: SensorStatus::Stopped,
            accuracy: Accuracy::UNRELIABLE,
            last_reading: None,
            pending: None,
            timeout: None,
            epoch: SessionEpoch::default(),
            subscribed: false,
        }
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }

    pub fn accuracy(&self) -> Accuracy {
        self.accuracy
    }

    pub fn last_reading(&self) -> Option<Reading> {
        self.last_reading
    }

    pub fn epoch(&self) -> SessionEpoch {
        self.epoch
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Whether a platform subscription is currently held.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Whether a start timeout is currently scheduled.
    pub fn has_timeout(&self) -> bool {
        self.timeout.is_some()
    }

    pub fn pending_callback(&self) -> Option<CallbackId> {
        self.pending.as_ref().map(|cb| cb.id())
    }

    #[cfg(test)]
    pub(crate) fn service(&self) -> &S {
        &self.service
    }

    #[cfg(test)]
    pub(crate) fn timer(&self) -> &T {
        &self.timer
    }

    /// Handle a start request from `caller`.
    ///
    /// The caller always becomes the pending caller. If a subscription is
    /// already starting or running nothing else happens; the caller hears
    /// back when the next reading or timeout arrives.
    pub fn start(&mut self, caller: Arc<dyn CallbackContext>) {
        self.replace_pending(caller);

        if !self.status.needs_start() {
            debug!(status = %self.status, "start requested while active, reusing subscription");
            return;
        }

        self.stop_timeout();
        if self.subscribed {
            // A timed-out attempt can leave its subscription behind.
            self.service.unsubscribe();
            self.subscribed = false;
        }

        self.epoch = self.epoch.next();
        self.status = SensorStatus::Starting;
        debug!(epoch = %self.epoch, "starting thermometer");

        let Some(sensor) = self
            .service
            .list_sensors(SensorKind::AmbientTemperature)
            .into_iter()
            .next()
        else {
            warn!("no ambient temperature sensor present");
            self.status = SensorStatus::FailedToStart;
            self.fail(NO_SENSORS_MESSAGE);
            return;
        };

        if let Err(e) = self.service.subscribe(&sensor, self.options.sampling_rate) {
            warn!(sensor = %sensor.name, error = %e, "sensor subscription rejected");
            self.status = SensorStatus::FailedToStart;
            self.fail(START_TIMEOUT_MESSAGE);
            return;
        }
        self.subscribed = true;

        self.timeout = Some(
            self.timer
                .schedule_after(self.options.start_timeout, self.epoch),
        );
        info!(
            sensor = %sensor.name,
            rate = ?self.options.sampling_rate,
            timeout_ms = self.options.start_timeout.as_millis() as u64,
            "thermometer subscription requested"
        );
    }

    /// Stop listening. Safe to call in any state; nothing is sent to the
    /// pending caller.
    pub fn stop(&mut self) {
        self.stop_timeout();
        if self.subscribed {
            self.service.unsubscribe();
            self.subscribed = false;
        }
        if self.status != SensorStatus::Stopped {
            self.epoch = self.epoch.next();
            info!(from = %self.status, "thermometer stopped");
        }
        self.status = SensorStatus::Stopped;
        self.accuracy = Accuracy::UNRELIABLE;
        self.last_reading = None;
    }

    /// Handle a fired start timeout scheduled for `epoch`.
    pub fn on_timeout(&mut self, epoch: SessionEpoch) {
        if epoch != self.epoch {
            debug!(fired = %epoch, current = %self.epoch, "ignoring stale timeout");
            return;
        }
        self.timeout = None;

        if self.status != SensorStatus::Starting {
            trace!(status = %self.status, "timeout after start resolved");
            return;
        }

        warn!(epoch = %epoch, "thermometer produced no reading before timeout");
        self.status = SensorStatus::FailedToStart;
        self.fail(START_TIMEOUT_MESSAGE);
    }

    /// The embedding view navigated away or was reset.
    pub fn on_host_reset(&mut self) {
        if self.status == SensorStatus::Running {
            self.stop();
        }
    }

    /// The host is shutting the plugin down.
    pub fn on_host_destroy(&mut self) {
        self.stop();
    }

    fn stop_timeout(&mut self) {
        if let Some(handle) = self.timeout.take() {
            self.timer.cancel(handle);
        }
    }

    fn replace_pending(&mut self, caller: Arc<dyn CallbackContext>) {
        // A caller whose attempt already failed has had its terminal result.
        if self.options.supersede == SupersedePolicy::FailPrevious
            && self.status != SensorStatus::FailedToStart
        {
            if let Some(previous) = self.pending.as_ref() {
                if previous.id() != caller.id() {
                    debug!(previous = %previous.id(), next = %caller.id(), "failing superseded caller");
                    previous.send(
                        PluginResult::failure(FailureInfo::failed_to_start(SUPERSEDED_MESSAGE))
                            .with_keep_callback(false),
                    );
                }
            }
        }
        self.pending = Some(caller);
    }

    fn deliver(&self, result: PluginResult) {
        match &self.pending {
            Some(cb) => cb.send(result),
            None => debug!("no pending caller, result dropped"),
        }
    }

    fn fail(&self, message: &str) {
        self.deliver(PluginResult::failure(FailureInfo::failed_to_start(message)));
    }
}

impl<S, T, C> SensorListener for SensorSession<S, T, C>
where
    S: SensorService,
    T: TimerService,
    C: Clock,
{
    fn on_accuracy_changed(&mut self, kind: SensorKind, accuracy: Accuracy) {
        if kind != SensorKind::AmbientTemperature || !self.status.accepts_events() {
            return;
        }
        debug!(from = %self.accuracy, to = %accuracy, "accuracy changed");
        self.accuracy = accuracy;
    }

    fn on_reading_changed(&mut self, kind: SensorKind, value: f32, platform_timestamp: u64) {
        if kind != SensorKind::AmbientTemperature || !self.status.accepts_events() {
            return;
        }

        if self.status != SensorStatus::Running {
            debug!(from = %self.status, "thermometer running");
        }
        self.status = SensorStatus::Running;
        self.stop_timeout();

        if !self.accuracy.is_reportable() {
            trace!(value, accuracy = %self.accuracy, "reading below accuracy gate");
            return;
        }

        let timestamp = self.clock.now_millis();
        trace!(value, timestamp, platform_timestamp, "reading accepted");
        self.last_reading = Some(Reading {
            value,
            timestamp_millis: timestamp,
        });
        self.deliver(PluginResult::success(Temperature {
            val: value,
            timestamp,
        }));
    }
}
