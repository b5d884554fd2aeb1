//! Serialized event loop for the thermometer plugin.
//!
//! One tokio task owns the [`ThermometerPlugin`] and applies every input in
//! arrival order: host actions, sensor callbacks and fired timeouts. This
//! gives the session its single-threaded callback model without locks.
//!
//! Timers and sensor sinks hold weak senders, so the loop ends (and forces
//! a stop) once every [`SessionHandle`] is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, trace};

use crate::callback::CallbackContext;
use crate::error::BridgeError;
use crate::plugin::{Action, PluginSnapshot, ThermometerPlugin};
use crate::sensor::{
    Accuracy, Clock, SensorKind, SensorListener, SensorService, SensorSession, SessionEpoch,
    SessionOptions, SystemClock, TimerHandle, TimerService,
};
use crate::Result;

/// Input processed by the plugin loop.
pub enum SessionEvent {
    Exec {
        action: String,
        callback: Arc<dyn CallbackContext>,
        reply: oneshot::Sender<Result<Action>>,
    },
    Accuracy {
        kind: SensorKind,
        accuracy: Accuracy,
    },
    Reading {
        kind: SensorKind,
        value: f32,
        platform_timestamp: u64,
    },
    Timeout {
        epoch: SessionEpoch,
    },
    Reset,
    Snapshot {
        reply: oneshot::Sender<PluginSnapshot>,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },
}

/// Delivers sensor callbacks into the plugin loop.
///
/// Sensor services are built with one of these and call it from whatever
/// thread or task the platform uses.
#[derive(Clone)]
pub struct SensorEventSink {
    tx: mpsc::WeakUnboundedSender<SessionEvent>,
}

impl SensorEventSink {
    fn post(&self, event: SessionEvent) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Report an accuracy change. Returns `false` once the loop is gone.
    pub fn accuracy_changed(&self, kind: SensorKind, accuracy: Accuracy) -> bool {
        self.post(SessionEvent::Accuracy { kind, accuracy })
    }

    /// Report a reading. Returns `false` once the loop is gone.
    pub fn reading_changed(&self, kind: SensorKind, value: f32, platform_timestamp: u64) -> bool {
        self.post(SessionEvent::Reading {
            kind,
            value,
            platform_timestamp,
        })
    }

    /// Check whether the plugin loop still accepts events.
    pub fn is_closed(&self) -> bool {
        self.tx.upgrade().map_or(true, |tx| tx.is_closed())
    }
}

impl SensorListener for SensorEventSink {
    fn on_accuracy_changed(&mut self, kind: SensorKind, accuracy: Accuracy) {
        self.accuracy_changed(kind, accuracy);
    }

    fn on_reading_changed(&mut self, kind: SensorKind, value: f32, platform_timestamp: u64) {
        self.reading_changed(kind, value, platform_timestamp);
    }
}

/// [`TimerService`] backed by tokio sleeps that post timeouts into the loop.
pub struct TokioTimer {
    tx: mpsc::WeakUnboundedSender<SessionEvent>,
    next_id: u64,
    tasks: HashMap<u64, AbortHandle>,
}

impl TokioTimer {
    fn new(tx: mpsc::WeakUnboundedSender<SessionEvent>) -> Self {
        Self {
            tx,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }

    /// Number of timeouts scheduled and not yet finished or cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|t| !t.is_finished()).count()
    }
}

impl TimerService for TokioTimer {
    fn schedule_after(&mut self, delay: Duration, epoch: SessionEpoch) -> TimerHandle {
        self.tasks.retain(|_, task| !task.is_finished());

        self.next_id += 1;
        let id = self.next_id;
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                trace!(%epoch, "start timeout fired");
                let _ = tx.send(SessionEvent::Timeout { epoch });
            }
        });
        self.tasks.insert(id, task.abort_handle());
        TimerHandle::from_raw(id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle.as_u64()) {
            task.abort();
        }
    }
}

/// Clone-able handle for talking to a running plugin loop.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    fn send(&self, event: SessionEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| BridgeError::ChannelClosed)
    }

    /// Dispatch a host action for `callback` and wait until the loop has
    /// applied it.
    pub async fn execute(
        &self,
        action: impl Into<String>,
        callback: Arc<dyn CallbackContext>,
    ) -> Result<Action> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Exec {
            action: action.into(),
            callback,
            reply,
        })?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)?
    }

    /// Fetch the current session state.
    pub async fn snapshot(&self) -> Result<PluginSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Snapshot { reply })?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    /// Signal that the embedding view was reset or navigated.
    pub fn reset(&self) -> Result<()> {
        self.send(SessionEvent::Reset)
    }

    /// Stop the session and end the loop. Waits until the stop is applied.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Destroy { reply })?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    /// A sink for delivering sensor callbacks from outside the loop.
    pub fn sensor_sink(&self) -> SensorEventSink {
        SensorEventSink {
            tx: self.tx.downgrade(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn a plugin loop using the system clock.
///
/// `make_service` receives the sink the service must deliver its callbacks
/// to. Must be called within a tokio runtime.
pub fn spawn<S, F>(make_service: F, options: SessionOptions) -> (SessionHandle, JoinHandle<()>)
where
    S: SensorService + 'static,
    F: FnOnce(SensorEventSink) -> S,
{
    spawn_with_clock(make_service, SystemClock, options)
}

/// Spawn a plugin loop with a custom clock.
pub fn spawn_with_clock<S, C, F>(
    make_service: F,
    clock: C,
    options: SessionOptions,
) -> (SessionHandle, JoinHandle<()>)
where
    S: SensorService + 'static,
    C: Clock + 'static,
    F: FnOnce(SensorEventSink) -> S,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle { tx };

    let service = make_service(handle.sensor_sink());
    let timer = TokioTimer::new(handle.tx.downgrade());
    let session = SensorSession::with_clock(service, timer, clock, options);
    let task = tokio::spawn(run(ThermometerPlugin::new(session), rx));

    (handle, task)
}

async fn run<S, T, C>(
    mut plugin: ThermometerPlugin<S, T, C>,
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
) where
    S: SensorService,
    T: TimerService,
    C: Clock,
{
    debug!("thermometer plugin loop started");

    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Exec {
                action,
                callback,
                reply,
            } => {
                let _ = reply.send(plugin.execute(&action, callback));
            }
            SessionEvent::Accuracy { kind, accuracy } => {
                plugin.on_accuracy_changed(kind, accuracy);
            }
            SessionEvent::Reading {
                kind,
                value,
                platform_timestamp,
            } => {
                plugin.on_reading_changed(kind, value, platform_timestamp);
            }
            SessionEvent::Timeout { epoch } => {
                plugin.session_mut().on_timeout(epoch);
            }
            SessionEvent::Reset => plugin.on_reset(),
            SessionEvent::Snapshot { reply } => {
                let _ = reply.send(plugin.snapshot());
            }
            SessionEvent::Destroy { reply } => {
                plugin.on_destroy();
                info!("thermometer plugin destroyed");
                let _ = reply.send(());
                return;
            }
        }
    }

    debug!("all session handles dropped");
    plugin.on_destroy();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{ChannelCallback, PluginResult, ResultStatus};
    use crate::sensor::{SamplingRate, SensorInfo, SensorStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::{sleep, Instant};

    /// A sensor that never emits on its own; tests push events through the
    /// sink instead.
    struct QuietSensor {
        present: bool,
        subscribes: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
    }

    impl SensorService for QuietSensor {
        fn list_sensors(&self, kind: SensorKind) -> Vec<SensorInfo> {
            if self.present {
                vec![SensorInfo::new(kind, "quiet", "test")]
            } else {
                Vec::new()
            }
        }

        fn subscribe(&mut self, _: &SensorInfo, _: SamplingRate) -> Result<()> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            self.active.store(1, Ordering::SeqCst);
            Ok(())
        }

        fn unsubscribe(&mut self) {
            self.active.store(0, Ordering::SeqCst);
        }
    }

    struct Harness {
        handle: SessionHandle,
        task: JoinHandle<()>,
        subscribes: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
    }

    fn harness(present: bool) -> Harness {
        let subscribes = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let (s, a) = (Arc::clone(&subscribes), Arc::clone(&active));
        let (handle, task) = spawn(
            move |_sink| QuietSensor {
                present,
                subscribes: s,
                active: a,
            },
            SessionOptions::default(),
        );
        Harness {
            handle,
            task,
            subscribes,
            active,
        }
    }

    async fn start(h: &Harness) -> UnboundedReceiver<PluginResult> {
        let (cb, mut rx) = ChannelCallback::new();
        h.handle.execute("start", Arc::new(cb)).await.unwrap();
        let ack = rx.recv().await.unwrap();
        assert_eq!(ack.status, ResultStatus::NoResult);
        rx
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_once_after_two_seconds() {
        let h = harness(true);
        let started = Instant::now();
        let mut rx = start(&h).await;

        let failure = rx.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert_eq!(
            failure.failure_info().unwrap().message,
            "Thermometer could not be started."
        );
        assert_eq!(
            h.handle.snapshot().await.unwrap().status,
            SensorStatus::FailedToStart
        );

        sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reading_at_500ms_wins_over_timeout() {
        let h = harness(true);
        let sink = h.handle.sensor_sink();
        let mut rx = start(&h).await;

        sink.accuracy_changed(SensorKind::AmbientTemperature, Accuracy::HIGH);
        sleep(Duration::from_millis(500)).await;
        assert!(sink.reading_changed(SensorKind::AmbientTemperature, 22.5, 500_000_000));

        let result = rx.recv().await.unwrap();
        assert!(result.is_ok());
        assert_eq!(result.temperature().unwrap().val, 22.5);
        assert_eq!(
            h.handle.snapshot().await.unwrap().status,
            SensorStatus::Running
        );

        sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(
            h.handle.snapshot().await.unwrap().status,
            SensorStatus::Running
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_sensor_fails_immediately() {
        let h = harness(false);
        let (cb, mut rx) = ChannelCallback::new();
        h.handle.execute("start", Arc::new(cb)).await.unwrap();

        let failure = rx.recv().await.unwrap();
        assert_eq!(failure.failure_info().unwrap().message, "No sensors found");
        assert_eq!(rx.recv().await.unwrap().status, ResultStatus::NoResult);
        assert_eq!(h.subscribes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_timeout() {
        let h = harness(true);
        let mut rx = start(&h).await;

        let (stopper, _srx) = ChannelCallback::new();
        h.handle.execute("stop", Arc::new(stopper)).await.unwrap();
        assert_eq!(h.active.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(
            h.handle.snapshot().await.unwrap().status,
            SensorStatus::Stopped
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_runs_full_cycle() {
        let h = harness(true);
        let _first = start(&h).await;
        let (stopper, _srx) = ChannelCallback::new();
        h.handle.execute("stop", Arc::new(stopper)).await.unwrap();

        sleep(Duration::from_millis(1500)).await;
        let mut rx = start(&h).await;
        let restarted = Instant::now();

        let failure = rx.recv().await.unwrap();
        assert!(failure.is_error());
        assert!(restarted.elapsed() >= Duration::from_millis(2000));
        assert_eq!(h.subscribes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_action_is_rejected() {
        let h = harness(true);
        let (cb, mut rx) = ChannelCallback::new();
        let err = h.handle.execute("pause", Arc::new(cb)).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedAction(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_running_session() {
        let h = harness(true);
        let sink = h.handle.sensor_sink();
        let _rx = start(&h).await;
        sink.reading_changed(SensorKind::AmbientTemperature, 20.0, 0);
        h.handle.reset().unwrap();

        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, SensorStatus::Stopped);
        assert_eq!(h.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_loop() {
        let h = harness(true);
        let _rx = start(&h).await;
        h.handle.shutdown().await.unwrap();
        tokio_test::assert_ok!(h.task.await);

        assert_eq!(h.active.load(Ordering::SeqCst), 0);
        assert!(h.handle.is_closed());
        assert!(h.handle.snapshot().await.is_err());
        assert!(h.handle.sensor_sink().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handles_destroys_plugin() {
        let h = harness(true);
        let _rx = start(&h).await;
        let Harness {
            handle,
            task,
            active,
            ..
        } = h;
        drop(handle);
        tokio_test::assert_ok!(task.await);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioTimer::new(tx.downgrade());

        let cancelled = timer.schedule_after(Duration::from_millis(100), SessionEpoch::from_raw(1));
        timer.schedule_after(Duration::from_millis(200), SessionEpoch::from_raw(2));
        timer.cancel(cancelled);
        timer.cancel(cancelled);

        sleep(Duration::from_millis(300)).await;
        match rx.try_recv() {
            Ok(SessionEvent::Timeout { epoch }) => assert_eq!(epoch.as_u64(), 2),
            _ => panic!("expected a single timeout event"),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(timer.pending(), 0);
    }
}
