//! Listener registry between bridge clients and the plugin.
//!
//! The plugin keeps a single pending caller. The hub is that caller: it
//! starts the sensor when a listener arrives, fans every result out to the
//! registered listeners, and stops the sensor once the last one leaves.
//!
//! Listener kinds follow the web-view API:
//! - [`ListenerMode::Once`] backs `getCurrentTemperature`.
//! - [`ListenerMode::Watch`] backs `watchTemperature` / `clearWatch`.
//! - [`ListenerMode::Stream`] receives every accepted reading.
//!
//! A failure detaches every listener. A separate hold keeps the sensor
//! running without any listener until released.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::callback::{
    CallbackContext, ChannelCallback, PluginResult, ResultStatus, Temperature,
};
use crate::error::BridgeError;
use crate::runtime::SessionHandle;
use crate::Result;

/// Interval between repeated deliveries to a watch when none is requested.
pub const DEFAULT_WATCH_FREQUENCY: Duration = Duration::from_secs(10);

/// How often listeners whose receivers were dropped are swept.
const PRUNE_INTERVAL: Duration = Duration::from_secs(1);

const MIN_WATCH_FREQUENCY: Duration = Duration::from_millis(1);

/// Identifies a registered listener. Watch ids are handed back to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// How a listener receives results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerMode {
    /// The next reading or failure, then detach.
    Once,
    /// Every accepted reading until detached.
    Stream,
    /// The latest reading every `frequency`, plus once on registration if
    /// one is known.
    Watch { frequency: Duration },
}

struct Listener {
    callback: Arc<dyn CallbackContext>,
    mode: ListenerMode,
    ticker: Option<AbortHandle>,
}

enum HubCommand {
    Register {
        callback: Arc<dyn CallbackContext>,
        mode: ListenerMode,
        reply: oneshot::Sender<Result<ListenerId>>,
    },
    Detach {
        ids: Vec<ListenerId>,
        reply: oneshot::Sender<usize>,
    },
    Hold {
        reply: oneshot::Sender<Result<()>>,
    },
    Release {
        reply: oneshot::Sender<()>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    Tick(ListenerId),
}

/// Clone-able handle to the listener hub task.
#[derive(Clone)]
pub struct ListenerHub {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl ListenerHub {
    /// Spawn the hub in front of `plugin`. Must be called within a tokio
    /// runtime. The hub stops the sensor and exits once every handle is
    /// dropped.
    pub fn spawn(plugin: SessionHandle) -> (Self, JoinHandle<()>) {
        let (tx, commands) = mpsc::unbounded_channel();
        let (callback, results) = ChannelCallback::new();

        let hub = Hub {
            plugin,
            callback: Arc::new(callback),
            listeners: BTreeMap::new(),
            next_id: 0,
            held: false,
            active: false,
            latest: None,
            tx: tx.downgrade(),
        };
        let task = tokio::spawn(run(hub, commands, results));

        (Self { tx }, task)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> HubCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| BridgeError::ChannelClosed)?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    /// Register `callback` and make sure the sensor is started.
    pub async fn register(
        &self,
        callback: Arc<dyn CallbackContext>,
        mode: ListenerMode,
    ) -> Result<ListenerId> {
        self.request(|reply| HubCommand::Register {
            callback,
            mode,
            reply,
        })
        .await?
    }

    /// Receive every accepted reading on `callback`.
    pub async fn attach(&self, callback: Arc<dyn CallbackContext>) -> Result<ListenerId> {
        self.register(callback, ListenerMode::Stream).await
    }

    /// Deliver the latest reading to `callback` every `frequency`.
    pub async fn watch(
        &self,
        callback: Arc<dyn CallbackContext>,
        frequency: Duration,
    ) -> Result<ListenerId> {
        self.register(callback, ListenerMode::Watch { frequency })
            .await
    }

    /// Wait for the next reading or failure.
    pub async fn get_current(&self) -> Result<PluginResult> {
        let (callback, mut results) = ChannelCallback::new();
        self.register(Arc::new(callback), ListenerMode::Once)
            .await?;
        results.recv().await.ok_or(BridgeError::ChannelClosed)
    }

    /// Remove listeners. Unknown ids are ignored. Returns how many were
    /// removed.
    pub async fn detach(&self, ids: impl IntoIterator<Item = ListenerId>) -> Result<usize> {
        let ids: Vec<ListenerId> = ids.into_iter().collect();
        self.request(|reply| HubCommand::Detach { ids, reply }).await
    }

    /// Remove a watch. Returns `false` if it was not registered.
    pub async fn clear_watch(&self, id: ListenerId) -> Result<bool> {
        Ok(self.detach([id]).await? == 1)
    }

    /// Keep the sensor running without a listener.
    pub async fn hold(&self) -> Result<()> {
        self.request(|reply| HubCommand::Hold { reply }).await?
    }

    /// Drop the hold. The sensor stops if no listener remains.
    pub async fn release(&self) -> Result<()> {
        self.request(|reply| HubCommand::Release { reply }).await
    }

    /// Number of registered listeners, not counting a hold.
    pub async fn listener_count(&self) -> Result<usize> {
        self.request(|reply| HubCommand::Count { reply }).await
    }
}

struct Hub {
    plugin: SessionHandle,
    callback: Arc<dyn CallbackContext>,
    listeners: BTreeMap<ListenerId, Listener>,
    next_id: u64,
    held: bool,
    /// Whether the hub started the sensor and has not stopped it since.
    active: bool,
    latest: Option<Temperature>,
    tx: mpsc::WeakUnboundedSender<HubCommand>,
}

impl Hub {
    async fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register {
                callback,
                mode,
                reply,
            } => {
                let result = self.register(callback, mode).await;
                let _ = reply.send(result);
            }
            HubCommand::Detach { ids, reply } => {
                let removed = self.detach(ids).await;
                let _ = reply.send(removed);
            }
            HubCommand::Hold { reply } => {
                self.held = true;
                let result = self.ensure_started().await;
                let _ = reply.send(result);
            }
            HubCommand::Release { reply } => {
                self.held = false;
                self.stop_if_idle().await;
                let _ = reply.send(());
            }
            HubCommand::Count { reply } => {
                let _ = reply.send(self.listeners.len());
            }
            HubCommand::Tick(id) => {
                if let (Some(listener), Some(latest)) = (self.listeners.get(&id), self.latest) {
                    listener.callback.send(PluginResult::success(latest));
                }
            }
        }
    }

    async fn register(
        &mut self,
        callback: Arc<dyn CallbackContext>,
        mode: ListenerMode,
    ) -> Result<ListenerId> {
        self.next_id += 1;
        let id = ListenerId(self.next_id);

        let ticker = match mode {
            ListenerMode::Watch { frequency } => {
                if let Some(latest) = self.latest {
                    callback.send(PluginResult::success(latest));
                }
                Some(self.spawn_ticker(id, frequency))
            }
            ListenerMode::Once | ListenerMode::Stream => None,
        };
        debug!(%id, ?mode, callback = %callback.id(), "listener registered");
        self.listeners.insert(
            id,
            Listener {
                callback,
                mode,
                ticker,
            },
        );

        if let Err(e) = self.ensure_started().await {
            self.remove(id);
            return Err(e);
        }
        Ok(id)
    }

    fn spawn_ticker(&self, id: ListenerId, frequency: Duration) -> AbortHandle {
        let frequency = frequency.max(MIN_WATCH_FREQUENCY);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + frequency, frequency);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match tx.upgrade() {
                    Some(tx) if tx.send(HubCommand::Tick(id)).is_ok() => {}
                    _ => break,
                }
            }
        })
        .abort_handle()
    }

    /// Starting is idempotent in the session, so every registration asks
    /// again. This also restarts a session whose last attempt failed.
    async fn ensure_started(&mut self) -> Result<()> {
        self.plugin
            .execute("start", Arc::clone(&self.callback))
            .await?;
        self.active = true;
        Ok(())
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        match self.listeners.remove(&id) {
            Some(listener) => {
                if let Some(ticker) = listener.ticker {
                    ticker.abort();
                }
                debug!(%id, "listener detached");
                true
            }
            None => false,
        }
    }

    async fn detach(&mut self, ids: Vec<ListenerId>) -> usize {
        let removed = ids.into_iter().filter(|id| self.remove(*id)).count();
        self.stop_if_idle().await;
        removed
    }

    async fn stop_if_idle(&mut self) {
        if !self.active || self.held || !self.listeners.is_empty() {
            return;
        }
        info!("last listener detached, stopping thermometer");
        if let Err(e) = self.plugin.execute("stop", Arc::clone(&self.callback)).await {
            warn!(error = %e, "failed to stop thermometer");
        }
        self.active = false;
        self.latest = None;
    }

    async fn dispatch(&mut self, result: PluginResult) {
        let finished: Vec<ListenerId> = match result.status {
            ResultStatus::NoResult => return,
            ResultStatus::Ok => {
                let Some(&reading) = result.temperature() else {
                    return;
                };
                self.latest = Some(reading);
                let mut finished = Vec::new();
                for (id, listener) in &self.listeners {
                    match listener.mode {
                        ListenerMode::Once => {
                            listener
                                .callback
                                .send(PluginResult::success(reading).with_keep_callback(false));
                            finished.push(*id);
                        }
                        ListenerMode::Stream => {
                            listener.callback.send(PluginResult::success(reading));
                        }
                        ListenerMode::Watch { .. } => {}
                    }
                }
                finished
            }
            ResultStatus::Error => {
                let Some(info) = result.failure_info() else {
                    return;
                };
                for listener in self.listeners.values() {
                    listener.callback.send(
                        PluginResult::failure(info.clone()).with_keep_callback(false),
                    );
                }
                self.listeners.keys().copied().collect()
            }
        };

        if !finished.is_empty() {
            self.detach(finished).await;
        }
    }

    async fn prune(&mut self) {
        let closed: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, listener)| listener.callback.is_closed())
            .map(|(id, _)| *id)
            .collect();
        if !closed.is_empty() {
            debug!(count = closed.len(), "pruning closed listeners");
            self.detach(closed).await;
        }
    }
}

async fn run(
    mut hub: Hub,
    mut commands: mpsc::UnboundedReceiver<HubCommand>,
    mut results: mpsc::UnboundedReceiver<PluginResult>,
) {
    let mut prune = tokio::time::interval(PRUNE_INTERVAL);
    prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => hub.handle(command).await,
                None => break,
            },
            Some(result) = results.recv() => hub.dispatch(result).await,
            _ = prune.tick() => hub.prune().await,
        }
    }

    debug!("all listener handles dropped");
    for id in hub.listeners.keys().copied().collect::<Vec<_>>() {
        hub.remove(id);
    }
    hub.held = false;
    hub.stop_if_idle().await;
}
