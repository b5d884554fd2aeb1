//! Result channels back to waiting callers.

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{CallbackId, PluginResult};

/// Channel through which a single caller receives plugin results.
///
/// Implementations must not block; the session calls `send` from its
/// serialized event loop.
pub trait CallbackContext: Send + Sync {
    /// Identity of the caller, used to tell a repeated start from the same
    /// caller apart from a different one.
    fn id(&self) -> CallbackId;

    /// Deliver one result. A caller that has gone away is not an error.
    fn send(&self, result: PluginResult);

    /// Whether the caller has gone away for good.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Callback context backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelCallback {
    id: CallbackId,
    tx: mpsc::UnboundedSender<PluginResult>,
}

impl ChannelCallback {
    /// Create a callback and the receiver its results arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PluginResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: CallbackId::new(),
                tx,
            },
            rx,
        )
    }
}

impl CallbackContext for ChannelCallback {
    fn id(&self) -> CallbackId {
        self.id
    }

    fn send(&self, result: PluginResult) {
        trace!(callback = %self.id, status = ?result.status, "sending result");
        if self.tx.send(result).is_err() {
            debug!(callback = %self.id, "caller dropped, result discarded");
        }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
