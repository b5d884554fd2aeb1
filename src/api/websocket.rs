//! WebSocket exec channel.
//!
//! Each connection owns one callback and registers it with the listener
//! hub. `exec start` attaches it as a stream, `watch` and `get_current`
//! add a watch or a one-shot listener, and every result delivered to it is
//! forwarded as a `result` message. Closing the socket detaches everything
//! it registered, which stops the sensor if no other listener remains.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tracing::{debug, warn};

use super::handlers::AppState;
use super::types::WsMessage;
use crate::callback::{CallbackContext, ChannelCallback};
use crate::error::BridgeError;
use crate::listeners::{ListenerId, ListenerMode, DEFAULT_WATCH_FREQUENCY};
use crate::plugin::Action;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and send one message. Returns `false` if the socket is gone.
async fn send_message(sink: &mut SplitSink<WebSocket, Message>, msg: &WsMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "dropping unserializable message");
            true
        }
    }
}

/// Listeners registered by one socket.
struct SocketListeners {
    callback: Arc<dyn CallbackContext>,
    stream: Option<ListenerId>,
    owned: Vec<ListenerId>,
}

impl SocketListeners {
    async fn exec(&mut self, state: &AppState, action: &str) -> Result<(), BridgeError> {
        match action.parse::<Action>()? {
            Action::Start => {
                // A failure may already have detached the previous stream.
                let id = state.listeners.attach(Arc::clone(&self.callback)).await?;
                if let Some(previous) = self.stream.replace(id) {
                    state.listeners.detach([previous]).await?;
                }
            }
            Action::Stop => {
                if let Some(id) = self.stream.take() {
                    state.listeners.detach([id]).await?;
                }
            }
        }
        Ok(())
    }

    async fn handle(&mut self, state: &AppState, msg: WsMessage) -> Option<WsMessage> {
        let reply = match msg {
            WsMessage::Exec { action } => self.exec(state, &action).await.map(|_| None),
            WsMessage::GetCurrent => state
                .listeners
                .register(Arc::clone(&self.callback), ListenerMode::Once)
                .await
                .map(|id| {
                    self.owned.push(id);
                    None
                }),
            WsMessage::Watch { frequency_ms } => {
                let frequency = frequency_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_WATCH_FREQUENCY);
                state
                    .listeners
                    .watch(Arc::clone(&self.callback), frequency)
                    .await
                    .map(|id| {
                        self.owned.push(id);
                        Some(WsMessage::Watching { id })
                    })
            }
            WsMessage::ClearWatch { id } => {
                self.owned.retain(|owned| *owned != id);
                state
                    .listeners
                    .clear_watch(id)
                    .await
                    .map(|removed| Some(WsMessage::Cleared { id, removed }))
            }
            WsMessage::Ping => Ok(Some(WsMessage::Pong)),
            _ => Ok(None),
        };

        match reply {
            Ok(reply) => reply,
            Err(BridgeError::UnsupportedAction(action)) => Some(WsMessage::error(
                "UNSUPPORTED_ACTION",
                format!("Action '{}' is not supported", action),
            )),
            Err(e) => Some(WsMessage::error("EXEC_ERROR", e.to_string())),
        }
    }

    async fn close(self, state: &AppState) {
        let ids = self.stream.into_iter().chain(self.owned);
        if let Err(e) = state.listeners.detach(ids).await {
            debug!(error = %e, "listener hub gone before socket cleanup");
        }
    }
}

/// Handle WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (callback, mut results) = ChannelCallback::new();
    let mut listeners = SocketListeners {
        callback: Arc::new(callback),
        stream: None,
        owned: Vec::new(),
    };
    debug!(callback = %listeners.callback.id(), "thermometer socket opened");

    loop {
        tokio::select! {
            Some(result) = results.recv() => {
                let msg = match WsMessage::from_result(&result) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "dropping unserializable plugin result");
                        continue;
                    }
                };
                if !send_message(&mut sink, &msg).await {
                    break;
                }
            }
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(_)) => continue,
                };

                let reply = match serde_json::from_str::<WsMessage>(&text) {
                    Ok(msg) => listeners.handle(&state, msg).await,
                    Err(e) => Some(WsMessage::error("PARSE_ERROR", e.to_string())),
                };

                if let Some(reply) = reply {
                    if !send_message(&mut sink, &reply).await {
                        break;
                    }
                }
            }
        }
    }

    debug!(callback = %listeners.callback.id(), "thermometer socket closed");
    listeners.close(&state).await;
}
