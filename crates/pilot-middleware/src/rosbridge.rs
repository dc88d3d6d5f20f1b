//! rosbridge-compatible WebSocket fan-out.
//!
//! [`RosbridgeServer`] exposes the internal [`EventBus`] to the outside world
//! using the subset of the rosbridge v2 protocol that topic consumers need:
//!
//! * a client sends `{"op":"subscribe","topic":"/franka_buttons/x"}` to start
//!   receiving a topic and `{"op":"unsubscribe", ...}` to stop;
//! * every bus event on a subscribed topic is pushed as
//!   `{"op":"publish","topic":"/franka_buttons/x","msg":{"data":1.0}}`.
//!
//! Any other client frame is ignored.  Topic names are matched with or without
//! the leading slash.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use pilot_types::{Event, PilotError};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, warn};

use crate::bus::EventBus;

/// Serves bus traffic to rosbridge WebSocket clients.
#[derive(Clone)]
pub struct RosbridgeServer {
    bus: Arc<EventBus>,
}

impl RosbridgeServer {
    /// Create a new server backed by `bus`.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Accept clients from `listener` until the task is dropped.
    ///
    /// Binding is left to the caller so a bind failure surfaces before any
    /// client could connect.
    pub async fn serve(self, listener: TcpListener) -> Result<(), PilotError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "rosbridge client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "rosbridge accept error");
                }
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), PilotError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| PilotError::Transport(format!("ws handshake from {peer}: {e}")))?;
        debug!(peer = %peer, "rosbridge client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let mut rx = self.bus.subscribe();
        let mut subscriptions = HashSet::new();

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if !subscriptions.contains(event.topic.trim_start_matches('/')) {
                                continue;
                            }
                            let frame = publish_frame(&event);
                            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(peer = %peer, lagged_by = n, "rosbridge client lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        Some(Ok(Message::Text(text))) => {
                            apply_client_op(text.as_str(), &mut subscriptions);
                        }
                        _ => {}
                    }
                }
            }
        }

        debug!(peer = %peer, "rosbridge client disconnected");
        Ok(())
    }
}

/// Render `event` as a rosbridge `publish` frame.
pub fn publish_frame(event: &Event) -> String {
    json!({
        "op": "publish",
        "topic": format!("/{}", event.topic.trim_start_matches('/')),
        "type": event.payload.ros_type(),
        "msg": { "data": event.payload.data() }
    })
    .to_string()
}

/// Update a client's subscription set from one incoming frame.
///
/// Returns `true` when the frame was a recognised `subscribe` or
/// `unsubscribe` operation.
fn apply_client_op(text: &str, subscriptions: &mut HashSet<String>) -> bool {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(text) else {
        return false;
    };
    let op = json.get("op").and_then(|o| o.as_str()).unwrap_or("");
    let Some(topic) = json.get("topic").and_then(|t| t.as_str()) else {
        return false;
    };
    let topic = topic.trim_start_matches('/').to_string();

    match op {
        "subscribe" => {
            subscriptions.insert(topic);
            true
        }
        "unsubscribe" => {
            subscriptions.remove(&topic);
            true
        }
        _ => false,
    }
}
