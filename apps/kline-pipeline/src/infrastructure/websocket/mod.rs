//! WebSocket Subscriber Endpoints
//!
//! Axum handlers that attach downstream WebSocket clients to a
//! [`BroadcastHub`](crate::infrastructure::broadcast::BroadcastHub).
//!
//! Each connection is split: the write half becomes a [`WsSubscriber`]
//! registered with the hub, and the handler keeps reading the read half only
//! to notice when the client goes away. Client frames carry no commands.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use crate::application::ports::{SinkError, SubscriberSink};
use crate::infrastructure::broadcast::SharedBroadcastHub;

// =============================================================================
// Subscriber Sink Adapter
// =============================================================================

/// Write half of one accepted WebSocket connection.
pub struct WsSubscriber {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSubscriber {
    /// Wrap the write half of a socket.
    #[must_use]
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

#[async_trait]
impl SubscriberSink for WsSubscriber {
    async fn send_text(&self, payload: &str) -> Result<(), SinkError> {
        self.sender
            .lock()
            .await
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| SinkError::Write(e.to_string()))
    }

    async fn close(&self) {
        let _ = self.sender.lock().await.close().await;
    }
}

// =============================================================================
// Routes
// =============================================================================

/// Router exposing `hub` on `path`.
pub fn hub_router(path: &str, hub: SharedBroadcastHub) -> Router {
    Router::new()
        .route(path, get(ws_handler))
        .with_state(hub)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(hub): State<SharedBroadcastHub>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_subscriber(socket, hub))
}

async fn handle_subscriber(socket: WebSocket, hub: SharedBroadcastHub) {
    let (sender, mut receiver) = socket.split();
    let id = hub.register(Arc::new(WsSubscriber::new(sender)));

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Close(_)) => {
                tracing::debug!(hub = hub.name(), subscriber = %id, "Client sent close frame");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(hub = hub.name(), subscriber = %id, error = %e, "Client read failed");
                break;
            }
        }
    }

    hub.unregister(id);
}
