//! WebSocket streaming API.
//!
//! Every connection joins the room of its authenticated user and receives
//! `{"type", "body"}` frames for dispute and notification events addressed
//! to that user.

#![allow(missing_docs)]

use async_trait::async_trait;
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use mercado_common::{AppResult, get_metrics};
use mercado_core::{EventPublisher, UserEvent};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, atomic::Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::middleware::AppState;

/// Buffered events per receiver before slow connections start lagging.
const ROOM_CAPACITY: usize = 1000;

/// Streaming query parameters.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Access token for authentication.
    #[serde(rename = "i")]
    pub token: Option<String>,
}

/// Frame pushed to clients.
#[derive(Debug, Serialize)]
struct ServerMessage<'a> {
    #[serde(rename = "type")]
    event: &'a str,
    body: &'a serde_json::Value,
}

/// Shared state for streaming.
#[derive(Clone)]
pub struct StreamingState {
    tx: Arc<broadcast::Sender<Arc<UserEvent>>>,
}

impl StreamingState {
    /// Create a new streaming state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ROOM_CAPACITY);
        Self { tx: Arc::new(tx) }
    }

    /// Hand an event to the connections of its recipients on this instance.
    pub fn deliver(&self, event: UserEvent) {
        // No receivers just means nobody is connected.
        let _ = self.tx.send(Arc::new(event));
    }

    /// Subscribe to every event delivered on this instance.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<UserEvent>> {
        self.tx.subscribe()
    }
}

impl Default for StreamingState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for StreamingState {
    async fn publish_to_users(
        &self,
        user_ids: &[String],
        event: &str,
        body: serde_json::Value,
    ) -> AppResult<()> {
        self.deliver(UserEvent {
            user_ids: user_ids.to_vec(),
            event: event.to_string(),
            body,
        });
        Ok(())
    }
}

/// WebSocket handler for streaming.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let token = query.token.unwrap_or_default();
    let user = state.user_service.authenticate_by_token(&token).await?;

    info!(user_id = %user.id, "New streaming connection");
    let streaming = state.streaming.clone();
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, user.id, streaming))
        .into_response())
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, user_id: String, streaming: StreamingState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = streaming.subscribe();
    let metrics = get_metrics();
    metrics
        .websocket_connections_active
        .fetch_add(1, Ordering::Relaxed);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(user_id = %user_id, "Client closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, user_id = %user_id, "WebSocket error");
                        break;
                    }
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if !event.user_ids.iter().any(|u| *u == user_id) {
                            continue;
                        }
                        let frame = ServerMessage { event: &event.event, body: &event.body };
                        let json = serde_json::to_string(&frame).unwrap_or_default();
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                        metrics.websocket_messages_sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user_id, skipped, "Streaming connection lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    metrics
        .websocket_connections_active
        .fetch_sub(1, Ordering::Relaxed);
    info!(user_id = %user_id, "Streaming connection closed");
}
