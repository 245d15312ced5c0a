//! Redis Pub/Sub for cross-instance event distribution.
//!
//! Every instance publishes user events to one channel and subscribes to it,
//! so a socket connected to any instance receives events raised on any other.

#![allow(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use mercado_common::{AppError, AppResult};
use mercado_core::services::{EventPublisher, UserEvent};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events buffered for local subscribers.
const LOCAL_CAPACITY: usize = 1000;

/// Channel carrying user events for the deployment using `prefix`.
#[must_use]
pub fn user_events_channel(prefix: &str) -> String {
    format!("{prefix}:user-events")
}

fn redis_error(e: fred::error::Error) -> AppError {
    AppError::Redis(e.to_string())
}

/// Redis Pub/Sub manager for event distribution.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    subscriber: SubscriberClient,
    channel: String,
    /// Local broadcast channel for events received from Redis.
    local_tx: broadcast::Sender<UserEvent>,
}

impl RedisPubSub {
    /// Connect to Redis. Keys and channels are namespaced with `prefix`.
    pub async fn new(redis_url: &str, prefix: &str) -> AppResult<Self> {
        let config = RedisConfig::from_url(redis_url).map_err(redis_error)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await.map_err(redis_error)?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await.map_err(redis_error)?;

        let (local_tx, _) = broadcast::channel(LOCAL_CAPACITY);

        info!("Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            subscriber,
            channel: user_events_channel(prefix),
            local_tx,
        })
    }

    /// Subscribe to the user event channel and start the event loop.
    pub async fn start(&self) -> AppResult<()> {
        self.subscriber
            .subscribe(self.channel.as_str())
            .await
            .map_err(redis_error)?;

        info!(channel = %self.channel, "Subscribed to Redis Pub/Sub channel");

        let local_tx = self.local_tx.clone();
        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                let Some(payload) = message.value.as_string() else {
                    continue;
                };
                match serde_json::from_str::<UserEvent>(&payload) {
                    Ok(event) => {
                        debug!(event = %event.event, "Received Pub/Sub event");
                        // No receivers just means no bridge is running.
                        let _ = local_tx.send(event);
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse Pub/Sub message");
                    }
                }
            }
            info!("Pub/Sub message stream ended");
        });

        Ok(())
    }

    /// Publish an event to every instance.
    pub async fn publish(&self, event: &UserEvent) -> AppResult<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| AppError::Internal(format!("Serialization error: {e}")))?;
        let _: () = self
            .publisher
            .publish(self.channel.as_str(), payload)
            .await
            .map_err(redis_error)?;
        debug!(channel = %self.channel, event = %event.event, "Published Pub/Sub event");
        Ok(())
    }

    /// Get a receiver for events received from Redis.
    #[must_use]
    pub fn subscribe_local(&self) -> broadcast::Receiver<UserEvent> {
        self.local_tx.subscribe()
    }

    /// Shutdown the Pub/Sub manager.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.subscriber.quit().await.map_err(redis_error)?;
        self.publisher.quit().await.map_err(redis_error)?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RedisPubSub {
    async fn publish_to_users(
        &self,
        user_ids: &[String],
        event: &str,
        body: serde_json::Value,
    ) -> AppResult<()> {
        self.publish(&UserEvent {
            user_ids: user_ids.to_vec(),
            event: event.to_string(),
            body,
        })
        .await
    }
}

/// Bridge between Redis Pub/Sub and the local streaming hub.
pub struct PubSubBridge {
    pubsub: Arc<RedisPubSub>,
}

impl PubSubBridge {
    #[must_use]
    pub const fn new(pubsub: Arc<RedisPubSub>) -> Self {
        Self { pubsub }
    }

    /// Forward every event received from Redis to `on_event`.
    pub fn start<F>(&self, on_event: F)
    where
        F: Fn(UserEvent) + Send + Sync + 'static,
    {
        let rx = self.pubsub.subscribe_local();
        tokio::spawn(forward(rx, on_event));
    }
}

async fn forward<F>(mut rx: broadcast::Receiver<UserEvent>, on_event: F)
where
    F: Fn(UserEvent) + Send + Sync + 'static,
{
    loop {
        match rx.recv().await {
            Ok(event) => on_event(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Pub/Sub bridge lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("Pub/Sub bridge channel closed");
                break;
            }
        }
    }
}
