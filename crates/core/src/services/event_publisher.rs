//! Event publisher service.
//!
//! Provides an abstraction for pushing real-time events to users.
//! The in-process implementation lives in the API streaming hub; the queue
//! crate provides a Redis Pub/Sub implementation for multi-instance setups.

use async_trait::async_trait;
use mercado_common::AppResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A dispute changed state or metadata.
pub const DISPUTE_UPDATED: &str = "dispute:updated";
/// A message was appended to a dispute thread.
pub const DISPUTE_MESSAGE: &str = "dispute:message";
/// A notification was stored for the user.
pub const NOTIFICATION: &str = "notification";

/// An event addressed to the personal rooms of a set of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEvent {
    /// Recipients.
    pub user_ids: Vec<String>,
    /// Event name, e.g. `dispute:updated`.
    #[serde(rename = "type")]
    pub event: String,
    /// Event payload.
    pub body: serde_json::Value,
}

/// Trait for publishing real-time events.
///
/// This allows the core services to publish events
/// without directly depending on the transport.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver `event` with `body` to every connection of the given users.
    async fn publish_to_users(
        &self,
        user_ids: &[String],
        event: &str,
        body: serde_json::Value,
    ) -> AppResult<()>;
}

/// A no-op implementation of `EventPublisher` for testing or when real-time events are disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_to_users(
        &self,
        _user_ids: &[String],
        _event: &str,
        _body: serde_json::Value,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Type alias for a shared event publisher.
pub type EventPublisherService = Arc<dyn EventPublisher>;
