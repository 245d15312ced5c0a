//! Redis integration tests.
//!
//! These tests require a running Redis instance.
//! Run with: `cargo test --test redis_integration -- --ignored`
//!
//! Set `REDIS_URL` environment variable to point to your Redis instance.
//! Default: <redis://localhost:6379>

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use mercado_core::{EventPublisher, UserEvent};
use mercado_queue::RedisPubSub;
use serde_json::json;

fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Test that we can connect to Redis.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_redis_connection() {
    let pubsub = RedisPubSub::new(&get_redis_url(), "mercado-test").await;
    assert!(pubsub.is_ok(), "Failed to connect to Redis: {:?}", pubsub.err());
}

/// Test that a published event comes back through the subscription.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_publish_round_trip() {
    let pubsub = RedisPubSub::new(&get_redis_url(), "mercado-test")
        .await
        .expect("Failed to connect to Redis");
    pubsub.start().await.expect("Failed to subscribe");
    let mut rx = pubsub.subscribe_local();

    // Give the subscription time to settle
    tokio::time::sleep(Duration::from_millis(100)).await;

    pubsub
        .publish_to_users(&["user-1".to_string()], "dispute:updated", json!({"id": "d1"}))
        .await
        .expect("Failed to publish");

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Channel closed");

    assert_eq!(
        received,
        UserEvent {
            user_ids: vec!["user-1".to_string()],
            event: "dispute:updated".to_string(),
            body: json!({"id": "d1"}),
        }
    );

    pubsub.shutdown().await.expect("Failed to shutdown");
}
