//! Metrics endpoints for monitoring and observability.
//!
//! Provides endpoints for:
//! - JSON and Prometheus metrics export
//! - Health checks

use axum::{
    Json, Router,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use mercado_common::metrics::{MetricsSnapshot, get_metrics};
use serde::Serialize;

use crate::middleware::AppState;

/// Create the metrics router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_metrics_json))
        .route("/prometheus", get(get_metrics_prometheus))
        .route("/health", get(health_check))
}

/// JSON metrics response.
#[derive(Serialize)]
pub struct MetricsResponse {
    pub http: HttpMetrics,
    pub disputes: DisputeMetrics,
    pub delivery: DeliveryMetrics,
    pub realtime: RealtimeMetrics,
    pub sweeper: SweeperMetrics,
}

#[derive(Serialize)]
pub struct HttpMetrics {
    pub requests_total: u64,
    pub requests_active: u64,
    pub requests_2xx: u64,
    pub requests_4xx: u64,
    pub requests_5xx: u64,
    pub latency_avg_us: u64,
}

#[derive(Serialize)]
pub struct DisputeMetrics {
    pub created: u64,
    pub transitions: u64,
    pub expired: u64,
    pub conflicts: u64,
    pub messages: u64,
    pub attachments_uploaded: u64,
}

#[derive(Serialize)]
pub struct DeliveryMetrics {
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub events_published: u64,
}

#[derive(Serialize)]
pub struct RealtimeMetrics {
    pub websocket_connections_active: u64,
    pub websocket_messages_sent: u64,
}

#[derive(Serialize)]
pub struct SweeperMetrics {
    pub runs: u64,
    pub failures: u64,
}

impl From<MetricsSnapshot> for MetricsResponse {
    fn from(s: MetricsSnapshot) -> Self {
        Self {
            http: HttpMetrics {
                requests_total: s.http_requests_total,
                requests_active: s.http_requests_active,
                requests_2xx: s.http_requests_2xx,
                requests_4xx: s.http_requests_4xx,
                requests_5xx: s.http_requests_5xx,
                latency_avg_us: s.http_request_latency_avg_us,
            },
            disputes: DisputeMetrics {
                created: s.disputes_created,
                transitions: s.dispute_transitions,
                expired: s.disputes_expired,
                conflicts: s.dispute_conflicts,
                messages: s.dispute_messages,
                attachments_uploaded: s.attachments_uploaded,
            },
            delivery: DeliveryMetrics {
                notifications_sent: s.notifications_sent,
                notifications_failed: s.notifications_failed,
                events_published: s.events_published,
            },
            realtime: RealtimeMetrics {
                websocket_connections_active: s.websocket_connections_active,
                websocket_messages_sent: s.websocket_messages_sent,
            },
            sweeper: SweeperMetrics {
                runs: s.expiry_sweeps,
                failures: s.expiry_sweep_failures,
            },
        }
    }
}

/// Get metrics in JSON format.
async fn get_metrics_json() -> Json<MetricsResponse> {
    let snapshot = get_metrics().snapshot();
    Json(MetricsResponse::from(snapshot))
}

/// Get metrics in Prometheus text format.
async fn get_metrics_prometheus() -> Response {
    let prometheus_output = get_metrics().to_prometheus();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        prometheus_output,
    )
        .into_response()
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Simple health check (liveness probe).
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
