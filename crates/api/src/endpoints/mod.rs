//! API endpoints.

mod admin_disputes;
mod disputes;
mod metrics;

use axum::{Router, routing::get};

use crate::{middleware::AppState, streaming::streaming_handler};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/disputes/admin", admin_disputes::router())
        .nest("/disputes", disputes::router())
        .nest("/metrics", metrics::router())
        .route("/streaming", get(streaming_handler))
}
