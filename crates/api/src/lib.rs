//! HTTP API layer for mercado.
//!
//! This crate provides the REST API and real-time streaming:
//!
//! - **Endpoints**: dispute workflow, staff dashboard, metrics
//! - **Extractors**: bearer authentication, staff guard, multipart forms
//! - **Middleware**: token resolution, request metrics
//! - **Streaming**: per-user WebSocket rooms
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod streaming;

pub use endpoints::router;
pub use streaming::{StreamingState, streaming_handler};
