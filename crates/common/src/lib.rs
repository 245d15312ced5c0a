//! Common utilities and shared types for mercado.
//!
//! This crate provides foundational components used across all mercado crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Metrics**: Request and workflow counters via [`Metrics`]
//! - **Storage**: File storage backends for dispute attachments
//!
//! # Example
//!
//! ```no_run
//! use mercado_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod metrics;
pub mod storage;

pub use config::{Config, DisputeConfig};
pub use error::{AppError, AppResult};
pub use id::{IdGenerator, is_valid_id};
pub use metrics::{Metrics, MetricsSnapshot, Timer, get_metrics};
pub use storage::{LocalStorage, StorageBackend, UploadedFile, generate_storage_key};
