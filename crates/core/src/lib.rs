//! Core business logic for mercado.

pub mod services;

pub use services::*;
