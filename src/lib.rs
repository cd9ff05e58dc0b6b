//! Proxy Validator
//!
//! Probes every proxy of a list with a test request, with bounded
//! concurrency, and keeps only the ones that answer with an HTML page.

pub mod config;
pub mod progress;
pub mod proxy;
pub mod tui;

pub use config::ValidatorConfig;
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
