//! Proxy module for validating proxy lists
//!
//! This module provides functionality for:
//! - Loading and saving plain-text proxy lists
//! - Probing a single proxy with a test request
//! - Validating a whole list with bounded concurrency

pub mod list;
pub mod models;
pub mod probe;
pub mod validator;

pub use list::{load_proxies, parse_proxies, save_proxies};
pub use models::{ProbeError, ProbeResult, ProxyEndpoint, WorkingSet};
pub use probe::{is_html_document, HttpProbe, Probe};
pub use validator::{Completion, Validator};
