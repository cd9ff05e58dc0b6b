//! Proxy data models

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A proxy address as it appears in the proxy list.
///
/// The string is opaque: it is handed to the HTTP client verbatim and no
/// host/port structure is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyEndpoint(String);

impl ProxyEndpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProxyEndpoint {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for ProxyEndpoint {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// Why a probe failed.
///
/// Only used for diagnostics; every variant collapses to
/// [`ProbeResult::Failure`].
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid proxy address: {0}")]
    InvalidProxy(#[source] reqwest::Error),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("timed out")]
    Timeout,
    #[error("unexpected HTTP status: {0}")]
    Status(StatusCode),
    #[error("response is not an html document")]
    MissingMarker,
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Success {
        endpoint: ProxyEndpoint,
        /// Size of the response body in bytes
        body_len: usize,
        elapsed_ms: u64,
    },
    Failure {
        endpoint: ProxyEndpoint,
    },
}

impl ProbeResult {
    pub fn success(endpoint: ProxyEndpoint, body_len: usize, elapsed_ms: u64) -> Self {
        Self::Success {
            endpoint,
            body_len,
            elapsed_ms,
        }
    }

    pub fn failure(endpoint: ProxyEndpoint) -> Self {
        Self::Failure { endpoint }
    }

    /// Fold a typed probe outcome into a result. Every error is a failure.
    pub fn from_outcome(
        endpoint: ProxyEndpoint,
        outcome: std::result::Result<(usize, u64), ProbeError>,
    ) -> Self {
        match outcome {
            Ok((body_len, elapsed_ms)) => Self::success(endpoint, body_len, elapsed_ms),
            Err(
                ProbeError::InvalidProxy(_)
                | ProbeError::Client(_)
                | ProbeError::Transport(_)
                | ProbeError::Body(_)
                | ProbeError::Timeout
                | ProbeError::Status(_)
                | ProbeError::MissingMarker,
            ) => Self::failure(endpoint),
        }
    }

    pub fn endpoint(&self) -> &ProxyEndpoint {
        match self {
            Self::Success { endpoint, .. } | Self::Failure { endpoint } => endpoint,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Proxies that passed their probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    proxies: Vec<ProxyEndpoint>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, endpoint: ProxyEndpoint) {
        self.proxies.push(endpoint);
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyEndpoint> {
        self.proxies.iter()
    }

    pub fn into_vec(self) -> Vec<ProxyEndpoint> {
        self.proxies
    }

    /// Newline-joined proxy list, no trailing newline
    pub fn to_lines(&self) -> String {
        self.proxies
            .iter()
            .map(ProxyEndpoint::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<ProxyEndpoint> for WorkingSet {
    fn from_iter<I: IntoIterator<Item = ProxyEndpoint>>(iter: I) -> Self {
        Self {
            proxies: iter.into_iter().collect(),
        }
    }
}
