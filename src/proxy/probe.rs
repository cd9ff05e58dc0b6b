//! Network probe issuing one test request through a proxy

use crate::config::ValidatorConfig;
use crate::proxy::models::{ProbeError, ProbeResult, ProxyEndpoint};
use crate::Result;
use anyhow::Context;
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode};
use std::time::{Duration, Instant};
use tracing::debug;

/// Marker a successful response body must contain, compared case-insensitively
const HTML_MARKER: &[u8] = b"<!doctype html>";

/// A single proxy check.
///
/// Implementations never fail: every problem is reported as
/// [`ProbeResult::Failure`].
pub trait Probe: Send + Sync {
    fn probe<'a>(&'a self, endpoint: &'a ProxyEndpoint) -> BoxFuture<'a, ProbeResult>;
}

/// Whether a response counts as a working proxy
pub fn is_html_document(status: StatusCode, body: &[u8]) -> bool {
    status == StatusCode::OK
        && body
            .windows(HTML_MARKER.len())
            .any(|window| window.eq_ignore_ascii_case(HTML_MARKER))
}

/// Probe that GETs the target URL through the proxy with reqwest
#[derive(Debug, Clone)]
pub struct HttpProbe {
    target_url: String,
    timeout: Duration,
    headers: HeaderMap,
}

impl HttpProbe {
    pub fn new(config: &ValidatorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name: {}", name))?;
            let header_value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {}", name))?;
            headers.insert(header_name, header_value);
        }

        Ok(Self {
            target_url: config.target_url.clone(),
            timeout: config.timeout,
            headers,
        })
    }

    /// One-off client routed through the proxy for both http and https
    fn create_client(&self, endpoint: &ProxyEndpoint) -> std::result::Result<Client, ProbeError> {
        let proxy = ReqwestProxy::all(endpoint.as_str()).map_err(ProbeError::InvalidProxy)?;

        Client::builder()
            .proxy(proxy)
            .default_headers(self.headers.clone())
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(ProbeError::Client)
    }

    async fn try_probe(
        &self,
        endpoint: &ProxyEndpoint,
    ) -> std::result::Result<(usize, u64), ProbeError> {
        let start = Instant::now();
        let client = self.create_client(endpoint)?;

        let request = async {
            let response = client
                .get(&self.target_url)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status();
            if status != StatusCode::OK {
                return Err(ProbeError::Status(status));
            }

            let body = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout
                } else {
                    ProbeError::Body(e)
                }
            })?;
            if !is_html_document(status, &body) {
                return Err(ProbeError::MissingMarker);
            }
            Ok(body.len())
        };

        // The client timeout should fire first; this bounds anything it misses.
        let body_len = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ProbeError::Timeout)??;

        Ok((body_len, start.elapsed().as_millis() as u64))
    }
}

fn transport_error(error: reqwest::Error) -> ProbeError {
    if error.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Transport(error)
    }
}

impl Probe for HttpProbe {
    fn probe<'a>(&'a self, endpoint: &'a ProxyEndpoint) -> BoxFuture<'a, ProbeResult> {
        async move {
            let outcome = self.try_probe(endpoint).await;
            if let Err(ref error) = outcome {
                debug!(proxy = %endpoint, %error, "probe failed");
            }
            ProbeResult::from_outcome(endpoint.clone(), outcome)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    /// Plain-http target so the mock server can play the forward proxy
    const TARGET: &str = "http://probe.test/";

    fn probe_with_timeout(timeout: Duration) -> HttpProbe {
        let config = ValidatorConfig::new()
            .with_target_url(TARGET.to_string())
            .with_timeout(timeout);
        HttpProbe::new(&config).unwrap()
    }

    #[test]
    fn test_html_marker_case_insensitive() {
        assert!(is_html_document(
            StatusCode::OK,
            b"<!DOCTYPE html><body>ok</body>"
        ));
        assert!(is_html_document(StatusCode::OK, b"\n  <!doctype HTML>"));
        assert!(!is_html_document(StatusCode::OK, b"<html><body>ok</body>"));
        assert!(!is_html_document(StatusCode::OK, b""));
    }

    #[test]
    fn test_non_200_is_never_html_document() {
        assert!(!is_html_document(
            StatusCode::FORBIDDEN,
            b"<!DOCTYPE html><body>denied</body>"
        ));
        assert!(!is_html_document(
            StatusCode::CREATED,
            b"<!DOCTYPE html><body>ok</body>"
        ));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let config = ValidatorConfig::new().with_header("Bad Header", "x");
        assert!(HttpProbe::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_probe_success() {
        let server = MockServer::start_async().await;
        let body = "<!DOCTYPE html><body>ok</body>";
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).header_exists("user-agent");
                then.status(200).body(body);
            })
            .await;

        let probe = probe_with_timeout(Duration::from_secs(5));
        let endpoint = ProxyEndpoint::new(server.base_url());
        let result = probe.probe(&endpoint).await;

        mock.assert_async().await;
        match result {
            ProbeResult::Success {
                endpoint: working,
                body_len,
                ..
            } => {
                assert_eq!(working, endpoint);
                assert_eq!(body_len, body.len());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_forbidden_is_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(403).body("<!DOCTYPE html><body>denied</body>");
            })
            .await;

        let probe = probe_with_timeout(Duration::from_secs(5));
        let result = probe.probe(&ProxyEndpoint::new(server.base_url())).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_probe_missing_marker_is_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body("{\"origin\": \"1.2.3.4\"}");
            })
            .await;

        let probe = probe_with_timeout(Duration::from_secs(5));
        let result = probe.probe(&ProxyEndpoint::new(server.base_url())).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_probe_timeout_is_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .body("<!doctype html>")
                    .delay(Duration::from_secs(5));
            })
            .await;

        let probe = probe_with_timeout(Duration::from_millis(300));
        let start = Instant::now();
        let result = probe.probe(&ProxyEndpoint::new(server.base_url())).await;

        assert!(!result.is_success());
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_probe_unreachable_proxy_is_failure() {
        let probe = probe_with_timeout(Duration::from_secs(2));
        let result = probe
            .probe(&ProxyEndpoint::new("http://127.0.0.1:1"))
            .await;
        assert_eq!(result, ProbeResult::failure("http://127.0.0.1:1".into()));
    }

    #[tokio::test]
    async fn test_probe_malformed_proxy_is_failure() {
        let probe = probe_with_timeout(Duration::from_secs(2));
        let result = probe.probe(&ProxyEndpoint::new("::not a proxy::")).await;
        assert!(!result.is_success());
    }
}
