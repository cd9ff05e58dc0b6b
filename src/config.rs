//! Validator configuration
//!
//! Values come from three layers: built-in defaults, an optional TOML file
//! and command line flags, each overriding the one before.

use crate::Result;
use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default URL every proxy is tested against
pub const DEFAULT_TARGET_URL: &str = "https://wplace.live";

/// Default timeout for a single probe in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of probes in flight
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default proxy list location
pub const DEFAULT_PROXIES_FILE: &str = "data/proxies.txt";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

/// Browser-like headers; the target rejects obvious bots with a 403
static DEFAULT_HEADERS: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    [
        ("User-Agent", DEFAULT_USER_AGENT),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.9"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
});

/// Configuration for a validation run
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    /// URL requested through each proxy
    pub target_url: String,
    /// Timeout for each probe (connect + transfer)
    pub timeout: Duration,
    /// Maximum number of probes in flight
    pub concurrency: usize,
    /// Headers sent with every probe
    pub headers: BTreeMap<String, String>,
    /// Proxy list to read
    pub proxies_file: PathBuf,
    /// Where working proxies are written, defaults to `proxies_file`
    pub output_file: Option<PathBuf>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            headers: DEFAULT_HEADERS.clone(),
            proxies_file: PathBuf::from(DEFAULT_PROXIES_FILE),
            output_file: None,
        }
    }
}

/// On-disk layout, every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    target_url: Option<String>,
    timeout_secs: Option<u64>,
    concurrency: Option<usize>,
    proxies_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    headers: Option<BTreeMap<String, String>>,
}

impl ValidatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML config file on top of the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(url) = file.target_url {
            config.target_url = url;
        }
        if let Some(secs) = file.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(concurrency) = file.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(path) = file.proxies_file {
            config.proxies_file = path;
        }
        if file.output_file.is_some() {
            config.output_file = file.output_file;
        }
        if let Some(headers) = file.headers {
            config.headers = headers;
        }

        Ok(config)
    }

    pub fn with_target_url(mut self, url: String) -> Self {
        self.target_url = url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_proxies_file(mut self, path: PathBuf) -> Self {
        self.proxies_file = path;
        self
    }

    pub fn with_output_file(mut self, path: PathBuf) -> Self {
        self.output_file = Some(path);
        self
    }

    /// Where the working proxies end up
    pub fn output_path(&self) -> &Path {
        self.output_file.as_deref().unwrap_or(&self.proxies_file)
    }

    /// Reject values that would make a run hang or never probe anything
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.timeout.is_zero() {
            bail!("timeout must be greater than zero");
        }
        if self.target_url.trim().is_empty() {
            bail!("target url must not be empty");
        }
        Ok(())
    }
}
