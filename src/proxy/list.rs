//! Reading and writing the plain-text proxy list

use crate::proxy::models::{ProxyEndpoint, WorkingSet};
use crate::Result;
use anyhow::Context;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

/// Parse proxies from list content, one per line.
///
/// Lines are trimmed and blank lines skipped; nothing else is interpreted.
pub fn parse_proxies(content: &str) -> Vec<ProxyEndpoint> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ProxyEndpoint::from)
        .collect()
}

/// Load proxies from a file. A missing file yields an empty list.
pub fn load_proxies<P: AsRef<Path>>(path: P) -> Result<Vec<ProxyEndpoint>> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_proxies(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "proxy file not found");
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Overwrite `path` with the working proxies
pub fn save_proxies<P: AsRef<Path>>(path: P, working: &WorkingSet) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, working.to_lines())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
