//! Textual progress reporting

use crate::proxy::ProbeResult;
use std::path::Path;

/// Running counts for a validation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub checked: usize,
    pub working: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, result: &ProbeResult) {
        self.checked += 1;
        if result.is_success() {
            self.working += 1;
        }
    }

    pub fn failed(&self) -> usize {
        self.checked - self.working
    }

    pub fn is_complete(&self) -> bool {
        self.checked >= self.total
    }

    pub fn percentage(&self) -> u16 {
        if self.total == 0 {
            return 100;
        }
        (self.checked as f64 / self.total as f64 * 100.0) as u16
    }

    /// e.g. `[3/10] 30% | working: 1`
    pub fn status_line(&self) -> String {
        format!(
            "[{}/{}] {}% | working: {}",
            self.checked,
            self.total,
            self.percentage(),
            self.working
        )
    }
}

/// Announcement for a working proxy, nothing for failures
pub fn working_line(result: &ProbeResult) -> Option<String> {
    match result {
        ProbeResult::Success {
            endpoint,
            body_len,
            elapsed_ms,
        } => Some(format!(
            "WORKING: {} -> OK (HTML {} bytes, {}ms)",
            endpoint, body_len, elapsed_ms
        )),
        ProbeResult::Failure { .. } => None,
    }
}

pub fn summary_line(working: usize, path: &Path) -> String {
    format!(
        "Done. {} working proxies saved back to {}",
        working,
        path.display()
    )
}
