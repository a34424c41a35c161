//! Error types for each pipeline stage.
//!
//! Failures are contained per source: a [`FetchFailure`] or
//! [`ExtractionFailure`] turns into zero items for that source and an entry in
//! `per_source_errors`, never into an aborted aggregation.

use thiserror::Error;

/// Why a single backend could not produce a document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchFailure {
    /// Connection, TLS or body-read failure.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-2xx status.
    #[error("HTTP status {code}")]
    HttpStatus { code: u16 },

    /// The backend did not finish within its timeout.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The response looked like an anti-bot challenge or was too small to be a real page.
    #[error("blocked: {0}")]
    Blocked(String),

    /// The backend itself could not run (e.g. the browser failed to launch).
    #[error("backend unavailable: {0}")]
    Backend(String),
}

impl FetchFailure {
    /// Whether another attempt with the same backend could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchFailure::Network(_) | FetchFailure::Timeout(_) => true,
            FetchFailure::HttpStatus { code } => {
                matches!(code, 401 | 403 | 408 | 429) || *code >= 500
            }
            FetchFailure::Blocked(_) | FetchFailure::Backend(_) => false,
        }
    }
}

impl FetchFailure {
    /// Classify a `reqwest` error, reporting timeouts with the budget that was exceeded.
    pub fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            FetchFailure::Timeout(timeout_secs)
        } else if let Some(status) = e.status() {
            FetchFailure::HttpStatus {
                code: status.as_u16(),
            }
        } else {
            FetchFailure::Network(e.to_string())
        }
    }
}

/// A document that could not be turned into candidates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("malformed {format} document ({bytes} bytes): {reason}")]
    Malformed {
        format: &'static str,
        bytes: usize,
        reason: String,
    },

    #[error("empty document")]
    Empty,
}

/// Errors from the snapshot store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// No snapshot has been written yet.
    #[error("no snapshot available yet")]
    Unavailable,
}

/// Errors while loading [`crate::config::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
