use std::fmt;

use thiserror::Error;

/// Default HTTP statuses the direct strategy retries.
pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Why a single fetch failed, independent of the strategy that ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request or navigation did not finish within its timeout.
    Timeout,
    /// The server answered with a non-success status.
    HttpStatus(u16),
    /// Connection, proxy, TLS or body-read failure.
    Transport(String),
    /// The browser could not open, navigate, or read the page.
    Navigation(String),
}

impl FetchFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchFailure::Timeout => "timeout",
            FetchFailure::HttpStatus(_) => "http-status",
            FetchFailure::Transport(_) => "transport",
            FetchFailure::Navigation(_) => "navigation",
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Timeout => write!(f, "timed out"),
            FetchFailure::HttpStatus(status) => write!(f, "HTTP {status}"),
            FetchFailure::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchFailure::Navigation(msg) => write!(f, "navigation error: {msg}"),
        }
    }
}

/// Application-wide error types for Hyperion.
#[derive(Error, Debug)]
pub enum AppError {
    /// A proxy source could not be read. Harvesting skips it.
    #[error("Proxy source {source_name} unavailable: {reason}")]
    HarvestSource { source_name: String, reason: String },

    /// A candidate proxy failed its probe and was discarded.
    #[error("Proxy {proxy} failed validation: {reason}")]
    ProxyValidation { proxy: String, reason: String },

    /// Every proxy in the pool is banned (or none were validated).
    #[error("Proxy pool exhausted: no usable proxies remain")]
    PoolExhausted,

    /// A fetch failed. Both strategies report every per-request failure this way.
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: FetchFailure },

    /// The extractor could not process a document.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The requested strategy is not available in this build or runtime.
    #[error("Unsupported strategy: {0}")]
    UnsupportedStrategy(String),

    /// Writing results failed.
    #[error("Output error: {0}")]
    Output(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn fetch_failed(url: impl Into<String>, reason: FetchFailure) -> Self {
        AppError::FetchFailed {
            url: url.into(),
            reason,
        }
    }

    /// The failure reason if this is a fetch failure.
    pub fn fetch_failure(&self) -> Option<&FetchFailure> {
        match self {
            AppError::FetchFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
