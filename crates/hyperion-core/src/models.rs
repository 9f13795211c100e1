use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// One extracted record: a flat mapping of field name to scalar value.
///
/// Keys keep insertion order, so the first record's keys become the CSV header
/// in the order the extractor produced them.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Protocol hint used when routing traffic through a proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    #[default]
    Http,
    Https,
    Socks5,
}

impl ProxyProtocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks5 => "socks5",
        }
    }
}

/// Health of a proxy as seen by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyHealth {
    /// Harvested but not yet probed.
    Unknown,
    /// Passed validation, or succeeded since its last failure.
    Valid,
    /// Has failed at least once, still below the ban threshold.
    Failing,
    /// Crossed the failure threshold; excluded from rotation.
    Banned,
}

impl ProxyHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyHealth::Unknown => "unknown",
            ProxyHealth::Valid => "valid",
            ProxyHealth::Failing => "failing",
            ProxyHealth::Banned => "banned",
        }
    }
}

impl fmt::Display for ProxyHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A third-party proxy (`ip:port`) and its failure accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proxy {
    pub address: String,
    pub protocol: ProxyProtocol,
    pub health: ProxyHealth,
    pub consecutive_failures: u32,
}

impl Proxy {
    /// A freshly harvested, unprobed candidate.
    pub fn candidate(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            protocol: ProxyProtocol::default(),
            health: ProxyHealth::Unknown,
            consecutive_failures: 0,
        }
    }

    /// A proxy that already passed validation.
    pub fn validated(address: impl Into<String>) -> Self {
        Self {
            health: ProxyHealth::Valid,
            ..Self::candidate(address)
        }
    }

    pub fn with_protocol(mut self, protocol: ProxyProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Proxy URL suitable for HTTP clients and browsers, e.g. `http://1.2.3.4:8080`.
    pub fn url(&self) -> String {
        format!("{}://{}", self.protocol.scheme(), self.address)
    }

    pub fn is_banned(&self) -> bool {
        self.health == ProxyHealth::Banned
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Which fetch path produces documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Plain HTTP GET through the proxy.
    #[default]
    Direct,
    /// Headless browser render through the proxy.
    Rendered,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Direct => "direct",
            StrategyKind::Rendered => "rendered",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single fetch: target, proxy, timeout and strategy. Immutable once built.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    url: String,
    timeout: Duration,
    proxy: Proxy,
    strategy: StrategyKind,
}

impl FetchRequest {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        proxy: Proxy,
        strategy: StrategyKind,
    ) -> Self {
        Self {
            url: url.into(),
            timeout,
            proxy,
            strategy,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }
}

/// Fetched content normalized to decoded UTF-8 markup.
///
/// Both strategies produce this shape, so extraction never needs to know
/// how the page was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub strategy: StrategyKind,
    pub html: String,
}

impl Document {
    pub fn new(url: impl Into<String>, strategy: StrategyKind, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            strategy,
            html: html.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

/// Records accumulated over a run, in the order URLs were processed.
///
/// Append-only: records can be added but never removed or reordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeResult {
    records: Vec<Record>,
}

impl ScrapeResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub urls_total: usize,
    pub urls_succeeded: usize,
    pub urls_failed: usize,
    /// URLs never attempted because the pool ran dry or the run was cancelled.
    pub urls_skipped: usize,
    pub records: ScrapeResult,
    /// Where the results were written; `None` when there was nothing to save.
    pub output_path: Option<PathBuf>,
    pub aborted: bool,
}
