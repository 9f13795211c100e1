use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, FetchFailure, TRANSIENT_STATUSES};
use crate::models::StrategyKind;

/// Output encoding for the results file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON array of records.
    Json,
    /// Header row from the first record's keys, one row per record.
    #[default]
    Csv,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// How a probe's reported IP is compared with the candidate address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IpMatch {
    /// Reported IP appears anywhere in the `ip:port` string.
    #[default]
    Substring,
    /// Reported IP equals the host part of the candidate.
    Exact,
}

impl IpMatch {
    pub fn matches(&self, reported_ip: &str, candidate: &str) -> bool {
        let reported_ip = reported_ip.trim();
        if reported_ip.is_empty() {
            return false;
        }
        match self {
            IpMatch::Substring => candidate.contains(reported_ip),
            IpMatch::Exact => candidate
                .rsplit_once(':')
                .is_some_and(|(host, _)| host == reported_ip),
        }
    }
}

/// Proxy pool tuning.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Consecutive failures after which a proxy is banned.
    pub failure_threshold: u32,
    /// Maximum number of candidates probed at once.
    pub validation_concurrency: usize,
    /// Timeout for a single validation probe.
    pub probe_timeout: Duration,
    pub ip_match: IpMatch,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            validation_concurrency: 32,
            probe_timeout: Duration::from_secs(15),
            ip_match: IpMatch::default(),
        }
    }
}

impl PoolConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_validation_concurrency(mut self, concurrency: usize) -> Self {
        self.validation_concurrency = concurrency;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_ip_match(mut self, ip_match: IpMatch) -> Self {
        self.ip_match = ip_match;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.failure_threshold == 0 {
            return Err(AppError::Config(
                "failure threshold must be at least 1".into(),
            ));
        }
        if self.validation_concurrency == 0 {
            return Err(AppError::Config(
                "validation concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Bounded retry with exponential backoff for the direct strategy.
///
/// Delay schedule with the defaults: 1s, 2s (three attempts in total).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub transient_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            transient_statuses: TRANSIENT_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_backoff.saturating_mul(1u32 << exponent);
        std::cmp::min(delay, self.max_backoff)
    }

    pub fn is_transient_status(&self, status: u16) -> bool {
        self.transient_statuses.contains(&status)
    }

    /// Whether a failed attempt may be retried. Navigation failures never are.
    pub fn should_retry(&self, failure: &FetchFailure) -> bool {
        match failure {
            FetchFailure::Timeout | FetchFailure::Transport(_) => true,
            FetchFailure::HttpStatus(status) => self.is_transient_status(*status),
            FetchFailure::Navigation(_) => false,
        }
    }
}

/// Optional capabilities of this build/runtime, checked before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether the rendered-browser strategy can be used.
    pub rendered: bool,
}

impl Capabilities {
    pub fn direct_only() -> Self {
        Self { rendered: false }
    }

    pub fn all() -> Self {
        Self { rendered: true }
    }

    pub fn supports(&self, strategy: StrategyKind) -> bool {
        match strategy {
            StrategyKind::Direct => true,
            StrategyKind::Rendered => self.rendered,
        }
    }

    /// Fails with [`AppError::UnsupportedStrategy`] if `strategy` is unavailable.
    pub fn ensure(&self, strategy: StrategyKind) -> Result<(), AppError> {
        if self.supports(strategy) {
            Ok(())
        } else {
            Err(AppError::UnsupportedStrategy(format!(
                "{strategy} fetching is not available (build with the `browser` feature)"
            )))
        }
    }
}

/// Per-run settings for the scrape orchestrator.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Must match the fetcher the service is built with.
    pub strategy: StrategyKind,
    pub format: OutputFormat,
    /// Bounds every fetch, including browser navigation.
    pub timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Direct,
            format: OutputFormat::Csv,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ScrapeConfig {
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.timeout.is_zero() {
            return Err(AppError::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }
}
