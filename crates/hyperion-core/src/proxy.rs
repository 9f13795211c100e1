//! Proxy pool lifecycle: harvest candidates, validate them, rotate the survivors.
//!
//! ```text
//! sources --harvest--> ip:port candidates --validate--> ProxyPool --next()--> Proxy
//!                                                          ^                    |
//!                                                          +--report_failure----+
//!                                                             report_success
//! ```
//!
//! A proxy that fails `failure_threshold` times in a row is banned and skipped
//! by rotation until it is [`reset`](ProxyPool::reset) or the pool is
//! [`refresh`](ProxyPool::refresh)ed.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;

use crate::config::PoolConfig;
use crate::error::AppError;
use crate::models::{Proxy, ProxyHealth};
use crate::traits::{ProxyProber, SourceLoader};

/// Where candidate proxies come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxySource {
    /// A URL serving a newline-delimited list.
    Remote(String),
    /// A local newline-delimited file.
    Local(PathBuf),
}

impl ProxySource {
    /// Anything starting with the literal `http` is remote; everything else is a path.
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        if source.starts_with("http") {
            ProxySource::Remote(source.to_string())
        } else {
            ProxySource::Local(PathBuf::from(source))
        }
    }
}

impl fmt::Display for ProxySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxySource::Remote(url) => write!(f, "{url}"),
            ProxySource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Strict `a.b.c.d:port` parse: four octets in 0-255 and a non-zero port.
///
/// Returns the canonical form, so `1.2.3.4:080` and `1.2.3.4:80` compare equal.
pub fn canonical_address(candidate: &str) -> Option<String> {
    match candidate.parse::<SocketAddrV4>() {
        Ok(addr) if addr.port() != 0 => Some(addr.to_string()),
        _ => None,
    }
}

/// Aggregates candidate addresses from every source, best effort.
#[derive(Clone)]
pub struct ProxyHarvester<L: SourceLoader> {
    loader: L,
}

impl<L: SourceLoader> ProxyHarvester<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    /// Loads all sources and returns unique, well-formed addresses in first-seen order.
    ///
    /// Unreadable sources are logged and skipped; they never fail the harvest.
    pub async fn harvest(&self, sources: &[ProxySource]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for source in sources {
            let text = match self.loader.load(source).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "Skipping proxy source");
                    continue;
                }
            };

            let before = candidates.len();
            let mut rejected = 0usize;
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Some(address) = canonical_address(line) else {
                    rejected += 1;
                    continue;
                };
                if seen.insert(address.clone()) {
                    candidates.push(address);
                }
            }

            tracing::info!(
                source = %source,
                added = candidates.len() - before,
                rejected,
                "Harvested proxy source"
            );
        }

        candidates
    }
}

/// Probes candidates through an IP echo endpoint and keeps the ones that answer correctly.
#[derive(Clone)]
pub struct ProxyValidator<P: ProxyProber> {
    prober: P,
    config: PoolConfig,
}

impl<P: ProxyProber> ProxyValidator<P> {
    pub fn new(prober: P, config: PoolConfig) -> Self {
        Self { prober, config }
    }

    /// Validates a single candidate.
    pub async fn check(&self, address: &str) -> Result<Proxy, AppError> {
        let reported = self
            .prober
            .probe(address, self.config.probe_timeout)
            .await
            .map_err(|e| AppError::ProxyValidation {
                proxy: address.to_string(),
                reason: e.to_string(),
            })?;

        if self.config.ip_match.matches(&reported, address) {
            Ok(Proxy::validated(address))
        } else {
            Err(AppError::ProxyValidation {
                proxy: address.to_string(),
                reason: format!("echo endpoint reported {reported}"),
            })
        }
    }

    /// Validates candidates concurrently. Survivors keep the input order.
    pub async fn validate(&self, candidates: Vec<String>) -> Vec<Proxy> {
        let total = candidates.len();
        let concurrency = self.config.validation_concurrency.max(1);

        let valid: Vec<Proxy> = futures::stream::iter(candidates)
            .map(|address| async move {
                match self.check(&address).await {
                    Ok(proxy) => Some(proxy),
                    Err(e) => {
                        tracing::debug!(error = %e, "Discarding proxy candidate");
                        None
                    }
                }
            })
            .buffered(concurrency)
            .filter_map(|proxy| async move { proxy })
            .collect()
            .await;

        tracing::info!(total, valid = valid.len(), "Proxy validation complete");
        valid
    }
}

/// Snapshot of pool health for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub banned: usize,
}

#[derive(Debug)]
struct PoolInner {
    entries: Vec<Proxy>,
    cursor: usize,
}

impl PoolInner {
    fn find_mut(&mut self, address: &str) -> Option<&mut Proxy> {
        self.entries.iter_mut().find(|p| p.address == address)
    }
}

/// Thread-safe rotating pool of validated proxies.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct ProxyPool {
    failure_threshold: u32,
    inner: Arc<Mutex<PoolInner>>,
}

impl ProxyPool {
    /// Builds a pool from validated proxies. Duplicate addresses collapse to the first.
    pub fn new(proxies: Vec<Proxy>, failure_threshold: u32) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            inner: Arc::new(Mutex::new(PoolInner {
                entries: dedup(proxies),
                cursor: 0,
            })),
        }
    }

    /// Harvests, validates, and pools proxies from `sources` in one step.
    pub async fn assemble<L, P>(
        loader: L,
        prober: P,
        sources: &[ProxySource],
        config: &PoolConfig,
    ) -> Result<Self, AppError>
    where
        L: SourceLoader,
        P: ProxyProber,
    {
        config.validate()?;
        let candidates = ProxyHarvester::new(loader).harvest(sources).await;
        tracing::info!(candidates = candidates.len(), "Validating proxy candidates");
        let proxies = ProxyValidator::new(prober, config.clone())
            .validate(candidates)
            .await;
        Ok(Self::new(proxies, config.failure_threshold))
    }

    fn lock_inner(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned proxy pool mutex");
            poisoned.into_inner()
        })
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Next non-banned proxy in round-robin order.
    ///
    /// Every non-banned proxy is handed out once before any repeats.
    /// Fails with [`AppError::PoolExhausted`] iff no non-banned proxy exists.
    pub fn next(&self) -> Result<Proxy, AppError> {
        let mut inner = self.lock_inner();
        let len = inner.entries.len();

        for offset in 0..len {
            let idx = (inner.cursor + offset) % len;
            if !inner.entries[idx].is_banned() {
                inner.cursor = (idx + 1) % len;
                return Ok(inner.entries[idx].clone());
            }
        }

        Err(AppError::PoolExhausted)
    }

    /// Records a failed fetch; bans the proxy once it reaches the threshold.
    pub fn report_failure(&self, proxy: &Proxy) {
        let threshold = self.failure_threshold;
        let mut inner = self.lock_inner();
        let Some(entry) = inner.find_mut(&proxy.address) else {
            tracing::debug!(proxy = %proxy, "Failure reported for proxy outside the pool");
            return;
        };

        if entry.is_banned() {
            return;
        }

        entry.consecutive_failures += 1;
        if entry.consecutive_failures >= threshold {
            entry.health = ProxyHealth::Banned;
            tracing::warn!(
                proxy = %entry.address,
                failures = entry.consecutive_failures,
                "Proxy banned after {} consecutive failures",
                entry.consecutive_failures
            );
        } else {
            entry.health = ProxyHealth::Failing;
            tracing::debug!(
                proxy = %entry.address,
                failures = entry.consecutive_failures,
                "Proxy failure recorded"
            );
        }
    }

    /// Records a successful fetch and clears the failure streak.
    pub fn report_success(&self, proxy: &Proxy) {
        let mut inner = self.lock_inner();
        if let Some(entry) = inner.find_mut(&proxy.address)
            && !entry.is_banned()
        {
            entry.consecutive_failures = 0;
            entry.health = ProxyHealth::Valid;
        }
    }

    /// Lifts a ban (or failure streak) on one proxy. Returns false if unknown.
    pub fn reset(&self, address: &str) -> bool {
        let mut inner = self.lock_inner();
        match inner.find_mut(address) {
            Some(entry) => {
                entry.consecutive_failures = 0;
                entry.health = ProxyHealth::Valid;
                tracing::info!(proxy = %address, "Proxy reset");
                true
            }
            None => false,
        }
    }

    /// Replaces the pool contents with a freshly validated set.
    pub fn refresh(&self, proxies: Vec<Proxy>) {
        let mut inner = self.lock_inner();
        inner.entries = dedup(proxies);
        inner.cursor = 0;
        tracing::info!(total = inner.entries.len(), "Proxy pool refreshed");
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.lock_inner();
        let banned = inner.entries.iter().filter(|p| p.is_banned()).count();
        PoolStats {
            total: inner.entries.len(),
            active: inner.entries.len() - banned,
            banned,
        }
    }

    /// Current state of every proxy, in rotation order.
    pub fn snapshot(&self) -> Vec<Proxy> {
        self.lock_inner().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock_inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_inner().entries.is_empty()
    }
}

fn dedup(proxies: Vec<Proxy>) -> Vec<Proxy> {
    let mut seen = HashSet::new();
    proxies
        .into_iter()
        .filter(|p| seen.insert(p.address.clone()))
        .collect()
}
