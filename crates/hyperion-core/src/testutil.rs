//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::OutputFormat;
use crate::error::{AppError, FetchFailure};
use crate::models::{Document, FetchRequest, Record, StrategyKind};
use crate::proxy::ProxySource;
use crate::scrape::{RunPhase, ScrapeEvent, ScrapeReporter};
use crate::traits::{Extractor, Fetcher, ProxyProber, ResultWriter, SourceLoader};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with per-URL outcomes that records every request.
///
/// URLs without a configured outcome return a default page.
#[derive(Clone)]
pub struct MockFetcher {
    kind: StrategyKind,
    outcomes: Arc<Mutex<HashMap<String, Result<String, FetchFailure>>>>,
    failing_proxies: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            kind: StrategyKind::Direct,
            outcomes: Arc::new(Mutex::new(HashMap::new())),
            failing_proxies: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_kind(mut self, kind: StrategyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub fn with_failure(self, url: &str, failure: FetchFailure) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(failure));
        self
    }

    /// Every request routed through `address` fails at the transport level.
    pub fn failing_through(self, address: &str) -> Self {
        self.failing_proxies
            .lock()
            .unwrap()
            .push(address.to_string());
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Document, AppError> {
        self.requests.lock().unwrap().push(request.clone());

        let proxy_fails = self
            .failing_proxies
            .lock()
            .unwrap()
            .contains(&request.proxy().address);
        if proxy_fails {
            return Err(AppError::fetch_failed(
                request.url(),
                FetchFailure::Transport("proxy refused connection".into()),
            ));
        }

        let outcome = self.outcomes.lock().unwrap().get(request.url()).cloned();
        match outcome {
            Some(Ok(html)) => Ok(Document::new(request.url(), self.kind, html)),
            Some(Err(failure)) => Err(AppError::fetch_failed(request.url(), failure)),
            None => Ok(Document::new(
                request.url(),
                self.kind,
                "<html><body>default</body></html>",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that emits one record per document carrying its URL.
#[derive(Clone)]
pub struct MockExtractor {
    empty: bool,
    failing_urls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    /// One `{"url": <document url>, "length": <html bytes>}` record per document.
    pub fn echo_url() -> Self {
        Self {
            empty: false,
            failing_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Never produces records.
    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Self::echo_url()
        }
    }

    pub fn failing_on(self, url: &str) -> Self {
        self.failing_urls.lock().unwrap().push(url.to_string());
        self
    }
}

impl Extractor for MockExtractor {
    fn extract(&self, document: &Document) -> Result<Vec<Record>, AppError> {
        if self.failing_urls.lock().unwrap().contains(&document.url) {
            return Err(AppError::Extraction(format!(
                "malformed document at {}",
                document.url
            )));
        }
        if self.empty {
            return Ok(vec![]);
        }
        let mut record = Record::new();
        record.insert("url".into(), document.url.clone().into());
        record.insert("length".into(), document.len().into());
        Ok(vec![record])
    }
}

// ---------------------------------------------------------------------------
// MockWriter
// ---------------------------------------------------------------------------

/// Recorded write: (records, format).
pub type WrittenBatch = (Vec<Record>, OutputFormat);

/// Mock writer that records every batch instead of touching the filesystem.
#[derive(Clone)]
pub struct MockWriter {
    written: Arc<Mutex<Vec<WrittenBatch>>>,
    error: Option<String>,
}

impl MockWriter {
    pub fn new() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            error: None,
        }
    }

    pub fn with_error(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn written(&self) -> Vec<WrittenBatch> {
        self.written.lock().unwrap().clone()
    }
}

impl ResultWriter for MockWriter {
    fn write(&self, records: &[Record], format: OutputFormat) -> Result<PathBuf, AppError> {
        if let Some(message) = &self.error {
            return Err(AppError::Output(message.clone()));
        }
        let mut written = self.written.lock().unwrap();
        written.push((records.to_vec(), format));
        Ok(PathBuf::from(format!(
            "output/results_{}.{}",
            written.len(),
            format.extension()
        )))
    }
}

// ---------------------------------------------------------------------------
// MockLoader
// ---------------------------------------------------------------------------

/// Mock source loader keyed by the source's display form.
///
/// Unknown sources fail like an unreachable URL or missing file would.
#[derive(Clone, Default)]
pub struct MockLoader {
    sources: Arc<Mutex<HashMap<String, String>>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(self, source: &str, text: &str) -> Self {
        self.sources
            .lock()
            .unwrap()
            .insert(source.to_string(), text.to_string());
        self
    }
}

impl SourceLoader for MockLoader {
    async fn load(&self, source: &ProxySource) -> Result<String, AppError> {
        self.sources
            .lock()
            .unwrap()
            .get(&source.to_string())
            .cloned()
            .ok_or_else(|| AppError::HarvestSource {
                source_name: source.to_string(),
                reason: "not found".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// MockProber
// ---------------------------------------------------------------------------

/// Mock prober returning a configured IP (or error) per candidate address.
///
/// Unconfigured candidates fail as if the connection was refused.
#[derive(Clone, Default)]
pub struct MockProber {
    answers: Arc<Mutex<HashMap<String, Result<String, String>>>>,
    probed: Arc<Mutex<Vec<String>>>,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ip(self, address: &str, reported_ip: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(address.to_string(), Ok(reported_ip.to_string()));
        self
    }

    pub fn with_error(self, address: &str, message: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(address.to_string(), Err(message.to_string()));
        self
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

impl ProxyProber for MockProber {
    async fn probe(&self, address: &str, _timeout: Duration) -> Result<String, AppError> {
        self.probed.lock().unwrap().push(address.to_string());
        let answer = self.answers.lock().unwrap().get(address).cloned();
        match answer {
            Some(Ok(ip)) => Ok(ip),
            Some(Err(message)) => Err(AppError::fetch_failed(
                "https://api.ipify.org",
                FetchFailure::Transport(message),
            )),
            None => Err(AppError::fetch_failed(
                "https://api.ipify.org",
                FetchFailure::Transport("connection refused".into()),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that keeps a compact trace of events for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
    phases: Mutex<Vec<RunPhase>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<RunPhase> {
        self.phases.lock().unwrap().clone()
    }
}

impl ScrapeReporter for RecordingReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        let line = match event {
            ScrapeEvent::Started { total } => format!("started:{total}"),
            ScrapeEvent::PhaseChanged { phase, .. } => {
                self.phases.lock().unwrap().push(phase);
                return;
            }
            ScrapeEvent::FetchSucceeded { url, .. } => format!("fetched:{url}"),
            ScrapeEvent::FetchFailed { url, .. } => format!("fetch_failed:{url}"),
            ScrapeEvent::Extracted { url, records } => format!("extracted:{url}:{records}"),
            ScrapeEvent::ExtractionFailed { url, .. } => format!("extraction_failed:{url}"),
            ScrapeEvent::Progress { completed, .. } => format!("progress:{completed}"),
            ScrapeEvent::PoolExhausted { skipped } => format!("pool_exhausted:{skipped}"),
            ScrapeEvent::Cancelled { skipped } => format!("cancelled:{skipped}"),
            ScrapeEvent::Saved { records, .. } => format!("saved:{records}"),
            ScrapeEvent::NothingToSave => "nothing_to_save".to_string(),
            ScrapeEvent::Finished { records, .. } => format!("finished:{records}"),
        };
        self.events.lock().unwrap().push(line);
    }
}
