use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::OutputFormat;
use crate::error::AppError;
use crate::models::{Document, FetchRequest, Record, StrategyKind};
use crate::proxy::ProxySource;

/// Fetches a page through a proxy and returns it as a normalized [`Document`].
///
/// Implementations report every per-request failure as [`AppError::FetchFailed`]
/// so the orchestrator can apply one failure policy to all strategies.
pub trait Fetcher: Send + Sync + Clone {
    fn kind(&self) -> StrategyKind;

    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<Document, AppError>> + Send;

    /// Releases long-lived resources (e.g. a browser process). Default: nothing to do.
    fn close(self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Reads the raw text of one proxy source.
pub trait SourceLoader: Send + Sync + Clone {
    fn load(&self, source: &ProxySource)
    -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Sends a probe through a candidate proxy to an IP echo endpoint.
pub trait ProxyProber: Send + Sync + Clone {
    /// Returns the IP address the echo endpoint saw.
    fn probe(
        &self,
        address: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns a document into an ordered list of records.
pub trait Extractor: Send + Sync + Clone {
    fn extract(&self, document: &Document) -> Result<Vec<Record>, AppError>;
}

/// Persists the records of a run and returns the path written.
pub trait ResultWriter: Send + Sync + Clone {
    fn write(&self, records: &[Record], format: OutputFormat) -> Result<PathBuf, AppError>;
}
