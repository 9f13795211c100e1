pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod scrape;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use config::{Capabilities, IpMatch, OutputFormat, PoolConfig, RetryPolicy, ScrapeConfig};
pub use error::{AppError, FetchFailure};
pub use models::{
    Document, FetchRequest, Proxy, ProxyHealth, ProxyProtocol, Record, RunSummary, ScrapeResult,
    StrategyKind,
};
pub use proxy::{PoolStats, ProxyHarvester, ProxyPool, ProxySource, ProxyValidator};
pub use scrape::{ScrapeEvent, ScrapeReporter, ScrapeService, TracingScrapeReporter};
pub use traits::{Extractor, Fetcher, ProxyProber, ResultWriter, SourceLoader};
