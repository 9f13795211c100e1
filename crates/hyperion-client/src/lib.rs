#[cfg(feature = "browser")]
pub mod browser_fetcher;
pub mod extractor;
pub mod fetcher;
pub mod probe;
pub mod sources;
pub mod strategy;
pub mod writer;

#[cfg(test)]
mod test_server;

#[cfg(feature = "browser")]
pub use browser_fetcher::BrowserFetcher;
pub use extractor::LinkExtractor;
pub use fetcher::{DEFAULT_USER_AGENT, DirectFetcher};
pub use probe::{DEFAULT_ECHO_ENDPOINT, IpEchoProber};
pub use sources::HttpSourceLoader;
pub use strategy::{AnyFetcher, FetcherOptions, capabilities};
pub use writer::FileWriter;
