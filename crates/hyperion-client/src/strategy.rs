use std::path::PathBuf;

use hyperion_core::config::{Capabilities, RetryPolicy};
use hyperion_core::error::AppError;
use hyperion_core::models::{Document, FetchRequest, StrategyKind};
use hyperion_core::traits::Fetcher;

#[cfg(feature = "browser")]
use crate::browser_fetcher::BrowserFetcher;
use crate::fetcher::DirectFetcher;

/// Fetcher settings shared by both strategies.
#[derive(Debug, Clone, Default)]
pub struct FetcherOptions {
    /// Explicit Chrome/Chromium binary. Falls back to `CHROME_BIN` and well-known paths.
    pub chrome_executable: Option<PathBuf>,
    /// Overrides the default desktop Chrome user agent.
    pub user_agent: Option<String>,
}

/// Strategies compiled into this build.
pub fn capabilities() -> Capabilities {
    Capabilities {
        rendered: cfg!(feature = "browser"),
    }
}

/// The fetcher selected for a run, dispatched statically.
#[derive(Clone)]
pub enum AnyFetcher {
    Direct(DirectFetcher),
    #[cfg(feature = "browser")]
    Rendered(BrowserFetcher),
}

impl AnyFetcher {
    /// Builds the fetcher for `kind`.
    ///
    /// `Rendered` launches a browser, and fails with
    /// [`AppError::UnsupportedStrategy`] in builds without the `browser` feature.
    pub async fn for_strategy(
        kind: StrategyKind,
        retry: RetryPolicy,
        options: &FetcherOptions,
    ) -> Result<Self, AppError> {
        match kind {
            StrategyKind::Direct => {
                let mut fetcher = DirectFetcher::new().with_retry_policy(retry);
                if let Some(user_agent) = &options.user_agent {
                    fetcher = fetcher.with_user_agent(user_agent.clone());
                }
                Ok(AnyFetcher::Direct(fetcher))
            }
            StrategyKind::Rendered => launch_browser(options).await,
        }
    }
}

#[cfg(feature = "browser")]
async fn launch_browser(options: &FetcherOptions) -> Result<AnyFetcher, AppError> {
    BrowserFetcher::launch(options)
        .await
        .map(AnyFetcher::Rendered)
}

#[cfg(not(feature = "browser"))]
async fn launch_browser(_options: &FetcherOptions) -> Result<AnyFetcher, AppError> {
    Err(AppError::UnsupportedStrategy(
        "rendered fetching requires a build with the `browser` feature".into(),
    ))
}

impl Fetcher for AnyFetcher {
    fn kind(&self) -> StrategyKind {
        match self {
            AnyFetcher::Direct(f) => f.kind(),
            #[cfg(feature = "browser")]
            AnyFetcher::Rendered(f) => f.kind(),
        }
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Document, AppError> {
        match self {
            AnyFetcher::Direct(f) => f.fetch(request).await,
            #[cfg(feature = "browser")]
            AnyFetcher::Rendered(f) => f.fetch(request).await,
        }
    }

    async fn close(self) {
        match self {
            AnyFetcher::Direct(f) => f.close().await,
            #[cfg(feature = "browser")]
            AnyFetcher::Rendered(f) => f.close().await,
        }
    }
}
