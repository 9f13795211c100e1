use std::time::Duration;

use hyperion_core::error::{AppError, FetchFailure};
use hyperion_core::models::{Document, FetchRequest, Proxy, StrategyKind};
use hyperion_core::traits::Fetcher;
use hyperion_core::RetryPolicy;
use moka::future::Cache;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

const MAX_CACHED_CLIENTS: u64 = 512;
const CLIENT_IDLE_TTL: Duration = Duration::from_secs(600);

/// HTTP fetcher using reqwest, routed through the request's proxy.
///
/// reqwest binds proxies at client construction, so one client is built per
/// proxy address and cached. Transient failures (timeouts, transport errors,
/// 429/5xx) are retried with exponential backoff per [`RetryPolicy`]; any
/// other error status fails immediately.
#[derive(Clone)]
pub struct DirectFetcher {
    clients: Cache<String, Client>,
    retry: RetryPolicy,
    user_agent: String,
}

/// Outcome of one attempt that did not produce a body.
struct AttemptFailure {
    reason: FetchFailure,
    retry_after: Option<Duration>,
}

impl From<FetchFailure> for AttemptFailure {
    fn from(reason: FetchFailure) -> Self {
        Self {
            reason,
            retry_after: None,
        }
    }
}

impl DirectFetcher {
    pub fn new() -> Self {
        Self {
            clients: Cache::builder()
                .max_capacity(MAX_CACHED_CLIENTS)
                .time_to_idle(CLIENT_IDLE_TTL)
                .build(),
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    async fn client_for(&self, proxy: &Proxy) -> Result<Client, FetchFailure> {
        if let Some(client) = self.clients.get(&proxy.address).await {
            return Ok(client);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let route = reqwest::Proxy::all(proxy.url())
            .map_err(|e| FetchFailure::Transport(format!("Invalid proxy {proxy}: {e}")))?;
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .default_headers(headers)
            .proxy(route)
            .build()
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        self.clients
            .insert(proxy.address.clone(), client.clone())
            .await;
        Ok(client)
    }

    async fn attempt(&self, client: &Client, request: &FetchRequest) -> Result<String, AttemptFailure> {
        let response = client
            .get(request.url())
            .timeout(request.timeout())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure {
                reason: FetchFailure::HttpStatus(status.as_u16()),
                retry_after: retry_after(&response),
            });
        }

        response
            .text()
            .await
            .map_err(|e| AttemptFailure::from(classify(e)))
    }
}

impl Default for DirectFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for DirectFetcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Document, AppError> {
        let url = request.url();
        validate_target(url).map_err(|reason| AppError::fetch_failed(url, reason))?;

        let client = self
            .client_for(request.proxy())
            .await
            .map_err(|reason| AppError::fetch_failed(url, reason))?;

        let mut attempt = 1;
        loop {
            let failure = match self.attempt(&client, request).await {
                Ok(html) => return Ok(Document::new(url, StrategyKind::Direct, html)),
                Err(failure) => failure,
            };

            if !self.retry.should_retry(&failure.reason) || attempt >= self.retry.max_attempts {
                return Err(AppError::fetch_failed(url, failure.reason));
            }

            let delay = failure
                .retry_after
                .map(|d| d.min(self.retry.max_backoff))
                .unwrap_or_else(|| self.retry.backoff_for_attempt(attempt));
            tracing::warn!(
                %url,
                proxy = %request.proxy(),
                attempt,
                reason = %failure.reason,
                delay_ms = %delay.as_millis(),
                "Retrying fetch"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn classify(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else if e.is_connect() {
        FetchFailure::Transport(format!("Connection failed: {e}"))
    } else {
        FetchFailure::Transport(e.to_string())
    }
}

/// Numeric `Retry-After` on 429/503 responses.
fn retry_after(response: &Response) -> Option<Duration> {
    let status = response.status().as_u16();
    if status != 429 && status != 503 {
        return None;
    }
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Only absolute `http`/`https` URLs can be fetched.
fn validate_target(url: &str) -> Result<(), FetchFailure> {
    let parsed =
        Url::parse(url).map_err(|e| FetchFailure::Transport(format!("Invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(FetchFailure::Transport(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}
