use std::time::Duration;

use hyperion_core::error::{AppError, FetchFailure};
use hyperion_core::traits::ProxyProber;
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_ECHO_ENDPOINT: &str = "https://api.ipify.org?format=json";

#[derive(Deserialize)]
struct EchoResponse {
    ip: String,
}

/// Probes a candidate by asking an IP echo service, through the candidate,
/// which address it sees.
#[derive(Debug, Clone)]
pub struct IpEchoProber {
    endpoint: String,
}

impl IpEchoProber {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ECHO_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    fn failed(&self, reason: FetchFailure) -> AppError {
        AppError::fetch_failed(&self.endpoint, reason)
    }
}

impl Default for IpEchoProber {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyProber for IpEchoProber {
    async fn probe(&self, address: &str, timeout: Duration) -> Result<String, AppError> {
        let route = reqwest::Proxy::all(format!("http://{address}"))
            .map_err(|e| self.failed(FetchFailure::Transport(e.to_string())))?;
        let client = Client::builder()
            .proxy(route)
            .timeout(timeout)
            .build()
            .map_err(|e| self.failed(FetchFailure::Transport(e.to_string())))?;

        let response = client.get(&self.endpoint).send().await.map_err(|e| {
            self.failed(if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Transport(e.to_string())
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failed(FetchFailure::HttpStatus(status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.failed(FetchFailure::Transport(e.to_string())))?;
        let echo: EchoResponse = serde_json::from_str(&body)?;
        Ok(echo.ip)
    }
}
