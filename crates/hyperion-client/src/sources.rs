use std::time::Duration;

use hyperion_core::error::AppError;
use hyperion_core::proxy::ProxySource;
use hyperion_core::traits::SourceLoader;
use reqwest::Client;

const SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Loads proxy lists from URLs (direct connection) or local files.
#[derive(Clone)]
pub struct HttpSourceLoader {
    client: Client,
}

impl HttpSourceLoader {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(SOURCE_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch_remote(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        response.text().await.map_err(|e| e.to_string())
    }
}

impl SourceLoader for HttpSourceLoader {
    async fn load(&self, source: &ProxySource) -> Result<String, AppError> {
        let loaded = match source {
            ProxySource::Remote(url) => self.fetch_remote(url).await,
            ProxySource::Local(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| e.to_string()),
        };

        loaded.map_err(|reason| AppError::HarvestSource {
            source_name: source.to_string(),
            reason,
        })
    }
}
