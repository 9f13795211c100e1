/// Smoke-test for the rendered strategy.
///
/// Launches headless Chromium, renders <https://example.com> through the proxy
/// given as the first argument (`ip:port`), and prints the extracted links.
///
/// Run with:
///   cargo run -p hyperion-client --example browser_smoke --features browser -- 1.2.3.4:8080
use std::time::Duration;

use hyperion_client::{BrowserFetcher, FetcherOptions, LinkExtractor};
use hyperion_core::models::{FetchRequest, Proxy, StrategyKind};
use hyperion_core::traits::{Extractor, Fetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let address = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: browser_smoke <ip:port>"))?;

    println!("Launching headless browser…");
    let fetcher = BrowserFetcher::launch(&FetcherOptions::default()).await?;

    let request = FetchRequest::new(
        "https://example.com",
        Duration::from_secs(30),
        Proxy::validated(address),
        StrategyKind::Rendered,
    );
    println!("Rendering {} …", request.url());
    let document = fetcher.fetch(&request).await?;

    assert!(
        document.html.contains("Example Domain"),
        "Expected heading not found in rendered HTML"
    );

    for record in LinkExtractor::new().extract(&document)? {
        println!("{}", serde_json::Value::Object(record));
    }
    println!("OK: got {} bytes of rendered HTML", document.len());

    fetcher.close().await;
    Ok(())
}
