mod progress;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use hyperion_client::{
    AnyFetcher, FetcherOptions, FileWriter, HttpSourceLoader, IpEchoProber, LinkExtractor,
    capabilities,
};
use hyperion_core::{
    IpMatch, OutputFormat, PoolConfig, ProxyPool, ProxySource, RetryPolicy, RunSummary,
    ScrapeConfig, ScrapeService, StrategyKind, TracingScrapeReporter,
};

use crate::progress::ProgressReporter;

#[derive(Parser, Debug)]
#[command(name = "hyperion", version, about = "Proxy-rotating web scraper")]
struct Cli {
    /// Target URLs, scraped in order
    #[arg(short, long = "urls", num_args = 1.., required = true)]
    urls: Vec<String>,

    /// Render pages in headless Chromium instead of plain HTTP
    #[arg(short, long, env = "HYPERION_DYNAMIC", default_value_t = false)]
    dynamic: bool,

    /// Output format (csv or json)
    #[arg(short, long, env = "HYPERION_FORMAT", default_value = "csv")]
    format: OutputFormat,

    /// Proxy list source: a local file or an http(s) URL. Repeatable.
    #[arg(
        short = 'p',
        long = "proxy-file",
        env = "HYPERION_PROXY_FILE",
        value_delimiter = ',',
        default_value = "proxies.txt"
    )]
    proxy_sources: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(
        short,
        long,
        env = "HYPERION_TIMEOUT",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Directory results are written to
    #[arg(short, long, env = "HYPERION_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Consecutive failures before a proxy is banned
    #[arg(long, env = "HYPERION_FAILURE_THRESHOLD", default_value_t = 3)]
    failure_threshold: u32,

    /// Candidates probed concurrently during validation
    #[arg(long, env = "HYPERION_VALIDATION_CONCURRENCY", default_value_t = 32)]
    validation_concurrency: usize,

    /// Require the echoed IP to equal the proxy host (default: substring match)
    #[arg(long, default_value_t = false)]
    exact_ip_match: bool,

    /// Resolve relative link URLs against the page URL
    #[arg(long, default_value_t = false)]
    resolve_links: bool,

    /// Chrome/Chromium binary for --dynamic
    #[arg(long, env = "CHROME_BIN")]
    chrome_bin: Option<PathBuf>,

    /// Log file (appended to)
    #[arg(long, env = "HYPERION_LOG_FILE", default_value = "hyperion_scraper.log")]
    log_file: PathBuf,

    /// Log to stderr only
    #[arg(long, default_value_t = false)]
    no_log_file: bool,

    /// Disable the progress bar
    #[arg(long, default_value_t = false)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli)?;

    let summary = run(cli).await?;

    if summary.records.is_empty() {
        tracing::warn!("No data extracted");
    } else {
        tracing::info!("Successfully extracted {} items", summary.records.len());
    }
    if let Some(path) = &summary.output_path {
        tracing::info!("Results saved to {}", path.display());
    }

    Ok(())
}

/// Stderr sink plus an optional append-mode file sink, both behind one filter.
fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("hyperion=info".parse()?);

    let file_layer = if cli.no_log_file {
        None
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cli.log_file)
            .with_context(|| format!("Failed to open log file {}", cli.log_file.display()))?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}

async fn run(cli: Cli) -> Result<RunSummary> {
    let strategy = if cli.dynamic {
        StrategyKind::Rendered
    } else {
        StrategyKind::Direct
    };
    // Fail before spending time on proxy validation.
    capabilities().ensure(strategy)?;

    // 1. Harvest and validate proxies
    let pool_config = PoolConfig::default()
        .with_failure_threshold(cli.failure_threshold)
        .with_validation_concurrency(cli.validation_concurrency)
        .with_ip_match(if cli.exact_ip_match {
            IpMatch::Exact
        } else {
            IpMatch::Substring
        });
    let sources: Vec<ProxySource> = cli
        .proxy_sources
        .iter()
        .map(|s| ProxySource::parse(s))
        .collect();

    let loader = HttpSourceLoader::new()?;
    let pool = ProxyPool::assemble(loader, IpEchoProber::new(), &sources, &pool_config)
        .await
        .context("Failed to assemble proxy pool")?;
    if pool.is_empty() {
        tracing::warn!("No valid proxies found; every URL will be skipped");
    }

    // 2. Build the fetcher for the selected strategy
    let options = FetcherOptions {
        chrome_executable: cli.chrome_bin.clone(),
        user_agent: None,
    };
    let fetcher = AnyFetcher::for_strategy(strategy, RetryPolicy::default(), &options)
        .await
        .context("Failed to initialise fetcher")?;

    let config = ScrapeConfig::default()
        .with_strategy(strategy)
        .with_format(cli.format)
        .with_timeout(Duration::from_secs(cli.timeout));
    let service = ScrapeService::new(
        fetcher,
        LinkExtractor::new().with_relative_resolution(cli.resolve_links),
        FileWriter::new(&cli.output_dir),
        pool,
        config,
        capabilities(),
    );

    // 3. Run with Ctrl-C mapped to cooperative cancellation
    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            signal_token.cancel();
        }
    });

    let result = if cli.no_progress {
        service
            .run(&cli.urls, cancel_token, &TracingScrapeReporter)
            .await
    } else {
        let reporter = ProgressReporter::new(cli.urls.len());
        service.run(&cli.urls, cancel_token, &reporter).await
    };

    let stats = service.pool().stats();
    tracing::info!(
        total = stats.total,
        active = stats.active,
        banned = stats.banned,
        "Proxy pool status"
    );
    service.shutdown().await;

    result.context("Scrape run failed")
}
