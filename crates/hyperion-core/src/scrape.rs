use tokio_util::sync::CancellationToken;

use crate::config::{Capabilities, ScrapeConfig};
use crate::error::{AppError, FetchFailure};
use crate::models::{FetchRequest, RunSummary, ScrapeResult};
use crate::proxy::ProxyPool;
use crate::traits::{Extractor, Fetcher, ResultWriter};

/// Orchestrator phase. Per URL: `Fetching -> Extracting -> Idle`; then `Saving -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Extracting,
    Saving,
    Done,
}

/// Events emitted during a run for progress reporting and logging.
#[derive(Debug, Clone)]
pub enum ScrapeEvent<'a> {
    Started {
        total: usize,
    },
    PhaseChanged {
        phase: RunPhase,
        url: Option<&'a str>,
    },
    FetchSucceeded {
        url: &'a str,
        proxy: &'a str,
        bytes: usize,
    },
    FetchFailed {
        url: &'a str,
        proxy: &'a str,
        reason: Option<&'a FetchFailure>,
        error: &'a str,
    },
    Extracted {
        url: &'a str,
        records: usize,
    },
    ExtractionFailed {
        url: &'a str,
        error: &'a str,
    },
    /// Fire-and-forget progress update.
    Progress {
        description: &'a str,
        completed: usize,
        total: usize,
    },
    PoolExhausted {
        skipped: usize,
    },
    Cancelled {
        skipped: usize,
    },
    Saved {
        path: &'a std::path::Path,
        records: usize,
    },
    NothingToSave,
    Finished {
        succeeded: usize,
        failed: usize,
        records: usize,
    },
}

/// Receives run events. Reporters observe; they cannot change the run.
pub trait ScrapeReporter: Send + Sync {
    fn report(&self, event: ScrapeEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ScrapeReporter for NullReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingScrapeReporter;

impl ScrapeReporter for TracingScrapeReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        match event {
            ScrapeEvent::Started { total } => {
                tracing::info!(%total, "Scrape run started");
            }
            ScrapeEvent::PhaseChanged { phase, url } => {
                tracing::trace!(?phase, ?url, "Phase changed");
            }
            ScrapeEvent::FetchSucceeded { url, proxy, bytes } => {
                tracing::info!(%url, %proxy, %bytes, "Fetched page");
            }
            ScrapeEvent::FetchFailed {
                url, proxy, error, ..
            } => {
                tracing::error!(%url, %proxy, %error, "Fetch failed");
            }
            ScrapeEvent::Extracted { url, records } => {
                tracing::info!(%url, %records, "Extracted records");
            }
            ScrapeEvent::ExtractionFailed { url, error } => {
                tracing::warn!(%url, %error, "Extraction failed, no records kept");
            }
            ScrapeEvent::Progress {
                description,
                completed,
                total,
            } => {
                tracing::debug!(%completed, %total, "{description}");
            }
            ScrapeEvent::PoolExhausted { skipped } => {
                tracing::error!(%skipped, "Proxy pool exhausted, aborting remaining URLs");
            }
            ScrapeEvent::Cancelled { skipped } => {
                tracing::warn!(%skipped, "Run cancelled, skipping remaining URLs");
            }
            ScrapeEvent::Saved { path, records } => {
                tracing::info!(path = %path.display(), %records, "Results saved");
            }
            ScrapeEvent::NothingToSave => {
                tracing::info!("No records extracted, nothing saved");
            }
            ScrapeEvent::Finished {
                succeeded,
                failed,
                records,
            } => {
                tracing::info!(%succeeded, %failed, %records, "Scrape run finished");
            }
        }
    }
}

/// Drives a run: rotate proxy → fetch → extract → accumulate, then save once.
///
/// Generic over all external collaborators via traits, so runs can be tested
/// without real HTTP, browsers, or files. URLs are processed sequentially;
/// per-URL failures are never fatal.
pub struct ScrapeService<F, E, W>
where
    F: Fetcher,
    E: Extractor,
    W: ResultWriter,
{
    fetcher: F,
    extractor: E,
    writer: W,
    pool: ProxyPool,
    config: ScrapeConfig,
    capabilities: Capabilities,
}

impl<F, E, W> ScrapeService<F, E, W>
where
    F: Fetcher,
    E: Extractor,
    W: ResultWriter,
{
    pub fn new(
        fetcher: F,
        extractor: E,
        writer: W,
        pool: ProxyPool,
        config: ScrapeConfig,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            writer,
            pool,
            config,
            capabilities,
        }
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    /// Process every URL and save whatever was collected.
    ///
    /// Returns an error only for fatal conditions: an unsupported strategy,
    /// invalid configuration (including a fetcher that does not match the
    /// configured strategy), or a failed write. Pool exhaustion stops the
    /// remaining URLs but results gathered so far are still saved.
    pub async fn run<R: ScrapeReporter>(
        &self,
        urls: &[String],
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Result<RunSummary, AppError> {
        self.config.validate()?;
        self.capabilities.ensure(self.config.strategy)?;
        if self.fetcher.kind() != self.config.strategy {
            return Err(AppError::Config(format!(
                "configured for {} fetching but the fetcher is {}",
                self.config.strategy,
                self.fetcher.kind()
            )));
        }

        let total = urls.len();
        let mut results = ScrapeResult::new();
        let mut summary = RunSummary {
            urls_total: total,
            ..RunSummary::default()
        };

        reporter.report(ScrapeEvent::Started { total });

        for (index, url) in urls.iter().enumerate() {
            let url = url.as_str();
            if cancel_token.is_cancelled() {
                summary.urls_skipped = total - index;
                summary.aborted = true;
                reporter.report(ScrapeEvent::Cancelled {
                    skipped: summary.urls_skipped,
                });
                break;
            }

            reporter.report(ScrapeEvent::PhaseChanged {
                phase: RunPhase::Fetching,
                url: Some(url),
            });
            let description = format!("Processing {url}");
            reporter.report(ScrapeEvent::Progress {
                description: &description,
                completed: index,
                total,
            });

            let proxy = match self.pool.next() {
                Ok(proxy) => proxy,
                Err(_) => {
                    summary.urls_skipped = total - index;
                    summary.aborted = true;
                    reporter.report(ScrapeEvent::PoolExhausted {
                        skipped: summary.urls_skipped,
                    });
                    break;
                }
            };

            let request = FetchRequest::new(
                url,
                self.config.timeout,
                proxy.clone(),
                self.config.strategy,
            );

            let fetched = tokio::select! {
                result = self.fetcher.fetch(&request) => Some(result),
                () = cancel_token.cancelled() => None,
            };

            let document = match fetched {
                None => {
                    summary.urls_skipped = total - index;
                    summary.aborted = true;
                    reporter.report(ScrapeEvent::Cancelled {
                        skipped: summary.urls_skipped,
                    });
                    break;
                }
                Some(Ok(document)) => document,
                Some(Err(e)) => {
                    self.pool.report_failure(&proxy);
                    summary.urls_failed += 1;
                    let error = e.to_string();
                    reporter.report(ScrapeEvent::FetchFailed {
                        url,
                        proxy: &proxy.address,
                        reason: e.fetch_failure(),
                        error: &error,
                    });
                    reporter.report(ScrapeEvent::PhaseChanged {
                        phase: RunPhase::Idle,
                        url: None,
                    });
                    continue;
                }
            };

            self.pool.report_success(&proxy);
            summary.urls_succeeded += 1;
            reporter.report(ScrapeEvent::FetchSucceeded {
                url,
                proxy: &proxy.address,
                bytes: document.len(),
            });

            reporter.report(ScrapeEvent::PhaseChanged {
                phase: RunPhase::Extracting,
                url: Some(url),
            });
            match self.extractor.extract(&document) {
                Ok(records) => {
                    reporter.report(ScrapeEvent::Extracted {
                        url,
                        records: records.len(),
                    });
                    results.extend(records);
                }
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(ScrapeEvent::ExtractionFailed { url, error: &error });
                }
            }

            reporter.report(ScrapeEvent::PhaseChanged {
                phase: RunPhase::Idle,
                url: None,
            });
        }

        let completed = summary.urls_succeeded + summary.urls_failed;
        reporter.report(ScrapeEvent::Progress {
            description: "Saving results",
            completed,
            total,
        });
        reporter.report(ScrapeEvent::PhaseChanged {
            phase: RunPhase::Saving,
            url: None,
        });

        if results.is_empty() {
            reporter.report(ScrapeEvent::NothingToSave);
        } else {
            let path = self.writer.write(results.records(), self.config.format)?;
            reporter.report(ScrapeEvent::Saved {
                path: &path,
                records: results.len(),
            });
            summary.output_path = Some(path);
        }

        reporter.report(ScrapeEvent::PhaseChanged {
            phase: RunPhase::Done,
            url: None,
        });
        reporter.report(ScrapeEvent::Finished {
            succeeded: summary.urls_succeeded,
            failed: summary.urls_failed,
            records: results.len(),
        });

        summary.records = results;
        Ok(summary)
    }

    /// Tears down the fetcher's long-lived resources (e.g. the browser process).
    pub async fn shutdown(self) {
        self.fetcher.close().await;
    }
}
