use hyperion_core::{ScrapeEvent, ScrapeReporter, TracingScrapeReporter};
use indicatif::{ProgressBar, ProgressStyle};

/// Terminal progress bar that also forwards every event to the tracing reporter.
pub struct ProgressReporter {
    bar: ProgressBar,
    inner: TracingScrapeReporter,
}

impl ProgressReporter {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self {
            bar,
            inner: TracingScrapeReporter,
        }
    }
}

impl ScrapeReporter for ProgressReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        match &event {
            ScrapeEvent::Progress {
                description,
                completed,
                total,
            } => {
                self.bar.set_length(*total as u64);
                self.bar.set_position(*completed as u64);
                self.bar.set_message(description.to_string());
            }
            ScrapeEvent::Finished { .. } => {
                self.bar.finish_and_clear();
            }
            _ => {}
        }
        // Keep log lines from tearing the bar.
        self.bar.suspend(|| self.inner.report(event));
    }
}
