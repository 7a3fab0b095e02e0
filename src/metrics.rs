use metrics::{register_counter, register_histogram, Counter, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Scrape counters, published through the `metrics` facade.
///
/// Handles are registered at construction, so a recorder installed later
/// will not see them. Local tallies back `snapshot()` independently of
/// whichever recorder is active.
pub struct ScrapeMetrics {
    scrapes_succeeded: Counter,
    scrapes_failed: Counter,
    scrape_attempts: Counter,
    scrape_retries: Counter,
    step_failures: Counter,
    cleanup_failures: Counter,
    scrape_duration: Histogram,
    tallies: Tallies,
}

#[derive(Default)]
struct Tallies {
    succeeded: AtomicU64,
    failed: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    step_failures: AtomicU64,
    cleanup_failures: AtomicU64,
}

impl ScrapeMetrics {
    pub fn new() -> Self {
        Self {
            scrapes_succeeded: register_counter!("design_scraper_scrapes_succeeded"),
            scrapes_failed: register_counter!("design_scraper_scrapes_failed"),
            scrape_attempts: register_counter!("design_scraper_scrape_attempts"),
            scrape_retries: register_counter!("design_scraper_scrape_retries"),
            step_failures: register_counter!("design_scraper_step_failures"),
            cleanup_failures: register_counter!("design_scraper_cleanup_failures"),
            scrape_duration: register_histogram!("design_scraper_scrape_duration_seconds"),
            tallies: Tallies::default(),
        }
    }

    pub fn record_scrape(&self, duration: Duration, success: bool) {
        if success {
            self.scrapes_succeeded.increment(1);
            self.tallies.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.scrapes_failed.increment(1);
            self.tallies.failed.fetch_add(1, Ordering::Relaxed);
        }

        self.scrape_duration.record(duration.as_secs_f64());
    }

    pub fn record_attempt(&self) {
        self.scrape_attempts.increment(1);
        self.tallies.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.scrape_retries.increment(1);
        self.tallies.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_step_failures(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.step_failures.increment(count as u64);
        self.tallies
            .step_failures
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_cleanup_failures(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.cleanup_failures.increment(count as u64);
        self.tallies
            .cleanup_failures
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scrapes_succeeded: self.tallies.succeeded.load(Ordering::Relaxed),
            scrapes_failed: self.tallies.failed.load(Ordering::Relaxed),
            scrape_attempts: self.tallies.attempts.load(Ordering::Relaxed),
            scrape_retries: self.tallies.retries.load(Ordering::Relaxed),
            step_failures: self.tallies.step_failures.load(Ordering::Relaxed),
            cleanup_failures: self.tallies.cleanup_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for ScrapeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub scrapes_succeeded: u64,
    pub scrapes_failed: u64,
    pub scrape_attempts: u64,
    pub scrape_retries: u64,
    pub step_failures: u64,
    pub cleanup_failures: u64,
}

/// Installs the global Prometheus recorder. Must run before any
/// `ScrapeMetrics` is constructed for its handles to be exported.
pub fn install_prometheus() -> Result<PrometheusHandle, crate::ScrapeError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| crate::ScrapeError::Configuration(format!("metrics recorder: {}", e)))
}
