use crate::{ScrapingResult, Scraper};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Runs independent scrapes concurrently, each on its own browser session.
pub struct BatchScraper {
    scraper: Arc<Scraper>,
    concurrency: usize,
}

impl BatchScraper {
    pub fn new(scraper: Arc<Scraper>, concurrency: usize) -> Self {
        Self {
            scraper,
            concurrency: concurrency.max(1),
        }
    }

    /// One slot per CPU.
    pub fn with_default_concurrency(scraper: Arc<Scraper>) -> Self {
        Self::new(scraper, num_cpus::get())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Scrapes every URL and returns the results in input order.
    pub async fn run(&self, urls: Vec<String>, tracker: Arc<ProgressTracker>) -> Vec<ScrapingResult> {
        info!(
            "Processing batch of {} URLs with concurrency {}",
            urls.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let max_attempts = self.scraper.config().retry.max_attempts;

        let tasks = urls.into_iter().map(|url| {
            let semaphore = semaphore.clone();
            let scraper = self.scraper.clone();
            let tracker = tracker.clone();

            async move {
                let _permit = semaphore.acquire().await;
                let result = scraper.scrape(&url, max_attempts).await;

                tracker.record_completion(result.success);
                if result.success {
                    debug!("Scraped {} in {}ms", url, result.duration_ms);
                } else {
                    warn!("Failed to scrape {}: {:?}", url, result.error_message);
                }
                result
            }
        });

        join_all(tasks).await
    }
}

pub struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_completion(&self, success: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_progress(&self) -> ProgressInfo {
        let completed = self.completed.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed();

        let rate = if elapsed.as_secs_f64() > 0.0 {
            completed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let eta = if completed > 0 && rate > 0.0 {
            let remaining = self.total.saturating_sub(completed);
            Some(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            None
        };

        ProgressInfo {
            total: self.total,
            completed,
            errors,
            success: completed - errors,
            elapsed,
            rate,
            eta,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Relaxed) >= self.total
    }
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub total: usize,
    pub completed: usize,
    pub errors: usize,
    pub success: usize,
    pub elapsed: Duration,
    pub rate: f64,
    pub eta: Option<Duration>,
}

impl ProgressInfo {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }
}
