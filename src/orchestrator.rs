//! Retry orchestration
//!
//! `Scraper::scrape` is the entry point of the crate. It validates the URL,
//! then runs attempts (acquire, extract, assemble, release) until one
//! succeeds or the attempt budget is spent, sleeping with exponential
//! backoff and jitter in between. It always returns a `ScrapingResult`.

use crate::browser::BrowserLauncher;
use crate::chrome::ChromeLauncher;
use crate::extractor::PageExtractor;
use crate::result::{ResultAssembler, ScrapingResult};
use crate::scripts::ScriptBundle;
use crate::session::BrowserSession;
use crate::{
    is_valid_url, DiagnosticSink, LogLevel, ScrapeError, ScrapeMetrics, ScraperConfig,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;

enum AttemptState {
    Validating,
    Attempting { attempt: usize },
    Retrying { attempt: usize },
    Succeeded(ScrapingResult),
    Failed(String),
}

pub struct Scraper {
    launcher: Arc<dyn BrowserLauncher>,
    config: ScraperConfig,
    extractor: PageExtractor,
    sink: Arc<dyn DiagnosticSink>,
    metrics: Arc<ScrapeMetrics>,
}

impl Scraper {
    pub fn new(
        config: ScraperConfig,
        launcher: Arc<dyn BrowserLauncher>,
        scripts: ScriptBundle,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let extractor = PageExtractor::new(config.clone(), scripts, sink.clone());

        Self {
            launcher,
            config,
            extractor,
            sink,
            metrics: Arc::new(ScrapeMetrics::new()),
        }
    }

    /// Scraper driving real Chrome, with scripts from `config.scripts_dir`
    /// or the built-in bundle.
    pub fn with_chrome(config: ScraperConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self, ScrapeError> {
        config.validate()?;
        let scripts = ScriptBundle::load(config.scripts_dir.as_deref())?;
        let launcher = Arc::new(ChromeLauncher::new(config.clone(), sink.clone()));

        Ok(Self::new(config, launcher, scripts, sink))
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ScrapeMetrics> {
        self.metrics.clone()
    }

    /// Scrapes `url`, making at most `max_retries` attempts.
    pub async fn scrape(&self, url: &str, max_retries: usize) -> ScrapingResult {
        let started = Instant::now();
        let mut attempts = 0;
        let mut state = AttemptState::Validating;

        loop {
            state = match state {
                AttemptState::Validating => {
                    if !is_valid_url(url) {
                        self.sink
                            .log(LogLevel::Error, &format!("Invalid URL: {}", url));
                        AttemptState::Failed(ScrapeError::InvalidUrl(url.to_string()).to_string())
                    } else if max_retries == 0 {
                        AttemptState::Failed(ScrapeError::MaxRetriesExceeded.to_string())
                    } else {
                        AttemptState::Attempting { attempt: 0 }
                    }
                }
                AttemptState::Attempting { attempt } => {
                    attempts = attempt + 1;
                    self.metrics.record_attempt();
                    self.sink.log(
                        LogLevel::Info,
                        &format!("Scraping {} (attempt {}/{})", url, attempts, max_retries),
                    );

                    match self.run_attempt(url).await {
                        Ok(result) => AttemptState::Succeeded(result),
                        Err(e) => {
                            self.sink.log(
                                LogLevel::Error,
                                &format!(
                                    "Attempt {} failed ({:?}): {}",
                                    attempts,
                                    e.category(),
                                    e
                                ),
                            );
                            if attempts >= max_retries {
                                AttemptState::Failed(e.to_string())
                            } else {
                                AttemptState::Retrying { attempt }
                            }
                        }
                    }
                }
                AttemptState::Retrying { attempt } => {
                    let delay = self.config.retry.backoff(attempt, &mut rand::thread_rng());
                    self.metrics.record_retry();
                    self.sink.log(
                        LogLevel::Debug,
                        &format!("Retrying {} in {:?}", url, delay),
                    );
                    sleep(delay).await;
                    AttemptState::Attempting {
                        attempt: attempt + 1,
                    }
                }
                AttemptState::Succeeded(result) => {
                    let elapsed = started.elapsed();
                    self.metrics.record_scrape(elapsed, true);
                    self.sink.log(
                        LogLevel::Info,
                        &format!("Scraped {} in {} attempt(s)", url, attempts),
                    );
                    return result.with_run_info(attempts, elapsed);
                }
                AttemptState::Failed(message) => {
                    let elapsed = started.elapsed();
                    self.metrics.record_scrape(elapsed, false);
                    return ResultAssembler::failure(url, message).with_run_info(attempts, elapsed);
                }
            };
        }
    }

    /// One attempt on a fresh session. The session is released only after
    /// the result has been assembled, on every path.
    async fn run_attempt(&self, url: &str) -> Result<ScrapingResult, ScrapeError> {
        let mut session = BrowserSession::empty(self.sink.clone());

        let outcome = self.acquire_and_extract(&mut session, url).await;

        let cleanup_failures = session.release().await;
        self.metrics.record_cleanup_failures(cleanup_failures);

        outcome
    }

    async fn acquire_and_extract(
        &self,
        session: &mut BrowserSession,
        url: &str,
    ) -> Result<ScrapingResult, ScrapeError> {
        session.acquire(self.launcher.as_ref(), &self.config).await?;

        let page = session.new_page().await?;
        let raw = self.extractor.extract(page.as_ref(), url).await?;
        self.metrics.record_step_failures(raw.degraded_steps);

        Ok(ResultAssembler::success(url, raw))
    }
}
