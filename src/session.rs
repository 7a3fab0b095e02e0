//! Browser session lifecycle
//!
//! A session owns one browser connection and exactly one isolated context.
//! It is created for a single attempt and released at the end of it.

use crate::browser::{BrowserConnection, BrowserLauncher, BrowsingContext, ScrapePage};
use crate::{DiagnosticSink, LogLevel, ScrapeError, ScraperConfig};
use std::sync::Arc;

pub struct BrowserSession {
    browser: Option<Box<dyn BrowserConnection>>,
    context: Option<Box<dyn BrowsingContext>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl BrowserSession {
    /// A session with nothing acquired yet; releasing it is a no-op.
    pub fn empty(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            browser: None,
            context: None,
            sink,
        }
    }

    /// Connects or launches a browser, then opens the session's context.
    ///
    /// Anything acquired before a failure stays owned by the session so a
    /// later `release` still closes it.
    pub async fn acquire(
        &mut self,
        launcher: &dyn BrowserLauncher,
        config: &ScraperConfig,
    ) -> Result<(), ScrapeError> {
        let mode = config.connection_mode();

        let browser = match launcher.launch(&mode).await {
            Ok(browser) => self.browser.insert(browser),
            Err(e) => {
                self.sink
                    .log(LogLevel::Error, &format!("Browser initialization failed: {}", e));
                return Err(e);
            }
        };

        match browser.new_context(&config.context_options()).await {
            Ok(context) => {
                self.context = Some(context);
                Ok(())
            }
            Err(e) => {
                self.sink
                    .log(LogLevel::Error, &format!("Browser initialization failed: {}", e));
                Err(e)
            }
        }
    }

    pub fn is_acquired(&self) -> bool {
        self.context.is_some()
    }

    pub async fn new_page(&self) -> Result<Box<dyn ScrapePage>, ScrapeError> {
        match &self.context {
            Some(context) => context.new_page().await,
            None => {
                self.sink.log(LogLevel::Error, "Browser context is not initialized");
                Err(ScrapeError::ContextUnavailable)
            }
        }
    }

    /// Closes the context, then the browser. Each close is attempted even if
    /// the other fails; failures are logged and counted, never returned.
    pub async fn release(&mut self) -> usize {
        let mut failures = 0;

        if let Some(mut context) = self.context.take() {
            if let Err(e) = context.close().await {
                failures += 1;
                self.sink
                    .log(LogLevel::Error, &format!("Browser cleanup failed: {}", e));
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                failures += 1;
                self.sink
                    .log(LogLevel::Error, &format!("Browser cleanup failed: {}", e));
            }
        }

        failures
    }
}
