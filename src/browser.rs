//! Browser abstraction seams
//!
//! The scraping pipeline drives a browser exclusively through these traits.
//! `crate::chrome` implements them over chromiumoxide; tests plug in an
//! in-memory fake.

use crate::{ContextOptions, ConnectionMode, ScrapeError, Viewport};
use crate::scripts::{Capability, InjectedScript};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Creates browser connections for a given connection mode.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, mode: &ConnectionMode) -> Result<Box<dyn BrowserConnection>, ScrapeError>;
}

/// A live browser, local or remote.
#[async_trait]
pub trait BrowserConnection: Send + Sync {
    async fn new_context(
        &mut self,
        options: &ContextOptions,
    ) -> Result<Box<dyn BrowsingContext>, ScrapeError>;

    async fn close(&mut self) -> Result<(), ScrapeError>;
}

/// An isolated browsing context (separate cookies, cache and storage).
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn ScrapePage>, ScrapeError>;

    async fn close(&mut self) -> Result<(), ScrapeError>;
}

/// Operations the extractor needs from a single page.
#[async_trait]
pub trait ScrapePage: Send + Sync {
    /// Starts appending every outgoing request to `log`.
    async fn observe_requests(&self, log: RequestLog) -> Result<(), ScrapeError>;

    /// Loads `url` and waits for network activity to settle, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;

    async fn inject_script(&self, script: &InjectedScript) -> Result<(), ScrapeError>;

    async fn set_viewport(&self, viewport: &Viewport) -> Result<(), ScrapeError>;

    /// Full-page PNG capture.
    async fn screenshot_full_page(&self) -> Result<Vec<u8>, ScrapeError>;

    /// Rendered HTML of the current document.
    async fn content(&self) -> Result<String, ScrapeError>;

    /// Calls one of the injected extraction functions and returns its JSON result.
    async fn invoke(&self, capability: Capability) -> Result<serde_json::Value, ScrapeError>;

    async fn close(&self) -> Result<(), ScrapeError>;
}

/// Resource classification of an observed network request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Image,
    Stylesheet,
    Font,
    Script,
    Other,
}

impl ResourceCategory {
    /// Maps a browser resource-type label ("image", "Stylesheet", ...) onto a category.
    pub fn from_resource_type(resource_type: &str) -> Self {
        match resource_type.to_ascii_lowercase().as_str() {
            "image" => ResourceCategory::Image,
            "stylesheet" => ResourceCategory::Stylesheet,
            "font" => ResourceCategory::Font,
            "script" => ResourceCategory::Script,
            _ => ResourceCategory::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub url: String,
    pub category: ResourceCategory,
    pub method: String,
}

impl RequestRecord {
    pub fn new(url: impl Into<String>, category: ResourceCategory, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category,
            method: method.into(),
        }
    }
}

/// Append-only log of requests observed during one attempt.
///
/// Clones share the same underlying log; the observer appends while the page
/// loads and the asset step reads a snapshot afterwards.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    records: Arc<Mutex<Vec<RequestRecord>>>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: RequestRecord) {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record);
    }

    pub fn snapshot(&self) -> Vec<RequestRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_category_mapping() {
        assert_eq!(ResourceCategory::from_resource_type("image"), ResourceCategory::Image);
        assert_eq!(ResourceCategory::from_resource_type("Stylesheet"), ResourceCategory::Stylesheet);
        assert_eq!(ResourceCategory::from_resource_type("Font"), ResourceCategory::Font);
        assert_eq!(ResourceCategory::from_resource_type("script"), ResourceCategory::Script);
        assert_eq!(ResourceCategory::from_resource_type("xhr"), ResourceCategory::Other);
        assert_eq!(ResourceCategory::from_resource_type("Document"), ResourceCategory::Other);
    }

    #[test]
    fn test_request_log_is_shared_and_ordered() {
        let log = RequestLog::new();
        let observer = log.clone();

        observer.record(RequestRecord::new("https://a.test/1.png", ResourceCategory::Image, "GET"));
        observer.record(RequestRecord::new("https://a.test/app.js", ResourceCategory::Script, "GET"));

        let records = log.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "https://a.test/1.png");
        assert_eq!(records[1].category, ResourceCategory::Script);
        assert!(!log.is_empty());
    }
}
