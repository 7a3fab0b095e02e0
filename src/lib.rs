//! # Design Scraper
//!
//! Captures the visual and structural design of a web page: screenshots at
//! three viewports, a sanitized DOM snapshot, normalized CSS findings, a
//! color palette, typography, layout, assets and page metadata. Everything
//! lands in one `ScrapingResult`, which is returned on every path, failure
//! included.
//!
//! ## Pipeline
//!
//! | Stage | Component | Failure policy |
//! |-------|-----------|----------------|
//! | URL check | `is_valid_url` | terminal, no browser touched |
//! | Browser + context | `BrowserSession` | retried per attempt |
//! | Navigation | `PageExtractor` | retried per attempt |
//! | Extraction steps | `PageExtractor` | defaulted per step |
//! | Record | `ResultAssembler` | never fails |
//! | Release | `BrowserSession` | logged, never surfaced |
//!
//! Attempts are driven by `Scraper::scrape`, which sleeps
//! `base_delay * multiplier^i + jitter` between attempts (1s, 2s, 4s plus up
//! to 1s by default).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use design_scraper::{default_sink, Scraper, ScraperConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scraper = Scraper::with_chrome(ScraperConfig::default(), default_sink())?;
//!
//!     let result = scraper.scrape("https://example.com", 3).await;
//!     if result.success {
//!         println!("palette: {:?}", result.color_palette);
//!     } else {
//!         println!("failed: {:?}", result.error_message);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! design-scraper scrape --url https://example.com --output example.json
//! design-scraper batch --input urls.txt --output results/ --concurrency 4
//! BROWSERBASE_KEY=... design-scraper --remote scrape --url https://example.com
//! ```

/// Scraper settings, viewports and retry policy
pub mod config;

/// Error taxonomy
pub mod error;

/// Explicitly passed logging capability
pub mod diagnostics;

/// Browser abstraction traits
pub mod browser;

/// chromiumoxide-backed browser implementation
pub mod chrome;

/// Per-attempt browser session lifecycle
pub mod session;

/// In-page extraction scripts and the capability set they provide
pub mod scripts;

/// Normalization of raw page findings
pub mod normalize;

/// DOM snapshot sanitization
pub mod sanitize;

/// Ordered page extraction steps
pub mod extractor;

/// Result record and assembly
pub mod result;

/// Retry-governed scrape entry point
pub mod orchestrator;

/// Concurrent multi-URL scraping
pub mod batch;

/// Command-line interface implementation
pub mod cli;

/// Scrape metrics
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use batch::*;
pub use browser::*;
pub use cli::*;
pub use config::*;
pub use diagnostics::*;
pub use error::*;
pub use extractor::*;
pub use self::metrics::*;
pub use orchestrator::*;
pub use result::*;
pub use scripts::*;
pub use session::*;
pub use utils::*;
