//! Configuration management with serde serialization/deserialization
//!
//! This module provides the scraper settings, the fixed viewport set used for
//! screenshots, the retry policy, and the browser connection-mode selection.

use crate::ScrapeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Desktop Chrome identity used for the browsing context and plain HTTP access.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Remote browser endpoint used when `use_remote` is set together with an API key.
pub const DEFAULT_REMOTE_ENDPOINT: &str = "wss://connect.browserbase.com";

/// Main configuration structure for the scraper
///
/// Controls browser selection, page timing, and retry behaviour. Every field
/// has a default, so partial JSON files are accepted.
///
/// # Examples
///
/// ```rust
/// use design_scraper::ScraperConfig;
///
/// // Local headless Chrome with defaults
/// let config = ScraperConfig::default();
///
/// // Remote browser
/// let config = ScraperConfig {
///     use_remote: true,
///     api_key: "bb_live_key".to_string(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Connect to the remote browser endpoint instead of launching Chrome (default: false)
    ///
    /// Only honoured when `api_key` is non-empty.
    pub use_remote: bool,

    /// API key for the remote browser endpoint (default: empty)
    pub api_key: String,

    /// Secure websocket endpoint of the remote browser provider
    pub remote_endpoint: String,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// User-Agent applied to the browsing context and HTTP client
    pub user_agent: String,

    /// Viewport of the isolated browsing context (default: 1920x1080)
    pub context_viewport: Viewport,

    /// Upper bound for page navigation (default: 30 seconds)
    #[serde(with = "duration_millis")]
    pub navigation_timeout: Duration,

    /// Pause after script injection so late scripts and animations settle (default: 2 seconds)
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,

    /// Pause after each viewport resize before capture (default: 1 second)
    #[serde(with = "duration_millis")]
    pub reflow_delay: Duration,

    /// Directory of `*.js` extraction scripts overriding the built-in bundle
    pub scripts_dir: Option<PathBuf>,

    /// Attempt-level retry policy
    pub retry: RetryConfig,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            use_remote: false,
            api_key: String::new(),
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            chrome_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            context_viewport: Viewport::default(),
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            reflow_delay: Duration::from_secs(1),
            scripts_dir: None,
            retry: RetryConfig::default(),
        }
    }
}

impl ScraperConfig {
    /// Picks the connection mode: remote only when requested AND keyed.
    pub fn connection_mode(&self) -> ConnectionMode {
        if self.use_remote && !self.api_key.is_empty() {
            ConnectionMode::Remote {
                ws_url: format!("{}?apiKey={}", self.remote_endpoint, self.api_key),
            }
        } else {
            ConnectionMode::Local {
                args: get_chrome_args(),
            }
        }
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            viewport: self.context_viewport.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.navigation_timeout.is_zero() {
            return Err(ScrapeError::Configuration(
                "Navigation timeout must be greater than 0".to_string(),
            ));
        }

        if self.context_viewport.width == 0 || self.context_viewport.height == 0 {
            return Err(ScrapeError::Configuration(
                "Viewport dimensions must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ScrapeError::Configuration(
                "Retry attempts must be greater than 0".to_string(),
            ));
        }

        if self.use_remote && self.remote_endpoint.is_empty() {
            return Err(ScrapeError::Configuration(
                "Remote endpoint must be set when use_remote is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

/// How a browser session obtains its browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Attach to a hosted browser over a secure websocket
    Remote { ws_url: String },
    /// Launch headless Chrome locally with the given flags
    Local { args: Vec<String> },
}

impl ConnectionMode {
    pub fn is_remote(&self) -> bool {
        matches!(self, ConnectionMode::Remote { .. })
    }
}

/// Settings applied to the single isolated context of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    pub viewport: Viewport,
    pub user_agent: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ScraperConfig::default().context_options()
    }
}

/// Browser viewport size in CSS pixels
///
/// # Examples
///
/// ```rust
/// use design_scraper::Viewport;
///
/// let desktop = Viewport::default();
/// assert_eq!((desktop.width, desktop.height), (1920, 1080));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1920)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_mobile(&self) -> bool {
        self.width < 768
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Named viewports captured for every page, in capture order.
pub const SCREENSHOT_VIEWPORTS: [(&str, Viewport); 3] = [
    ("desktop", Viewport::new(1920, 1080)),
    ("tablet", Viewport::new(768, 1024)),
    ("mobile", Viewport::new(375, 667)),
];

/// Attempt-level retry policy
///
/// The delay before retrying after attempt index `i` (starting at 0) is
/// `base_delay * multiplier^i` plus a uniform jitter in `[0, max_jitter)`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    pub multiplier: f64,
    #[serde(with = "duration_millis")]
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Deterministic part of the backoff for attempt index `attempt`.
    pub fn base_backoff(&self, attempt: usize) -> Duration {
        self.base_delay.mul_f64(self.multiplier.powi(attempt as i32))
    }

    /// Full backoff including jitter drawn from `rng`.
    pub fn backoff<R: rand::Rng + ?Sized>(&self, attempt: usize, rng: &mut R) -> Duration {
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            self.max_jitter.mul_f64(rng.gen_range(0.0..1.0))
        };

        self.base_backoff(attempt) + jitter
    }
}

/// Chrome flags for local headless execution inside containers.
///
/// # Examples
///
/// ```rust
/// use design_scraper::get_chrome_args;
///
/// let args = get_chrome_args();
/// assert!(args.contains(&"--no-sandbox".to_string()));
/// ```
pub fn get_chrome_args() -> Vec<String> {
    vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-web-security".to_string(),
        "--disable-features=VizDisplayCompositor".to_string(),
    ]
}

pub fn create_browser_config(
    config: &ScraperConfig,
    args: &[String],
) -> Result<chromiumoxide::browser::BrowserConfig, ScrapeError> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.context_viewport.width, config.context_viewport.height)
        .args(args.to_vec());

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(ScrapeError::Acquisition)
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
