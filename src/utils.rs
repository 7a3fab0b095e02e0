use crate::{ScrapeError, ScraperConfig};
use std::time::Duration;
use url::Url;

/// Returns true when `url` parses as an absolute URL carrying both a scheme
/// and a host. Never fails; parse errors simply yield `false`.
pub fn is_valid_url(url: &str) -> bool {
    // The parser fills in a missing `//` for special schemes ("http:host"),
    // so the authority marker is checked on the raw text.
    let has_authority = url
        .trim()
        .split_once(':')
        .is_some_and(|(_, rest)| rest.starts_with("//"));
    if !has_authority {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => !parsed.scheme().is_empty() && parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

pub fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '&' | '=' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Builds an output file name for a scraped URL, e.g.
/// `https://example.com/a?b=1` becomes `example.com_a_b_1.json`.
pub fn result_filename(url: &str) -> String {
    let stripped = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');

    format!("{}.json", sanitize_filename(stripped))
}

/// Result file name for the `index`-th URL of a batch. The index prefix keeps
/// repeated URLs, or URLs that sanitize alike, from overwriting each other.
pub fn batch_result_filename(index: usize, url: &str) -> String {
    format!("{:04}_{}", index, result_filename(url))
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

/// HTTP client carrying the same desktop identity as the browser context.
///
/// The scraping pipeline itself never issues plain HTTP requests; this is
/// used for reachability checks ahead of a scrape.
pub fn build_http_client(config: &ScraperConfig) -> Result<reqwest::Client, ScrapeError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.navigation_timeout)
        .build()
        .map_err(|e| ScrapeError::Configuration(e.to_string()))
}

/// Issues a HEAD request and reports the response status.
pub async fn preflight(client: &reqwest::Client, url: &str) -> Result<u16, ScrapeError> {
    let response = client
        .head(url)
        .send()
        .await
        .map_err(|e| ScrapeError::Navigation(e.to_string()))?;

    Ok(response.status().as_u16())
}
