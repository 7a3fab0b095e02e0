use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScrapeError {
    #[error("not valid")]
    InvalidUrl(String),

    #[error("Browser acquisition failed: {0}")]
    Acquisition(String),

    #[error("Browser context is not initialized")]
    ContextUnavailable,

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("{step} extraction failed: {message}")]
    Step {
        step: ExtractionStep,
        message: String,
    },

    #[error("Browser cleanup failed: {0}")]
    Cleanup(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Max retries exceeded")]
    MaxRetriesExceeded,
}

/// Where an error sits in the scrape failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input; terminal, never retried
    Validation,
    /// Browser or context could not be created; retried
    Acquisition,
    /// Page failed to load or timed out; retried
    Navigation,
    /// A single extraction step failed; defaulted locally
    ExtractionStep,
    /// Releasing browser resources failed; logged only
    Cleanup,
    /// Anything else raised while driving the page
    Internal,
}

impl ScrapeError {
    pub fn step(step: ExtractionStep, err: impl fmt::Display) -> Self {
        ScrapeError::Step {
            step,
            message: err.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ScrapeError::InvalidUrl(_) => ErrorCategory::Validation,
            ScrapeError::Acquisition(_) | ScrapeError::ContextUnavailable => {
                ErrorCategory::Acquisition
            }
            ScrapeError::Navigation(_) | ScrapeError::NavigationTimeout(_) => {
                ErrorCategory::Navigation
            }
            ScrapeError::Step { .. } => ErrorCategory::ExtractionStep,
            ScrapeError::Cleanup(_) => ErrorCategory::Cleanup,
            _ => ErrorCategory::Internal,
        }
    }
}

/// Extraction steps that degrade to a default instead of failing the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionStep {
    Screenshots,
    Dom,
    Css,
    Colors,
    Typography,
    Layout,
    Assets,
    Metadata,
}

impl ExtractionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStep::Screenshots => "screenshot",
            ExtractionStep::Dom => "DOM",
            ExtractionStep::Css => "CSS",
            ExtractionStep::Colors => "color palette",
            ExtractionStep::Typography => "typography",
            ExtractionStep::Layout => "layout",
            ExtractionStep::Assets => "asset",
            ExtractionStep::Metadata => "metadata",
        }
    }
}

impl fmt::Display for ExtractionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<std::io::Error> for ScrapeError {
    fn from(err: std::io::Error) -> Self {
        ScrapeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Serialization(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Page(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        assert_eq!(ScrapeError::InvalidUrl(String::new()).category(), ErrorCategory::Validation);
        assert_eq!(
            ScrapeError::step(ExtractionStep::Assets, "x").category(),
            ErrorCategory::ExtractionStep
        );
        assert_eq!(ScrapeError::Cleanup("x".to_string()).category(), ErrorCategory::Cleanup);
        assert_eq!(ScrapeError::ContextUnavailable.category(), ErrorCategory::Acquisition);
        assert_eq!(
            ScrapeError::NavigationTimeout(Duration::from_secs(30)).category(),
            ErrorCategory::Navigation
        );
        assert_eq!(ScrapeError::Configuration("x".to_string()).category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ScrapeError::InvalidUrl("ftp:".to_string()).to_string(), "not valid");
        assert_eq!(ScrapeError::MaxRetriesExceeded.to_string(), "Max retries exceeded");
        assert_eq!(
            ScrapeError::step(ExtractionStep::Typography, "undefined function").to_string(),
            "typography extraction failed: undefined function"
        );
    }
}
