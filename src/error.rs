//! Custom error types for scholarcrawl.
//!
//! Most variants are recoverable: the drivers catch them at the narrowest
//! scope (one field, one result, one loop, one topic) and log them.
//! All functions return `Result<T, CrawlError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for crawl operations.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// An expected page element is absent.
    ///
    /// Recovered locally by substituting the sentinel for that field.
    #[error("Field missing: {0}")]
    FieldMissing(String),

    /// A page failed to load or a control could not be followed.
    ///
    /// Terminal for the current pagination/reveal loop, never for the crawl.
    #[error("Navigation failed for {url}: {reason}")]
    Navigation {
        /// URL (or control) that could not be reached
        url: String,
        /// Why navigation failed
        reason: String,
    },

    /// CAPTCHA interstitial served instead of content
    #[error("CAPTCHA detected at {0}, please refresh cookies")]
    Captcha(String),

    /// Rate limited by the source site
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// A whole result or paper page could not be turned into a record
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// A durable store exists but cannot be read back
    #[error("Store corrupted at {path}: {reason}")]
    StoreCorruption {
        /// Store file path
        path: String,
        /// Underlying read/parse problem
        reason: String,
    },

    /// Invalid CSS selector
    #[error("Selector error: {0}")]
    Selector(String),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl CrawlError {
    /// Shorthand for a [`CrawlError::Navigation`].
    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is an expected end of navigation rather than a fault.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. } | Self::Captcha(_) | Self::RateLimited(_) | Self::Network(_)
        )
    }
}

/// Result type alias using `CrawlError`
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a field-missing error message
    fn ok_or_missing(self, what: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, what: &str) -> Result<T> {
        self.ok_or_else(|| CrawlError::FieldMissing(what.to_string()))
    }
}
