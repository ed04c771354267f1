//! Site-Audit: a bounded-crawl SEO auditor
//!
//! This crate crawls a single site breadth-first within a fixed page budget,
//! extracts on-page signals from every fetched page, runs a set of
//! specialist checkers over them and aggregates the results into weighted
//! category scores and a prioritized report.

pub mod audit;
pub mod checks;
pub mod config;
pub mod crawler;
pub mod output;
pub mod profile;
pub mod robots;
pub mod scoring;
pub mod state;
pub mod url;

use thiserror::Error;

/// Hard failures of an audit run
///
/// Everything else (fetch failures, parse failures, unavailable measurement
/// sources, aborted crawls) degrades into the returned `AuditResult`.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Rejected audit input
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsafe target {url}: {reason}")]
    UnsafeTarget { url: String, reason: String },
}

impl From<UrlError> for ValidationError {
    fn from(err: UrlError) -> Self {
        ValidationError::InvalidUrl(err.to_string())
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for audit runs
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for input validation
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

// Re-export commonly used types
pub use audit::{run, run_with_cancellation, AuditResult};
pub use config::AuditOptions;
pub use state::{CrawlState, PageState};
pub use url::{normalize_url, Scope, TargetGuard};
