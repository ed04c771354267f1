//! Configuration module for Site-Audit
//!
//! This module defines the audit options, their optional TOML file form,
//! and validation. Options are validated when they are built, never lazily.
//!
//! # Example
//!
//! ```
//! use site_audit::config::AuditOptions;
//!
//! let options = AuditOptions::builder().max_pages(2_000).build().unwrap();
//! assert_eq!(options.max_pages, 500);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AuditOptions, AuditOptionsBuilder, ChecksSection, CrawlSection, OptionsFile, UserAgentConfig,
    MAX_PAGES_CAP, MAX_REQUEST_DELAY_SECONDS,
};

// Re-export parser functions
pub use parser::{load_options, load_options_builder, load_options_with_hash, options_fingerprint};
pub use validation::validate;
