use crate::config::types::{AuditOptions, AuditOptionsBuilder, OptionsFile};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads a TOML options file and layers it onto the default builder
///
/// The returned builder is not validated yet, so callers can apply further
/// overrides (for example command-line flags) before calling `build()`.
pub fn load_options_builder(path: &Path) -> Result<AuditOptionsBuilder, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let file: OptionsFile = toml::from_str(&content)?;
    Ok(file.apply(AuditOptions::builder()))
}

/// Loads and validates options from a TOML file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use site_audit::config::load_options;
///
/// let options = load_options(Path::new("audit.toml")).unwrap();
/// println!("Page budget: {}", options.max_pages);
/// ```
pub fn load_options(path: &Path) -> Result<AuditOptions, ConfigError> {
    load_options_builder(path)?.build()
}

/// Computes a SHA-256 fingerprint of the effective options
///
/// Two audits with the same fingerprint crawled with identical settings.
/// Neither the PageSpeed API key nor the screenshot directory is part of
/// the fingerprint.
pub fn options_fingerprint(options: &AuditOptions) -> String {
    let canonical = serde_json::to_string(options).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads options and returns them with their fingerprint
pub fn load_options_with_hash(path: &Path) -> Result<(AuditOptions, String), ConfigError> {
    let options = load_options(path)?;
    let hash = options_fingerprint(&options);
    Ok((options, hash))
}
