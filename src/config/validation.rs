use crate::config::types::{
    AuditOptions, UserAgentConfig, MAX_PAGES_CAP, MAX_REQUEST_DELAY_SECONDS,
};
use crate::ConfigError;
use url::Url;

/// Applies the page cap, then validates the options
pub(crate) fn finalize(mut options: AuditOptions) -> Result<AuditOptions, ConfigError> {
    if options.max_pages > MAX_PAGES_CAP {
        tracing::warn!(
            "max_pages {} exceeds the cap, clamping to {}",
            options.max_pages,
            MAX_PAGES_CAP
        );
        options.max_pages = MAX_PAGES_CAP;
    }

    validate(&options)?;
    Ok(options)
}

/// Validates the entire option set
pub fn validate(options: &AuditOptions) -> Result<(), ConfigError> {
    validate_crawl_limits(options)?;
    validate_pacing(options)?;
    validate_user_agent_config(&options.user_agent)?;
    Ok(())
}

/// Validates page budget, depth, redirect and failure limits
fn validate_crawl_limits(options: &AuditOptions) -> Result<(), ConfigError> {
    if options.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be at least 1, got {}",
            options.max_pages
        )));
    }

    if options.max_pages > MAX_PAGES_CAP {
        return Err(ConfigError::Validation(format!(
            "max_pages must be <= {}, got {}",
            MAX_PAGES_CAP, options.max_pages
        )));
    }

    if options.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 20, got {}",
            options.max_redirects
        )));
    }

    if options.failure_threshold < 1 {
        return Err(ConfigError::Validation(
            "failure_threshold must be at least 1".to_string(),
        ));
    }

    if options.retry_attempts > 5 {
        return Err(ConfigError::Validation(format!(
            "retry_attempts must be <= 5, got {}",
            options.retry_attempts
        )));
    }

    Ok(())
}

/// Validates concurrency, timeout and delay
fn validate_pacing(options: &AuditOptions) -> Result<(), ConfigError> {
    if options.concurrency < 1 || options.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            options.concurrency
        )));
    }

    if options.timeout_seconds < 1 || options.timeout_seconds > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout_seconds must be between 1 and 300, got {}",
            options.timeout_seconds
        )));
    }

    let delay = options.request_delay_seconds;
    if !(0.0..=MAX_REQUEST_DELAY_SECONDS).contains(&delay) {
        return Err(ConfigError::Validation(format!(
            "request_delay_seconds must be between 0 and {}, got {}",
            MAX_REQUEST_DELAY_SECONDS, delay
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_defaults() {
        assert!(validate(&AuditOptions::default()).is_ok());
    }

    #[test]
    fn test_zero_max_pages_rejected() {
        let result = AuditOptions::builder().max_pages(0).build();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unclamped_max_pages_rejected_by_validate() {
        let options = AuditOptions {
            max_pages: 501,
            ..AuditOptions::default()
        };
        assert!(validate(&options).is_err());
    }

    #[test]
    fn test_concurrency_bounds() {
        assert!(AuditOptions::builder().concurrency(0).build().is_err());
        assert!(AuditOptions::builder().concurrency(101).build().is_err());
        assert!(AuditOptions::builder().concurrency(1).build().is_ok());
        assert!(AuditOptions::builder().concurrency(100).build().is_ok());
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(AuditOptions::builder().timeout_seconds(0).build().is_err());
        assert!(AuditOptions::builder().timeout_seconds(301).build().is_err());
    }

    #[test]
    fn test_negative_or_nan_delay_rejected() {
        assert!(AuditOptions::builder()
            .request_delay_seconds(-1.0)
            .build()
            .is_err());
        assert!(AuditOptions::builder()
            .request_delay_seconds(f64::NAN)
            .build()
            .is_err());
        assert!(AuditOptions::builder()
            .request_delay_seconds(0.0)
            .build()
            .is_ok());
    }

    #[test]
    fn test_oversized_delay_rejected() {
        assert!(AuditOptions::builder()
            .request_delay_seconds(1e20)
            .build()
            .is_err());
        assert!(AuditOptions::builder()
            .request_delay_seconds(f64::INFINITY)
            .build()
            .is_err());
        let options = AuditOptions::builder()
            .request_delay_seconds(MAX_REQUEST_DELAY_SECONDS)
            .build()
            .unwrap();
        assert_eq!(options.request_delay(), std::time::Duration::from_secs(3600));
    }

    #[test]
    fn test_failure_threshold_must_be_positive() {
        assert!(AuditOptions::builder().failure_threshold(0).build().is_err());
    }

    #[test]
    fn test_redirect_and_retry_limits() {
        assert!(AuditOptions::builder().max_redirects(21).build().is_err());
        assert!(AuditOptions::builder().retry_attempts(6).build().is_err());
    }

    #[test]
    fn test_invalid_crawler_name() {
        let ua = UserAgentConfig {
            crawler_name: "Bad Bot!".to_string(),
            ..UserAgentConfig::default()
        };
        let result = AuditOptions::builder().user_agent(ua).build();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_contact_url() {
        let ua = UserAgentConfig {
            contact_url: "not a url".to_string(),
            ..UserAgentConfig::default()
        };
        let result = AuditOptions::builder().user_agent(ua).build();
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }
}
