use crate::config::validation::finalize;
use crate::ConfigResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Hard cap on the number of pages a single audit may visit
pub const MAX_PAGES_CAP: usize = 500;

/// Longest accepted per-slot delay between requests, in seconds
pub const MAX_REQUEST_DELAY_SECONDS: f64 = 3600.0;

/// Options for one audit run
///
/// Construct through [`AuditOptions::builder`]; `build()` applies the page
/// cap and rejects invalid values, so a built value is always usable.
#[derive(Debug, Clone, Serialize)]
pub struct AuditOptions {
    /// Page budget for the crawl (clamped to [`MAX_PAGES_CAP`])
    pub max_pages: usize,

    /// Whether the headless-browser visual checks run
    pub include_visual: bool,

    /// Per-fetch timeout in seconds
    pub timeout_seconds: u64,

    /// Number of concurrent fetch slots
    pub concurrency: usize,

    /// Minimum delay between two requests issued by the same slot
    pub request_delay_seconds: f64,

    /// Redirect hops followed per fetch
    pub max_redirects: usize,

    /// Maximum crawl distance from the start URL
    pub max_depth: u32,

    /// Consecutive failed fetches that abort the crawl
    pub failure_threshold: u32,

    /// Extra attempts for transient fetch failures (0 disables retries)
    pub retry_attempts: u32,

    /// Treat subdomains of the start host as same-site
    pub include_subdomains: bool,

    /// Disable the non-public host guard (local fixtures only)
    pub allow_private_targets: bool,

    pub user_agent: UserAgentConfig,

    /// PageSpeed Insights API key for the performance checker
    #[serde(skip)]
    pub pagespeed_api_key: Option<String>,

    /// Directory for visual-check screenshots
    #[serde(skip)]
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            max_pages: MAX_PAGES_CAP,
            include_visual: false,
            timeout_seconds: 30,
            concurrency: 5,
            request_delay_seconds: 1.0,
            max_redirects: 3,
            max_depth: 10,
            failure_threshold: 10,
            retry_attempts: 0,
            include_subdomains: false,
            allow_private_targets: false,
            user_agent: UserAgentConfig::default(),
            pagespeed_api_key: None,
            screenshot_dir: None,
        }
    }
}

impl AuditOptions {
    /// Starts a builder seeded with the default options
    pub fn builder() -> AuditOptionsBuilder {
        AuditOptionsBuilder::default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_delay_seconds.min(MAX_REQUEST_DELAY_SECONDS))
            .unwrap_or(Duration::ZERO)
    }
}

/// Builder for [`AuditOptions`]
#[derive(Debug, Clone, Default)]
pub struct AuditOptionsBuilder {
    options: AuditOptions,
}

impl AuditOptionsBuilder {
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.options.max_pages = max_pages;
        self
    }

    pub fn include_visual(mut self, include_visual: bool) -> Self {
        self.options.include_visual = include_visual;
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.options.timeout_seconds = seconds;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.options.concurrency = concurrency;
        self
    }

    pub fn request_delay_seconds(mut self, seconds: f64) -> Self {
        self.options.request_delay_seconds = seconds;
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.options.max_redirects = max_redirects;
        self
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.options.failure_threshold = threshold;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.options.retry_attempts = attempts;
        self
    }

    pub fn include_subdomains(mut self, include: bool) -> Self {
        self.options.include_subdomains = include;
        self
    }

    pub fn allow_private_targets(mut self, allow: bool) -> Self {
        self.options.allow_private_targets = allow;
        self
    }

    pub fn user_agent(mut self, user_agent: UserAgentConfig) -> Self {
        self.options.user_agent = user_agent;
        self
    }

    pub fn pagespeed_api_key(mut self, key: Option<String>) -> Self {
        self.options.pagespeed_api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn screenshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.options.screenshot_dir = dir;
        self
    }

    /// Clamps the page budget and validates every field
    pub fn build(self) -> ConfigResult<AuditOptions> {
        finalize(self.options)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also used as the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SiteAuditBot".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/site-audit/site-audit".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }

    /// Token matched against robots.txt `User-agent` groups
    pub fn product_token(&self) -> &str {
        &self.crawler_name
    }
}

/// On-disk TOML representation of the options
///
/// Every key is optional; missing keys keep the builder's current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionsFile {
    #[serde(default)]
    pub crawl: CrawlSection,

    #[serde(default, rename = "user-agent")]
    pub user_agent: Option<UserAgentConfig>,

    #[serde(default)]
    pub checks: ChecksSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlSection {
    #[serde(rename = "max-pages")]
    pub max_pages: Option<usize>,

    #[serde(rename = "timeout-seconds")]
    pub timeout_seconds: Option<u64>,

    pub concurrency: Option<usize>,

    #[serde(rename = "request-delay-seconds")]
    pub request_delay_seconds: Option<f64>,

    #[serde(rename = "max-redirects")]
    pub max_redirects: Option<usize>,

    #[serde(rename = "max-depth")]
    pub max_depth: Option<u32>,

    #[serde(rename = "failure-threshold")]
    pub failure_threshold: Option<u32>,

    #[serde(rename = "retry-attempts")]
    pub retry_attempts: Option<u32>,

    #[serde(rename = "include-subdomains")]
    pub include_subdomains: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChecksSection {
    #[serde(rename = "include-visual")]
    pub include_visual: Option<bool>,

    #[serde(rename = "screenshot-dir")]
    pub screenshot_dir: Option<PathBuf>,
}

impl OptionsFile {
    /// Applies every key present in the file on top of `builder`
    pub fn apply(self, mut builder: AuditOptionsBuilder) -> AuditOptionsBuilder {
        let crawl = self.crawl;
        if let Some(v) = crawl.max_pages {
            builder = builder.max_pages(v);
        }
        if let Some(v) = crawl.timeout_seconds {
            builder = builder.timeout_seconds(v);
        }
        if let Some(v) = crawl.concurrency {
            builder = builder.concurrency(v);
        }
        if let Some(v) = crawl.request_delay_seconds {
            builder = builder.request_delay_seconds(v);
        }
        if let Some(v) = crawl.max_redirects {
            builder = builder.max_redirects(v);
        }
        if let Some(v) = crawl.max_depth {
            builder = builder.max_depth(v);
        }
        if let Some(v) = crawl.failure_threshold {
            builder = builder.failure_threshold(v);
        }
        if let Some(v) = crawl.retry_attempts {
            builder = builder.retry_attempts(v);
        }
        if let Some(v) = crawl.include_subdomains {
            builder = builder.include_subdomains(v);
        }
        if let Some(ua) = self.user_agent {
            builder = builder.user_agent(ua);
        }
        if let Some(v) = self.checks.include_visual {
            builder = builder.include_visual(v);
        }
        if self.checks.screenshot_dir.is_some() {
            builder = builder.screenshot_dir(self.checks.screenshot_dir);
        }
        builder
    }
}
