//! Robots.txt handling module
//!
//! robots.txt is fetched once per audit through the same fetcher (and
//! therefore the same safety guard) as every page.

mod parser;

pub use parser::{ParsedRobots, AI_CRAWLERS};

use crate::crawler::Fetcher;
use crate::url::Scope;
use serde::Serialize;

/// The site's robots.txt as fetched at the start of an audit
#[derive(Debug, Clone, Serialize)]
pub struct RobotsFile {
    pub url: String,

    /// True when robots.txt answered with a 2xx status
    pub found: bool,

    /// Status of the final response, if any arrived
    pub status: Option<u16>,

    #[serde(skip)]
    pub robots: ParsedRobots,
}

impl RobotsFile {
    /// A RobotsFile standing in for an unreachable robots.txt
    pub fn missing(url: String) -> Self {
        Self {
            url,
            found: false,
            status: None,
            robots: ParsedRobots::allow_all(),
        }
    }
}

/// Fetches and parses robots.txt for the audited site
///
/// | Response | Result |
/// |----------|--------|
/// | 2xx | parsed content |
/// | 401 / 403 | disallow all |
/// | any other status or failure | allow all |
pub async fn fetch_robots(fetcher: &dyn Fetcher, scope: &Scope) -> RobotsFile {
    let Some(url) = scope.site_url("/robots.txt") else {
        return RobotsFile::missing(format!("{}/robots.txt", scope.origin()));
    };

    match fetcher.fetch(&url).await {
        Ok(response) if (200..300).contains(&response.status) => {
            tracing::debug!("Fetched robots.txt from {}", url);
            RobotsFile {
                url: url.to_string(),
                found: true,
                status: Some(response.status),
                robots: ParsedRobots::from_content(&response.text()),
            }
        }
        Ok(response) if matches!(response.status, 401 | 403) => {
            tracing::warn!(
                "robots.txt at {} returned {}, treating site as disallowed",
                url,
                response.status
            );
            RobotsFile {
                url: url.to_string(),
                found: false,
                status: Some(response.status),
                robots: ParsedRobots::disallow_all(),
            }
        }
        Ok(response) => {
            tracing::debug!("No robots.txt at {} (HTTP {})", url, response.status);
            RobotsFile {
                url: url.to_string(),
                found: false,
                status: Some(response.status),
                robots: ParsedRobots::allow_all(),
            }
        }
        Err(e) => {
            tracing::warn!("Failed to fetch robots.txt: {}", e);
            RobotsFile::missing(url.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{FetchError, PageFetch};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use url::Url;

    struct StaticFetcher(Result<(u16, &'static str), FetchError>);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &Url) -> Result<PageFetch, FetchError> {
            let (status, body) = self.0.clone()?;
            Ok(PageFetch {
                status,
                final_url: url.clone(),
                headers: BTreeMap::new(),
                body: body.as_bytes().to_vec(),
                redirect_hops: 0,
                elapsed: Duration::ZERO,
            })
        }
    }

    fn scope() -> Scope {
        Scope::from_url(Url::parse("https://example.com/").unwrap(), false).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_robots_found() {
        let fetcher = StaticFetcher(Ok((200, "User-agent: *\nDisallow: /admin")));
        let file = fetch_robots(&fetcher, &scope()).await;
        assert!(file.found);
        assert_eq!(file.url, "https://example.com/robots.txt");
        assert!(!file.robots.is_allowed("https://example.com/admin", "SiteAuditBot"));
    }

    #[tokio::test]
    async fn test_fetch_robots_not_found_allows_all() {
        let fetcher = StaticFetcher(Ok((404, "nope")));
        let file = fetch_robots(&fetcher, &scope()).await;
        assert!(!file.found);
        assert_eq!(file.status, Some(404));
        assert!(file.robots.is_allowed("https://example.com/admin", "SiteAuditBot"));
    }

    #[tokio::test]
    async fn test_fetch_robots_forbidden_disallows_all() {
        let fetcher = StaticFetcher(Ok((403, "")));
        let file = fetch_robots(&fetcher, &scope()).await;
        assert!(!file.robots.is_allowed("https://example.com/", "SiteAuditBot"));
    }

    #[tokio::test]
    async fn test_fetch_robots_failure_allows_all() {
        let fetcher = StaticFetcher(Err(FetchError::Timeout {
            url: "https://example.com/robots.txt".to_string(),
        }));
        let file = fetch_robots(&fetcher, &scope()).await;
        assert!(!file.found);
        assert_eq!(file.status, None);
        assert!(file.robots.is_allowed("https://example.com/x", "SiteAuditBot"));
    }
}
