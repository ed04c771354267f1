//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests issued during an audit:
//! - Building the HTTP client with the crawler's user agent
//! - One logical GET per URL, following redirects manually
//! - Re-checking every redirect hop against the target guard
//! - Classifying failures into `FetchError` kinds
//!
//! 4xx/5xx responses are returned as successful fetches; deciding whether
//! they count as failures is up to the caller.

use crate::config::AuditOptions;
use crate::state::PageState;
use crate::url::{normalize_parsed, GuardError, TargetGuard};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Bodies larger than this are truncated
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Failure of a logical fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Unsafe target {url}: {reason}")]
    UnsafeTarget { url: String, reason: String },

    #[error("Too many redirects from {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Invalid redirect from {url}: {message}")]
    InvalidRedirect { url: String, message: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },
}

impl FetchError {
    /// The page state recorded for this failure
    pub fn page_state(&self) -> PageState {
        match self {
            Self::Timeout { .. } => PageState::Timeout,
            Self::Connect { .. } => PageState::Unreachable,
            Self::UnsafeTarget { .. } => PageState::UnsafeTarget,
            Self::TooManyRedirects { .. } | Self::InvalidRedirect { .. } => {
                PageState::RedirectLimit
            }
            Self::Body { .. } | Self::Http { .. } => PageState::Failed,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connect { .. })
    }
}

/// A completed HTTP response
#[derive(Debug, Clone)]
pub struct PageFetch {
    /// HTTP status code of the final response
    pub status: u16,

    /// URL of the final response after redirects
    pub final_url: Url,

    /// Response headers, names lowercased, repeated values joined with ", "
    pub headers: BTreeMap<String, String>,

    pub body: Vec<u8>,

    /// Number of redirects followed
    pub redirect_hops: usize,

    /// Time from the first request to the end of the body
    pub elapsed: Duration,
}

impl PageFetch {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// True for 1xx-3xx final responses
    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    /// Body decoded lossily as text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Retrieves one URL
///
/// Implementations must re-validate every hop they follow.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<PageFetch, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled so that [`HttpFetcher`] can check each hop.
pub fn build_http_client(options: &AuditOptions) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(options.user_agent.header_value())
        .timeout(options.timeout())
        .connect_timeout(options.timeout().min(Duration::from_secs(10)))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// `reqwest`-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    guard: TargetGuard,
    max_redirects: usize,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(options: &AuditOptions, guard: TargetGuard) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(options)?,
            guard,
            max_redirects: options.max_redirects,
            timeout: options.timeout(),
        })
    }

    async fn fetch_following_redirects(&self, url: &Url) -> Result<PageFetch, FetchError> {
        let started = Instant::now();
        let mut current = url.clone();
        let mut hops = 0;

        loop {
            self.guard
                .check(&current)
                .await
                .map_err(|e| guard_failure(e, &current))?;

            let mut response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| classify_error(&e, &current))?;

            let status = response.status();
            if status.is_redirection() {
                if let Some(location) = response.headers().get(LOCATION) {
                    if hops >= self.max_redirects {
                        return Err(FetchError::TooManyRedirects {
                            url: url.to_string(),
                            limit: self.max_redirects,
                        });
                    }

                    current = next_hop(&current, location.to_str().ok())?;
                    hops += 1;
                    tracing::trace!("Redirect hop {} -> {}", hops, current);
                    continue;
                }
            }

            let headers = collect_headers(response.headers());
            let mut body = Vec::new();
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| classify_body_error(&e, &current))?
            {
                let room = MAX_BODY_BYTES.saturating_sub(body.len());
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if body.len() >= MAX_BODY_BYTES {
                    tracing::debug!("Truncated body of {} at {} bytes", current, MAX_BODY_BYTES);
                    break;
                }
            }

            return Ok(PageFetch {
                status: status.as_u16(),
                final_url: current,
                headers,
                body,
                redirect_hops: hops,
                elapsed: started.elapsed(),
            });
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<PageFetch, FetchError> {
        // The client timeout applies per hop; this bounds the whole chain
        let budget = self.timeout * (self.max_redirects as u32 + 1);
        match tokio::time::timeout(budget, self.fetch_following_redirects(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        }
    }
}

/// Resolves a Location header against the current URL
fn next_hop(current: &Url, location: Option<&str>) -> Result<Url, FetchError> {
    let invalid = |message: String| FetchError::InvalidRedirect {
        url: current.to_string(),
        message,
    };

    let location = location
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| invalid("missing or unreadable Location header".to_string()))?;

    let next = current
        .join(location)
        .map_err(|e| invalid(format!("{}: {}", location, e)))?;

    normalize_parsed(next).map_err(|e| invalid(e.to_string()))
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).trim().to_string();
        collected
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

/// Maps a guard rejection; unresolvable hosts are connection failures
fn guard_failure(err: GuardError, url: &Url) -> FetchError {
    match err {
        GuardError::Unresolved { reason, .. } => FetchError::Connect {
            url: url.to_string(),
            message: reason,
        },
        GuardError::Unsafe(e) => FetchError::UnsafeTarget {
            url: url.to_string(),
            reason: e.to_string(),
        },
    }
}

/// Classifies a request error
fn classify_error(err: &reqwest::Error, url: &Url) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

fn classify_body_error(err: &reqwest::Error, url: &Url) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Body {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        let options = AuditOptions::default();
        assert!(build_http_client(&options).is_ok());
        assert!(HttpFetcher::new(&options, TargetGuard::default()).is_ok());
    }

    #[test]
    fn test_next_hop_relative() {
        let next = next_hop(&url("https://example.com/a/b"), Some("../c#x")).unwrap();
        assert_eq!(next.as_str(), "https://example.com/c");
    }

    #[test]
    fn test_next_hop_absolute() {
        let next = next_hop(&url("https://example.com/"), Some("https://www.example.com/")).unwrap();
        assert_eq!(next.as_str(), "https://www.example.com/");
    }

    #[test]
    fn test_next_hop_rejects_non_http() {
        let err = next_hop(&url("https://example.com/"), Some("ftp://example.com/file")).unwrap_err();
        assert!(matches!(err, FetchError::InvalidRedirect { .. }));
    }

    #[test]
    fn test_next_hop_missing_location() {
        let err = next_hop(&url("https://example.com/"), None).unwrap_err();
        assert!(matches!(err, FetchError::InvalidRedirect { .. }));
    }

    #[test]
    fn test_collect_headers_lowercases_and_joins() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", "text/html".parse().unwrap());
        headers.append("Set-Cookie", "a=1".parse().unwrap());
        headers.append("Set-Cookie", "b=2".parse().unwrap());

        let collected = collect_headers(&headers);
        assert_eq!(collected.get("content-type").unwrap(), "text/html");
        assert_eq!(collected.get("set-cookie").unwrap(), "a=1, b=2");
    }

    #[test]
    fn test_error_page_states() {
        let u = "https://example.com/".to_string();
        assert_eq!(
            FetchError::Timeout { url: u.clone() }.page_state(),
            PageState::Timeout
        );
        assert_eq!(
            FetchError::TooManyRedirects { url: u.clone(), limit: 3 }.page_state(),
            PageState::RedirectLimit
        );
        assert_eq!(
            FetchError::UnsafeTarget {
                url: u,
                reason: "loopback".to_string()
            }
            .page_state(),
            PageState::UnsafeTarget
        );
    }

    #[test]
    fn test_transient_errors() {
        let u = "https://example.com/".to_string();
        assert!(FetchError::Timeout { url: u.clone() }.is_transient());
        assert!(FetchError::Connect {
            url: u.clone(),
            message: "refused".to_string()
        }
        .is_transient());
        assert!(!FetchError::UnsafeTarget {
            url: u,
            reason: "private".to_string()
        }
        .is_transient());
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_transient_connect_failure() {
        let fetcher = HttpFetcher::new(&AuditOptions::default(), TargetGuard::default()).unwrap();
        let err = fetcher
            .fetch(&url("https://no-such-host.invalid/"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Connect { .. }), "{:?}", err);
        assert!(err.is_transient());
        assert_eq!(err.page_state(), PageState::Unreachable);
    }

    #[test]
    fn test_guard_rejection_stays_unsafe() {
        let err = guard_failure(
            GuardError::Unsafe(crate::ValidationError::UnsafeTarget {
                url: "http://10.0.0.1/".to_string(),
                reason: "non-public address 10.0.0.1".to_string(),
            }),
            &url("http://10.0.0.1/"),
        );
        assert_eq!(err.page_state(), PageState::UnsafeTarget);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_page_fetch_helpers() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html; charset=utf-8".to_string());
        let page = PageFetch {
            status: 404,
            final_url: url("https://example.com/missing"),
            headers,
            body: b"not found".to_vec(),
            redirect_hops: 0,
            elapsed: Duration::from_millis(12),
        };
        assert_eq!(page.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(page.header("Content-Type"), Some("text/html; charset=utf-8"));
        assert!(!page.is_success());
        assert_eq!(page.text(), "not found");
    }
}
