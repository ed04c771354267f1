use crate::url::normalize::normalize_url;
use crate::url::safety::{GuardError, TargetGuard};
use crate::ValidationError;
use url::Url;

/// Crawl boundary derived from the start URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    start: Url,
    canonical_domain: String,
    include_subdomains: bool,
}

impl Scope {
    /// Builds a scope from an already validated start URL
    pub fn from_url(start: Url, include_subdomains: bool) -> Result<Self, ValidationError> {
        let canonical_domain = extract_domain(&start)
            .ok_or_else(|| ValidationError::InvalidUrl(format!("{} has no host", start)))?;

        Ok(Self {
            start,
            canonical_domain,
            include_subdomains,
        })
    }

    /// The normalized start URL
    pub fn start(&self) -> &Url {
        &self.start
    }

    /// Lowercase host of the start URL
    pub fn canonical_domain(&self) -> &str {
        &self.canonical_domain
    }

    pub fn includes_subdomains(&self) -> bool {
        self.include_subdomains
    }

    /// True iff `url` belongs to the audited site
    ///
    /// Exact host match by default. With subdomains enabled, the start host
    /// (minus a leading `www.`) and every host below it match.
    pub fn same_site(&self, url: &Url) -> bool {
        let Some(host) = extract_domain(url) else {
            return false;
        };

        if !self.include_subdomains {
            return host == self.canonical_domain;
        }

        let base = self
            .canonical_domain
            .strip_prefix("www.")
            .unwrap_or(&self.canonical_domain);
        host == base || host.ends_with(&format!(".{}", base))
    }

    /// `scheme://host[:port]` of the start URL
    pub fn origin(&self) -> String {
        self.start.origin().ascii_serialization()
    }

    /// Resolves `path` against the site origin
    pub fn site_url(&self, path: &str) -> Option<Url> {
        self.start.join(path).ok()
    }
}

/// Validates the start URL and computes the crawl scope
///
/// Fails with `InvalidUrl` for malformed or non-http(s) input and with
/// `UnsafeTarget` when the host is, or resolves to, a non-public address.
/// A host that does not resolve is accepted here; the crawl then records
/// its fetch as unreachable. No request is sent to the target.
pub async fn resolve(
    start_url: &str,
    guard: &TargetGuard,
    include_subdomains: bool,
) -> Result<Scope, ValidationError> {
    let start = normalize_url(start_url)?;
    match guard.check(&start).await {
        Ok(()) => {}
        Err(GuardError::Unsafe(e)) => return Err(e),
        Err(GuardError::Unresolved { url, reason }) => {
            tracing::warn!("Start host of {} does not resolve yet: {}", url, reason);
        }
    }
    Scope::from_url(start, include_subdomains)
}

/// Extracts the lowercase host of a URL, without a trailing dot
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.trim_end_matches('.').to_lowercase())
}
