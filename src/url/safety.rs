//! Target-safety guard
//!
//! Every URL the auditor fetches, the start URL and each redirect hop
//! alike, must resolve to a public host. The guard has a cheap literal check
//! (host names and IP literals, used before a URL is queued) and a full
//! check that also resolves host names through DNS (used right before each
//! request).

use crate::ValidationError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use thiserror::Error;
use url::{Host, Url};

const DNS_TIMEOUT: Duration = Duration::from_secs(10);

/// Host names that never point at a public site
const BLOCKED_HOSTS: &[&str] = &["localhost", "metadata.google.internal", "metadata"];

/// Host suffixes reserved for private networks
const BLOCKED_SUFFIXES: &[&str] = &[".localhost", ".internal", ".local", ".lan", ".home.arpa"];

/// Failure of the full, DNS-resolving guard check
#[derive(Debug, Error)]
pub enum GuardError {
    /// The host is, or resolves to, a non-public address
    #[error(transparent)]
    Unsafe(#[from] ValidationError),

    /// The host name could not be resolved; says nothing about safety
    #[error("Cannot resolve {url}: {reason}")]
    Unresolved { url: String, reason: String },
}

/// Rejects non-public fetch targets
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetGuard {
    allow_private: bool,
}

impl TargetGuard {
    /// Creates a guard; `allow_private` turns all host checks off
    pub fn new(allow_private: bool) -> Self {
        Self { allow_private }
    }

    /// Whether private targets are allowed
    pub fn allows_private(&self) -> bool {
        self.allow_private
    }

    /// Checks the URL's host without touching the network
    pub fn check_literal(&self, url: &Url) -> Result<(), ValidationError> {
        let host = url.host().ok_or_else(|| unsafe_target(url, "URL has no host"))?;

        if self.allow_private {
            return Ok(());
        }

        match host {
            Host::Domain(name) => {
                let lower = name.trim_end_matches('.').to_lowercase();
                if BLOCKED_HOSTS.contains(&lower.as_str())
                    || BLOCKED_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
                {
                    return Err(unsafe_target(url, &format!("blocked host name {}", lower)));
                }
                Ok(())
            }
            Host::Ipv4(ip) => check_ip(url, IpAddr::V4(ip)),
            Host::Ipv6(ip) => check_ip(url, IpAddr::V6(ip)),
        }
    }

    /// Checks the URL's host, resolving host names through DNS
    ///
    /// A name is rejected when any of its addresses is non-public. Lookup
    /// failures are reported as `GuardError::Unresolved`.
    pub async fn check(&self, url: &Url) -> Result<(), GuardError> {
        self.check_literal(url)?;

        if self.allow_private {
            return Ok(());
        }

        let name = match url.host() {
            Some(Host::Domain(name)) => name.to_string(),
            _ => return Ok(()),
        };
        let port = url.port_or_known_default().unwrap_or(80);
        let unresolved = |reason: String| GuardError::Unresolved {
            url: url.to_string(),
            reason,
        };

        let lookup = tokio::time::timeout(DNS_TIMEOUT, tokio::net::lookup_host((name.as_str(), port)))
            .await
            .map_err(|_| unresolved("DNS resolution timed out".to_string()))?
            .map_err(|e| unresolved(e.to_string()))?;

        let mut resolved_any = false;
        for addr in lookup {
            resolved_any = true;
            check_ip(url, addr.ip())?;
        }

        if !resolved_any {
            return Err(unresolved("host resolved to no addresses".to_string()));
        }

        Ok(())
    }
}

fn check_ip(url: &Url, ip: IpAddr) -> Result<(), ValidationError> {
    if is_non_public_ip(ip) {
        Err(unsafe_target(url, &format!("non-public address {}", ip)))
    } else {
        Ok(())
    }
}

fn unsafe_target(url: &Url, reason: &str) -> ValidationError {
    ValidationError::UnsafeTarget {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Returns true for loopback, private, link-local and reserved addresses
pub fn is_non_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_non_public_v4(v4),
        IpAddr::V6(v6) => is_non_public_v6(v6),
    }
}

fn is_non_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.is_documentation()
        // 0.0.0.0/8 "this network"
        || a == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (64..128).contains(&b))
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b == 18 || b == 19))
        // 240.0.0.0/4 reserved
        || a >= 240
}

fn is_non_public_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_non_public_v4(v4);
    }

    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80
        // 2001:db8::/32 documentation
        || (first == 0x2001 && ip.segments()[1] == 0x0db8)
}
