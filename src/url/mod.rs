//! URL handling module for Site-Audit
//!
//! This module provides URL normalization, the crawl scope (canonical
//! domain plus same-site predicate) and the target-safety guard.

mod normalize;
mod safety;
mod scope;

// Re-export main functions
pub use normalize::{normalize_parsed, normalize_url};
pub use safety::{is_non_public_ip, GuardError, TargetGuard};
pub use scope::{extract_domain, resolve, Scope};
