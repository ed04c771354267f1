/// Page outcome definitions
///
/// Every dequeued URL ends in exactly one of these states.
use serde::Serialize;
use std::fmt;

/// Outcome of fetching (and possibly parsing) one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    // ===== Success States =====
    /// HTML page fetched and parsed
    Processed,

    /// Fetched, but the body is not HTML
    NonHtml,

    /// Fetched, but the body could not be decoded as text
    ParseFailed,

    // ===== Failure States =====
    /// The server answered with a 4xx/5xx status
    HttpError,

    /// No response within the timeout
    Timeout,

    /// Connection refused, DNS or TLS failure
    Unreachable,

    /// The URL or one of its redirect hops points at a non-public host
    UnsafeTarget,

    /// Redirect chain longer than the configured limit, or a bad Location
    RedirectLimit,

    /// Any other fetch failure
    Failed,
}

impl PageState {
    /// Returns true if the fetch completed with a usable response
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Processed | Self::NonHtml | Self::ParseFailed)
    }

    /// Returns true if this counts as a failed fetch
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Returns true if the page carries parser signals
    pub fn has_signals(&self) -> bool {
        matches!(self, Self::Processed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::NonHtml => "non_html",
            Self::ParseFailed => "parse_failed",
            Self::HttpError => "http_error",
            Self::Timeout => "timeout",
            Self::Unreachable => "unreachable",
            Self::UnsafeTarget => "unsafe_target",
            Self::RedirectLimit => "redirect_limit",
            Self::Failed => "failed",
        }
    }

    /// Parses the string form produced by [`PageState::as_str`]
    pub fn from_str_name(s: &str) -> Option<Self> {
        Self::all_states().into_iter().find(|state| state.as_str() == s)
    }

    /// Returns all possible page states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Processed,
            Self::NonHtml,
            Self::ParseFailed,
            Self::HttpError,
            Self::Timeout,
            Self::Unreachable,
            Self::UnsafeTarget,
            Self::RedirectLimit,
            Self::Failed,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        assert!(PageState::Processed.is_success());
        assert!(PageState::NonHtml.is_success());
        assert!(PageState::ParseFailed.is_success());

        assert!(!PageState::HttpError.is_success());
        assert!(!PageState::Timeout.is_success());
        assert!(!PageState::UnsafeTarget.is_success());
    }

    #[test]
    fn test_is_failure() {
        assert!(PageState::HttpError.is_failure());
        assert!(PageState::Timeout.is_failure());
        assert!(PageState::Unreachable.is_failure());
        assert!(PageState::RedirectLimit.is_failure());
        assert!(PageState::Failed.is_failure());

        assert!(!PageState::Processed.is_failure());
        assert!(!PageState::ParseFailed.is_failure());
    }

    #[test]
    fn test_only_processed_has_signals() {
        for state in PageState::all_states() {
            assert_eq!(state.has_signals(), state == PageState::Processed);
        }
    }

    #[test]
    fn test_string_names() {
        for state in PageState::all_states() {
            assert_eq!(PageState::from_str_name(state.as_str()), Some(state));
        }
        assert_eq!(PageState::from_str_name("invalid"), None);
    }

    #[test]
    fn test_display_matches_serde() {
        assert_eq!(format!("{}", PageState::HttpError), "http_error");
        assert_eq!(
            serde_json::to_string(&PageState::NonHtml).unwrap(),
            "\"non_html\""
        );
    }
}
