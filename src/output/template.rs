//! Report template substitution
//!
//! Styled HTML reports are produced outside this crate from a template that
//! carries exactly one findings marker. This module only fills the marker.

use crate::audit::AuditResult;
use crate::output::markdown::render_findings_payload;
use crate::output::traits::{OutputError, OutputResult};

/// Placeholder replaced by the findings payload
pub const FINDINGS_MARKER: &str = "{{FINDINGS}}";

/// Replaces the single [`FINDINGS_MARKER`] in `template` with `payload`
///
/// Fails with `OutputError::Format` when the marker is absent or appears
/// more than once.
pub fn fill_template(template: &str, payload: &str) -> OutputResult<String> {
    match template.matches(FINDINGS_MARKER).count() {
        0 => Err(OutputError::Format(format!(
            "template has no {} marker",
            FINDINGS_MARKER
        ))),
        1 => Ok(template.replacen(FINDINGS_MARKER, payload, 1)),
        n => Err(OutputError::Format(format!(
            "template has {} {} markers, expected one",
            n, FINDINGS_MARKER
        ))),
    }
}

/// Fills `template` with the rendered findings of `result`
pub fn render_template(template: &str, result: &AuditResult) -> OutputResult<String> {
    fill_template(template, &render_findings_payload(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::sample_result;

    #[test]
    fn test_marker_replaced() {
        let html = fill_template("<main>{{FINDINGS}}</main>", "### Technical").unwrap();
        assert_eq!(html, "<main>### Technical</main>");
    }

    #[test]
    fn test_missing_marker_rejected() {
        let err = fill_template("<main></main>", "x").unwrap_err();
        assert!(matches!(err, OutputError::Format(_)));
    }

    #[test]
    fn test_duplicate_marker_rejected() {
        let err = fill_template("{{FINDINGS}}<hr>{{FINDINGS}}", "x").unwrap_err();
        assert!(err.to_string().contains("2 {{FINDINGS}} markers"));
    }

    #[test]
    fn test_payload_with_marker_text_is_not_reexpanded() {
        let html = fill_template("<p>{{FINDINGS}}</p>", "literal {{FINDINGS}}").unwrap();
        assert_eq!(html, "<p>literal {{FINDINGS}}</p>");
    }

    #[test]
    fn test_render_template_uses_findings_payload() {
        let html = render_template("<body>{{FINDINGS}}</body>", &sample_result()).unwrap();
        assert!(html.contains("#### [Critical] HTTP errors during crawl"));
        assert!(!html.contains(FINDINGS_MARKER));
    }
}
