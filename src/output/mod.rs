//! Output module for writing audit deliverables
//!
//! This module handles:
//! - Rendering the full Markdown report and the prioritized action plan
//! - Serializing the machine-readable summary
//! - Filling external report templates with the findings payload

mod action_plan;
mod markdown;
mod summary;
mod template;
mod traits;

pub use action_plan::{format_action_plan, phase_label, ActionPlan};
pub use markdown::{format_full_report, render_findings_payload, FullReport};
pub use summary::{AuditSummary, FindingCounts, SummaryJson};
pub use template::{fill_template, render_template, FINDINGS_MARKER};
pub use traits::{OutputError, OutputResult, ReportRenderer};

use crate::audit::AuditResult;
use std::path::{Path, PathBuf};

pub const FULL_REPORT_FILE: &str = "FULL-AUDIT-REPORT.md";
pub const ACTION_PLAN_FILE: &str = "ACTION-PLAN.md";
pub const SUMMARY_FILE: &str = "SUMMARY.json";

/// Subdirectory of the output directory holding visual-check screenshots
pub const SCREENSHOT_DIR: &str = "screenshots";

/// The renderers of the per-run deliverable set
pub fn default_renderers() -> Vec<Box<dyn ReportRenderer>> {
    vec![Box::new(FullReport), Box::new(ActionPlan), Box::new(SummaryJson)]
}

/// Writes every deliverable of `result` into `output_dir`
///
/// # Arguments
///
/// * `result` - The finished audit
/// * `output_dir` - Target directory, created if missing
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - Paths of the written files
/// * `Err(OutputError)` - A document could not be rendered or written
pub fn write_reports(result: &AuditResult, output_dir: &Path) -> OutputResult<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    for renderer in default_renderers() {
        let path = output_dir.join(renderer.file_name());
        let contents = renderer.render(result)?;
        std::fs::write(&path, contents)?;
        tracing::info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_result;
    use super::*;

    #[test]
    fn test_write_reports_creates_deliverables() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("audit");
        let written = write_reports(&sample_result(), &out).unwrap();

        assert_eq!(written.len(), 3);
        for name in [FULL_REPORT_FILE, ACTION_PLAN_FILE, SUMMARY_FILE] {
            assert!(out.join(name).is_file(), "{} missing", name);
        }
        let summary = std::fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
        assert!(summary.ends_with('\n'));
    }

    #[test]
    fn test_reports_identical_for_identical_results() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_reports(&sample_result(), first.path()).unwrap();
        write_reports(&sample_result(), second.path()).unwrap();

        for name in [FULL_REPORT_FILE, ACTION_PLAN_FILE, SUMMARY_FILE] {
            let a = std::fs::read(first.path().join(name)).unwrap();
            let b = std::fs::read(second.path().join(name)).unwrap();
            assert_eq!(a, b, "{} differs", name);
        }
    }

    #[test]
    fn test_write_into_file_path_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = write_reports(&sample_result(), file.path()).unwrap_err();
        assert!(matches!(err, OutputError::Io(_)));
    }
}
