//! Prioritized action plan
//!
//! Findings are grouped into remediation phases by severity.

use crate::audit::AuditResult;
use crate::checks::{Finding, Severity};
use crate::output::traits::{OutputResult, ReportRenderer};

/// Evidence URLs listed per plan item
const PLAN_EVIDENCE: usize = 5;

/// Renders `ACTION-PLAN.md`
pub struct ActionPlan;

impl ReportRenderer for ActionPlan {
    fn file_name(&self) -> &'static str {
        super::ACTION_PLAN_FILE
    }

    fn render(&self, result: &AuditResult) -> OutputResult<String> {
        Ok(format_action_plan(result))
    }
}

/// Heading of the phase that handles findings of `severity`
pub fn phase_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Phase 1 (0-48h): Critical Fixes",
        Severity::High => "Phase 2 (Days 3-7): High-Impact Work",
        Severity::Medium => "Phase 3 (Weeks 2-4): Structural Optimization",
        Severity::Low => "Backlog: Ongoing Improvements",
    }
}

fn push_item(md: &mut String, idx: usize, finding: &Finding) {
    md.push_str(&format!(
        "{}. **{}** ({})\n",
        idx,
        finding.title,
        finding.category.label()
    ));
    if !finding.impact.is_empty() {
        md.push_str(&format!("   - Why it matters: {}\n", finding.impact));
    }
    let action = if finding.recommendation.is_empty() {
        &finding.detail
    } else {
        &finding.recommendation
    };
    md.push_str(&format!("   - Action: {}\n", action));
    md.push_str(&format!("   - Effort: {}\n", finding.effort.label()));
    if !finding.evidence.is_empty() {
        let urls: Vec<&str> = finding
            .evidence
            .iter()
            .take(PLAN_EVIDENCE)
            .map(|e| e.url.as_str())
            .collect();
        md.push_str(&format!("   - Evidence: {}\n", urls.join(", ")));
    }
}

/// Formats the action plan
pub fn format_action_plan(result: &AuditResult) -> String {
    let mut md = String::new();

    md.push_str("# SEO Action Plan\n\n");
    md.push_str(&format!("- **Target**: {}\n", result.target));
    md.push_str(&format!("- **Generated**: {}\n", result.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Baseline Score**: {:.1}/100 ({})\n",
        result.scorecard.overall, result.scorecard.band
    ));
    if result.is_partial() {
        md.push_str(&format!(
            "- **Note**: {}; findings cover only the pages crawled\n",
            super::markdown::crawl_state_line(result)
        ));
    }
    md.push('\n');

    for severity in Severity::ALL {
        md.push_str(&format!("## {}\n\n", phase_label(severity)));
        let findings: Vec<&Finding> = result.findings_with(severity).collect();
        if findings.is_empty() {
            md.push_str(&format!("- No {} findings in this crawl.\n\n", severity));
            continue;
        }
        for (idx, finding) in findings.iter().enumerate() {
            push_item(&mut md, idx + 1, finding);
        }
        md.push('\n');
    }

    md.push_str("## Success Criteria\n\n");
    md.push_str("- Resolve all Critical items before the next audit.\n");
    md.push_str("- Cut the number of High items by at least half in the first remediation cycle.\n");
    let unmeasured: Vec<&str> = result
        .scorecard
        .categories
        .iter()
        .filter(|c| !c.score.is_measured())
        .map(|c| c.category.label())
        .collect();
    if !unmeasured.is_empty() {
        md.push_str(&format!(
            "- Measure the categories this audit could not score: {}.\n",
            unmeasured.join(", ")
        ));
    }
    md.push_str(&format!(
        "- Re-run with the same options (fingerprint `{}`) to compare like for like.\n",
        short_fingerprint(&result.options_fingerprint)
    ));

    md
}

fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
