//! Markdown report generation
//!
//! This module renders `FULL-AUDIT-REPORT.md` and the ordered findings
//! payload handed to report templates.

use crate::audit::AuditResult;
use crate::checks::{Category, CategoryScore, Finding};
use crate::output::traits::{OutputResult, ReportRenderer};

/// Renders `FULL-AUDIT-REPORT.md`
pub struct FullReport;

impl ReportRenderer for FullReport {
    fn file_name(&self) -> &'static str {
        super::FULL_REPORT_FILE
    }

    fn render(&self, result: &AuditResult) -> OutputResult<String> {
        Ok(format_full_report(result))
    }
}

/// Escapes a value for use inside a Markdown table cell
pub(crate) fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

pub(crate) fn crawl_state_line(result: &AuditResult) -> String {
    match result.stats.state.abort_reason() {
        Some(reason) => format!("Aborted ({}), partial results", reason),
        None => result.stats.state.to_string(),
    }
}

/// Formats the full audit report
///
/// # Arguments
///
/// * `result` - The finished audit
///
/// # Returns
///
/// A formatted markdown string
pub fn format_full_report(result: &AuditResult) -> String {
    let mut md = String::new();
    let card = &result.scorecard;

    // Title
    md.push_str("# Full SEO Audit Report\n\n");

    md.push_str(&format!("- **Target**: {}\n", result.target));
    md.push_str(&format!("- **Domain**: {}\n", result.canonical_domain));
    md.push_str(&format!("- **Generated**: {}\n", result.finished_at.to_rfc3339()));
    md.push_str(&format!("- **Crawl**: {}\n", crawl_state_line(result)));
    md.push_str(&format!(
        "- **Options Fingerprint**: `{}`\n\n",
        result.options_fingerprint
    ));

    // Scores
    md.push_str("## Score Summary\n\n");
    md.push_str(&format!(
        "**Overall score: {:.1}/100** ({}, grade {})\n\n",
        card.overall, card.band, card.grade
    ));
    md.push_str("| Category | Weight | Effective Weight | Score |\n");
    md.push_str("|----------|--------|------------------|-------|\n");
    for entry in &card.categories {
        let effective = entry
            .effective_weight
            .map(|w| format!("{:.2}", w))
            .unwrap_or_else(|| "-".to_string());
        let score = match &entry.score {
            CategoryScore::Measured { score } => format!("{:.1}", score),
            CategoryScore::NotMeasured { reason } => format!("Not Measured ({})", cell(reason)),
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            entry.category.label(),
            entry.weight,
            effective,
            score
        ));
    }
    md.push('\n');

    // Quick wins
    md.push_str("## Quick Wins\n\n");
    let wins = result.quick_wins();
    if wins.is_empty() {
        md.push_str("- No quick wins detected in this crawl.\n\n");
    } else {
        for (idx, finding) in wins.iter().enumerate() {
            md.push_str(&format!(
                "{}. **{}** ({}, {}) - {}\n",
                idx + 1,
                finding.title,
                finding.category.label(),
                finding.severity,
                finding.recommendation
            ));
        }
        md.push('\n');
    }

    // Crawl statistics
    let stats = &result.stats;
    md.push_str("## Crawl Statistics\n\n");
    md.push_str(&format!("- **Pages Visited**: {}\n", stats.pages_visited));
    md.push_str(&format!("- **Pages Succeeded**: {}\n", stats.pages_succeeded));
    md.push_str(&format!("- **Pages Failed**: {}\n", stats.pages_failed));
    md.push_str(&format!("- **HTML Pages**: {}\n", stats.html_pages));
    md.push_str(&format!("- **Failure Rate**: {:.2}%\n", stats.failure_rate()));
    md.push_str(&format!("- **URLs Discovered**: {}\n", stats.urls_discovered));
    md.push_str(&format!("- **Skipped by robots.txt**: {}\n", stats.skipped_by_robots));
    md.push_str(&format!("- **Skipped by Depth**: {}\n", stats.skipped_by_depth));
    md.push_str(&format!("- **Budget Remaining**: {}\n", stats.budget_remaining));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n\n",
        stats.duration_ms as f64 / 1000.0
    ));

    let profile = &result.profile;
    md.push_str("### Site Profile\n\n");
    md.push_str(&format!(
        "- **Median Response Time**: {} ms\n",
        number(profile.response_times.median_ms)
    ));
    md.push_str(&format!(
        "- **p90 Response Time**: {} ms\n",
        number(profile.response_times.p90_ms)
    ));
    md.push_str(&format!(
        "- **Word Count p25 / Median / p75**: {} / {} / {}\n",
        number(profile.word_counts.p25),
        number(profile.word_counts.median),
        number(profile.word_counts.p75)
    ));
    md.push_str(&format!(
        "- **Business Type**: {} ({:.1}% confidence)\n\n",
        profile.business.kind,
        profile.business.confidence * 100.0
    ));

    if !stats.failures.is_empty() {
        md.push_str("### Failures\n\n");
        md.push_str("| URL | State | Status | Reason |\n");
        md.push_str("|-----|-------|--------|--------|\n");
        for failure in &stats.failures {
            let status = failure
                .status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                cell(&failure.url),
                failure.state,
                status,
                cell(&failure.reason)
            ));
        }
        md.push('\n');
    }

    // Findings
    md.push_str("## Findings\n\n");
    md.push_str(&render_findings_payload(result));

    // Artifacts
    let artifacts: Vec<&str> = result.artifacts().collect();
    if !artifacts.is_empty() {
        md.push_str("## Artifacts\n\n");
        for artifact in artifacts {
            md.push_str(&format!("- `{}`\n", artifact));
        }
        md.push('\n');
    }

    md
}

fn number(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

fn push_finding(md: &mut String, finding: &Finding) {
    md.push_str(&format!("#### [{}] {}\n\n", finding.severity, finding.title));
    if !finding.detail.is_empty() {
        md.push_str(&format!("{}\n\n", finding.detail));
    }
    if !finding.impact.is_empty() {
        md.push_str(&format!("- **Impact**: {}\n", finding.impact));
    }
    if !finding.recommendation.is_empty() {
        md.push_str(&format!("- **Recommendation**: {}\n", finding.recommendation));
    }
    md.push_str(&format!("- **Effort**: {}\n", finding.effort.label()));
    if !finding.evidence.is_empty() {
        md.push_str("- **Evidence**:\n");
        for evidence in &finding.evidence {
            md.push_str(&format!("  - {}: {}\n", evidence.url, evidence.signal));
        }
    }
    md.push('\n');
}

/// Renders every finding as ordered Markdown, grouped by category
///
/// Categories follow the weight table; inside a category findings keep
/// the audit's severity order. This is the payload substituted into
/// report templates.
pub fn render_findings_payload(result: &AuditResult) -> String {
    let mut md = String::new();
    if result.findings.is_empty() {
        md.push_str("No issues were detected in this crawl.\n\n");
        return md;
    }

    for category in Category::ALL {
        let findings: Vec<&Finding> = result.findings_for(category).collect();
        if findings.is_empty() {
            continue;
        }
        md.push_str(&format!("### {} ({})\n\n", category.label(), findings.len()));
        for finding in findings {
            push_finding(&mut md, finding);
        }
    }
    md
}
