//! Machine-readable audit summary

use crate::audit::AuditResult;
use crate::checks::Severity;
use crate::crawler::CrawlStats;
use crate::output::traits::{OutputResult, ReportRenderer};
use crate::profile::SiteProfile;
use crate::scoring::{Band, CategoryResult, Grade};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Renders `SUMMARY.json`
pub struct SummaryJson;

impl ReportRenderer for SummaryJson {
    fn file_name(&self) -> &'static str {
        super::SUMMARY_FILE
    }

    fn render(&self, result: &AuditResult) -> OutputResult<String> {
        let mut json = serde_json::to_string_pretty(&AuditSummary::from_result(result))?;
        json.push('\n');
        Ok(json)
    }
}

/// Finding totals by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindingCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

/// Contents of `SUMMARY.json`
#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary<'a> {
    pub target: &'a str,
    pub canonical_domain: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub partial: bool,
    pub overall_score: f64,
    pub band: Band,
    pub grade: Grade,
    pub categories: &'a [CategoryResult],
    pub findings: FindingCounts,
    pub quick_wins: Vec<&'a str>,
    pub crawl: &'a CrawlStats,
    pub profile: &'a SiteProfile,
    pub robots_txt_found: bool,
    pub artifacts: Vec<&'a str>,
    pub options_fingerprint: &'a str,
}

impl<'a> AuditSummary<'a> {
    pub fn from_result(result: &'a AuditResult) -> Self {
        let count = |severity: Severity| result.findings_with(severity).count();
        Self {
            target: &result.target,
            canonical_domain: &result.canonical_domain,
            started_at: result.started_at,
            finished_at: result.finished_at,
            partial: result.is_partial(),
            overall_score: result.scorecard.overall,
            band: result.scorecard.band,
            grade: result.scorecard.grade,
            categories: &result.scorecard.categories,
            findings: FindingCounts {
                critical: count(Severity::Critical),
                high: count(Severity::High),
                medium: count(Severity::Medium),
                low: count(Severity::Low),
                total: result.findings.len(),
            },
            quick_wins: result.quick_wins().iter().map(|f| f.title.as_str()).collect(),
            crawl: &result.stats,
            profile: &result.profile,
            robots_txt_found: result.robots.found,
            artifacts: result.artifacts().collect(),
            options_fingerprint: &result.options_fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::sample_result;
    use serde_json::Value;

    fn rendered() -> Value {
        let json = SummaryJson.render(&sample_result()).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_summary_scores() {
        let summary = rendered();
        assert_eq!(summary["overall_score"], 72.5);
        assert_eq!(summary["band"], "good");
        assert_eq!(summary["grade"], "C");
        assert_eq!(summary["partial"], false);

        let categories = summary["categories"].as_array().unwrap();
        assert_eq!(categories.len(), 7);
        assert_eq!(categories[0]["category"], "technical");
        assert_eq!(categories[0]["score"]["status"], "measured");
        assert_eq!(categories[0]["score"]["score"], 60.0);
        assert_eq!(categories[4]["score"]["status"], "not_measured");
        assert!(categories[4]["effective_weight"].is_null());
    }

    #[test]
    fn test_summary_counts_and_crawl() {
        let summary = rendered();
        assert_eq!(summary["findings"]["critical"], 1);
        assert_eq!(summary["findings"]["high"], 1);
        assert_eq!(summary["findings"]["total"], 3);
        assert_eq!(summary["quick_wins"][0], "Missing title tags");
        assert_eq!(summary["crawl"]["pages_visited"], 3);
        assert_eq!(summary["crawl"]["state"]["state"], "completed");
        assert_eq!(summary["crawl"]["failures"][0]["status_code"], 500);
        assert_eq!(summary["artifacts"][0], "screenshots/desktop.png");
        assert_eq!(summary["options_fingerprint"], sample_result().options_fingerprint);
    }

    #[test]
    fn test_summary_profile() {
        let summary = rendered();
        let profile = &summary["profile"];
        assert_eq!(profile["response_times"]["median_ms"], 240.0);
        assert_eq!(profile["response_times"]["p90_ms"], 910.0);
        assert_eq!(profile["word_counts"]["p25"], 180.0);
        assert_eq!(profile["word_counts"]["p75"], 1200.0);
        assert_eq!(profile["business"]["kind"], "publisher");
        assert_eq!(profile["business"]["confidence"], 0.667);
        assert_eq!(profile["business"]["signals"][0], "path signal: /blog (/blog/launch)");
    }
}
