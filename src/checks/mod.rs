//! Specialist checkers
//!
//! Each checker reads the immutable page records of one crawl and produces
//! findings plus, for scored tracks, a category score. Checkers never
//! mutate shared state and run concurrently.
//!
//! | Checker | Category | Scored |
//! |---------|----------|--------|
//! | technical | Technical | yes |
//! | content | Content | yes |
//! | onpage | On-Page | yes |
//! | schema | Schema | yes |
//! | performance | Performance | yes (PageSpeed API key required) |
//! | images | Images | yes |
//! | ai_readiness | AI readiness | yes |
//! | sitemap | Technical | findings only |
//! | visual | Technical | findings only, opt-in |

mod ai_readiness;
mod content;
mod images;
mod onpage;
mod performance;
mod schema;
mod sitemap;
mod technical;
mod visual;

pub use ai_readiness::AiReadinessChecker;
pub use content::ContentChecker;
pub use images::ImagesChecker;
pub use onpage::OnPageChecker;
pub use performance::{PerformanceChecker, PAGESPEED_ENDPOINT};
pub use schema::{validate_json_ld, SchemaChecker, SchemaIssue};
pub use sitemap::SitemapChecker;
pub use technical::TechnicalChecker;
pub use visual::{find_browser, VisualChecker};

use crate::config::AuditOptions;
use crate::crawler::{CrawlStats, Fetcher, PageRecord, PageSignals};
use crate::robots::RobotsFile;
use crate::url::Scope;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Maximum number of evidence entries kept per finding
pub const MAX_EVIDENCE: usize = 8;

/// Reason recorded when a crawl yielded no HTML pages
pub(crate) const NO_HTML_PAGES: &str = "no HTML pages were crawled";

/// Specialist audit tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Technical,
    Content,
    OnPage,
    Schema,
    Performance,
    Images,
    AiReadiness,
}

impl Category {
    /// All categories in weight-table order
    pub const ALL: [Category; 7] = [
        Category::Technical,
        Category::Content,
        Category::OnPage,
        Category::Schema,
        Category::Performance,
        Category::Images,
        Category::AiReadiness,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Content => "content",
            Self::OnPage => "onpage",
            Self::Schema => "schema",
            Self::Performance => "performance",
            Self::Images => "images",
            Self::AiReadiness => "ai_readiness",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Technical => "Technical SEO",
            Self::Content => "Content Quality",
            Self::OnPage => "On-Page SEO",
            Self::Schema => "Schema / Structured Data",
            Self::Performance => "Performance",
            Self::Images => "Images",
            Self::AiReadiness => "AI Search Readiness",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Remediation urgency, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Estimated work to fix a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// The page and signal that triggered a finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    pub url: String,
    pub signal: String,
}

impl Evidence {
    pub fn new(url: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            signal: signal.into(),
        }
    }
}

/// One detected issue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub category: Category,
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    pub impact: String,
    pub recommendation: String,
    /// At most [`MAX_EVIDENCE`] entries, first occurrence order, no duplicates
    pub evidence: Vec<Evidence>,
    pub effort: Effort,
}

impl Finding {
    pub fn new(
        category: Category,
        severity: Severity,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            title: title.into(),
            detail: detail.into(),
            impact: String::new(),
            recommendation: String::new(),
            evidence: Vec::new(),
            effort: Effort::Medium,
        }
    }

    pub fn impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = impact.into();
        self
    }

    pub fn recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn effort(mut self, effort: Effort) -> Self {
        self.effort = effort;
        self
    }

    pub fn evidence(mut self, evidence: impl IntoIterator<Item = Evidence>) -> Self {
        for item in evidence {
            if self.evidence.len() >= MAX_EVIDENCE {
                break;
            }
            if !self.evidence.contains(&item) {
                self.evidence.push(item);
            }
        }
        self
    }

    /// Ordering used by every report: severity, then title
    pub fn sort_key(&self) -> (Severity, &str) {
        (self.severity, self.title.as_str())
    }
}

/// Health score of one category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryScore {
    Measured { score: f64 },
    NotMeasured { reason: String },
}

impl CategoryScore {
    /// A measured score, clamped to [0, 100] and rounded to one decimal
    pub fn measured(score: f64) -> Self {
        Self::Measured {
            score: round1(score.clamp(0.0, 100.0)),
        }
    }

    pub fn not_measured(reason: impl Into<String>) -> Self {
        Self::NotMeasured {
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Measured { score } => Some(*score),
            Self::NotMeasured { .. } => None,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, Self::Measured { .. })
    }
}

/// Output of one checker
#[derive(Debug, Clone, Serialize)]
pub struct CheckerReport {
    pub checker: String,
    pub category: Category,
    /// Whether `score` takes part in the overall score
    pub contributes_score: bool,
    /// `None` for findings-only checkers that ran
    pub score: Option<CategoryScore>,
    pub findings: Vec<Finding>,
    /// Files written by the checker, relative to the output directory
    pub artifacts: Vec<String>,
}

impl CheckerReport {
    pub fn scored(checker: &dyn Checker, score: CategoryScore, findings: Vec<Finding>) -> Self {
        Self {
            checker: checker.name().to_string(),
            category: checker.category(),
            contributes_score: checker.contributes_score(),
            score: Some(score),
            findings,
            artifacts: Vec::new(),
        }
    }

    pub fn findings_only(checker: &dyn Checker, findings: Vec<Finding>) -> Self {
        Self {
            checker: checker.name().to_string(),
            category: checker.category(),
            contributes_score: checker.contributes_score(),
            score: None,
            findings,
            artifacts: Vec::new(),
        }
    }
}

/// Settings the checkers read from the audit options
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub pagespeed_api_key: Option<String>,
    pub include_visual: bool,
    pub screenshot_dir: Option<std::path::PathBuf>,
    pub timeout: std::time::Duration,
}

impl CheckOptions {
    pub fn from_options(options: &AuditOptions) -> Self {
        Self {
            pagespeed_api_key: options.pagespeed_api_key.clone(),
            include_visual: options.include_visual,
            screenshot_dir: options.screenshot_dir.clone(),
            timeout: options.timeout(),
        }
    }
}

/// Everything a checker may read
pub struct AuditContext {
    pub scope: Scope,
    pub pages: Vec<PageRecord>,
    pub stats: CrawlStats,
    pub robots: RobotsFile,
    /// Guarded fetcher for auxiliary site files (sitemaps, llms.txt)
    pub fetcher: Arc<dyn Fetcher>,
    pub options: CheckOptions,
}

impl AuditContext {
    /// Pages that carry parser signals, in crawl order
    pub fn html_pages(&self) -> impl Iterator<Item = (&PageRecord, &PageSignals)> {
        self.pages
            .iter()
            .filter_map(|page| page.signals.as_ref().map(|signals| (page, signals)))
    }

    pub fn html_count(&self) -> usize {
        self.html_pages().count()
    }

    /// The first record of the crawl if it was fetched successfully
    pub fn homepage(&self) -> Option<&PageRecord> {
        self.pages.first().filter(|page| !page.is_failure())
    }

    /// Whether `path` on the audited origin answers with a status below 400
    pub async fn site_file_exists(&self, path: &str) -> bool {
        let Some(url) = self.scope.site_url(path) else {
            return false;
        };
        match self.fetcher.fetch(&url).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                tracing::debug!("Request to {} failed: {}", url, e);
                false
            }
        }
    }

    /// Evidence for HTML pages matching `predicate`, at most [`MAX_EVIDENCE`]
    pub fn sample<F>(&self, signal: &str, predicate: F) -> Vec<Evidence>
    where
        F: Fn(&PageSignals) -> bool,
    {
        self.html_pages()
            .filter(|(_, signals)| predicate(signals))
            .take(MAX_EVIDENCE)
            .map(|(page, _)| Evidence::new(page.url.clone(), signal))
            .collect()
    }
}

/// One specialist audit track
#[async_trait]
pub trait Checker: Send + Sync {
    fn name(&self) -> &'static str;

    fn category(&self) -> Category;

    /// Findings-only checkers return false
    fn contributes_score(&self) -> bool {
        true
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport;
}

/// The checker set for an audit
pub fn default_checkers(options: &CheckOptions) -> Vec<Box<dyn Checker>> {
    let mut checkers: Vec<Box<dyn Checker>> = vec![
        Box::new(TechnicalChecker),
        Box::new(ContentChecker),
        Box::new(OnPageChecker),
        Box::new(SchemaChecker),
        Box::new(PerformanceChecker::new(options.pagespeed_api_key.clone())),
        Box::new(ImagesChecker),
        Box::new(AiReadinessChecker),
        Box::new(SitemapChecker),
    ];
    if options.include_visual {
        checkers.push(Box::new(VisualChecker::new(options.screenshot_dir.clone())));
    }
    checkers
}

/// Runs all checkers concurrently over the same context
///
/// Reports come back in checker order.
pub async fn run_checkers(checkers: &[Box<dyn Checker>], ctx: &AuditContext) -> Vec<CheckerReport> {
    let futures = checkers.iter().map(|checker| async move {
        tracing::debug!("Running {} checker", checker.name());
        let report = checker.evaluate(ctx).await;
        tracing::debug!(
            "{} checker produced {} findings",
            checker.name(),
            report.findings.len()
        );
        report
    });
    futures::future::join_all(futures).await
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `count / total` with an empty total counting as 1
pub(crate) fn ratio(count: usize, total: usize) -> f64 {
    count as f64 / total.max(1) as f64
}
