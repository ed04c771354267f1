//! Audit entry point
//!
//! One audit runs the whole pipeline for a single site:
//! - Validating options and the target URL (the only hard failures)
//! - Fetching robots.txt and crawling the site within the page budget
//! - Running every checker over the immutable page records
//! - Aggregating category scores into the overall score

use crate::checks::{
    default_checkers, run_checkers, AuditContext, Category, CheckOptions, CheckerReport, Finding,
    Severity,
};
use crate::config::{options_fingerprint, validate, AuditOptions};
use crate::crawler::{CrawlSettings, CrawlStats, Crawler, Fetcher, HttpFetcher, PageRecord, RetryingFetcher};
use crate::profile::{self, SiteProfile};
use crate::robots::{fetch_robots, RobotsFile};
use crate::scoring::{self, Scorecard};
use crate::url::{resolve, TargetGuard};
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one audit produced
#[derive(Debug, Clone)]
pub struct AuditResult {
    /// Normalized start URL
    pub target: String,
    pub canonical_domain: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Page records in crawl order
    pub pages: Vec<PageRecord>,
    pub stats: CrawlStats,
    /// Response-time, word-count and business-type statistics
    pub profile: SiteProfile,
    pub robots: RobotsFile,
    /// Checker outputs in checker order
    pub reports: Vec<CheckerReport>,
    /// All findings, most urgent first
    pub findings: Vec<Finding>,
    pub scorecard: Scorecard,
    /// SHA-256 of the effective options
    pub options_fingerprint: String,
}

impl AuditResult {
    /// True when the crawl stopped early and the page set is partial
    pub fn is_partial(&self) -> bool {
        self.stats.state.is_partial()
    }

    pub fn findings_with(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    pub fn findings_for(&self, category: Category) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.category == category)
    }

    pub fn quick_wins(&self) -> Vec<&Finding> {
        scoring::quick_wins(&self.findings)
    }

    /// Files written by checkers, relative to the output directory
    pub fn artifacts(&self) -> impl Iterator<Item = &str> {
        self.reports
            .iter()
            .flat_map(|r| r.artifacts.iter().map(String::as_str))
    }
}

/// Runs a full audit of `target_url`
///
/// # Arguments
///
/// * `target_url` - Start URL of the site
/// * `options` - Validated audit options
///
/// # Returns
///
/// * `Ok(AuditResult)` - The audit ran, possibly with a partial crawl
/// * `Err(AuditError)` - Invalid options, invalid or unsafe target URL, or
///   an HTTP client that could not be built
pub async fn run(target_url: &str, options: &AuditOptions) -> Result<AuditResult> {
    run_with_cancellation(target_url, options, CancellationToken::new()).await
}

/// Runs a full audit that stops crawling when `cancel` fires
///
/// A cancelled audit still runs the checkers over the pages gathered so
/// far and returns a result whose crawl state is `Aborted`.
pub async fn run_with_cancellation(
    target_url: &str,
    options: &AuditOptions,
    cancel: CancellationToken,
) -> Result<AuditResult> {
    let started_at = Utc::now();
    validate(options)?;

    let guard = TargetGuard::new(options.allow_private_targets);
    let scope = resolve(target_url, &guard, options.include_subdomains).await?;
    tracing::info!("Auditing {} (domain {})", scope.start(), scope.canonical_domain());

    let http = HttpFetcher::new(options, guard)?;
    let fetcher: Arc<dyn Fetcher> = if options.retry_attempts > 0 {
        Arc::new(RetryingFetcher::new(http, options.retry_attempts))
    } else {
        Arc::new(http)
    };

    let robots = fetch_robots(fetcher.as_ref(), &scope).await;

    let crawler = Crawler::new(
        CrawlSettings::from_options(options),
        scope.clone(),
        Arc::clone(&fetcher),
        guard,
        robots.robots.clone(),
        options.user_agent.product_token(),
    );
    let outcome = crawler.run(cancel).await;
    tracing::info!(
        "Crawl {}: {} pages visited, {} failed",
        outcome.stats.state,
        outcome.stats.pages_visited,
        outcome.stats.pages_failed
    );

    let check_options = CheckOptions::from_options(options);
    let checkers = default_checkers(&check_options);
    let ctx = AuditContext {
        scope,
        pages: outcome.pages,
        stats: outcome.stats,
        robots,
        fetcher,
        options: check_options,
    };
    let reports = run_checkers(&checkers, &ctx).await;

    let findings = collect_findings(&reports);
    let scorecard = scoring::score(&reports);
    tracing::info!(
        "Overall score {} ({}), {} findings",
        scorecard.overall,
        scorecard.band,
        findings.len()
    );

    let AuditContext {
        scope,
        pages,
        stats,
        robots,
        ..
    } = ctx;
    let profile = profile::profile(&pages, scope.start().as_str());
    tracing::debug!("Site profile: {:?}", profile);

    Ok(AuditResult {
        target: scope.start().to_string(),
        canonical_domain: scope.canonical_domain().to_string(),
        started_at,
        finished_at: Utc::now(),
        pages,
        stats,
        profile,
        robots,
        reports,
        findings,
        scorecard,
        options_fingerprint: options_fingerprint(options),
    })
}

/// Flattens checker findings, ordered by severity, title, then category
///
/// The sort is stable, so ties keep checker order.
pub fn collect_findings(reports: &[CheckerReport]) -> Vec<Finding> {
    let mut findings: Vec<Finding> = reports
        .iter()
        .flat_map(|r| r.findings.iter().cloned())
        .collect();
    findings.sort_by(|a, b| {
        a.sort_key()
            .cmp(&b.sort_key())
            .then(a.category.cmp(&b.category))
    });
    findings
}
