//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the pieces together:
//! - Seeding the frontier with the start URL
//! - Running a fixed pool of worker slots against the shared frontier
//! - Fetching, classifying and parsing each claimed URL
//! - Filtering discovered links by scope, safety and robots.txt
//! - Collecting page records and crawl statistics

use crate::config::AuditOptions;
use crate::crawler::fetcher::{FetchError, Fetcher, PageFetch};
use crate::crawler::frontier::{ClaimedUrl, Completion, Discovery, Frontier, SharedFrontier};
use crate::crawler::pacing::{effective_delay, SlotPacer};
use crate::crawler::parser::{looks_like_html, parse};
use crate::crawler::record::{CrawlStats, FailureEntry, PageRecord};
use crate::robots::ParsedRobots;
use crate::state::{CrawlState, PageState};
use crate::url::{normalize_url, Scope, TargetGuard};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Limits of one crawl, taken from validated options
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSettings {
    pub max_pages: usize,
    pub max_depth: u32,
    pub concurrency: usize,
    pub request_delay: Duration,
    pub failure_threshold: u32,
}

impl CrawlSettings {
    pub fn from_options(options: &AuditOptions) -> Self {
        Self {
            max_pages: options.max_pages,
            max_depth: options.max_depth,
            concurrency: options.concurrency.max(1),
            request_delay: options.request_delay(),
            failure_threshold: options.failure_threshold,
        }
    }
}

/// Everything a crawl produced
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Records in dequeue order
    pub pages: Vec<PageRecord>,
    pub stats: CrawlStats,
}

/// Bounded breadth-first crawler over one site
pub struct Crawler {
    settings: CrawlSettings,
    scope: Scope,
    fetcher: Arc<dyn Fetcher>,
    guard: TargetGuard,
    robots: ParsedRobots,
    user_agent: String,
}

/// State shared by all worker slots
struct WorkerContext {
    frontier: SharedFrontier,
    scope: Scope,
    fetcher: Arc<dyn Fetcher>,
    guard: TargetGuard,
    robots: ParsedRobots,
    user_agent: String,
    delay: Duration,
    completed: AtomicUsize,
    started: Instant,
}

impl Crawler {
    /// Creates a crawler
    ///
    /// # Arguments
    ///
    /// * `settings` - Crawl limits
    /// * `scope` - Site boundary; its start URL seeds the frontier
    /// * `fetcher` - Fetcher used for every page
    /// * `guard` - Safety filter applied to discovered links
    /// * `robots` - The site's robots.txt rules
    /// * `user_agent` - Product token matched against robots.txt groups
    pub fn new(
        settings: CrawlSettings,
        scope: Scope,
        fetcher: Arc<dyn Fetcher>,
        guard: TargetGuard,
        robots: ParsedRobots,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            scope,
            fetcher,
            guard,
            robots,
            user_agent: user_agent.into(),
        }
    }

    /// Runs the crawl to completion, abort or cancellation
    ///
    /// Never fails: every fetch problem is recorded in the returned
    /// statistics. After `cancel` fires no new URL is claimed; fetches
    /// already in flight finish or time out.
    pub async fn run(&self, cancel: CancellationToken) -> CrawlOutcome {
        let started_at = Utc::now();
        let started = Instant::now();
        let state = CrawlState::Running;

        let delay = effective_delay(self.settings.request_delay, &self.robots, &self.user_agent);
        tracing::info!(
            "Starting crawl of {} (max {} pages, {} workers, {:?} delay)",
            self.scope.start(),
            self.settings.max_pages,
            self.settings.concurrency,
            delay
        );

        let frontier = Frontier::new(
            self.scope.start().clone(),
            self.settings.max_pages,
            self.settings.max_depth,
            self.settings.failure_threshold,
        );

        let ctx = Arc::new(WorkerContext {
            frontier: SharedFrontier::new(frontier),
            scope: self.scope.clone(),
            fetcher: self.fetcher.clone(),
            guard: self.guard.clone(),
            robots: self.robots.clone(),
            user_agent: self.user_agent.clone(),
            delay,
            completed: AtomicUsize::new(0),
            started,
        });

        let mut workers = JoinSet::new();
        for _ in 0..self.settings.concurrency {
            workers.spawn(worker(ctx.clone(), cancel.clone()));
        }

        let mut collected: Vec<(usize, PageRecord)> = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(records) => collected.extend(records),
                Err(e) => {
                    // A panicking worker must not leave the others waiting forever
                    tracing::warn!("Crawl worker stopped unexpectedly: {}", e);
                    ctx.frontier.cancel();
                }
            }
        }
        collected.sort_by_key(|(sequence, _)| *sequence);
        let pages: Vec<PageRecord> = collected.into_iter().map(|(_, record)| record).collect();

        let snapshot = ctx.frontier.snapshot();
        let terminal = match snapshot.abort {
            Some(reason) => CrawlState::Aborted(reason),
            None => CrawlState::Completed,
        };
        let state = state.transition(terminal).unwrap_or(terminal);

        let failures: Vec<FailureEntry> = pages
            .iter()
            .filter(|p| p.is_failure())
            .map(|p| FailureEntry {
                url: p.url.clone(),
                state: p.state,
                status_code: p.status_code,
                reason: p.error.clone().unwrap_or_else(|| p.state.to_string()),
            })
            .collect();

        let stats = CrawlStats {
            state,
            pages_visited: pages.len(),
            pages_succeeded: pages.len() - failures.len(),
            pages_failed: failures.len(),
            html_pages: pages.iter().filter(|p| p.signals.is_some()).count(),
            failures,
            skipped_by_robots: snapshot.skipped_by_robots,
            skipped_by_depth: snapshot.skipped_by_depth,
            urls_discovered: snapshot.urls_discovered,
            budget_remaining: snapshot.budget_remaining,
            started_at,
            finished_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Crawl {}: {} pages ({} failed) in {:?}",
            stats.state,
            stats.pages_visited,
            stats.pages_failed,
            started.elapsed()
        );

        CrawlOutcome { pages, stats }
    }
}

/// One worker slot: pace, claim, process, complete, repeat
async fn worker(ctx: Arc<WorkerContext>, cancel: CancellationToken) -> Vec<(usize, PageRecord)> {
    let mut pacer = SlotPacer::new(ctx.delay);
    let mut records = Vec::new();

    loop {
        if let Some(wait) = pacer.time_until_next(Instant::now()) {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => {
                    ctx.frontier.cancel();
                    break;
                }
            }
        }

        let Some(claimed) = ctx.frontier.claim(&cancel).await else {
            break;
        };
        pacer.record_start(Instant::now());

        let (record, completion) = ctx.process(&claimed).await;
        ctx.frontier.complete(completion);
        records.push((claimed.sequence, record));

        let done = ctx.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if done % 10 == 0 {
            let snapshot = ctx.frontier.snapshot();
            let rate = done as f64 / ctx.started.elapsed().as_secs_f64().max(0.001);
            tracing::info!(
                "Progress: {} pages crawled, {} in queue, {:.2} pages/sec",
                done,
                snapshot.queued,
                rate
            );
        }
    }

    records
}

impl WorkerContext {
    /// Fetches one claimed URL and turns the response into a record
    async fn process(&self, claimed: &ClaimedUrl) -> (PageRecord, Completion) {
        tracing::debug!("Processing URL: {} (depth {})", claimed.url, claimed.depth);

        match self.fetcher.fetch(&claimed.url).await {
            Ok(response) => self.process_response(claimed, response),
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", claimed.url, e);
                (failure_record(claimed, &e), failed_completion(claimed.depth))
            }
        }
    }

    fn process_response(&self, claimed: &ClaimedUrl, response: PageFetch) -> (PageRecord, Completion) {
        let redirected_to = (response.final_url != claimed.url
            && self.scope.same_site(&response.final_url))
        .then(|| response.final_url.clone());

        let mut record = PageRecord {
            url: claimed.url.to_string(),
            final_url: response.final_url.to_string(),
            state: PageState::Processed,
            status_code: Some(response.status),
            depth: claimed.depth,
            signals: None,
            headers: response.headers.clone(),
            response_ms: Some(response.elapsed.as_millis() as u64),
            redirect_hops: response.redirect_hops,
            error: None,
        };

        if !response.is_success() {
            record.state = PageState::HttpError;
            record.error = Some(format!("HTTP {}", response.status));
            return (record, failed_completion(claimed.depth));
        }

        let mut completion = Completion {
            depth: claimed.depth,
            success: true,
            redirected_to,
            discovered: Vec::new(),
        };

        if !looks_like_html(response.content_type(), &response.body) {
            record.state = PageState::NonHtml;
            return (record, completion);
        }

        match parse(&response.body, &response.final_url) {
            Ok(mut signals) => {
                if let Some(header) = response.header("x-robots-tag") {
                    signals.merge_robots_header(header);
                }
                completion.discovered = self.discover(&signals.internal_links, &signals.external_links);
                record.signals = Some(signals);
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", claimed.url, e);
                record.state = PageState::ParseFailed;
                record.error = Some(format!("Parse error: {}", e));
            }
        }

        (record, completion)
    }

    /// Filters extracted links down to what may enter the frontier
    ///
    /// Order: scope, safety, robots.txt. Links blocked by robots are
    /// reported so they can be counted.
    fn discover(&self, internal: &[String], external: &[String]) -> Vec<Discovery> {
        let mut seen = HashSet::new();
        let mut discovered = Vec::new();

        for link in internal.iter().chain(external) {
            let Ok(url) = normalize_url(link) else {
                tracing::trace!("Skipping unnormalizable link {}", link);
                continue;
            };
            if !self.scope.same_site(&url) || !seen.insert(url.as_str().to_string()) {
                continue;
            }
            if let Err(e) = self.guard.check_literal(&url) {
                tracing::debug!("Skipping unsafe link {}: {}", url, e);
                continue;
            }
            if self.robots.is_allowed(url.as_str(), &self.user_agent) {
                discovered.push(Discovery::Allowed(url));
            } else {
                tracing::debug!("URL {} disallowed by robots.txt", url);
                discovered.push(Discovery::RobotsBlocked(url));
            }
        }

        discovered
    }
}

fn failure_record(claimed: &ClaimedUrl, error: &FetchError) -> PageRecord {
    PageRecord {
        url: claimed.url.to_string(),
        final_url: claimed.url.to_string(),
        state: error.page_state(),
        status_code: None,
        depth: claimed.depth,
        signals: None,
        headers: Default::default(),
        response_ms: None,
        redirect_hops: 0,
        error: Some(error.to_string()),
    }
}

fn failed_completion(depth: u32) -> Completion {
    Completion {
        depth,
        success: false,
        redirected_to: None,
        discovered: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AbortReason;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap};
    use url::Url;

    /// Serves canned responses and records every requested URL
    #[derive(Default)]
    struct SiteFetcher {
        pages: HashMap<String, (u16, String)>,
        requests: Mutex<Vec<String>>,
    }

    impl SiteFetcher {
        fn page(mut self, path: &str, links: &[&str]) -> Self {
            let anchors: String = links
                .iter()
                .map(|l| format!("<a href=\"{}\">{}</a>", l, l))
                .collect();
            self.pages.insert(
                format!("https://example.com{}", path),
                (200, format!("<html><head><title>{}</title></head><body>{}</body></html>", path, anchors)),
            );
            self
        }

        fn status(mut self, path: &str, status: u16) -> Self {
            self.pages
                .insert(format!("https://example.com{}", path), (status, "error".to_string()));
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl Fetcher for SiteFetcher {
        async fn fetch(&self, url: &Url) -> Result<PageFetch, FetchError> {
            self.requests.lock().push(url.to_string());
            let Some((status, body)) = self.pages.get(url.as_str()) else {
                return Err(FetchError::Connect {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                });
            };
            let mut headers = BTreeMap::new();
            headers.insert("content-type".to_string(), "text/html".to_string());
            Ok(PageFetch {
                status: *status,
                final_url: url.clone(),
                headers,
                body: body.as_bytes().to_vec(),
                redirect_hops: 0,
                elapsed: Duration::from_millis(5),
            })
        }
    }

    fn settings(max_pages: usize, concurrency: usize) -> CrawlSettings {
        CrawlSettings {
            max_pages,
            max_depth: 10,
            concurrency,
            request_delay: Duration::ZERO,
            failure_threshold: 10,
        }
    }

    fn crawler(settings: CrawlSettings, fetcher: Arc<SiteFetcher>, robots: ParsedRobots) -> Crawler {
        let scope = Scope::from_url(Url::parse("https://example.com/").unwrap(), false).unwrap();
        Crawler::new(settings, scope, fetcher, TargetGuard::default(), robots, "SiteAuditBot")
    }

    #[tokio::test]
    async fn test_budget_limits_breadth_first_crawl() {
        let site = Arc::new(
            SiteFetcher::default()
                .page("/", &["/a", "/b"])
                .page("/a", &["/c"])
                .page("/b", &[])
                .page("/c", &[]),
        );
        let outcome = crawler(settings(3, 1), site.clone(), ParsedRobots::allow_all())
            .run(CancellationToken::new())
            .await;

        assert_eq!(
            site.requested(),
            vec![
                "https://example.com/",
                "https://example.com/a",
                "https://example.com/b"
            ]
        );
        assert_eq!(outcome.stats.state, CrawlState::Completed);
        assert_eq!(outcome.stats.budget_remaining, 0);
        assert_eq!(outcome.stats.urls_discovered, 4);
        assert_eq!(outcome.pages.len(), 3);
        assert_eq!(outcome.pages[1].depth, 1);
    }

    #[tokio::test]
    async fn test_server_error_recorded_without_halting() {
        let site = Arc::new(
            SiteFetcher::default()
                .page("/", &["/broken", "/ok"])
                .status("/broken", 500)
                .page("/ok", &[]),
        );
        let outcome = crawler(settings(10, 2), site, ParsedRobots::allow_all())
            .run(CancellationToken::new())
            .await;

        assert_eq!(outcome.stats.state, CrawlState::Completed);
        assert_eq!(outcome.stats.pages_visited, 3);
        assert_eq!(outcome.stats.pages_failed, 1);
        assert_eq!(outcome.stats.failures[0].url, "https://example.com/broken");
        assert_eq!(outcome.stats.failures[0].status_code, Some(500));

        let broken = outcome.pages.iter().find(|p| p.url.ends_with("/broken")).unwrap();
        assert_eq!(broken.state, PageState::HttpError);
        assert!(broken.signals.is_none());
    }

    #[tokio::test]
    async fn test_consecutive_failures_abort_with_partial_results() {
        let site = Arc::new(SiteFetcher::default().page("/", &["/x1", "/x2", "/x3", "/x4", "/x5"]));
        let mut limits = settings(10, 1);
        limits.failure_threshold = 3;

        let outcome = crawler(limits, site.clone(), ParsedRobots::allow_all())
            .run(CancellationToken::new())
            .await;

        assert_eq!(
            outcome.stats.state,
            CrawlState::Aborted(AbortReason::FailureThreshold {
                consecutive_failures: 3
            })
        );
        assert_eq!(site.requested().len(), 4);
        assert_eq!(outcome.stats.pages_succeeded, 1);
        assert!(outcome.stats.state.is_partial());
    }

    #[tokio::test]
    async fn test_robots_disallowed_links_never_fetched() {
        let site = Arc::new(
            SiteFetcher::default()
                .page("/", &["/private/a", "/public", "/private/b"])
                .page("/public", &["/private/a"])
                .page("/private/a", &[])
                .page("/private/b", &[]),
        );
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /private");
        let outcome = crawler(settings(10, 2), site.clone(), robots)
            .run(CancellationToken::new())
            .await;

        assert!(site.requested().iter().all(|u| !u.contains("/private")));
        assert_eq!(outcome.stats.skipped_by_robots, 2);
        assert_eq!(outcome.stats.pages_visited, 2);
    }

    #[tokio::test]
    async fn test_no_url_fetched_twice() {
        let site = Arc::new(
            SiteFetcher::default()
                .page("/", &["/a", "/b", "/a#top", "/?utm_source=x"])
                .page("/a", &["/", "/b"])
                .page("/b", &["/a", "/"]),
        );
        crawler(settings(50, 4), site.clone(), ParsedRobots::allow_all())
            .run(CancellationToken::new())
            .await;

        let requested = site.requested();
        let unique: HashSet<_> = requested.iter().collect();
        assert_eq!(requested.len(), unique.len());
        assert_eq!(requested.len(), 3);
    }

    #[tokio::test]
    async fn test_offsite_links_not_followed() {
        let site = Arc::new(
            SiteFetcher::default().page("/", &["https://other.example.org/", "https://sub.example.com/"]),
        );
        let outcome = crawler(settings(10, 1), site.clone(), ParsedRobots::allow_all())
            .run(CancellationToken::new())
            .await;
        assert_eq!(site.requested(), vec!["https://example.com/"]);
        assert_eq!(outcome.stats.urls_discovered, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let site = Arc::new(SiteFetcher::default().page("/", &["/a"]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = crawler(settings(10, 2), site.clone(), ParsedRobots::allow_all())
            .run(cancel)
            .await;

        assert!(site.requested().is_empty());
        assert_eq!(outcome.stats.state, CrawlState::Aborted(AbortReason::Cancelled));
        assert!(outcome.pages.is_empty());
    }

    #[tokio::test]
    async fn test_depth_limit_skips_deep_pages() {
        let site = Arc::new(
            SiteFetcher::default()
                .page("/", &["/one"])
                .page("/one", &["/two"])
                .page("/two", &[]),
        );
        let mut limits = settings(10, 1);
        limits.max_depth = 1;
        let outcome = crawler(limits, site.clone(), ParsedRobots::allow_all())
            .run(CancellationToken::new())
            .await;

        assert_eq!(outcome.stats.pages_visited, 2);
        assert_eq!(outcome.stats.skipped_by_depth, 1);
    }

    #[test]
    fn test_settings_from_options() {
        let options = AuditOptions::default();
        let settings = CrawlSettings::from_options(&options);
        assert_eq!(settings.max_pages, 500);
        assert_eq!(settings.concurrency, 5);
        assert_eq!(settings.request_delay, Duration::from_secs(1));
        assert_eq!(settings.failure_threshold, 10);
    }
}
