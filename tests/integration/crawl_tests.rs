//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the real
//! HTTP fetcher and crawler end-to-end.

use site_audit::config::AuditOptions;
use site_audit::crawler::{CrawlOutcome, CrawlSettings, Crawler, Fetcher, HttpFetcher};
use site_audit::robots::fetch_robots;
use site_audit::state::{AbortReason, CrawlState, PageState};
use site_audit::url::{Scope, TargetGuard};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_options(max_pages: usize) -> AuditOptions {
    AuditOptions::builder()
        .max_pages(max_pages)
        .concurrency(1)
        .request_delay_seconds(0.0)
        .timeout_seconds(5)
        .failure_threshold(3)
        .allow_private_targets(true)
        .build()
        .expect("valid test options")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Page</title></head><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

async fn crawl(server: &MockServer, options: &AuditOptions, cancel: CancellationToken) -> CrawlOutcome {
    let guard = TargetGuard::new(true);
    let scope = Scope::from_url(Url::parse(&server.uri()).unwrap(), false).unwrap();
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(options, guard).unwrap());
    let robots = fetch_robots(fetcher.as_ref(), &scope).await;

    Crawler::new(
        CrawlSettings::from_options(options),
        scope,
        fetcher,
        guard,
        robots.robots,
        options.user_agent.product_token(),
    )
    .run(cancel)
    .await
}

fn paths(outcome: &CrawlOutcome) -> Vec<String> {
    outcome
        .pages
        .iter()
        .map(|p| Url::parse(&p.url).unwrap().path().to_string())
        .collect()
}

#[tokio::test]
async fn test_budget_stops_breadth_first_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html(r#"<a href="/a">A</a><a href="/b">B</a>"#), 1).await;
    mount_page(&server, "/a", html(r#"<a href="/c">C</a>"#), 1).await;
    mount_page(&server, "/b", html("leaf"), 1).await;
    mount_page(&server, "/c", html("off budget"), 0).await;

    let outcome = crawl(&server, &test_options(3), CancellationToken::new()).await;

    assert_eq!(paths(&outcome), vec!["/", "/a", "/b"]);
    assert_eq!(outcome.stats.state, CrawlState::Completed);
    assert_eq!(outcome.stats.budget_remaining, 0);
    assert_eq!(outcome.stats.urls_discovered, 4);
}

#[tokio::test]
async fn test_server_error_recorded_and_crawl_continues() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html(r#"<a href="/broken">x</a><a href="/ok">y</a>"#), 1).await;
    mount_page(&server, "/broken", ResponseTemplate::new(500), 1).await;
    mount_page(&server, "/ok", html("fine"), 1).await;

    let outcome = crawl(&server, &test_options(10), CancellationToken::new()).await;

    assert_eq!(outcome.stats.state, CrawlState::Completed);
    assert_eq!(outcome.stats.pages_visited, 3);
    assert_eq!(outcome.stats.pages_failed, 1);
    let failure = &outcome.stats.failures[0];
    assert!(failure.url.ends_with("/broken"));
    assert_eq!(failure.state, PageState::HttpError);
    assert_eq!(failure.status_code, Some(500));

    let broken = outcome.pages.iter().find(|p| p.url.ends_with("/broken")).unwrap();
    assert!(broken.signals.is_none());
}

#[tokio::test]
async fn test_no_url_fetched_twice() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html(r#"<a href="/a">A</a><a href="/b">B</a><a href="/">Home</a>"#), 1).await;
    mount_page(&server, "/a", html(r#"<a href="/b">B</a><a href="/">Home</a><a href="/a#top">Self</a>"#), 1).await;
    mount_page(&server, "/b", html(r#"<a href="/a">A</a><a href="/">Home</a>"#), 1).await;

    let outcome = crawl(&server, &test_options(50), CancellationToken::new()).await;

    let mut visited = paths(&outcome);
    let total = visited.len();
    visited.sort();
    visited.dedup();
    assert_eq!(visited.len(), total);
    assert_eq!(total, 3);
}

#[tokio::test]
async fn test_robots_disallowed_links_never_fetched() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        1,
    )
    .await;
    mount_page(&server, "/", html(r#"<a href="/private/x">P</a><a href="/public">Q</a>"#), 1).await;
    mount_page(&server, "/private/x", html("secret"), 0).await;
    mount_page(&server, "/public", html("open"), 1).await;

    let outcome = crawl(&server, &test_options(10), CancellationToken::new()).await;

    assert_eq!(paths(&outcome), vec!["/", "/public"]);
    assert_eq!(outcome.stats.skipped_by_robots, 1);
}

#[tokio::test]
async fn test_consecutive_failures_abort_with_partial_results() {
    let server = MockServer::start().await;
    let links: String = (1..=6).map(|i| format!(r#"<a href="/e{}">e</a>"#, i)).collect();
    mount_page(&server, "/", html(&links), 1).await;
    for i in 1..=3 {
        mount_page(&server, &format!("/e{}", i), ResponseTemplate::new(503), 1).await;
    }
    for i in 4..=6 {
        mount_page(&server, &format!("/e{}", i), ResponseTemplate::new(503), 0).await;
    }

    let outcome = crawl(&server, &test_options(10), CancellationToken::new()).await;

    assert_eq!(
        outcome.stats.state,
        CrawlState::Aborted(AbortReason::FailureThreshold {
            consecutive_failures: 3
        })
    );
    assert_eq!(outcome.stats.pages_visited, 4);
    assert!(outcome.pages[0].signals.is_some());
}

#[tokio::test]
async fn test_redirect_target_not_fetched_again() {
    let server = MockServer::start().await;
    let new_url = format!("{}/new", server.uri());
    mount_page(&server, "/", html(r#"<a href="/old">old</a><a href="/other">other</a>"#), 1).await;
    mount_page(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("location", new_url.as_str()),
        1,
    )
    .await;
    mount_page(&server, "/new", html("moved"), 1).await;
    mount_page(&server, "/other", html(r#"<a href="/new">new</a>"#), 1).await;

    let outcome = crawl(&server, &test_options(10), CancellationToken::new()).await;

    let old = outcome.pages.iter().find(|p| p.url.ends_with("/old")).unwrap();
    assert_eq!(old.final_url, new_url);
    assert_eq!(old.redirect_hops, 1);
    assert_eq!(old.state, PageState::Processed);
    assert_eq!(paths(&outcome), vec!["/", "/old", "/other"]);
}

#[tokio::test]
async fn test_queued_redirect_target_not_fetched_again() {
    let server = MockServer::start().await;
    let new_url = format!("{}/new", server.uri());
    // "/new" is queued before "/old" resolves to it
    mount_page(&server, "/", html(r#"<a href="/old">old</a><a href="/new">new</a>"#), 1).await;
    mount_page(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("location", new_url.as_str()),
        1,
    )
    .await;
    mount_page(&server, "/new", html("moved"), 1).await;

    let outcome = crawl(&server, &test_options(10), CancellationToken::new()).await;

    assert_eq!(paths(&outcome), vec!["/", "/old"]);
    assert_eq!(outcome.stats.pages_visited, 2);
}

#[tokio::test]
async fn test_cancelled_crawl_returns_aborted_state() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("home"), 0).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = crawl(&server, &test_options(10), cancel).await;

    assert_eq!(outcome.stats.state, CrawlState::Aborted(AbortReason::Cancelled));
    assert!(outcome.pages.is_empty());
    assert!(outcome.stats.state.is_partial());
}

#[tokio::test]
async fn test_non_html_response_has_no_signals() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html(r#"<a href="/report.pdf">pdf</a>"#), 1).await;
    mount_page(
        &server,
        "/report.pdf",
        ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
        1,
    )
    .await;

    let outcome = crawl(&server, &test_options(10), CancellationToken::new()).await;

    let pdf = &outcome.pages[1];
    assert_eq!(pdf.state, PageState::NonHtml);
    assert!(pdf.signals.is_none());
    assert_eq!(outcome.stats.html_pages, 1);
    assert_eq!(outcome.stats.pages_failed, 0);
}
