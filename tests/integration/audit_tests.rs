//! End-to-end audits of a mock site, from start URL to written reports

use serde_json::Value;
use site_audit::checks::{Category, Severity};
use site_audit::config::AuditOptions;
use site_audit::output::{write_reports, ACTION_PLAN_FILE, FULL_REPORT_FILE, SUMMARY_FILE};
use site_audit::state::CrawlState;
use site_audit::{run, AuditError, AuditResult, ValidationError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_options() -> AuditOptions {
    AuditOptions::builder()
        .max_pages(20)
        .concurrency(2)
        .request_delay_seconds(0.0)
        .timeout_seconds(5)
        .allow_private_targets(true)
        .build()
        .expect("valid test options")
}

fn page(base: &str, route: &str, title: &str, links: &str) -> String {
    let body = "Useful text about the topic. ".repeat(80);
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <title>{title}</title>
  <meta name="description" content="A description of {title} that is long enough to sit inside the recommended length range.">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <link rel="canonical" href="{base}{route}">
  <script type="application/ld+json">{{"@context":"https://schema.org","@type":"WebPage","name":"{title}"}}</script>
</head>
<body>
  <h1>{title}</h1>
  <nav>{links}</nav>
  <p>{body}</p>
  <img src="/img/photo.jpg" alt="A photo" width="640" height="480">
</body>
</html>"#
    )
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

/// A small static site: home, about and one broken link
async fn static_site() -> MockServer {
    let server = MockServer::start().await;
    let base = server.uri();
    let nav = r#"<a href="/">Home</a><a href="/about">About us</a><a href="/missing">Old page</a>"#;

    mount(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nAllow: /\n\nSitemap: {}/sitemap.xml\n",
            base
        )),
    )
    .await;
    mount(
        &server,
        "/sitemap.xml",
        ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/</loc><lastmod>2026-01-10</lastmod></url>
  <url><loc>{base}/about</loc><lastmod>2026-02-03</lastmod></url>
</urlset>"#
            ),
            "application/xml",
        ),
    )
    .await;
    mount(&server, "/llms.txt", ResponseTemplate::new(200).set_body_string("# Example site")).await;
    mount(
        &server,
        "/",
        ResponseTemplate::new(200).set_body_raw(page(&base, "/", "Example Home - Guides for careful readers", nav), "text/html"),
    )
    .await;
    mount(
        &server,
        "/about",
        ResponseTemplate::new(200).set_body_raw(page(&base, "/about", "About Example - Who writes these guides", nav), "text/html"),
    )
    .await;
    mount(&server, "/missing", ResponseTemplate::new(404)).await;

    server
}

async fn audit(server: &MockServer) -> AuditResult {
    run(&server.uri(), &test_options()).await.expect("audit runs")
}

#[tokio::test]
async fn test_audit_of_static_site() {
    let server = static_site().await;
    let result = audit(&server).await;

    assert_eq!(result.stats.state, CrawlState::Completed);
    assert_eq!(result.stats.pages_visited, 3);
    assert_eq!(result.stats.pages_failed, 1);
    assert_eq!(result.stats.html_pages, 2);
    assert!(result.robots.found);

    // Both HTML pages share one body, the 404 only has a response time
    let words = &result.profile.word_counts;
    assert_eq!(words.median, words.p25);
    assert_eq!(words.p25, words.p75);
    assert!(words.median.unwrap() > 300.0);
    assert!(result.profile.response_times.median_ms.is_some());

    let card = &result.scorecard;
    assert!(card.overall > 0.0 && card.overall <= 100.0);
    let performance = card.get(Category::Performance).unwrap();
    assert!(!performance.score.is_measured());
    let technical = card.get(Category::Technical).unwrap();
    assert!(technical.score.is_measured());
    assert_eq!(technical.effective_weight, Some(27.78));

    // The broken link is the only page-level error
    let errors = result
        .findings
        .iter()
        .find(|f| f.title == "HTTP errors during crawl")
        .expect("error finding");
    assert_eq!(errors.severity, Severity::Critical);
    assert!(errors.evidence[0].url.ends_with("/missing"));

    assert!(result.findings.iter().any(|f| f.title == "Site not served over HTTPS"));
    assert!(!result.findings.iter().any(|f| f.title == "Missing llms.txt"));
    assert!(!result.findings.iter().any(|f| f.title == "Missing title tags"));
}

#[tokio::test]
async fn test_reports_written() {
    let server = static_site().await;
    let result = audit(&server).await;
    let dir = tempfile::tempdir().unwrap();

    write_reports(&result, dir.path()).unwrap();

    let report = std::fs::read_to_string(dir.path().join(FULL_REPORT_FILE)).unwrap();
    assert!(report.contains("# Full SEO Audit Report"));
    assert!(report.contains("Not Measured"));
    let plan = std::fs::read_to_string(dir.path().join(ACTION_PLAN_FILE)).unwrap();
    assert!(plan.contains("Phase 1 (0-48h)"));
    assert!(plan.contains("HTTP errors during crawl"));

    let summary: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary["crawl"]["pages_visited"], 3);
    assert_eq!(summary["overall_score"].as_f64(), Some(result.scorecard.overall));
    assert_eq!(summary["options_fingerprint"].as_str().unwrap().len(), 64);
    assert!(summary["profile"]["word_counts"]["median"].is_number());
    assert!(summary["profile"]["business"]["kind"].is_string());
    assert!(report.contains("### Site Profile"));
    assert!(!dir.path().join("screenshots").exists());
}

#[tokio::test]
async fn test_repeated_audits_score_identically() {
    let server = static_site().await;
    let first = audit(&server).await;
    let second = audit(&server).await;

    assert_eq!(first.scorecard, second.scorecard);
    let titles = |r: &AuditResult| r.findings.iter().map(|f| f.title.clone()).collect::<Vec<_>>();
    assert_eq!(titles(&first), titles(&second));
    assert_eq!(first.options_fingerprint, second.options_fingerprint);
}

#[tokio::test]
async fn test_unsafe_target_rejected_without_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let options = AuditOptions::builder().build().unwrap();
    let err = run(&server.uri(), &options).await.unwrap_err();
    assert!(matches!(
        err,
        AuditError::Validation(ValidationError::UnsafeTarget { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_homepage_still_yields_result() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(500)).await;

    let result = audit(&server).await;

    assert_eq!(result.stats.pages_visited, 1);
    assert_eq!(result.stats.pages_failed, 1);
    let content = result.scorecard.get(Category::Content).unwrap();
    assert!(!content.score.is_measured());
    assert!(result.scorecard.get(Category::Technical).unwrap().score.is_measured());
}
