//! Crawlability, indexability and transport checks

use crate::checks::{
    ratio, AuditContext, Category, CategoryScore, Checker, CheckerReport, Effort, Evidence,
    Finding, Severity, MAX_EVIDENCE, NO_HTML_PAGES,
};
use async_trait::async_trait;

/// Response headers expected on the homepage
pub const SECURITY_HEADERS: &[&str] = &[
    "content-security-policy",
    "strict-transport-security",
    "x-frame-options",
    "x-content-type-options",
    "referrer-policy",
];

/// Redirect chains longer than this are flagged
const MAX_REDIRECT_HOPS: usize = 2;

pub struct TechnicalChecker;

#[async_trait]
impl Checker for TechnicalChecker {
    fn name(&self) -> &'static str {
        "technical"
    }

    fn category(&self) -> Category {
        Category::Technical
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport {
        let all = ctx.pages.len();
        let html_total = ctx.html_count();

        let error_pages: Vec<_> = ctx.pages.iter().filter(|p| p.is_failure()).collect();
        let missing_canonical = ctx.html_pages().filter(|(_, s)| s.canonical.is_none()).count();
        let long_redirects: Vec<_> = ctx
            .pages
            .iter()
            .filter(|p| !p.is_failure() && p.redirect_hops > MAX_REDIRECT_HOPS)
            .collect();
        let noindex = ctx.html_pages().filter(|(_, s)| s.is_noindex()).count();

        let missing_headers: Vec<&str> = match ctx.homepage() {
            Some(home) => SECURITY_HEADERS
                .iter()
                .copied()
                .filter(|h| home.header(h).is_none())
                .collect(),
            None => SECURITY_HEADERS.to_vec(),
        };

        let sitemap_ok = ctx.site_file_exists("/sitemap.xml").await
            || !ctx.robots.robots.sitemaps().is_empty();
        let robots_ok = ctx.robots.found;

        let mut score = 100.0;
        score -= 22.0 * ratio(error_pages.len(), all);
        score -= 16.0 * ratio(missing_canonical, html_total);
        score -= 14.0 * ratio(long_redirects.len(), html_total);
        score -= 18.0 * ratio(noindex, html_total);
        score -= (missing_headers.len() as f64 * 3.0).min(18.0);
        if !robots_ok {
            score -= 8.0;
        }
        if !sitemap_ok {
            score -= 8.0;
        }

        let start = ctx.scope.start().to_string();
        let mut findings = Vec::new();

        if html_total == 0 {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::High,
                    "No HTML pages crawled",
                    "The crawl did not collect any HTML document in scope.",
                )
                .impact("Most checks are blocked when no indexable HTML is collected.")
                .recommendation("Verify the start URL and rerun with a larger crawl budget.")
                .evidence([Evidence::new(start.clone(), NO_HTML_PAGES)])
                .effort(Effort::Low),
            );
        }

        if !error_pages.is_empty() {
            let status_4xx = error_pages
                .iter()
                .filter(|p| matches!(p.status_code, Some(400..=499)))
                .count();
            let status_5xx = error_pages
                .iter()
                .filter(|p| matches!(p.status_code, Some(500..=599)))
                .count();
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Critical,
                    "HTTP errors during crawl",
                    format!(
                        "{} of {} pages failed ({} with 4xx, {} with 5xx, {} without a response).",
                        error_pages.len(),
                        all,
                        status_4xx,
                        status_5xx,
                        error_pages.len() - status_4xx - status_5xx
                    ),
                )
                .impact("Error URLs waste crawl budget and suppress organic visibility.")
                .recommendation("Repair broken URLs and eliminate server-side failures on key templates first.")
                .evidence(error_pages.iter().take(MAX_EVIDENCE).map(|p| {
                    Evidence::new(p.url.clone(), p.error.clone().unwrap_or_else(|| p.state.to_string()))
                }))
                .effort(Effort::Medium),
            );
        }

        if noindex > 0 {
            let severity = if noindex > 2usize.max(html_total / 10) {
                Severity::Critical
            } else {
                Severity::High
            };
            findings.push(
                Finding::new(
                    Category::Technical,
                    severity,
                    "Noindex directives detected",
                    format!("{}/{} HTML pages include noindex directives.", noindex, html_total),
                )
                .impact("Important pages can be dropped from the index despite internal links.")
                .recommendation("Remove unintended noindex tags and X-Robots-Tag headers from pages meant to rank.")
                .evidence(ctx.sample("noindex", |s| s.is_noindex()))
                .effort(Effort::Low),
            );
        }

        if missing_canonical > 0 {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Medium,
                    "Missing canonical tags",
                    format!("{}/{} HTML pages declare no canonical URL.", missing_canonical, html_total),
                )
                .impact("Duplicate URL variants compete with each other for ranking signals.")
                .recommendation("Add a self-referencing rel=canonical to every indexable page.")
                .evidence(ctx.sample("no rel=canonical", |s| s.canonical.is_none()))
                .effort(Effort::Low),
            );
        }

        if !long_redirects.is_empty() {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Medium,
                    "Long redirect chains",
                    format!(
                        "{} pages were reached through more than {} redirects.",
                        long_redirects.len(),
                        MAX_REDIRECT_HOPS
                    ),
                )
                .impact("Every extra hop delays rendering and dilutes link equity.")
                .recommendation("Point internal links and redirects straight at the final URL.")
                .evidence(long_redirects.iter().map(|p| {
                    Evidence::new(p.url.clone(), format!("{} hops to {}", p.redirect_hops, p.final_url))
                }))
                .effort(Effort::Low),
            );
        }

        if !missing_headers.is_empty() {
            let severity = if missing_headers.len() >= 3 {
                Severity::High
            } else {
                Severity::Medium
            };
            let evidence_url = ctx.homepage().map(|p| p.final_url.clone()).unwrap_or_else(|| start.clone());
            findings.push(
                Finding::new(
                    Category::Technical,
                    severity,
                    "Missing security headers",
                    format!(
                        "Missing {}/{} security headers: {}.",
                        missing_headers.len(),
                        SECURITY_HEADERS.len(),
                        missing_headers.join(", ")
                    ),
                )
                .impact("Weakens trust signals and increases the security risk surface.")
                .recommendation("Set the missing headers at the edge or server and verify them on primary templates.")
                .evidence([Evidence::new(evidence_url, missing_headers.join(", "))])
                .effort(Effort::Medium),
            );
        }

        if !robots_ok {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Medium,
                    "Missing robots.txt",
                    "No valid robots.txt was found.",
                )
                .impact("Crawler policy is ambiguous and difficult to manage.")
                .recommendation("Publish robots.txt with an allow/disallow policy and sitemap pointers.")
                .evidence([Evidence::new(ctx.robots.url.clone(), status_signal(ctx.robots.status))])
                .effort(Effort::Low),
            );
        }

        if !sitemap_ok {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Medium,
                    "Missing sitemap.xml",
                    "No sitemap.xml was found and robots.txt declares none.",
                )
                .impact("Search engines discover deep URLs less reliably.")
                .recommendation("Generate and submit XML sitemaps listing canonical URLs only.")
                .evidence([Evidence::new(format!("{}/sitemap.xml", ctx.scope.origin()), "not found")])
                .effort(Effort::Low),
            );
        }

        if ctx.scope.start().scheme() != "https" {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::High,
                    "Site not served over HTTPS",
                    "The audited start URL uses plain HTTP.",
                )
                .impact("Browsers flag the site as not secure and rankings favour HTTPS pages.")
                .recommendation("Serve the site over HTTPS and redirect every HTTP URL to it.")
                .evidence([Evidence::new(start.clone(), "http scheme")])
                .effort(Effort::Medium),
            );
        }

        if let Some(reason) = ctx.stats.state.abort_reason() {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Medium,
                    "Crawl stopped early",
                    format!(
                        "The crawl was aborted ({}) after {} pages; results are partial.",
                        reason, ctx.stats.pages_visited
                    ),
                )
                .impact("Issues on pages that were never fetched are not reported.")
                .recommendation("Resolve the failures above and rerun the audit.")
                .evidence([Evidence::new(start, reason.to_string())])
                .effort(Effort::Low),
            );
        }

        CheckerReport::scored(self, CategoryScore::measured(score), findings)
    }
}

fn status_signal(status: Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "unreachable".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::*;
    use crate::robots::{ParsedRobots, RobotsFile};

    const GOOD_PAGE: &str = r#"<html><head><title>Home</title>
        <link rel="canonical" href="https://example.com/"></head><body>hi</body></html>"#;

    fn secure_home() -> crate::crawler::PageRecord {
        let mut page = html_page("/", GOOD_PAGE);
        for header in SECURITY_HEADERS {
            page.headers.insert(header.to_string(), "set".to_string());
        }
        page
    }

    fn robots_found() -> RobotsFile {
        RobotsFile {
            url: "https://example.com/robots.txt".to_string(),
            found: true,
            status: Some(200),
            robots: ParsedRobots::from_content("User-agent: *\nDisallow:"),
        }
    }

    fn finding<'a>(report: &'a CheckerReport, title: &str) -> Option<&'a Finding> {
        report.findings.iter().find(|f| f.title == title)
    }

    #[tokio::test]
    async fn test_healthy_site_scores_full() {
        let site = StaticSite::default().with("https://example.com/sitemap.xml", 200, "<urlset/>");
        let ctx = context_with(vec![secure_home()], robots_found(), site);
        let report = TechnicalChecker.evaluate(&ctx).await;
        assert_eq!(report.score, Some(CategoryScore::measured(100.0)));
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }

    #[tokio::test]
    async fn test_error_pages_penalized() {
        let ctx = context_with(
            vec![secure_home(), failed_page("/a", 500), failed_page("/b", 404), html_page("/c", GOOD_PAGE)],
            robots_found(),
            StaticSite::default().with("https://example.com/sitemap.xml", 200, "<urlset/>"),
        );
        let report = TechnicalChecker.evaluate(&ctx).await;

        // 22 * 2/4 = 11
        assert_eq!(report.score.as_ref().unwrap().value(), Some(89.0));
        let errors = finding(&report, "HTTP errors during crawl").unwrap();
        assert_eq!(errors.severity, Severity::Critical);
        assert!(errors.detail.contains("1 with 4xx, 1 with 5xx"));
        assert_eq!(errors.evidence.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_site_files_and_headers() {
        let ctx = context(vec![html_page("/", GOOD_PAGE)]);
        let report = TechnicalChecker.evaluate(&ctx).await;

        // 15 (five headers) + 8 (robots) + 8 (sitemap)
        assert_eq!(report.score.as_ref().unwrap().value(), Some(69.0));
        assert!(finding(&report, "Missing robots.txt").is_some());
        assert!(finding(&report, "Missing sitemap.xml").is_some());
        assert_eq!(
            finding(&report, "Missing security headers").unwrap().severity,
            Severity::High
        );
    }

    #[tokio::test]
    async fn test_noindex_and_canonical() {
        let noindex = html_page(
            "/hidden",
            r#"<html><head><meta name="robots" content="noindex"></head></html>"#,
        );
        let ctx = context_with(
            vec![secure_home(), noindex],
            robots_found(),
            StaticSite::default().with("https://example.com/sitemap.xml", 200, ""),
        );
        let report = TechnicalChecker.evaluate(&ctx).await;

        // 16 * 1/2 + 18 * 1/2
        assert_eq!(report.score.as_ref().unwrap().value(), Some(83.0));
        assert_eq!(finding(&report, "Noindex directives detected").unwrap().severity, Severity::High);
        assert_eq!(
            finding(&report, "Missing canonical tags").unwrap().evidence[0].url,
            "https://example.com/hidden"
        );
    }

    #[tokio::test]
    async fn test_no_html_pages_still_measured() {
        let ctx = context(vec![failed_page("/", 503)]);
        let report = TechnicalChecker.evaluate(&ctx).await;
        assert!(report.score.as_ref().unwrap().is_measured());
        assert!(finding(&report, "No HTML pages crawled").is_some());
    }
}
