//! Readiness for AI search and answer engines

use super::content::THIN_WORDS;
use crate::checks::{
    ratio, AuditContext, Category, CategoryScore, Checker, CheckerReport, Effort, Evidence,
    Finding, Severity, NO_HTML_PAGES,
};
use async_trait::async_trait;
use url::Url;

/// Path fragments of pages that establish who runs the site
const TRUST_PATHS: &[&str] = &["/about", "/contact", "/team", "/company"];

pub struct AiReadinessChecker;

fn is_trust_link(link: &str) -> bool {
    Url::parse(link)
        .map(|url| {
            let path = url.path().to_lowercase();
            TRUST_PATHS.iter().any(|p| path.contains(p))
        })
        .unwrap_or(false)
}

#[async_trait]
impl Checker for AiReadinessChecker {
    fn name(&self) -> &'static str {
        "ai_readiness"
    }

    fn category(&self) -> Category {
        Category::AiReadiness
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport {
        let total = ctx.html_count();
        if total == 0 {
            return CheckerReport::scored(self, CategoryScore::not_measured(NO_HTML_PAGES), Vec::new());
        }

        let llms_ok = ctx.site_file_exists("/llms.txt").await;
        let trust_links = ctx
            .html_pages()
            .any(|(_, s)| s.internal_links.iter().any(|l| is_trust_link(l)));
        let schema_pages = ctx
            .html_pages()
            .filter(|(_, s)| !s.structured_data.is_empty())
            .count();
        let thin = ctx.html_pages().filter(|(_, s)| s.word_count < THIN_WORDS).count();
        let noindex = ctx.html_pages().filter(|(_, s)| s.is_noindex()).count();

        let site_root = format!("{}/", ctx.scope.origin());
        let blocked = if ctx.robots.found {
            ctx.robots.robots.blocked_ai_crawlers(&site_root)
        } else {
            Vec::new()
        };

        let mut score = 100.0;
        if !llms_ok {
            score -= 18.0;
        }
        if !trust_links {
            score -= 16.0;
        }
        score -= 20.0 * (1.0 - ratio(schema_pages, total));
        score -= 14.0 * ratio(thin, total);
        score -= 12.0 * ratio(noindex, total);
        if !blocked.is_empty() {
            score -= 10.0;
        }

        let mut findings = Vec::new();

        if !llms_ok {
            findings.push(
                Finding::new(
                    Category::AiReadiness,
                    Severity::Low,
                    "Missing llms.txt",
                    "No llms.txt detected.",
                )
                .impact("No explicit AI retrieval guidance is available at the root.")
                .recommendation("Publish llms.txt with clear citation and crawl guidance.")
                .evidence([Evidence::new(format!("{}llms.txt", site_root), "not found")])
                .effort(Effort::Low),
            );
        }

        if !trust_links {
            findings.push(
                Finding::new(
                    Category::AiReadiness,
                    Severity::Medium,
                    "No about or contact pages linked",
                    "No crawled page links to an about, contact, team or company page.",
                )
                .impact("Answer engines weigh clear ownership and contact signals when citing sources.")
                .recommendation("Link about and contact pages from the main navigation or footer.")
                .evidence([Evidence::new(ctx.scope.start().to_string(), "no trust navigation links")])
                .effort(Effort::Low),
            );
        }

        if !blocked.is_empty() {
            findings.push(
                Finding::new(
                    Category::AiReadiness,
                    Severity::Medium,
                    "AI crawlers blocked by robots.txt",
                    format!("robots.txt disallows {}.", blocked.join(", ")),
                )
                .impact("Blocked assistants cannot retrieve or cite the site's content.")
                .recommendation("Allow the AI crawlers you want citations from in robots.txt.")
                .evidence(
                    blocked
                        .iter()
                        .map(|agent| Evidence::new(ctx.robots.url.clone(), format!("{} disallowed", agent))),
                )
                .effort(Effort::Low),
            );
        }

        CheckerReport::scored(self, CategoryScore::measured(score), findings)
    }
}
