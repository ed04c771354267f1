//! Content depth, uniqueness and internal linking

use crate::checks::{
    ratio, AuditContext, Category, CategoryScore, Checker, CheckerReport, Effort, Evidence,
    Finding, Severity, NO_HTML_PAGES,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Pages below this word count are thin
pub(crate) const THIN_WORDS: usize = 300;

/// Pages with fewer internal links are weakly linked
const MIN_INTERNAL_LINKS: usize = 2;

pub struct ContentChecker;

/// Threshold above which thin content becomes a high-severity finding
pub(crate) fn thin_is_widespread(thin: usize, total: usize) -> bool {
    thin > 3usize.max(total / 5)
}

#[async_trait]
impl Checker for ContentChecker {
    fn name(&self) -> &'static str {
        "content"
    }

    fn category(&self) -> Category {
        Category::Content
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport {
        let total = ctx.html_count();
        if total == 0 {
            return CheckerReport::scored(self, CategoryScore::not_measured(NO_HTML_PAGES), Vec::new());
        }

        let thin = ctx.html_pages().filter(|(_, s)| s.word_count < THIN_WORDS).count();
        let invalid_h1 = ctx.html_pages().filter(|(_, s)| s.h1_count() != 1).count();
        let weak_linking = ctx
            .html_pages()
            .filter(|(_, s)| s.internal_links.len() < MIN_INTERNAL_LINKS)
            .count();

        // Normalized title -> pages using it
        let mut titles: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for (page, signals) in ctx.html_pages() {
            if let Some(title) = &signals.title {
                let key = title.trim().to_lowercase();
                if !key.is_empty() {
                    titles.entry(key).or_default().push(page.url.as_str());
                }
            }
        }
        let duplicates: Vec<(&String, &Vec<&str>)> =
            titles.iter().filter(|(_, urls)| urls.len() > 1).collect();
        let duplicate_count: usize = duplicates.iter().map(|(_, urls)| urls.len() - 1).sum();

        let score = 100.0
            - 36.0 * ratio(thin, total)
            - 18.0 * ratio(duplicate_count, total)
            - 14.0 * ratio(invalid_h1, total)
            - 8.0 * ratio(weak_linking, total);

        let mut findings = Vec::new();

        if thin > 0 {
            let severity = if thin_is_widespread(thin, total) {
                Severity::High
            } else {
                Severity::Low
            };
            findings.push(
                Finding::new(
                    Category::Content,
                    severity,
                    "Thin content",
                    format!("{}/{} HTML pages have fewer than {} words.", thin, total, THIN_WORDS),
                )
                .impact("Low-depth pages rarely satisfy intent and lose rankings to fuller answers.")
                .recommendation("Expand key pages with original detail or consolidate them into stronger pages.")
                .evidence(
                    ctx.html_pages()
                        .filter(|(_, s)| s.word_count < THIN_WORDS)
                        .map(|(p, s)| Evidence::new(p.url.clone(), format!("{} words", s.word_count))),
                )
                .effort(Effort::High),
            );
        }

        if duplicate_count > 0 {
            findings.push(
                Finding::new(
                    Category::Content,
                    Severity::Medium,
                    "Duplicate title tags",
                    format!(
                        "{} titles are shared by more than one page ({} duplicate pages).",
                        duplicates.len(),
                        duplicate_count
                    ),
                )
                .impact("Search engines struggle to pick the right page for a query.")
                .recommendation("Write a unique, descriptive title for each page.")
                .evidence(duplicates.iter().flat_map(|(title, urls)| {
                    urls.iter().map(move |url| Evidence::new(*url, format!("title \"{}\"", title)))
                }))
                .effort(Effort::Low),
            );
        }

        if invalid_h1 > 0 {
            findings.push(
                Finding::new(
                    Category::Content,
                    Severity::Medium,
                    "Missing or multiple H1 headings",
                    format!("{}/{} HTML pages do not have exactly one H1.", invalid_h1, total),
                )
                .impact("The main topic of the page is less clear to search engines and readers.")
                .recommendation("Give every page a single H1 describing its primary topic.")
                .evidence(
                    ctx.html_pages()
                        .filter(|(_, s)| s.h1_count() != 1)
                        .map(|(p, s)| Evidence::new(p.url.clone(), format!("{} h1", s.h1_count()))),
                )
                .effort(Effort::Low),
            );
        }

        if weak_linking > 0 {
            findings.push(
                Finding::new(
                    Category::Content,
                    Severity::Low,
                    "Weak internal linking",
                    format!(
                        "{}/{} HTML pages link to fewer than {} internal pages.",
                        weak_linking, total, MIN_INTERNAL_LINKS
                    ),
                )
                .impact("Link equity and crawl paths do not reach deeper content.")
                .recommendation("Add contextual links between related pages and hubs.")
                .evidence(
                    ctx.html_pages()
                        .filter(|(_, s)| s.internal_links.len() < MIN_INTERNAL_LINKS)
                        .map(|(p, s)| {
                            Evidence::new(p.url.clone(), format!("{} internal links", s.internal_links.len()))
                        }),
                )
                .effort(Effort::Medium),
            );
        }

        CheckerReport::scored(self, CategoryScore::measured(score), findings)
    }
}
