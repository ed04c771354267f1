//! Title, meta description and heading structure checks

use crate::checks::{
    ratio, AuditContext, Category, CategoryScore, Checker, CheckerReport, Effort, Evidence,
    Finding, Severity, NO_HTML_PAGES,
};
use crate::crawler::PageSignals;
use async_trait::async_trait;
use std::ops::RangeInclusive;

const TITLE_LENGTH: RangeInclusive<usize> = 30..=60;
const META_LENGTH: RangeInclusive<usize> = 70..=160;

pub struct OnPageChecker;

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn title_out_of_range(signals: &PageSignals) -> bool {
    signals
        .title
        .as_deref()
        .map(|t| !TITLE_LENGTH.contains(&char_len(t)))
        .unwrap_or(false)
}

fn meta_out_of_range(signals: &PageSignals) -> bool {
    signals
        .meta_description
        .as_deref()
        .map(|m| !META_LENGTH.contains(&char_len(m)))
        .unwrap_or(false)
}

/// First heading that jumps more than one level deeper than its predecessor
fn heading_skip(signals: &PageSignals) -> Option<(u8, u8)> {
    signals
        .headings
        .windows(2)
        .map(|pair| (pair[0].level, pair[1].level))
        .find(|(prev, next)| *next > prev + 1)
}

#[async_trait]
impl Checker for OnPageChecker {
    fn name(&self) -> &'static str {
        "onpage"
    }

    fn category(&self) -> Category {
        Category::OnPage
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport {
        let total = ctx.html_count();
        if total == 0 {
            return CheckerReport::scored(self, CategoryScore::not_measured(NO_HTML_PAGES), Vec::new());
        }

        let missing_title = ctx.html_pages().filter(|(_, s)| s.title.is_none()).count();
        let missing_meta = ctx
            .html_pages()
            .filter(|(_, s)| s.meta_description.is_none())
            .count();
        let invalid_h1 = ctx.html_pages().filter(|(_, s)| s.h1_count() != 1).count();
        let bad_title_length = ctx.html_pages().filter(|(_, s)| title_out_of_range(s)).count();
        let bad_meta_length = ctx.html_pages().filter(|(_, s)| meta_out_of_range(s)).count();
        let skipped_levels = ctx.html_pages().filter(|(_, s)| heading_skip(s).is_some()).count();
        let missing_lang = ctx.html_pages().filter(|(_, s)| s.lang.is_none()).count();

        let score = 100.0
            - 32.0 * ratio(missing_title, total)
            - 24.0 * ratio(missing_meta, total)
            - 18.0 * ratio(invalid_h1, total)
            - 8.0 * ratio(bad_title_length, total)
            - 8.0 * ratio(bad_meta_length, total);

        let mut findings = Vec::new();

        if missing_title > 0 {
            findings.push(
                Finding::new(
                    Category::OnPage,
                    Severity::High,
                    "Missing title tags",
                    format!("{}/{} HTML pages have no title.", missing_title, total),
                )
                .impact("Search results fall back to generated titles with lower click-through.")
                .recommendation("Write a unique title of 30-60 characters for every indexable page.")
                .evidence(ctx.sample("missing <title>", |s| s.title.is_none()))
                .effort(Effort::Low),
            );
        }

        if missing_meta > 0 {
            findings.push(
                Finding::new(
                    Category::OnPage,
                    Severity::High,
                    "Missing meta descriptions",
                    format!("{}/{} HTML pages have no meta description.", missing_meta, total),
                )
                .impact("Snippets are generated from arbitrary page text and convert worse.")
                .recommendation("Add a 70-160 character meta description summarising each page.")
                .evidence(ctx.sample("missing meta description", |s| s.meta_description.is_none()))
                .effort(Effort::Low),
            );
        }

        if bad_title_length > 0 {
            findings.push(
                Finding::new(
                    Category::OnPage,
                    Severity::Low,
                    "Title length outside 30-60 characters",
                    format!("{} titles are too short or too long.", bad_title_length),
                )
                .impact("Short titles waste ranking context and long ones are truncated.")
                .recommendation("Rewrite titles to 30-60 characters with the primary topic first.")
                .evidence(
                    ctx.html_pages()
                        .filter(|(_, s)| title_out_of_range(s))
                        .map(|(p, s)| {
                            let len = s.title.as_deref().map(char_len).unwrap_or(0);
                            Evidence::new(p.url.clone(), format!("title is {} characters", len))
                        }),
                )
                .effort(Effort::Low),
            );
        }

        if bad_meta_length > 0 {
            findings.push(
                Finding::new(
                    Category::OnPage,
                    Severity::Low,
                    "Meta description length outside 70-160 characters",
                    format!("{} meta descriptions are too short or too long.", bad_meta_length),
                )
                .impact("Snippets are rewritten or truncated in search results.")
                .recommendation("Keep meta descriptions between 70 and 160 characters.")
                .evidence(
                    ctx.html_pages()
                        .filter(|(_, s)| meta_out_of_range(s))
                        .map(|(p, s)| {
                            let len = s.meta_description.as_deref().map(char_len).unwrap_or(0);
                            Evidence::new(p.url.clone(), format!("meta description is {} characters", len))
                        }),
                )
                .effort(Effort::Low),
            );
        }

        if skipped_levels > 0 {
            findings.push(
                Finding::new(
                    Category::OnPage,
                    Severity::Low,
                    "Heading levels skipped",
                    format!("{}/{} HTML pages skip heading levels.", skipped_levels, total),
                )
                .impact("Outline structure is harder for assistive technology and parsers to follow.")
                .recommendation("Nest headings one level at a time (h1, h2, h3).")
                .evidence(ctx.html_pages().filter_map(|(p, s)| {
                    heading_skip(s).map(|(from, to)| Evidence::new(p.url.clone(), format!("h{} followed by h{}", from, to)))
                }))
                .effort(Effort::Low),
            );
        }

        if missing_lang > 0 {
            findings.push(
                Finding::new(
                    Category::OnPage,
                    Severity::Low,
                    "Missing html lang attribute",
                    format!("{}/{} HTML pages do not declare a language.", missing_lang, total),
                )
                .impact("Language targeting and screen readers rely on the declared language.")
                .recommendation("Set <html lang=\"..\"> on every template.")
                .evidence(ctx.sample("no lang attribute", |s| s.lang.is_none()))
                .effort(Effort::Low),
            );
        }

        CheckerReport::scored(self, CategoryScore::measured(score), findings)
    }
}
