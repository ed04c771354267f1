//! XML sitemap discovery and validation
//!
//! Sitemaps come from robots.txt `Sitemap:` lines, or `/sitemap.xml` when
//! none are declared. Sitemap indexes are followed breadth-first up to
//! [`MAX_SITEMAP_FILES`] files. A missing sitemap is left to the technical
//! checker; this checker only reports on sitemaps it could read or was
//! explicitly pointed at.

use crate::checks::{AuditContext, Category, Checker, CheckerReport, Effort, Evidence, Finding, Severity};
use crate::url::normalize_url;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet, VecDeque};
use url::Url;

const MAX_SITEMAP_FILES: usize = 10;

/// Protocol limit on URLs per sitemap file
const MAX_URLS_PER_FILE: usize = 50_000;

/// Crawled pages missing from the sitemap above this count is high severity
const MISSING_HIGH_THRESHOLD: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SitemapKind {
    UrlSet,
    Index,
}

/// One parsed sitemap file
#[derive(Debug, Clone, PartialEq)]
struct SitemapFile {
    source: String,
    kind: SitemapKind,
    locs: Vec<String>,
    children: Vec<String>,
    /// `<priority>` and `<changefreq>` elements, ignored by Google
    deprecated_tags: usize,
    identical_lastmod: bool,
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn parse_sitemap(xml: &str, source: &str) -> Result<SitemapFile, String> {
    let document = roxmltree::Document::parse(xml).map_err(|e| format!("invalid XML: {}", e))?;
    let root = document.root_element();
    let kind = match root.tag_name().name() {
        "urlset" => SitemapKind::UrlSet,
        "sitemapindex" => SitemapKind::Index,
        other => return Err(format!("unsupported root element <{}>", other)),
    };

    let entry_name = match kind {
        SitemapKind::UrlSet => "url",
        SitemapKind::Index => "sitemap",
    };
    let entries: Vec<_> = root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == entry_name)
        .collect();

    let mut file = SitemapFile {
        source: source.to_string(),
        kind,
        locs: Vec::new(),
        children: Vec::new(),
        deprecated_tags: 0,
        identical_lastmod: false,
    };

    match kind {
        SitemapKind::Index => {
            file.children = entries
                .iter()
                .filter_map(|e| child_text(*e, "loc"))
                .map(str::to_string)
                .collect();
        }
        SitemapKind::UrlSet => {
            let mut lastmods = Vec::new();
            for entry in entries {
                let Some(loc) = child_text(entry, "loc") else {
                    continue;
                };
                file.locs.push(loc.to_string());
                if let Some(lastmod) = child_text(entry, "lastmod") {
                    lastmods.push(lastmod);
                }
                file.deprecated_tags += entry
                    .children()
                    .filter(|c| c.is_element() && matches!(c.tag_name().name(), "priority" | "changefreq"))
                    .count();
            }
            let distinct: HashSet<_> = lastmods.iter().collect();
            file.identical_lastmod = lastmods.len() > 1 && distinct.len() == 1;
        }
    }
    Ok(file)
}

fn normalized(loc: &str) -> String {
    normalize_url(loc)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| loc.trim().to_string())
}

/// Sitemaps read for one audit
#[derive(Debug, Default)]
struct SitemapSet {
    files: Vec<SitemapFile>,
    /// Unreadable sitemaps that were declared or linked from an index
    errors: Vec<Evidence>,
    declared_in_robots: bool,
}

pub struct SitemapChecker;

impl SitemapChecker {
    async fn collect(&self, ctx: &AuditContext) -> SitemapSet {
        let mut set = SitemapSet::default();

        // (url, whether a failure should be reported)
        let mut queue: VecDeque<(String, bool)> = VecDeque::new();
        let declared = ctx.robots.robots.sitemaps();
        if declared.is_empty() {
            if let Some(url) = ctx.scope.site_url("/sitemap.xml") {
                queue.push_back((url.to_string(), false));
            }
        } else {
            set.declared_in_robots = true;
            queue.extend(declared.into_iter().map(|url| (url, true)));
        }

        let mut visited = HashSet::new();
        while let Some((source, required)) = queue.pop_front() {
            if set.files.len() >= MAX_SITEMAP_FILES {
                break;
            }
            if !visited.insert(source.clone()) {
                continue;
            }

            let url = match ctx.scope.start().join(&source) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => url,
                _ => {
                    set.errors.push(Evidence::new(source, "unsupported sitemap URL"));
                    continue;
                }
            };

            let response = match ctx.fetcher.fetch(&url).await {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    if required {
                        set.errors.push(Evidence::new(source, format!("HTTP {}", response.status)));
                    }
                    continue;
                }
                Err(e) => {
                    if required {
                        set.errors.push(Evidence::new(source, e.to_string()));
                    }
                    continue;
                }
            };

            match parse_sitemap(&response.text(), &source) {
                Ok(file) => {
                    match file.kind {
                        SitemapKind::Index => {
                            tracing::debug!("Read sitemap index {} ({} children)", source, file.children.len())
                        }
                        SitemapKind::UrlSet => {
                            tracing::debug!("Read sitemap {} ({} URLs)", source, file.locs.len())
                        }
                    }
                    queue.extend(file.children.iter().map(|child| (child.clone(), true)));
                    set.files.push(file);
                }
                Err(reason) => {
                    tracing::warn!("Sitemap {} rejected: {}", source, reason);
                    set.errors.push(Evidence::new(source, reason));
                }
            }
        }
        set
    }
}

#[async_trait]
impl Checker for SitemapChecker {
    fn name(&self) -> &'static str {
        "sitemap"
    }

    fn category(&self) -> Category {
        Category::Technical
    }

    fn contributes_score(&self) -> bool {
        false
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport {
        let set = self.collect(ctx).await;
        let mut findings = Vec::new();

        if !set.errors.is_empty() {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Critical,
                    "Invalid sitemap XML",
                    format!("{} sitemap files could not be read or parsed.", set.errors.len()),
                )
                .impact("Search engines cannot use a broken sitemap to discover URLs.")
                .recommendation("Serve well-formed urlset or sitemapindex XML at every declared location.")
                .evidence(set.errors.clone())
                .effort(Effort::Low),
            );
        }

        let oversized: Vec<&SitemapFile> = set
            .files
            .iter()
            .filter(|f| f.locs.len() > MAX_URLS_PER_FILE)
            .collect();
        if !oversized.is_empty() {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Critical,
                    "Sitemap exceeds protocol URL limit",
                    format!("{} sitemap files list more than 50,000 URLs.", oversized.len()),
                )
                .impact("URLs beyond the limit are ignored.")
                .recommendation("Split large sitemaps and reference them from a sitemap index.")
                .evidence(
                    oversized
                        .iter()
                        .map(|f| Evidence::new(f.source.clone(), format!("{} URLs", f.locs.len()))),
                )
                .effort(Effort::Medium),
            );
        }

        if set.files.is_empty() {
            return CheckerReport::findings_only(self, findings);
        }

        let listed: BTreeSet<String> = set
            .files
            .iter()
            .flat_map(|f| f.locs.iter())
            .map(|loc| normalized(loc))
            .collect();

        let insecure: Vec<&String> = listed
            .iter()
            .filter(|loc| Url::parse(loc).map(|u| u.scheme() != "https").unwrap_or(false))
            .collect();
        if !insecure.is_empty() {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::High,
                    "HTTP URLs found in sitemap",
                    format!("{} sitemap URLs are not HTTPS.", insecure.len()),
                )
                .impact("Search engines are pointed at insecure or redirecting URLs.")
                .recommendation("List only the canonical HTTPS version of each URL.")
                .evidence(insecure.iter().map(|loc| Evidence::new(loc.as_str(), "http scheme")))
                .effort(Effort::Low),
            );
        }

        if !set.declared_in_robots && ctx.robots.found {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Medium,
                    "Sitemap not referenced in robots.txt",
                    "robots.txt does not declare the sitemap location.",
                )
                .impact("Crawlers that do not check /sitemap.xml will not find it.")
                .recommendation("Add a Sitemap: line with the absolute sitemap URL to robots.txt.")
                .evidence([Evidence::new(ctx.robots.url.clone(), "no Sitemap: directive")])
                .effort(Effort::Low),
            );
        }

        let same_lastmod: Vec<&SitemapFile> = set.files.iter().filter(|f| f.identical_lastmod).collect();
        if !same_lastmod.is_empty() {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Low,
                    "Identical lastmod values detected",
                    format!(
                        "{} sitemap files use the same lastmod for every URL.",
                        same_lastmod.len()
                    ),
                )
                .impact("Search engines learn to ignore lastmod values that never vary.")
                .recommendation("Emit the real last modification date of each URL.")
                .evidence(
                    same_lastmod
                        .iter()
                        .map(|f| Evidence::new(f.source.clone(), "identical lastmod")),
                )
                .effort(Effort::Low),
            );
        }

        let deprecated: usize = set.files.iter().map(|f| f.deprecated_tags).sum();
        if deprecated > 0 {
            findings.push(
                Finding::new(
                    Category::Technical,
                    Severity::Low,
                    "Deprecated sitemap tags used",
                    format!("{} <priority>/<changefreq> elements found; Google ignores them.", deprecated),
                )
                .impact("Adds bytes without influencing crawling.")
                .recommendation("Drop priority and changefreq from generated sitemaps.")
                .evidence(
                    set.files
                        .iter()
                        .filter(|f| f.deprecated_tags > 0)
                        .map(|f| Evidence::new(f.source.clone(), format!("{} deprecated tags", f.deprecated_tags))),
                )
                .effort(Effort::Low),
            );
        }

        let missing: Vec<&str> = ctx
            .html_pages()
            .filter(|(page, signals)| !signals.is_noindex() && !listed.contains(&page.url))
            .map(|(page, _)| page.url.as_str())
            .collect();
        if !missing.is_empty() {
            let severity = if missing.len() > MISSING_HIGH_THRESHOLD {
                Severity::High
            } else {
                Severity::Medium
            };
            findings.push(
                Finding::new(
                    Category::Technical,
                    severity,
                    "Crawled pages missing from sitemap",
                    format!("{} indexable crawled URLs are not listed in any sitemap.", missing.len()),
                )
                .impact("Pages outside the sitemap are discovered later and less reliably.")
                .recommendation("Generate the sitemap from the full set of canonical, indexable URLs.")
                .evidence(missing.iter().map(|url| Evidence::new(*url, "not in sitemap")))
                .effort(Effort::Medium),
            );
        }

        CheckerReport::findings_only(self, findings)
    }
}
