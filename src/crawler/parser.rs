//! HTML signal extraction
//!
//! `parse` is a pure function of the body bytes and the base URL: no network
//! access, no clocks, no randomness. Malformed HTML is parsed best-effort by
//! html5ever; only bodies that cannot be read as text are rejected.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Body that cannot be turned into text
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Body is not decodable as text ({0} bytes)")]
    Undecodable(usize),
}

/// One heading in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    /// 1 for `<h1>` through 6 for `<h6>`
    pub level: u8,
    pub text: String,
}

impl Heading {
    pub fn tag(&self) -> String {
        format!("h{}", self.level)
    }
}

/// One `<img>` tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageTag {
    /// Absolute source URL when resolvable, raw attribute otherwise
    pub src: String,
    /// `None` when the attribute is absent; `Some("")` marks a decorative image
    pub alt: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    /// Lowercased `loading` attribute
    pub loading: Option<String>,
    pub srcset: Option<String>,
}

impl ImageTag {
    pub fn has_dimensions(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }

    pub fn is_lazy(&self) -> bool {
        self.loading.as_deref() == Some("lazy")
    }
}

/// Structured data found on a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructuredData {
    /// Raw `application/ld+json` payloads
    pub json_ld: Vec<String>,
    /// Microdata `itemtype` values
    pub microdata_types: Vec<String>,
    /// RDFa `typeof` values
    pub rdfa_types: Vec<String>,
}

impl StructuredData {
    pub fn is_empty(&self) -> bool {
        self.json_ld.is_empty() && self.microdata_types.is_empty() && self.rdfa_types.is_empty()
    }
}

/// Signals extracted from one HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageSignals {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    /// Absolute canonical URL
    pub canonical: Option<String>,
    /// Lowercased directives from robots meta tags and the X-Robots-Tag header
    pub robots_directives: Vec<String>,
    pub headings: Vec<Heading>,
    /// Same-host links, absolute, fragment-free, first occurrence order
    pub internal_links: Vec<String>,
    pub external_links: Vec<String>,
    pub images: Vec<ImageTag>,
    pub structured_data: StructuredData,
    /// Words of visible text (script, style and noscript excluded)
    pub word_count: usize,
    pub lang: Option<String>,
    pub has_viewport: bool,
}

impl PageSignals {
    pub fn h1_count(&self) -> usize {
        self.headings.iter().filter(|h| h.level == 1).count()
    }

    pub fn is_noindex(&self) -> bool {
        self.robots_directives
            .iter()
            .any(|d| d == "noindex" || d == "none")
    }

    /// Merges an `X-Robots-Tag` header value into the directives
    ///
    /// Agent-scoped values (`googlebot: noindex`) are reduced to the
    /// directive itself.
    pub fn merge_robots_header(&mut self, header: &str) {
        for part in header.split(',') {
            let mut directive = part.trim().to_lowercase();
            if let Some((prefix, rest)) = directive.split_once(':') {
                let prefix = prefix.trim();
                if matches!(prefix, "googlebot" | "bingbot" | "robots" | "otherbot") {
                    directive = rest.trim().to_string();
                }
            }
            if !directive.is_empty() && !self.robots_directives.contains(&directive) {
                self.robots_directives.push(directive);
            }
        }
    }
}

/// Returns true when a response should be parsed as HTML
///
/// Uses the content type when present, otherwise sniffs the body.
pub fn looks_like_html(content_type: Option<&str>, body: &[u8]) -> bool {
    match content_type {
        Some(ct) if !ct.trim().is_empty() => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("html")
        }
        _ => {
            let head = &body[..body.len().min(2048)];
            String::from_utf8_lossy(head).to_ascii_lowercase().contains("<html")
        }
    }
}

/// Parses a response body into page signals
///
/// # Arguments
///
/// * `body` - Raw response bytes
/// * `base_url` - URL used to resolve relative links (the final URL of the fetch)
///
/// # Example
///
/// ```
/// use site_audit::crawler::parse;
/// use url::Url;
///
/// let html = br#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let signals = parse(html, &base_url).unwrap();
/// assert_eq!(signals.title.as_deref(), Some("Test"));
/// assert_eq!(signals.internal_links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse(body: &[u8], base_url: &Url) -> Result<PageSignals, ParseError> {
    let text = decode_body(body)?;
    Ok(parse_html(&text, base_url))
}

/// Parses HTML text into page signals
pub fn parse_html(html: &str, base_url: &Url) -> PageSignals {
    let document = Html::parse_document(html);
    let (internal_links, external_links) = extract_links(&document, base_url);

    PageSignals {
        title: extract_title(&document),
        meta_description: meta_content(&document, &["description"]),
        canonical: extract_canonical(&document, base_url),
        robots_directives: extract_robots_directives(&document),
        headings: extract_headings(&document),
        internal_links,
        external_links,
        images: extract_images(&document, base_url),
        structured_data: extract_structured_data(&document),
        word_count: count_words(&document),
        lang: select_all(&document, "html[lang]")
            .first()
            .and_then(|e| e.value().attr("lang"))
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
        has_viewport: meta_content(&document, &["viewport"]).is_some(),
    }
}

fn decode_body(body: &[u8]) -> Result<Cow<'_, str>, ParseError> {
    let text = match std::str::from_utf8(body) {
        Ok(text) => Cow::Borrowed(text),
        // NUL bytes in an invalid UTF-8 body means binary or UTF-16 content
        Err(_) if body.contains(&0) => return Err(ParseError::Undecodable(body.len())),
        Err(_) => String::from_utf8_lossy(body),
    };

    Ok(match text {
        Cow::Borrowed(s) => Cow::Borrowed(s.strip_prefix('\u{feff}').unwrap_or(s)),
        Cow::Owned(s) => match s.strip_prefix('\u{feff}') {
            Some(stripped) => Cow::Owned(stripped.to_string()),
            None => Cow::Owned(s),
        },
    })
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    select_all(document, "title")
        .first()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Content of the first `<meta name=...>` whose name matches, case-insensitively
fn meta_content(document: &Html, names: &[&str]) -> Option<String> {
    select_all(document, "meta[name]")
        .into_iter()
        .filter(|e| {
            e.value()
                .attr("name")
                .map(|n| names.contains(&n.trim().to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .find_map(|e| e.value().attr("content").map(|c| collapse_whitespace(c)))
        .filter(|c| !c.is_empty())
}

fn extract_canonical(document: &Html, base_url: &Url) -> Option<String> {
    select_all(document, "link[rel][href]")
        .into_iter()
        .find(|e| {
            e.value()
                .attr("rel")
                .map(|rel| {
                    rel.split_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("canonical"))
                })
                .unwrap_or(false)
        })
        .and_then(|e| e.value().attr("href"))
        .and_then(|href| base_url.join(href.trim()).ok())
        .map(|url| url.to_string())
}

fn extract_robots_directives(document: &Html) -> Vec<String> {
    let mut directives: Vec<String> = Vec::new();
    for element in select_all(document, "meta[name][content]") {
        let name = element
            .value()
            .attr("name")
            .map(|n| n.trim().to_lowercase())
            .unwrap_or_default();
        if name != "robots" && name != "googlebot" {
            continue;
        }
        if let Some(content) = element.value().attr("content") {
            for directive in content.split(',') {
                let directive = directive.trim().to_lowercase();
                if !directive.is_empty() && !directives.contains(&directive) {
                    directives.push(directive);
                }
            }
        }
    }
    directives
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    select_all(document, "h1, h2, h3, h4, h5, h6")
        .into_iter()
        .filter_map(|element| {
            let level = element.value().name()[1..].parse::<u8>().ok()?;
            Some(Heading {
                level,
                text: collapse_whitespace(&element.text().collect::<String>()),
            })
        })
        .collect()
}

/// Extracts links, split by whether they share the base URL's host
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:`, `data:` links
/// - fragment-only links
/// - `<a download>`
/// - anything that is not http(s) after resolution
///
/// `rel="nofollow"` links are kept.
fn extract_links(document: &Html, base_url: &Url) -> (Vec<String>, Vec<String>) {
    let base_host = base_url.host_str().map(|h| h.to_lowercase());
    let mut seen = HashSet::new();
    let mut internal = Vec::new();
    let mut external = Vec::new();

    for element in select_all(document, "a[href]") {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(link) = element.value().attr("href").and_then(|h| resolve_link(h, base_url))
        else {
            continue;
        };

        if !seen.insert(link.to_string()) {
            continue;
        }

        let host = link.host_str().map(|h| h.to_lowercase());
        if host.is_some() && host == base_host {
            internal.push(link.to_string());
        } else {
            external.push(link.to_string());
        }
    }

    (internal, external)
}

/// Resolves a link href to an absolute, fragment-free URL
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<ImageTag> {
    select_all(document, "img")
        .into_iter()
        .filter_map(|element| {
            let attrs = element.value();
            let raw_src = attrs
                .attr("src")
                .or_else(|| attrs.attr("data-src"))
                .map(str::trim)
                .filter(|s| !s.is_empty())?;
            let src = base_url
                .join(raw_src)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| raw_src.to_string());
            let attr = |name: &str| {
                attrs
                    .attr(name)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            };

            Some(ImageTag {
                src,
                alt: attrs.attr("alt").map(|a| a.trim().to_string()),
                width: attr("width"),
                height: attr("height"),
                loading: attr("loading").map(|l| l.to_lowercase()),
                srcset: attr("srcset"),
            })
        })
        .collect()
}

fn extract_structured_data(document: &Html) -> StructuredData {
    let json_ld = select_all(document, "script[type]")
        .into_iter()
        .filter(|e| {
            e.value()
                .attr("type")
                .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
                .unwrap_or(false)
        })
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|payload| !payload.is_empty())
        .collect();

    StructuredData {
        json_ld,
        microdata_types: attribute_tokens(document, "[itemtype]", "itemtype"),
        rdfa_types: attribute_tokens(document, "[typeof]", "typeof"),
    }
}

/// Whitespace-separated attribute values, deduplicated in document order
fn attribute_tokens(document: &Html, css: &str, attr: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for element in select_all(document, css) {
        if let Some(value) = element.value().attr(attr) {
            for token in value.split_whitespace() {
                if !tokens.iter().any(|t| t == token) {
                    tokens.push(token.to_string());
                }
            }
        }
    }
    tokens
}

fn count_words(document: &Html) -> usize {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
                    .unwrap_or(false)
            });
            if hidden {
                None
            } else {
                Some(
                    text.split_whitespace()
                        .filter(|w| w.chars().any(char::is_alphanumeric))
                        .count(),
                )
            }
        })
        .sum()
}
