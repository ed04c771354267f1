//! Site profile
//!
//! Descriptive statistics of one crawl that feed the reports but not the
//! scores: response-time and word-count distributions and a heuristic
//! guess of the kind of business the site belongs to.

use crate::crawler::PageRecord;
use serde::Serialize;
use std::fmt;

/// Pages inspected for business path signals
const MAX_PROFILED_PAGES: usize = 300;

/// Signals kept per business type
const MAX_SIGNALS: usize = 8;

/// Kind of business a site appears to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessKind {
    Saas,
    Ecommerce,
    Publisher,
    Agency,
    LocalService,
    Generic,
}

impl BusinessKind {
    /// Candidates in tie-breaking order
    const DETECTABLE: [BusinessKind; 5] = [
        BusinessKind::Saas,
        BusinessKind::Ecommerce,
        BusinessKind::Publisher,
        BusinessKind::Agency,
        BusinessKind::LocalService,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Saas => "SaaS",
            Self::Ecommerce => "E-commerce",
            Self::Publisher => "Publisher",
            Self::Agency => "Agency",
            Self::LocalService => "Local Service",
            Self::Generic => "Generic",
        }
    }

    fn path_signals(&self) -> &'static [&'static str] {
        match self {
            Self::Saas => &["/pricing", "/features", "/integrations", "/docs", "/platform", "/product"],
            Self::Ecommerce => &["/products", "/product/", "/collections", "/shop", "/cart", "/checkout", "/store"],
            Self::Publisher => &["/blog", "/news", "/articles", "/author", "/category", "/topics"],
            Self::Agency => &["/case-studies", "/portfolio", "/our-work", "/industries", "/clients"],
            Self::LocalService => &["/locations", "/service-area", "/services", "/contact", "/book"],
            Self::Generic => &[],
        }
    }

    fn keyword_signals(&self) -> &'static [&'static str] {
        match self {
            Self::Saas => &["free trial", "book demo", "start free", "software", "platform", "api"],
            Self::Ecommerce => &["add to cart", "buy now", "shop now", "free shipping", "product"],
            Self::Publisher => &["newsletter", "editorial", "read more", "published", "article"],
            Self::Agency => &["case study", "our clients", "results", "portfolio", "growth marketing"],
            Self::LocalService => &["call now", "service area", "licensed", "near you", "schedule service"],
            Self::Generic => &[],
        }
    }
}

impl fmt::Display for BusinessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Detected business type with its share of all signal points
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessType {
    pub kind: BusinessKind,
    /// Winner's points over all points, in [0, 1]
    pub confidence: f64,
    pub signals: Vec<String>,
}

impl BusinessType {
    fn generic() -> Self {
        Self {
            kind: BusinessKind::Generic,
            confidence: 0.0,
            signals: Vec::new(),
        }
    }
}

/// Response times of pages that answered, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseTimes {
    pub median_ms: Option<f64>,
    pub p90_ms: Option<f64>,
}

/// Word counts of HTML pages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WordCounts {
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteProfile {
    pub response_times: ResponseTimes,
    pub word_counts: WordCounts,
    pub business: BusinessType,
}

/// Profiles the crawled pages of the site starting at `start_url`
pub fn profile(pages: &[PageRecord], start_url: &str) -> SiteProfile {
    let response: Vec<f64> = pages
        .iter()
        .filter_map(|p| p.response_ms)
        .map(|ms| ms as f64)
        .collect();
    let words: Vec<f64> = pages
        .iter()
        .filter_map(|p| p.signals.as_ref())
        .map(|s| s.word_count as f64)
        .collect();

    SiteProfile {
        response_times: ResponseTimes {
            median_ms: median(&response),
            p90_ms: percentile(&response, 0.90),
        },
        word_counts: WordCounts {
            p25: percentile(&words, 0.25),
            median: median(&words),
            p75: percentile(&words, 0.75),
        },
        business: detect_business(pages, start_url),
    }
}

/// Nearest-rank percentile; the rank index rounds half to even
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let ordered = sorted(values);
    let last = ordered.len().checked_sub(1)?;
    let idx = ((last as f64) * p).round_ties_even() as usize;
    ordered.get(idx.min(last)).copied()
}

/// Middle value, or the mean of the two middle values
pub fn median(values: &[f64]) -> Option<f64> {
    let ordered = sorted(values);
    let n = ordered.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(ordered[n / 2]),
        _ => Some((ordered[n / 2 - 1] + ordered[n / 2]) / 2.0),
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut ordered = values.to_vec();
    ordered.sort_by(f64::total_cmp);
    ordered
}

/// Scores URL paths (2 points per page) and homepage keywords (1 point each)
pub fn detect_business(pages: &[PageRecord], start_url: &str) -> BusinessType {
    let kinds = BusinessKind::DETECTABLE;
    let mut points = [0u32; 5];
    let mut signals: [Vec<String>; 5] = Default::default();

    let html: Vec<_> = pages.iter().filter(|p| p.signals.is_some()).collect();

    for page in html.iter().take(MAX_PROFILED_PAGES) {
        let path = url::Url::parse(&page.url)
            .map(|u| u.path().to_lowercase())
            .unwrap_or_else(|_| "/".to_string());
        for (i, kind) in kinds.iter().enumerate() {
            if let Some(pattern) = kind.path_signals().iter().find(|p| path.contains(**p)) {
                points[i] += 2;
                if signals[i].len() < MAX_SIGNALS {
                    signals[i].push(format!("path signal: {} ({})", pattern, path));
                }
            }
        }
    }

    let home = html.first().and_then(|p| p.signals.as_ref());
    let homepage_text = [
        home.and_then(|s| s.title.as_deref()).unwrap_or_default(),
        home.and_then(|s| s.meta_description.as_deref()).unwrap_or_default(),
        start_url,
    ]
    .join(" ")
    .to_lowercase();

    for (i, kind) in kinds.iter().enumerate() {
        for keyword in kind.keyword_signals() {
            if homepage_text.contains(*keyword) {
                points[i] += 1;
                if signals[i].len() < MAX_SIGNALS {
                    signals[i].push(format!("keyword signal: {}", keyword));
                }
            }
        }
    }

    // First kind wins ties
    let mut winner = 0;
    for i in 1..kinds.len() {
        if points[i] > points[winner] {
            winner = i;
        }
    }
    if points[winner] == 0 {
        return BusinessType::generic();
    }

    let total: u32 = points.iter().sum();
    BusinessType {
        kind: kinds[winner],
        confidence: (points[winner] as f64 / total as f64 * 1000.0).round() / 1000.0,
        signals: std::mem::take(&mut signals[winner]),
    }
}
