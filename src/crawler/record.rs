use crate::crawler::parser::PageSignals;
use crate::state::{CrawlState, PageState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One fetched (and possibly parsed) page
///
/// Created once when a fetch completes, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    /// Normalized requested URL
    pub url: String,

    /// URL after redirects
    pub final_url: String,

    pub state: PageState,

    /// HTTP status of the final response, if one arrived
    pub status_code: Option<u16>,

    /// Crawl distance from the start URL
    pub depth: u32,

    /// Parser output; `None` for failures, non-HTML and undecodable bodies
    #[serde(skip)]
    pub signals: Option<PageSignals>,

    #[serde(skip)]
    pub headers: BTreeMap<String, String>,

    pub response_ms: Option<u64>,

    pub redirect_hops: usize,

    /// Failure description
    pub error: Option<String>,
}

impl PageRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_failure(&self) -> bool {
        self.state.is_failure()
    }
}

/// A fetch that failed, as reported in crawl statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub url: String,
    pub state: PageState,
    pub status_code: Option<u16>,
    pub reason: String,
}

/// Statistics of one crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlStats {
    /// Terminal state; `Aborted` means the page set is partial
    pub state: CrawlState,
    pub pages_visited: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    /// Pages that carried parser signals
    pub html_pages: usize,
    pub failures: Vec<FailureEntry>,
    /// Distinct same-site links not enqueued because robots.txt disallows them
    pub skipped_by_robots: usize,
    /// Queue entries dropped for exceeding the depth limit
    pub skipped_by_depth: usize,
    /// Distinct URLs ever added to the queue, start URL included
    pub urls_discovered: usize,
    pub budget_remaining: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl CrawlStats {
    /// Percentage of visited pages that failed
    pub fn failure_rate(&self) -> f64 {
        if self.pages_visited == 0 {
            0.0
        } else {
            (self.pages_failed as f64 / self.pages_visited as f64) * 100.0
        }
    }
}
