//! Crawler module for page fetching and processing
//!
//! This module contains the crawling logic, including:
//! - HTTP fetching with per-hop target validation and optional retries
//! - HTML parsing into page signals
//! - The shared breadth-first frontier and per-slot pacing
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod pacing;
mod parser;
mod record;
mod retry;

pub use coordinator::{CrawlOutcome, CrawlSettings, Crawler};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher, PageFetch};
pub use frontier::{
    Claim, ClaimedUrl, Completion, Discovery, Frontier, FrontierSnapshot, SharedFrontier,
};
pub use pacing::{effective_delay, SlotPacer};
pub use parser::{
    looks_like_html, parse, parse_html, Heading, ImageTag, PageSignals, ParseError,
    StructuredData,
};
pub use record::{CrawlStats, FailureEntry, PageRecord};
pub use retry::RetryingFetcher;
