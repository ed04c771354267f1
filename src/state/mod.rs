//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageState`: the outcome recorded for each dequeued URL
//! - `CrawlState`: the crawl lifecycle (`Idle -> Running -> {Completed, Aborted}`)

mod crawl_state;
mod page_state;

// Re-export main types
pub use crawl_state::{AbortReason, CrawlState, InvalidTransition};
pub use page_state::PageState;
