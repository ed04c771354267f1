//! Crawl frontier
//!
//! The frontier is the only mutable state shared by crawl workers. All
//! mutation goes through two atomic operations, `claim_next` (dequeue and
//! mark visited) and `complete` (record the outcome and enqueue newly
//! discovered links), both executed under one lock. Fetching and parsing
//! happen outside it.

use crate::state::AbortReason;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A URL waiting in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    pub url: Url,
    pub depth: u32,
}

/// A URL handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedUrl {
    pub url: Url,
    pub depth: u32,
    /// Dequeue order, starting at 0
    pub sequence: usize,
}

/// Result of asking the frontier for work
#[derive(Debug, PartialEq, Eq)]
pub enum Claim {
    Fetch(ClaimedUrl),
    /// Queue is empty but fetches in flight may still discover links
    Wait,
    /// Nothing left to do
    Done,
}

/// A link found on a fetched page, already scope- and safety-checked
#[derive(Debug, Clone)]
pub enum Discovery {
    Allowed(Url),
    /// Disallowed by robots.txt; counted, never enqueued
    RobotsBlocked(Url),
}

/// What a worker reports back after processing a claimed URL
#[derive(Debug, Clone)]
pub struct Completion {
    pub depth: u32,
    pub success: bool,
    /// Final URL when the fetch was redirected within the site
    pub redirected_to: Option<Url>,
    pub discovered: Vec<Discovery>,
}

/// Counters reported in crawl statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierSnapshot {
    pub visited: usize,
    pub budget_remaining: usize,
    pub skipped_by_robots: usize,
    pub skipped_by_depth: usize,
    pub urls_discovered: usize,
    pub queued: usize,
    pub abort: Option<AbortReason>,
}

/// Breadth-first crawl frontier
///
/// Invariants: a URL is claimed at most once, and at most `max_pages`
/// URLs are ever claimed.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,
    visited: HashSet<String>,
    /// Everything ever queued, so duplicates never enter the queue
    enqueued: HashSet<String>,
    /// Redirect targets already fetched under another URL
    aliases: HashSet<String>,
    robots_blocked: HashSet<String>,
    max_pages: usize,
    max_depth: u32,
    budget_remaining: usize,
    in_flight: usize,
    consecutive_failures: u32,
    failure_threshold: u32,
    skipped_by_depth: usize,
    next_sequence: usize,
    abort: Option<AbortReason>,
}

impl Frontier {
    /// Creates a frontier seeded with the start URL at depth 0
    pub fn new(start: Url, max_pages: usize, max_depth: u32, failure_threshold: u32) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            enqueued: HashSet::new(),
            aliases: HashSet::new(),
            robots_blocked: HashSet::new(),
            max_pages,
            max_depth,
            budget_remaining: max_pages,
            in_flight: 0,
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
            skipped_by_depth: 0,
            next_sequence: 0,
            abort: None,
        };
        frontier.enqueue(start, 0);
        frontier
    }

    /// Pops the next unvisited URL within the depth limit and marks it visited
    pub fn claim_next(&mut self) -> Claim {
        if self.abort.is_some() || self.visited.len() >= self.max_pages {
            return Claim::Done;
        }

        while let Some(item) = self.queue.pop_front() {
            let key = item.url.as_str().to_string();
            if self.visited.contains(&key) || self.aliases.contains(&key) {
                continue;
            }
            if item.depth > self.max_depth {
                self.skipped_by_depth += 1;
                continue;
            }

            self.visited.insert(key);
            self.in_flight += 1;
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            return Claim::Fetch(ClaimedUrl {
                url: item.url,
                depth: item.depth,
                sequence,
            });
        }

        if self.in_flight > 0 {
            Claim::Wait
        } else {
            Claim::Done
        }
    }

    /// Records a finished fetch attempt and enqueues its allowed links
    ///
    /// Returns the number of URLs newly added to the queue.
    pub fn complete(&mut self, completion: Completion) -> usize {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.budget_remaining = self.budget_remaining.saturating_sub(1);

        if completion.success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            if self.consecutive_failures >= self.failure_threshold && self.abort.is_none() {
                tracing::warn!(
                    "Aborting crawl after {} consecutive failures",
                    self.consecutive_failures
                );
                self.abort = Some(AbortReason::FailureThreshold {
                    consecutive_failures: self.consecutive_failures,
                });
            }
        }

        if let Some(target) = completion.redirected_to {
            self.aliases.insert(target.as_str().to_string());
        }

        let mut added = 0;
        for discovery in completion.discovered {
            match discovery {
                Discovery::Allowed(url) => {
                    if self.enqueue(url, completion.depth + 1) {
                        added += 1;
                    }
                }
                Discovery::RobotsBlocked(url) => {
                    self.robots_blocked.insert(url.as_str().to_string());
                }
            }
        }
        added
    }

    /// Stops further claims; in-flight fetches may still complete
    pub fn cancel(&mut self) {
        if self.abort.is_none() {
            self.abort = Some(AbortReason::Cancelled);
        }
    }

    pub fn snapshot(&self) -> FrontierSnapshot {
        FrontierSnapshot {
            visited: self.visited.len(),
            budget_remaining: self.budget_remaining,
            skipped_by_robots: self.robots_blocked.len(),
            skipped_by_depth: self.skipped_by_depth,
            urls_discovered: self.enqueued.len(),
            queued: self.queue.len(),
            abort: self.abort,
        }
    }

    fn enqueue(&mut self, url: Url, depth: u32) -> bool {
        let key = url.as_str();
        if self.visited.contains(key) || self.aliases.contains(key) || self.enqueued.contains(key)
        {
            return false;
        }
        self.enqueued.insert(key.to_string());
        self.queue.push_back(QueuedUrl { url, depth });
        true
    }
}

/// Frontier shared between workers
///
/// Waiting workers are woken whenever a completion may have produced work
/// or ended the crawl.
#[derive(Debug)]
pub struct SharedFrontier {
    inner: Mutex<Frontier>,
    notify: Notify,
}

impl SharedFrontier {
    pub fn new(frontier: Frontier) -> Self {
        Self {
            inner: Mutex::new(frontier),
            notify: Notify::new(),
        }
    }

    /// Waits for the next URL to fetch
    ///
    /// Returns `None` once the crawl is finished, aborted or cancelled.
    pub async fn claim(&self, cancel: &CancellationToken) -> Option<ClaimedUrl> {
        loop {
            if cancel.is_cancelled() {
                self.cancel();
                return None;
            }

            // Registered before inspecting the frontier so no wakeup is lost
            let notified = self.notify.notified();
            let claim = self.inner.lock().claim_next();

            match claim {
                Claim::Fetch(claimed) => return Some(claimed),
                Claim::Done => {
                    self.notify.notify_waiters();
                    return None;
                }
                Claim::Wait => {
                    tokio::select! {
                        _ = notified => {}
                        _ = cancel.cancelled() => {
                            self.cancel();
                            return None;
                        }
                    }
                }
            }
        }
    }

    pub fn complete(&self, completion: Completion) -> usize {
        let added = self.inner.lock().complete(completion);
        self.notify.notify_waiters();
        added
    }

    pub fn cancel(&self) {
        self.inner.lock().cancel();
        self.notify.notify_waiters();
    }

    pub fn snapshot(&self) -> FrontierSnapshot {
        self.inner.lock().snapshot()
    }
}
