//! Per-slot request pacing
//!
//! Each worker slot keeps its own pacer, so the delay bounds the request
//! rate of one slot without serializing the whole crawl.

use crate::config::MAX_REQUEST_DELAY_SECONDS;
use crate::robots::ParsedRobots;
use std::time::{Duration, Instant};

/// Start times of the requests issued by one worker slot
#[derive(Debug, Clone)]
pub struct SlotPacer {
    delay: Duration,
    last_start: Option<Instant>,
}

impl SlotPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_start: None,
        }
    }

    /// Time to wait before this slot may start its next request
    ///
    /// Returns `None` if a request can be started now.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        let last = self.last_start?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.delay {
            Some(self.delay - elapsed)
        } else {
            None
        }
    }

    /// Records that this slot started a request
    pub fn record_start(&mut self, now: Instant) {
        self.last_start = Some(now);
    }
}

/// Calculates the delay between requests of one slot
///
/// Uses the maximum of the configured delay and the robots.txt crawl-delay,
/// which is capped like the configured one.
pub fn effective_delay(config_delay: Duration, robots: &ParsedRobots, user_agent: &str) -> Duration {
    let robots_delay = robots
        .crawl_delay(user_agent)
        .map(|seconds| seconds.min(MAX_REQUEST_DELAY_SECONDS))
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        .unwrap_or(Duration::ZERO);

    std::cmp::max(config_delay, robots_delay)
}
