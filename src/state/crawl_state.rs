use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a crawl stopped before draining its frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum AbortReason {
    /// Too many fetches failed in a row
    FailureThreshold { consecutive_failures: u32 },

    /// The caller cancelled the crawl
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailureThreshold {
                consecutive_failures,
            } => write!(f, "{} consecutive fetch failures", consecutive_failures),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle of a crawl: `Idle -> Running -> {Completed, Aborted}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum CrawlState {
    Idle,
    Running,
    Completed,
    Aborted(AbortReason),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid crawl state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: CrawlState,
    pub to: CrawlState,
}

impl CrawlState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted(_))
    }

    /// Results of an aborted crawl are partial
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            Self::Aborted(reason) => Some(*reason),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: &CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Aborted(_))
        )
    }

    /// Returns the next state, or an error for an illegal move
    pub fn transition(self, next: CrawlState) -> Result<CrawlState, InvalidTransition> {
        if self.can_transition_to(&next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}
