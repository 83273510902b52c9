/// Session status definitions for the crawl state machine
///
/// A session only ever moves forward through these states.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    // ===== Setup States =====
    /// Session created, start URL and depth not yet validated
    Init,

    /// Keyword expansion is running
    Expanding,

    // ===== Active States =====
    /// Frontier entries are being dispatched to workers
    Crawling,

    /// No new dispatch; in-flight work is finishing
    Draining,

    // ===== Terminal States =====
    /// Snapshot available
    Done,

    /// Setup failed before crawling started
    Failed,
}

impl SessionStatus {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Position along the success path, used to keep transitions monotonic
    fn rank(&self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Expanding => 1,
            Self::Crawling => 2,
            Self::Draining => 3,
            Self::Done => 4,
            Self::Failed => 4,
        }
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    ///
    /// The success path must be walked one step at a time. `Failed` is only
    /// reachable from the setup states.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }

        match next {
            Self::Failed => matches!(self, Self::Init | Self::Expanding),
            _ => next.rank() == self.rank() + 1,
        }
    }

    /// Converts the status to its serialized string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Expanding => "expanding",
            Self::Crawling => "crawling",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its string representation
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "init" => Some(Self::Init),
            "expanding" => Some(Self::Expanding),
            "crawling" => Some(Self::Crawling),
            "draining" => Some(Self::Draining),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
