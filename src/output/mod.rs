//! Output module for crawl results
//!
//! This module handles:
//! - The result types of a session: page records, the processing log, statistics
//! - Accumulating them while the crawl runs ([`ResultAccumulator`])
//! - Writing the final snapshot as JSON
//! - Printing a summary to stdout

mod accumulator;
mod json;
pub mod stats;

pub use accumulator::ResultAccumulator;
pub use json::{load_results, results_file_name, save_results};
pub use stats::{print_summary, CrawlStatistics, DepthBucket};

use crate::session::SessionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to one processed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Fetched and scored at or above the threshold
    Relevant,

    /// Fetched and scored below the threshold
    Irrelevant,

    /// Fetched, but the oracle could not score it
    ScoreFailed,

    FetchFailed,

    ParseFailed,

    /// Still queued when the session stopped early
    Abandoned,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevant => "relevant",
            Self::Irrelevant => "irrelevant",
            Self::ScoreFailed => "score_failed",
            Self::FetchFailed => "fetch_failed",
            Self::ParseFailed => "parse_failed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Returns true for outcomes caused by an error
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ScoreFailed | Self::FetchFailed | Self::ParseFailed
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the crawl loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Frontier exhausted with no work in flight
    Completed,
    Cancelled,
    PageBudget,
    TimeBudget,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::PageBudget => "page_budget",
            Self::TimeBudget => "time_budget",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub depth: u32,
    pub parent_url: Option<String>,
    /// Anchor text of the link that led here
    pub anchor_text: String,
    pub title: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub extracted_text: String,
    pub relevance_score: f64,
    pub passed: bool,
    pub outbound_link_count: usize,
    pub selected_link_count: usize,
}

/// One line of the processing log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub url: String,
    pub depth: u32,
    pub outcome: Outcome,
    pub reason: Option<String>,
}

impl LogEntry {
    pub fn new(url: impl Into<String>, depth: u32, outcome: Outcome) -> Self {
        Self {
            url: url.into(),
            depth,
            outcome,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Session metadata written alongside the pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub instruction: String,
    pub start_url: String,
    pub max_depth: u32,
    pub status: SessionStatus,
    pub expanded_terms: Vec<String>,
    /// True when expansion fell back to literal terms
    pub keywords_degraded: bool,
    pub termination: Termination,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Final snapshot of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub session: SessionSummary,
    pub pages: Vec<PageRecord>,
    pub log: Vec<LogEntry>,
    pub stats: CrawlStatistics,
}

impl CrawlResult {
    /// Pages that passed the relevance threshold
    pub fn relevant_pages(&self) -> impl Iterator<Item = &PageRecord> {
        self.pages.iter().filter(|p| p.passed)
    }

    /// Returns true when the crawl stopped before the frontier was exhausted
    pub fn is_partial(&self) -> bool {
        self.session.termination != Termination::Completed
    }
}
