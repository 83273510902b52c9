//! Session module for tracking a single crawl from setup to snapshot
//!
//! # Components
//!
//! - `SessionStatus`: the monotonic state machine (init, expanding, crawling, draining, done/failed)
//! - `CrawlSession`: the session-scoped identity of one crawl

mod status;

pub use status::SessionStatus;

use crate::relevance::KeywordSet;
use crate::StateError;
use chrono::{DateTime, Utc};
use url::Url;

/// One crawl session
///
/// Everything a session owns lives for the duration of a single
/// `Coordinator::run` call; nothing here is process-global.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    pub instruction: String,
    pub start_url: Url,
    pub max_depth: u32,
    pub keywords: Option<KeywordSet>,
    pub created_at: DateTime<Utc>,
    status: SessionStatus,
}

impl CrawlSession {
    pub fn new(instruction: impl Into<String>, start_url: Url, max_depth: u32) -> Self {
        Self {
            instruction: instruction.into(),
            start_url,
            max_depth,
            keywords: None,
            created_at: Utc::now(),
            status: SessionStatus::Init,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Moves the session to `next`, rejecting backward or skipped transitions
    pub fn advance(&mut self, next: SessionStatus) -> Result<(), StateError> {
        if !self.status.can_transition_to(next) {
            return Err(StateError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        tracing::debug!("Session {} -> {}", self.status, next);
        self.status = next;
        Ok(())
    }

    /// Expanded terms, empty until expansion has run
    pub fn expanded_terms(&self) -> Vec<String> {
        self.keywords
            .as_ref()
            .map(|k| k.expanded_terms.iter().cloned().collect())
            .unwrap_or_default()
    }
}
