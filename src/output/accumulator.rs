//! Accumulates page records and log entries for one session

use crate::output::{CrawlResult, CrawlStatistics, LogEntry, PageRecord, SessionSummary};
use crate::StateError;
use std::collections::HashSet;

/// Owned by the coordinator; workers hand their results back to it
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    pages: Vec<PageRecord>,
    log: Vec<LogEntry>,
    recorded_urls: HashSet<String>,
    snapshot: Option<CrawlResult>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page record together with its log entry
    ///
    /// Returns `Ok(false)` if a record for the same URL already exists; the
    /// duplicate is dropped.
    pub fn record_page(&mut self, record: PageRecord, entry: LogEntry) -> Result<bool, StateError> {
        self.ensure_open()?;

        if !self.recorded_urls.insert(record.url.clone()) {
            tracing::warn!("Duplicate page record dropped: {}", record.url);
            return Ok(false);
        }

        self.pages.push(record);
        self.log.push(entry);
        Ok(true)
    }

    /// Adds a log entry for a URL that produced no page record
    pub fn record_log(&mut self, entry: LogEntry) -> Result<(), StateError> {
        self.ensure_open()?;
        self.log.push(entry);
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn relevant_count(&self) -> usize {
        self.pages.iter().filter(|p| p.passed).count()
    }

    pub fn is_finalized(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Seals the accumulator and returns the snapshot
    ///
    /// Only the first call uses `session`; later calls return the same
    /// snapshot unchanged.
    pub fn finalize(&mut self, session: SessionSummary) -> CrawlResult {
        if let Some(snapshot) = &self.snapshot {
            return snapshot.clone();
        }

        let pages = std::mem::take(&mut self.pages);
        let log = std::mem::take(&mut self.log);
        let stats = CrawlStatistics::compute(&pages, &log);
        let snapshot = CrawlResult {
            session,
            pages,
            log,
            stats,
        };

        self.snapshot = Some(snapshot.clone());
        snapshot
    }

    fn ensure_open(&self) -> Result<(), StateError> {
        if self.snapshot.is_some() {
            Err(StateError::Finalized)
        } else {
            Ok(())
        }
    }
}
