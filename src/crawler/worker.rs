//! One unit of crawl work: fetch, score, select links
//!
//! A [`PageWorker`] is shared by every task of a session. It pushes selected
//! links into the frontier itself and reports the page back to the
//! coordinator, which owns the result accumulator.

use crate::crawler::fetcher::{FetchedPage, PageFetcher};
use crate::crawler::frontier::{FrontierEntry, SharedFrontier};
use crate::output::{LogEntry, Outcome, PageRecord};
use crate::relevance::{truncate_chars, KeywordSet, LinkCandidate, LinkSelector, RelevanceScorer};
use crate::retry::{with_retry, RetryPolicy};
use crate::url::{absolute_href, is_same_host, normalize_parsed};
use crate::FetchError;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What a finished unit hands back to the coordinator
#[derive(Debug)]
pub enum PageReport {
    /// Fetched and scored, possibly with a scoring failure
    Page { record: PageRecord, entry: LogEntry },

    /// Nothing recorded beyond the log entry
    Skipped(LogEntry),
}

impl PageReport {
    pub fn log_entry(&self) -> &LogEntry {
        match self {
            Self::Page { entry, .. } => entry,
            Self::Skipped(entry) => entry,
        }
    }
}

/// Everything a unit of work needs, shared across tasks
pub struct PageWorker {
    pub fetcher: Arc<dyn PageFetcher>,
    pub scorer: RelevanceScorer,
    pub selector: LinkSelector,
    pub keywords: KeywordSet,
    pub frontier: SharedFrontier,
    pub seed: Url,
    pub max_depth: u32,
    pub same_host_only: bool,
    pub fetch_timeout: Duration,
    pub fetch_retry: RetryPolicy,
    pub max_content_chars: usize,
    pub cancel: CancellationToken,
}

impl PageWorker {
    /// Processes one frontier entry
    ///
    /// Never fails: every error ends up in the returned log entry.
    pub async fn process(self: Arc<Self>, entry: FrontierEntry) -> PageReport {
        let url = entry.url.to_string();

        if self.cancel.is_cancelled() {
            return PageReport::Skipped(
                LogEntry::new(url, entry.depth, Outcome::Abandoned)
                    .with_reason("cancelled before fetch"),
            );
        }

        tracing::debug!("Processing URL: {} (depth {})", url, entry.depth);

        let page = match self.fetch(&entry.fetch_url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                let outcome = match e {
                    FetchError::Parse(_) => Outcome::ParseFailed,
                    _ => Outcome::FetchFailed,
                };
                return PageReport::Skipped(
                    LogEntry::new(url, entry.depth, outcome).with_reason(e.to_string()),
                );
            }
        };

        // A redirect target is the same page; never fetch it again
        if let Ok(final_url) = normalize_parsed(page.final_url.clone()) {
            if final_url != entry.url {
                self.frontier.lock().mark_visited(&final_url);
            }
        }

        let verdict = self.scorer.score(&page.text, &self.keywords).await;
        let (outcome, reason) = match &verdict.error {
            Some(error) => (Outcome::ScoreFailed, Some(error.clone())),
            None if verdict.passed => (Outcome::Relevant, None),
            None => (Outcome::Irrelevant, None),
        };
        tracing::debug!("Scored {}: {:.2} ({})", url, verdict.score, outcome);

        // Links of an unscored page are not followed
        let selected_link_count = if entry.depth < self.max_depth && verdict.error.is_none() {
            self.follow_links(&page, &entry, verdict.passed).await
        } else {
            0
        };

        let record = PageRecord {
            url: url.clone(),
            depth: entry.depth,
            parent_url: entry.parent_url.as_ref().map(|u| u.to_string()),
            anchor_text: entry.anchor_text.clone(),
            title: page.title.clone(),
            fetched_at: Utc::now(),
            extracted_text: truncate_chars(&page.text, self.max_content_chars).to_string(),
            relevance_score: verdict.score,
            passed: verdict.passed,
            outbound_link_count: page.links.len(),
            selected_link_count,
        };

        let mut log_entry = LogEntry::new(url, entry.depth, outcome);
        if let Some(reason) = reason {
            log_entry = log_entry.with_reason(reason);
        }

        PageReport::Page {
            record,
            entry: log_entry,
        }
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let fetcher = &self.fetcher;
        let timeout = self.fetch_timeout;
        let cancel = &self.cancel;
        with_retry(&self.fetch_retry, "fetch", cancel, move || async move {
            match tokio::time::timeout(timeout, fetcher.fetch(url, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    url: url.to_string(),
                }),
            }
        })
        .await
    }

    /// Selects links of `page` and queues them; returns how many were selected
    async fn follow_links(
        &self,
        page: &FetchedPage,
        entry: &FrontierEntry,
        page_passed: bool,
    ) -> usize {
        let (targets, candidates) = self.prepare_candidates(page, entry);
        if candidates.is_empty() {
            return 0;
        }

        let scored = self
            .selector
            .select(candidates, &self.keywords, page_passed)
            .await;

        let mut selected = 0;
        let mut queued = 0;
        {
            let mut frontier = self.frontier.lock();
            for ((url, fetch_url), candidate) in targets.into_iter().zip(scored) {
                if !candidate.selected {
                    continue;
                }
                selected += 1;
                let child = FrontierEntry::child(
                    entry,
                    url,
                    fetch_url,
                    candidate.anchor_text,
                    candidate.surrounding_text,
                );
                if frontier.push(child) {
                    queued += 1;
                }
            }
        }

        tracing::debug!(
            "{}: {} links selected, {} queued",
            entry.url,
            selected,
            queued
        );
        selected
    }

    /// Turns raw links into candidates worth asking the oracle about
    ///
    /// Each target is returned as its normalized key and the address to
    /// request. Drops links that cannot be resolved, leave the seed's host
    /// (when scoped), point back at the page, repeat within the page, or were
    /// already visited.
    fn prepare_candidates(
        &self,
        page: &FetchedPage,
        entry: &FrontierEntry,
    ) -> (Vec<(Url, Url)>, Vec<LinkCandidate>) {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for raw in &page.links {
            let Some(fetch_url) = absolute_href(&raw.href, &page.final_url) else {
                continue;
            };
            let Ok(url) = normalize_parsed(fetch_url.clone()) else {
                continue;
            };
            if self.same_host_only && !is_same_host(&self.seed, &url) {
                continue;
            }
            if url == entry.url || !seen.insert(url.as_str().to_string()) {
                continue;
            }
            resolved.push((url, fetch_url, raw));
        }

        {
            let frontier = self.frontier.lock();
            resolved.retain(|(url, _, _)| !frontier.is_visited(url));
        }

        resolved
            .into_iter()
            .map(|(url, fetch_url, raw)| {
                let candidate = LinkCandidate::new(
                    url.as_str(),
                    raw.anchor_text.as_str(),
                    raw.surrounding_text.as_str(),
                );
                ((url, fetch_url), candidate)
            })
            .unzip()
    }
}
