//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the session state machine and the crawl loop,
//! including:
//! - Validating the request and expanding the instruction into keywords
//! - Dispatching frontier entries to a bounded pool of workers
//! - Enforcing page and wall-clock budgets and external cancellation
//! - Draining in-flight work and producing the final snapshot

use crate::config::{validate_max_depth, Config};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::frontier::{Frontier, FrontierEntry, SharedFrontier};
use crate::crawler::worker::{PageReport, PageWorker};
use crate::oracle::SemanticOracle;
use crate::output::{
    CrawlResult, LogEntry, Outcome, ResultAccumulator, SessionSummary, Termination,
};
use crate::relevance::{KeywordExpander, KeywordSet, LinkSelector, RelevanceScorer};
use crate::retry::RetryPolicy;
use crate::session::{CrawlSession, SessionStatus};
use crate::url::{complete_start_url, normalize_parsed};
use crate::{ConfigError, RufusError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Pages between two progress log lines
const PROGRESS_INTERVAL: usize = 10;

/// What to crawl
///
/// Unset limits fall back to the `[crawler]` configuration.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub instruction: String,
    pub start_url: String,
    pub max_depth: Option<u32>,
    pub max_pages: Option<usize>,
    pub time_budget: Option<Duration>,
}

impl CrawlRequest {
    pub fn new(instruction: impl Into<String>, start_url: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            start_url: start_url.into(),
            max_depth: None,
            max_pages: None,
            time_budget: None,
        }
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// Limits resolved from the request and the configuration
struct Budget {
    max_pages: Option<usize>,
    time_budget: Option<Duration>,
}

/// Main crawler coordinator structure
///
/// A coordinator can run any number of sessions; nothing is shared between
/// them except the collaborators passed in.
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    oracle: Arc<dyn SemanticOracle>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fetcher` - Where pages come from
    /// * `oracle` - Who judges relevance
    pub fn new(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        oracle: Arc<dyn SemanticOracle>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            oracle,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an external cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs one crawl session to completion
    ///
    /// Returns `Err` only when setup fails (invalid request, missing
    /// credentials, or keyword expansion with no fallback). Per-page failures,
    /// budgets and cancellation all produce an `Ok` snapshot.
    pub async fn run(&self, request: CrawlRequest) -> Result<CrawlResult, RufusError> {
        let (mut session, seed, budget) = self.init(&request).map_err(|e| {
            tracing::error!("Session failed during setup: {}", e);
            e
        })?;

        session.advance(SessionStatus::Expanding)?;
        let keywords = match self.expand(&session.instruction).await {
            Ok(keywords) => keywords,
            Err(e) => {
                session.advance(SessionStatus::Failed)?;
                tracing::error!("Session failed during keyword expansion: {}", e);
                return Err(e.into());
            }
        };
        session.keywords = Some(keywords.clone());

        session.advance(SessionStatus::Crawling)?;
        let frontier = Frontier::shared(session.max_depth);
        frontier.lock().push(seed);

        let worker = Arc::new(self.build_worker(&session, keywords, frontier.clone()));
        let mut accumulator = ResultAccumulator::new();
        let termination = self
            .crawl(&mut session, &worker, &frontier, &mut accumulator, &budget)
            .await?;

        self.drain(&session, &frontier, &mut accumulator)?;

        session.advance(SessionStatus::Done)?;
        let result = accumulator.finalize(SessionSummary {
            instruction: session.instruction.clone(),
            start_url: session.start_url.to_string(),
            max_depth: session.max_depth,
            status: session.status(),
            expanded_terms: session.expanded_terms(),
            keywords_degraded: session.keywords.as_ref().map_or(false, |k| k.degraded),
            termination,
            created_at: session.created_at,
            finished_at: Utc::now(),
        });

        tracing::info!(
            "Crawl finished ({}): {} pages, {} relevant",
            termination,
            result.stats.total_pages,
            result.stats.relevant_pages
        );

        Ok(result)
    }

    /// INIT: validates the request before any network activity
    ///
    /// The seed entry requests the start URL as given and is deduplicated
    /// under its normalized form.
    fn init(
        &self,
        request: &CrawlRequest,
    ) -> Result<(CrawlSession, FrontierEntry, Budget), RufusError> {
        let instruction = request.instruction.trim();
        if instruction.is_empty() {
            return Err(ConfigError::Validation("instruction cannot be empty".to_string()).into());
        }

        let invalid_url = |e: crate::UrlError| {
            ConfigError::InvalidUrl(format!("{}: {}", request.start_url, e))
        };
        let fetch_url = complete_start_url(&request.start_url).map_err(invalid_url)?;
        let start_url = normalize_parsed(fetch_url.clone()).map_err(invalid_url)?;

        let max_depth = request.max_depth.unwrap_or(self.config.crawler.max_depth);
        validate_max_depth(max_depth)?;

        let budget = Budget {
            max_pages: request.max_pages.or(self.config.crawler.max_pages),
            time_budget: request.time_budget.or_else(|| self.config.crawler.time_budget()),
        };
        if budget.max_pages == Some(0) {
            return Err(ConfigError::Validation("max_pages must be >= 1".to_string()).into());
        }

        self.oracle.ensure_configured()?;

        tracing::info!(
            "Starting session at {} (max depth {}, oracle {})",
            start_url,
            max_depth,
            self.oracle.name()
        );
        let seed = FrontierEntry::seed(start_url.clone(), fetch_url);
        Ok((CrawlSession::new(instruction, start_url, max_depth), seed, budget))
    }

    /// EXPANDING: builds the keyword set, degrading to literal terms
    async fn expand(&self, instruction: &str) -> Result<KeywordSet, crate::OracleError> {
        let expander = KeywordExpander::new(
            self.oracle.clone(),
            self.retry_policy(),
            self.config.crawler.score_timeout(),
        )
        .with_cancellation(self.cancel.clone());
        expander.expand_or_fallback(instruction).await
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.crawler.max_retries,
            self.config.crawler.retry_base_delay(),
        )
    }

    fn build_worker(
        &self,
        session: &CrawlSession,
        keywords: KeywordSet,
        frontier: SharedFrontier,
    ) -> PageWorker {
        let crawler = &self.config.crawler;
        let relevance = &self.config.relevance;

        PageWorker {
            fetcher: self.fetcher.clone(),
            scorer: RelevanceScorer::new(
                self.oracle.clone(),
                relevance,
                crawler.score_timeout(),
                self.retry_policy(),
            )
            .with_cancellation(self.cancel.clone()),
            selector: LinkSelector::new(
                self.oracle.clone(),
                relevance,
                crawler.score_timeout(),
                self.retry_policy(),
            )
            .with_cancellation(self.cancel.clone()),
            keywords,
            frontier,
            seed: session.start_url.clone(),
            max_depth: session.max_depth,
            same_host_only: crawler.same_host_only,
            fetch_timeout: crawler.fetch_timeout(),
            fetch_retry: self.retry_policy(),
            max_content_chars: relevance.max_content_chars,
            cancel: self.cancel.clone(),
        }
    }

    /// CRAWLING: dispatches entries until the frontier is exhausted or a stop
    /// condition fires, then waits for in-flight work
    async fn crawl(
        &self,
        session: &mut CrawlSession,
        worker: &Arc<PageWorker>,
        frontier: &SharedFrontier,
        accumulator: &mut ResultAccumulator,
        budget: &Budget,
    ) -> Result<Termination, RufusError> {
        let workers = self.config.crawler.workers.max(1);
        let started = Instant::now();
        let deadline = budget.time_budget.map(|b| started + b);

        let mut in_flight = JoinSet::new();
        let mut dispatched = 0usize;
        let mut processed = 0usize;
        let mut stop: Option<Termination> = None;

        loop {
            if stop.is_none() {
                if self.cancel.is_cancelled() {
                    stop = Some(Termination::Cancelled);
                } else if deadline.map_or(false, |d| Instant::now() >= d) {
                    stop = Some(Termination::TimeBudget);
                }
                if let Some(reason) = stop {
                    self.begin_draining(session, frontier, reason)?;
                }
            }

            if stop.is_none() {
                while in_flight.len() < workers
                    && budget.max_pages.map_or(true, |max| dispatched < max)
                {
                    let next = frontier.lock().pop();
                    let Some(entry) = next else {
                        break;
                    };
                    dispatched += 1;
                    in_flight.spawn(worker.clone().process(entry));
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                joined = in_flight.join_next() => {
                    let Some(joined) = joined else {
                        continue;
                    };
                    match joined {
                        Ok(report) => {
                            self.record(accumulator, report)?;
                            processed += 1;
                            if processed % PROGRESS_INTERVAL == 0 {
                                let elapsed = started.elapsed();
                                let rate = processed as f64 / elapsed.as_secs_f64().max(0.001);
                                tracing::info!(
                                    "Progress: {} pages processed, {} relevant, {} in frontier, {:.2} pages/sec",
                                    processed,
                                    accumulator.relevant_count(),
                                    frontier.lock().len(),
                                    rate
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!("Worker task failed: {}", e);
                        }
                    }
                }
                _ = self.cancel.cancelled(), if stop.is_none() => {
                    tracing::info!(
                        "Cancellation requested, draining {} in-flight pages",
                        in_flight.len()
                    );
                    stop = Some(Termination::Cancelled);
                    self.begin_draining(session, frontier, Termination::Cancelled)?;
                }
                _ = wait_until(deadline), if stop.is_none() => {
                    tracing::info!(
                        "Time budget exhausted, draining {} in-flight pages",
                        in_flight.len()
                    );
                    stop = Some(Termination::TimeBudget);
                    self.begin_draining(session, frontier, Termination::TimeBudget)?;
                }
            }
        }

        let termination = match stop {
            Some(reason) => reason,
            None if frontier.lock().is_empty() => Termination::Completed,
            None => {
                tracing::info!("Page budget of {} reached", dispatched);
                Termination::PageBudget
            }
        };

        if session.status() == SessionStatus::Crawling {
            self.begin_draining(session, frontier, termination)?;
        }

        tracing::info!(
            "Crawl loop stopped after {} pages in {:?}",
            processed,
            started.elapsed()
        );
        Ok(termination)
    }

    /// CRAWLING -> DRAINING; the frontier accepts nothing afterwards
    fn begin_draining(
        &self,
        session: &mut CrawlSession,
        frontier: &SharedFrontier,
        reason: Termination,
    ) -> Result<(), RufusError> {
        frontier.lock().close();
        session.advance(SessionStatus::Draining)?;
        tracing::debug!("Draining session ({})", reason);
        Ok(())
    }

    /// Logs whatever is left in the frontier as abandoned
    fn drain(
        &self,
        session: &CrawlSession,
        frontier: &SharedFrontier,
        accumulator: &mut ResultAccumulator,
    ) -> Result<(), RufusError> {
        let abandoned = frontier.lock().drain();
        if !abandoned.is_empty() {
            tracing::info!(
                "{} frontier entries abandoned (session {})",
                abandoned.len(),
                session.status()
            );
        }
        for entry in abandoned {
            accumulator.record_log(
                LogEntry::new(entry.url.as_str(), entry.depth, Outcome::Abandoned)
                    .with_reason("session stopped before dispatch"),
            )?;
        }
        Ok(())
    }

    fn record(
        &self,
        accumulator: &mut ResultAccumulator,
        report: PageReport,
    ) -> Result<(), RufusError> {
        match report {
            PageReport::Page { record, entry } => {
                accumulator.record_page(record, entry)?;
            }
            PageReport::Skipped(entry) => {
                accumulator.record_log(entry)?;
            }
        }
        Ok(())
    }
}

/// Completes at `deadline`, or never when there is none
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
