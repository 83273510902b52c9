//! In-memory site and deterministic oracle for driving the coordinator

use async_trait::async_trait;
use parking_lot::Mutex;
use rufus::crawler::{parse_html, FetchedPage, PageFetcher};
use rufus::oracle::SemanticOracle;
use rufus::relevance::{KeywordSet, LinkCandidate};
use rufus::{FetchError, OracleError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const SITE: &str = "https://site.test";

pub fn site_url(path: &str) -> String {
    format!("{}{}", SITE, path)
}

/// Builds a page whose body is `text` followed by one link per href
pub fn page(text: &str, hrefs: &[&str]) -> String {
    let links: String = hrefs
        .iter()
        .map(|href| format!(r#"<li><a href="{}">{}</a></li>"#, href, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><p>{}</p><ul>{}</ul></body></html>",
        text, text, links
    )
}

/// Serves HTML from memory, keyed by path, and records every fetch
#[derive(Default)]
pub struct SiteFetcher {
    pages: HashMap<String, String>,
    failures: HashMap<String, u16>,
    fetches: Mutex<HashMap<String, u32>>,
    delay: Duration,
    cancel_on: Option<(String, CancellationToken)>,
    started_after_cancel: AtomicU32,
}

impl SiteFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, path: &str, html: String) -> Self {
        self.pages.insert(path.to_string(), html);
        self
    }

    /// Answers every request for `path` with HTTP `status`
    pub fn failing(mut self, path: &str, status: u16) -> Self {
        self.failures.insert(path.to_string(), status);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cancels `token` when `path` is fetched
    pub fn cancel_on(mut self, path: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((path.to_string(), token));
        self
    }

    pub fn fetch_count(&self, path: &str) -> u32 {
        self.fetches.lock().get(path).copied().unwrap_or(0)
    }

    pub fn fetch_counts(&self) -> HashMap<String, u32> {
        self.fetches.lock().clone()
    }

    pub fn total_fetches(&self) -> u32 {
        self.fetches.lock().values().sum()
    }

    pub fn started_after_cancel(&self) -> u32 {
        self.started_after_cancel.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for SiteFetcher {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        let path = url.path().to_string();
        *self.fetches.lock().entry(path.clone()).or_insert(0) += 1;

        if let Some((trigger, token)) = &self.cancel_on {
            if token.is_cancelled() {
                self.started_after_cancel.fetch_add(1, Ordering::SeqCst);
            } else if *trigger == path {
                token.cancel();
            }
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(&status) = self.failures.get(&path) {
            return Err(FetchError::Http {
                url: url.to_string(),
                status,
            });
        }

        let html = self.pages.get(&path).ok_or_else(|| FetchError::Http {
            url: url.to_string(),
            status: 404,
        })?;
        let parsed = parse_html(html, url)?;

        Ok(FetchedPage {
            final_url: url.clone(),
            title: parsed.title,
            html: html.clone(),
            text: parsed.text,
            links: parsed.links,
        })
    }
}

/// Deterministic oracle
///
/// Pages whose text contains the marker score 0.9, others 0.1. Links score
/// from a per-URL table with a default.
pub struct StubOracle {
    expand_answer: Result<Vec<String>, OracleError>,
    marker: String,
    score_error: Option<OracleError>,
    link_scores: HashMap<String, f64>,
    default_link_score: f64,
    score_calls: AtomicU32,
    link_calls: AtomicU32,
}

impl StubOracle {
    pub fn new(marker: &str) -> Self {
        Self {
            expand_answer: Ok(vec!["cost".to_string(), "plans".to_string()]),
            marker: marker.to_string(),
            score_error: None,
            link_scores: HashMap::new(),
            default_link_score: 1.0,
            score_calls: AtomicU32::new(0),
            link_calls: AtomicU32::new(0),
        }
    }

    pub fn expand_fails(mut self, error: OracleError) -> Self {
        self.expand_answer = Err(error);
        self
    }

    pub fn score_fails(mut self, error: OracleError) -> Self {
        self.score_error = Some(error);
        self
    }

    pub fn link_score(mut self, url: &str, score: f64) -> Self {
        self.link_scores.insert(url.to_string(), score);
        self
    }

    pub fn default_link_score(mut self, score: f64) -> Self {
        self.default_link_score = score;
        self
    }

    pub fn score_calls(&self) -> u32 {
        self.score_calls.load(Ordering::SeqCst)
    }

    pub fn link_calls(&self) -> u32 {
        self.link_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemanticOracle for StubOracle {
    async fn expand(&self, _instruction: &str) -> Result<Vec<String>, OracleError> {
        self.expand_answer.clone()
    }

    async fn score(&self, text: &str, _keywords: &KeywordSet) -> Result<f64, OracleError> {
        self.score_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.score_error {
            return Err(error.clone());
        }
        Ok(if text.contains(&self.marker) { 0.9 } else { 0.1 })
    }

    async fn score_links(
        &self,
        candidates: &[LinkCandidate],
        _keywords: &KeywordSet,
    ) -> Result<Vec<f64>, OracleError> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        Ok(candidates
            .iter()
            .map(|c| {
                self.link_scores
                    .get(&c.href)
                    .copied()
                    .unwrap_or(self.default_link_score)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "stub"
    }
}
