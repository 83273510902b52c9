//! Page relevance scoring
//!
//! The oracle makes the judgment. This module bounds its input, applies the
//! pass threshold, and turns exhausted retries into a failed verdict instead of
//! an error.

use crate::config::RelevanceConfig;
use crate::oracle::SemanticOracle;
use crate::relevance::KeywordSet;
use crate::retry::{with_retry, RetryPolicy};
use crate::OracleError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Verdict for one page
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    /// In [0, 1]; 0 when scoring failed
    pub score: f64,
    pub passed: bool,
    /// Set when the oracle could not score the page
    pub error: Option<String>,
}

impl ScoreOutcome {
    fn failed(error: &OracleError) -> Self {
        Self {
            score: 0.0,
            passed: false,
            error: Some(error.to_string()),
        }
    }
}

/// Scores page text against the session's keyword set
pub struct RelevanceScorer {
    oracle: Arc<dyn SemanticOracle>,
    threshold: f64,
    max_chars: usize,
    timeout: Duration,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl RelevanceScorer {
    pub fn new(
        oracle: Arc<dyn SemanticOracle>,
        config: &RelevanceConfig,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            oracle,
            threshold: config.threshold,
            max_chars: config.max_content_chars,
            timeout,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops retrying once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scores `text`; never fails
    ///
    /// Blank pages score 0 without an oracle call.
    pub async fn score(&self, text: &str, keywords: &KeywordSet) -> ScoreOutcome {
        let excerpt = truncate_chars(text.trim(), self.max_chars);
        if excerpt.is_empty() {
            return ScoreOutcome {
                score: 0.0,
                passed: false,
                error: None,
            };
        }

        let oracle = &self.oracle;
        let timeout = self.timeout;
        let cancel = &self.cancel;
        let result = with_retry(&self.retry, "relevance scoring", cancel, move || async move {
            let raw = match tokio::time::timeout(timeout, oracle.score(excerpt, keywords)).await {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(OracleError::Timeout),
            };
            if !raw.is_finite() {
                return Err(OracleError::Malformed(format!(
                    "score is not finite: {}",
                    raw
                )));
            }
            Ok(raw.clamp(0.0, 1.0))
        })
        .await;

        match result {
            Ok(score) => ScoreOutcome {
                score,
                passed: score >= self.threshold,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Scoring failed after retries: {}", e);
                ScoreOutcome::failed(&e)
            }
        }
    }
}

/// Returns at most `max_chars` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
