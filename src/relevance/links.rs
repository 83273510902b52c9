//! Link selection
//!
//! All candidates of a page are scored in one oracle call. A page that failed
//! relevance may still be a hub, so its links are kept but held to a stricter
//! threshold.

use crate::config::RelevanceConfig;
use crate::oracle::SemanticOracle;
use crate::relevance::{KeywordSet, LinkCandidate};
use crate::retry::{with_retry, RetryPolicy};
use crate::OracleError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct LinkSelector {
    oracle: Arc<dyn SemanticOracle>,
    threshold: f64,
    strict_threshold: f64,
    max_links: Option<usize>,
    timeout: Duration,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl LinkSelector {
    pub fn new(
        oracle: Arc<dyn SemanticOracle>,
        config: &RelevanceConfig,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            oracle,
            threshold: config.link_threshold,
            strict_threshold: config.strict_link_threshold,
            max_links: config.max_links_per_page,
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

    /// Threshold a candidate must reach given its page's verdict
    pub fn threshold_for(&self, page_passed: bool) -> f64 {
        if page_passed {
            self.threshold
        } else {
            self.strict_threshold
        }
    }

    /// Scores and marks candidates; order of the input is preserved
    ///
    /// Never fails. If the batch cannot be scored every candidate comes back
    /// unselected.
    pub async fn select(
        &self,
        mut candidates: Vec<LinkCandidate>,
        keywords: &KeywordSet,
        page_passed: bool,
    ) -> Vec<LinkCandidate> {
        if candidates.is_empty() {
            return candidates;
        }

        let scores = match self.score_batch(&candidates, keywords).await {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!(
                    "Link scoring failed for {} candidates: {}",
                    candidates.len(),
                    e
                );
                return candidates;
            }
        };

        let threshold = self.threshold_for(page_passed);
        for (candidate, score) in candidates.iter_mut().zip(scores) {
            if !score.is_finite() {
                tracing::trace!("Unscorable link excluded: {}", candidate.href);
                continue;
            }
            candidate.selection_score = score.clamp(0.0, 1.0);
            candidate.selected = candidate.selection_score >= threshold;
        }

        if let Some(cap) = self.max_links {
            apply_cap(&mut candidates, cap);
        }

        candidates
    }

    async fn score_batch(
        &self,
        candidates: &[LinkCandidate],
        keywords: &KeywordSet,
    ) -> Result<Vec<f64>, OracleError> {
        let oracle = &self.oracle;
        let timeout = self.timeout;
        let cancel = &self.cancel;
        let scores = with_retry(&self.retry, "link scoring", cancel, move || async move {
            match tokio::time::timeout(timeout, oracle.score_links(candidates, keywords)).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::Timeout),
            }
        })
        .await?;

        if scores.len() != candidates.len() {
            return Err(OracleError::Malformed(format!(
                "expected {} link scores, got {}",
                candidates.len(),
                scores.len()
            )));
        }
        Ok(scores)
    }
}

/// Keeps only the `cap` best selected candidates; earlier links win ties
fn apply_cap(candidates: &mut [LinkCandidate], cap: usize) {
    let mut ranked: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].selected)
        .collect();
    if ranked.len() <= cap {
        return;
    }

    // Stable sort keeps appearance order among equal scores
    ranked.sort_by(|&a, &b| {
        candidates[b]
            .selection_score
            .total_cmp(&candidates[a].selection_score)
    });
    for &i in &ranked[cap..] {
        candidates[i].selected = false;
    }
}
