//! Keyword expansion
//!
//! The instruction's own significant words always belong to the keyword set.
//! The oracle adds related terms once per session; if it cannot, the literal
//! words are used alone.

use crate::oracle::SemanticOracle;
use crate::retry::{with_retry, RetryPolicy};
use crate::OracleError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Words that carry no topical signal in an instruction
const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "by", "can", "do", "for",
    "from", "get", "give", "how", "i", "in", "into", "is", "it", "list", "me", "my", "of", "on",
    "or", "our", "please", "show", "that", "the", "their", "them", "there", "these", "this", "to",
    "us", "want", "was", "we", "what", "when", "where", "which", "who", "why", "with", "you",
    "your", "find", "look", "search",
];

/// The keyword set of one session; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    pub original_instruction: String,
    /// Case-normalized, deduplicated; sorted for stable output
    pub expanded_terms: BTreeSet<String>,
    /// True when the oracle failed and only literal terms are present
    pub degraded: bool,
}

impl KeywordSet {
    pub fn new(
        instruction: impl Into<String>,
        terms: impl IntoIterator<Item = String>,
        degraded: bool,
    ) -> Self {
        let expanded_terms = terms
            .into_iter()
            .map(|t| normalize_term(&t))
            .filter(|t| !t.is_empty())
            .collect();

        Self {
            original_instruction: instruction.into(),
            expanded_terms,
            degraded,
        }
    }

    /// A keyword set built only from the instruction's literal terms
    pub fn literal(instruction: &str) -> Self {
        Self::new(instruction, literal_terms(instruction), true)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.expanded_terms.contains(&normalize_term(term))
    }

    pub fn len(&self) -> usize {
        self.expanded_terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded_terms.is_empty()
    }

    /// Terms joined for prompts and logs
    pub fn joined(&self) -> String {
        self.expanded_terms
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Lowercases and collapses inner whitespace
fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Extracts the significant words of an instruction
///
/// Words are split on anything that is not alphanumeric, a hyphen or an
/// apostrophe, lowercased, and kept if they have at least two characters and
/// are not stop-words.
pub fn literal_terms(instruction: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut terms = Vec::new();

    for word in instruction.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '\'')) {
        let word = word.trim_matches(|c: char| c == '-' || c == '\'').to_lowercase();
        if word.chars().count() < 2 || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        if seen.insert(word.clone()) {
            terms.push(word);
        }
    }

    terms
}

/// Turns an instruction into a keyword set with one oracle call
pub struct KeywordExpander {
    oracle: Arc<dyn SemanticOracle>,
    retry: RetryPolicy,
    timeout: Duration,
    cancel: CancellationToken,
}

impl KeywordExpander {
    pub fn new(oracle: Arc<dyn SemanticOracle>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            oracle,
            retry,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops retrying once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Literal terms plus oracle suggestions; fails if the oracle fails
    pub async fn expand(&self, instruction: &str) -> Result<KeywordSet, OracleError> {
        let oracle = &self.oracle;
        let timeout = self.timeout;
        let cancel = &self.cancel;
        let suggested = with_retry(&self.retry, "keyword expansion", cancel, move || async move {
            match tokio::time::timeout(timeout, oracle.expand(instruction)).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::Timeout),
            }
        })
        .await?;

        let keywords = KeywordSet::new(
            instruction,
            literal_terms(instruction).into_iter().chain(suggested),
            false,
        );
        tracing::info!(
            "Generated {} keywords: {}",
            keywords.len(),
            keywords.joined()
        );
        Ok(keywords)
    }

    /// Like [`expand`](Self::expand), but degrades to literal terms on failure
    ///
    /// Only fails when the oracle failed and the instruction has no
    /// significant words of its own.
    pub async fn expand_or_fallback(&self, instruction: &str) -> Result<KeywordSet, OracleError> {
        match self.expand(instruction).await {
            Ok(keywords) => Ok(keywords),
            Err(e) => {
                let fallback = KeywordSet::literal(instruction);
                if fallback.is_empty() {
                    tracing::error!("Keyword expansion failed with no literal fallback: {}", e);
                    return Err(e);
                }
                tracing::warn!(
                    "Keyword expansion failed ({}); using {} literal terms",
                    e,
                    fallback.len()
                );
                Ok(fallback)
            }
        }
    }
}
