//! Relevance pipeline for Rufus
//!
//! Three steps, each backed by the semantic oracle:
//! - [`KeywordExpander`] turns the instruction into a [`KeywordSet`] once per session
//! - [`RelevanceScorer`] decides whether a fetched page matches it
//! - [`LinkSelector`] decides which outbound links are worth following

mod keywords;
mod links;
mod scorer;

pub use keywords::{literal_terms, KeywordExpander, KeywordSet};
pub use links::LinkSelector;
pub use scorer::{truncate_chars, RelevanceScorer, ScoreOutcome};

use serde::Serialize;

/// An outbound link being considered for the frontier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkCandidate {
    /// Resolved, normalized absolute URL
    pub href: String,
    pub anchor_text: String,
    pub surrounding_text: String,
    pub selection_score: f64,
    pub selected: bool,
}

impl LinkCandidate {
    pub fn new(
        href: impl Into<String>,
        anchor_text: impl Into<String>,
        surrounding_text: impl Into<String>,
    ) -> Self {
        Self {
            href: href.into(),
            anchor_text: anchor_text.into(),
            surrounding_text: surrounding_text.into(),
            selection_score: 0.0,
            selected: false,
        }
    }
}
