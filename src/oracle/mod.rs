//! Semantic oracle abstraction
//!
//! Every non-deterministic judgment the crawler makes goes through
//! [`SemanticOracle`]: keyword expansion, page scoring and batched link
//! scoring. Tests swap in a deterministic implementation; production uses
//! [`OpenAiOracle`], which talks to any OpenAI-compatible chat completions API.

mod openai;

pub use openai::{parse_score, parse_score_list, parse_term_list, OpenAiOracle};

use crate::relevance::{KeywordSet, LinkCandidate};
use crate::{ConfigError, OracleError};
use async_trait::async_trait;

/// Capability contract of the semantic oracle
#[async_trait]
pub trait SemanticOracle: Send + Sync {
    /// Suggest terms related to the instruction
    async fn expand(&self, instruction: &str) -> Result<Vec<String>, OracleError>;

    /// Score how well `text` matches the keyword set, in [0, 1]
    async fn score(&self, text: &str, keywords: &KeywordSet) -> Result<f64, OracleError>;

    /// Score every candidate link; the result has one entry per candidate, in order
    async fn score_links(
        &self,
        candidates: &[LinkCandidate],
        keywords: &KeywordSet,
    ) -> Result<Vec<f64>, OracleError>;

    /// Checked at session setup, before any network activity
    fn ensure_configured(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Name used in logs
    fn name(&self) -> &str {
        "oracle"
    }
}
