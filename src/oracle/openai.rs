//! OpenAI-compatible chat completions oracle
//!
//! Prompts are plain text and answers are parsed leniently: a keyword list,
//! a single number, or a JSON array of numbers.

use crate::config::OracleConfig;
use crate::oracle::SemanticOracle;
use crate::relevance::{KeywordSet, LinkCandidate};
use crate::{ConfigError, OracleError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Surrounding text sent per link candidate is cut to this many characters
const LINK_CONTEXT_CHARS: usize = 200;

/// Oracle backed by an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiOracle {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
    api_key_env: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiOracle {
    /// Builds an oracle client
    ///
    /// `api_key` may be None; the session then fails at setup with
    /// `ConfigError::MissingCredential` instead of at the first request.
    pub fn new(
        config: &OracleConfig,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            api_key_env: config.api_key_env.clone(),
        })
    }

    /// Builds an oracle client reading the key from `config.api_key_env`
    pub fn from_config(config: &OracleConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::new(config, config.api_key_from_env(), timeout)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| OracleError::Auth(format!("{} is not set", self.api_key_env)))?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status.as_u16() {
                401 | 403 => OracleError::Auth(error_text),
                429 => OracleError::RateLimited(error_text),
                code => OracleError::Status {
                    status: code,
                    body: error_text,
                },
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed("No choices in response".to_string()))
    }
}

fn map_http_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Request(e.to_string())
    }
}

#[async_trait]
impl SemanticOracle for OpenAiOracle {
    async fn expand(&self, instruction: &str) -> Result<Vec<String>, OracleError> {
        let prompt = format!(
            "List keywords and short phrases semantically related to this instruction.\n\n\
             Instruction: \"{}\"\n\n\
             Include synonyms, domain terminology, common abbreviations and closely related topics.\n\
             Return ONLY a comma-separated list.",
            instruction
        );

        let content = self
            .complete(
                "You are a semantic analysis expert. Return only a comma-separated list of keywords.",
                &prompt,
            )
            .await?;

        let terms = parse_term_list(&content);
        if terms.is_empty() {
            return Err(OracleError::Malformed(
                "keyword list was empty".to_string(),
            ));
        }
        Ok(terms)
    }

    async fn score(&self, text: &str, keywords: &KeywordSet) -> Result<f64, OracleError> {
        let prompt = format!(
            "Rate how relevant this content is to the instruction and keywords.\n\n\
             Instruction: \"{}\"\n\
             Keywords: {}\n\n\
             Content:\n\"\"\"\n{}\n\"\"\"\n\n\
             Answer ONLY with a number between 0 and 1.",
            keywords.original_instruction,
            keywords.joined(),
            text
        );

        let content = self
            .complete(
                "You are a content relevance analyst. Respond only with a number between 0 and 1.",
                &prompt,
            )
            .await?;

        parse_score(&content)
    }

    async fn score_links(
        &self,
        candidates: &[LinkCandidate],
        keywords: &KeywordSet,
    ) -> Result<Vec<f64>, OracleError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut listing = String::new();
        for (i, candidate) in candidates.iter().enumerate() {
            let context: String = candidate
                .surrounding_text
                .chars()
                .take(LINK_CONTEXT_CHARS)
                .collect();
            listing.push_str(&format!(
                "{}. URL: {} | Link text: \"{}\" | Context: \"{}\"\n",
                i + 1,
                candidate.href,
                candidate.anchor_text,
                context
            ));
        }

        let prompt = format!(
            "For each link below, rate how likely following it leads to content relevant to the instruction.\n\n\
             Instruction: \"{}\"\n\
             Keywords: {}\n\n\
             Links:\n{}\n\
             Answer ONLY with a JSON array of {} numbers between 0 and 1, in the same order.",
            keywords.original_instruction,
            keywords.joined(),
            listing,
            candidates.len()
        );

        let content = self
            .complete(
                "You are a link relevance analyst. Respond only with a JSON array of numbers.",
                &prompt,
            )
            .await?;

        parse_score_list(&content)
    }

    fn ensure_configured(&self) -> Result<(), ConfigError> {
        match &self.api_key {
            Some(_) => Ok(()),
            None => Err(ConfigError::MissingCredential(self.api_key_env.clone())),
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Splits a comma or newline separated keyword answer into terms
pub fn parse_term_list(content: &str) -> Vec<String> {
    content
        .split([',', '\n'])
        .map(|t| {
            strip_list_marker(t.trim())
                .trim_matches(|c: char| c == '"' || c == '\'')
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Removes a leading bullet ("- ", "* ") or ordinal ("3. ", "3) ")
fn strip_list_marker(term: &str) -> &str {
    if let Some(rest) = term.strip_prefix(['-', '*']) {
        return rest.trim_start();
    }

    let digits = term.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &term[digits..];
        if let Some(after) = rest.strip_prefix(['.', ')']) {
            return after.trim_start();
        }
    }

    term
}

/// Extracts the first number from a scoring answer
///
/// `TRUE` / `FALSE` answers are accepted as 1.0 / 0.0. Negative numbers and
/// answers on another scale (`7/10`, `70%`) are malformed.
pub fn parse_score(content: &str) -> Result<f64, OracleError> {
    let trimmed = content.trim();
    let malformed = || OracleError::Malformed(format!("expected a score, got '{}'", trimmed));

    match trimmed.to_ascii_uppercase().as_str() {
        "TRUE" => return Ok(1.0),
        "FALSE" => return Ok(0.0),
        _ => {}
    }

    let Some(mut start) = trimmed.find(|c: char| c.is_ascii_digit()) else {
        return Err(malformed());
    };
    if trimmed[..start].ends_with('.') {
        start -= 1;
    }
    if trimmed[..start].ends_with('-') {
        return Err(malformed());
    }

    let number: String = trimmed[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let rest = trimmed[start + number.len()..].trim_start();
    if rest.starts_with('/') || rest.starts_with('%') {
        return Err(malformed());
    }

    let value: f64 = number.trim_end_matches('.').parse().map_err(|_| malformed())?;

    if !value.is_finite() {
        return Err(OracleError::Malformed(format!(
            "score is not finite: {}",
            value
        )));
    }

    Ok(value)
}

/// Parses a JSON array of scores, tolerating prose around the array
pub fn parse_score_list(content: &str) -> Result<Vec<f64>, OracleError> {
    let start = content.find('[');
    let end = content.rfind(']');

    let slice = match (start, end) {
        (Some(s), Some(e)) if s < e => &content[s..=e],
        _ => {
            return Err(OracleError::Malformed(format!(
                "expected a JSON array, got '{}'",
                content.trim()
            )))
        }
    };

    let values: Vec<serde_json::Value> = serde_json::from_str(slice)
        .map_err(|e| OracleError::Malformed(format!("invalid score array: {}", e)))?;

    Ok(values
        .iter()
        .map(|v| match v {
            serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            serde_json::Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => f64::NAN,
        })
        .collect())
}
