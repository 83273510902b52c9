//! Rufus: an instruction-guided semantic crawler
//!
//! This crate explores a website from a seed URL, asks a semantic oracle which
//! pages match a natural-language instruction, and follows only the links the
//! oracle considers promising. Traversal is breadth-first, depth-bounded and
//! deduplicated by normalized URL.

pub mod config;
pub mod crawler;
pub mod oracle;
pub mod output;
pub mod relevance;
pub mod retry;
pub mod session;
pub mod url;

use thiserror::Error;

/// Main error type for Rufus operations
#[derive(Debug, Error)]
pub enum RufusError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid start URL: {0}")]
    InvalidUrl(String),

    #[error("Missing oracle credential: environment variable {0} is not set")]
    MissingCredential(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Malformed page content
#[derive(Debug, Clone, Error)]
#[error("HTML parse error for {url}: {message}")]
pub struct ParseError {
    pub url: String,
    pub message: String,
}

/// Page-local fetch failures
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Expected HTML from {url}, got {content_type}")]
    ContentMismatch { url: String, content_type: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FetchError {
    /// Returns true if retrying the request may succeed
    ///
    /// Timeouts, connection failures, HTTP 429 and 5xx responses are
    /// transient. Client errors, content mismatches and parse failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::ContentMismatch { .. } | Self::Parse(_) => false,
        }
    }
}

/// Semantic oracle failures
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Oracle request failed: {0}")]
    Request(String),

    #[error("Oracle request timed out")]
    Timeout,

    #[error("Oracle rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Oracle authentication failed: {0}")]
    Auth(String),

    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Returns true if the call is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout | Self::RateLimited(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Auth(_) | Self::Malformed(_) => false,
        }
    }
}

/// Operations attempted in the wrong session state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: session::SessionStatus,
        to: session::SessionStatus,
    },

    #[error("Result accumulator is already finalized")]
    Finalized,
}

/// Result type alias for Rufus operations
pub type Result<T> = std::result::Result<T, RufusError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Coordinator, CrawlRequest};
pub use output::{CrawlResult, PageRecord};
pub use session::SessionStatus;
pub use crate::url::normalize_url;
