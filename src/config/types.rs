use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Rufus
///
/// Every section is optional; a missing file or section yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub relevance: RelevanceConfig,
    pub oracle: OracleConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link-hops from the seed URL
    pub max_depth: u32,

    /// Number of concurrent page workers
    pub workers: usize,

    /// Maximum number of pages dispatched per session
    pub max_pages: Option<usize>,

    /// Wall-clock budget for the crawling phase (seconds)
    pub time_budget_secs: Option<u64>,

    /// Timeout for a single page fetch (milliseconds)
    pub fetch_timeout_ms: u64,

    /// Timeout for a single oracle scoring call (milliseconds)
    pub score_timeout_ms: u64,

    /// Retries for transient fetch and oracle failures
    pub max_retries: u32,

    /// Base delay of the exponential backoff (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Only follow links on the seed's host
    pub same_host_only: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            workers: 4,
            max_pages: None,
            time_budget_secs: None,
            fetch_timeout_ms: 30_000,
            score_timeout_ms: 60_000,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            same_host_only: true,
        }
    }
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn score_timeout(&self) -> Duration {
        Duration::from_millis(self.score_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }
}

/// Relevance thresholds and oracle input limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RelevanceConfig {
    /// Minimum page score for `passed`
    pub threshold: f64,

    /// Minimum link score when the linking page passed
    pub link_threshold: f64,

    /// Minimum link score when the linking page failed
    pub strict_link_threshold: f64,

    /// Optional cap on followed links per page
    pub max_links_per_page: Option<usize>,

    /// Page text is truncated to this many characters before scoring
    pub max_content_chars: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            link_threshold: 0.5,
            strict_link_threshold: 0.7,
            max_links_per_page: None,
            max_content_chars: 2_000,
        }
    }
}

/// Semantic oracle endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OracleConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// Chat model used for expansion and scoring
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Environment variable that holds the API key
    pub api_key_env: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl OracleConfig {
    /// Reads the API key from the configured environment variable
    ///
    /// Returns None if the variable is unset or blank.
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Rufus".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL)
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory that receives `semantic_results_<timestamp>.json`
    pub results_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: ".".to_string(),
        }
    }
}
