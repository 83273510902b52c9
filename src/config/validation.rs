use crate::config::types::{Config, CrawlerConfig, OracleConfig, RelevanceConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Deepest crawl the configuration accepts
pub const MAX_DEPTH_LIMIT: u32 = 16;

/// Largest worker pool the configuration accepts
pub const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_relevance_config(&config.relevance)?;
    validate_oracle_config(&config.oracle)?;
    validate_user_agent_config(&config.user_agent)?;

    if config.output.results_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "results_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a crawl depth requested in config or on the command line
pub fn validate_max_depth(max_depth: u32) -> Result<(), ConfigError> {
    if max_depth > MAX_DEPTH_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_depth must be <= {}, got {}",
            MAX_DEPTH_LIMIT, max_depth
        )));
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_max_depth(config.max_depth)?;

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    if config.time_budget_secs == Some(0) {
        return Err(ConfigError::Validation(
            "time_budget_secs must be >= 1 when set".to_string(),
        ));
    }

    if config.fetch_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.score_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "score_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates relevance thresholds
fn validate_relevance_config(config: &RelevanceConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("threshold", config.threshold),
        ("link_threshold", config.link_threshold),
        ("strict_link_threshold", config.strict_link_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 0.0 and 1.0, got {}",
                name, value
            )));
        }
    }

    if config.max_links_per_page == Some(0) {
        return Err(ConfigError::Validation(
            "max_links_per_page must be >= 1 when set".to_string(),
        ));
    }

    if config.max_content_chars < 100 {
        return Err(ConfigError::Validation(format!(
            "max_content_chars must be >= 100, got {}",
            config.max_content_chars
        )));
    }

    Ok(())
}

/// Validates oracle endpoint configuration
fn validate_oracle_config(config: &OracleConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::Validation(format!("Invalid oracle base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "oracle base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "oracle model cannot be empty".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "oracle temperature must be between 0.0 and 2.0, got {}",
            config.temperature
        )));
    }

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api_key_env cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::Validation(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}
