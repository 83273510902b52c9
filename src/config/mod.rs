//! Configuration module for Rufus
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so running without a file is equivalent to an empty one.
//!
//! # Example
//!
//! ```no_run
//! use rufus::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("rufus.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, OracleConfig, OutputConfig, RelevanceConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_max_depth, MAX_DEPTH_LIMIT, MAX_WORKERS};
