//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`PageFetcher`] seam
//! - HTML parsing and link extraction
//! - The breadth-first frontier shared by workers
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod worker;

pub use coordinator::{Coordinator, CrawlRequest};
pub use fetcher::{build_http_client, FetchedPage, HttpFetcher, PageFetcher};
pub use frontier::{Frontier, FrontierEntry, SharedFrontier};
pub use parser::{parse_html, ParsedPage, RawLink};
pub use worker::PageReport;

use crate::config::Config;
use crate::oracle::OpenAiOracle;
use crate::output::CrawlResult;
use crate::RufusError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl with the production adapters
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP fetcher and the OpenAI-compatible oracle from `config`
/// 2. Validate the request and expand the instruction into keywords
/// 3. Crawl breadth-first until the frontier or a budget is exhausted
/// 4. Return the final snapshot
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `request` - Instruction, start URL and limits
/// * `cancel` - Cancelling it stops dispatch and returns a partial result
///
/// # Example
///
/// ```no_run
/// use rufus::config::Config;
/// use rufus::crawler::{run_crawl, CrawlRequest};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let request = CrawlRequest::new("find pricing information", "example.com");
/// let result = run_crawl(Config::default(), request, CancellationToken::new()).await?;
/// println!("{} relevant pages", result.stats.relevant_pages);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    request: CrawlRequest,
    cancel: CancellationToken,
) -> Result<CrawlResult, RufusError> {
    let fetcher = HttpFetcher::from_config(&config.user_agent)?;
    let oracle = OpenAiOracle::from_config(&config.oracle, config.crawler.score_timeout())?;

    Coordinator::new(config, Arc::new(fetcher), Arc::new(oracle))
        .with_cancellation(cancel)
        .run(request)
        .await
}
