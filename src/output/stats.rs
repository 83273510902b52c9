//! Statistics derived from a crawl snapshot
//!
//! This module provides functionality for computing and displaying
//! crawl statistics from the accumulated page records and log.

use crate::output::{CrawlResult, LogEntry, Outcome, PageRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relevant pages found at one depth
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthBucket {
    pub urls: Vec<String>,
    pub count: usize,
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlStatistics {
    /// Pages fetched and recorded
    pub total_pages: usize,

    /// Pages that passed relevance
    pub relevant_pages: usize,

    /// Relevant pages by depth
    pub depth_breakdown: BTreeMap<u32, DepthBucket>,

    /// Log entries caused by fetch, parse or scoring errors
    pub failures: usize,

    /// Frontier entries left when the session stopped early
    pub abandoned: usize,
}

impl CrawlStatistics {
    pub fn compute(pages: &[PageRecord], log: &[LogEntry]) -> Self {
        let mut depth_breakdown: BTreeMap<u32, DepthBucket> = BTreeMap::new();
        for page in pages.iter().filter(|p| p.passed) {
            let bucket = depth_breakdown.entry(page.depth).or_default();
            bucket.urls.push(page.url.clone());
            bucket.count += 1;
        }

        Self {
            total_pages: pages.len(),
            relevant_pages: pages.iter().filter(|p| p.passed).count(),
            depth_breakdown,
            failures: log.iter().filter(|e| e.outcome.is_failure()).count(),
            abandoned: log
                .iter()
                .filter(|e| e.outcome == Outcome::Abandoned)
                .count(),
        }
    }
}

/// Prints a crawl summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `result` - The snapshot to display
pub fn print_summary(result: &CrawlResult) {
    let stats = &result.stats;
    let session = &result.session;

    println!("=== Crawl Summary ===\n");

    println!("Session:");
    println!("  Instruction: {}", session.instruction);
    println!("  Start URL: {}", session.start_url);
    println!("  Max depth: {}", session.max_depth);
    println!(
        "  Keywords: {}{}",
        session.expanded_terms.join(", "),
        if session.keywords_degraded {
            " (literal fallback)"
        } else {
            ""
        }
    );
    println!("  Stopped: {}", session.termination);
    let duration = session.finished_at - session.created_at;
    println!("  Duration: {}s", duration.num_seconds());
    println!();

    println!("Pages:");
    println!("  Processed: {}", stats.total_pages);
    let percentage = if stats.total_pages > 0 {
        (stats.relevant_pages as f64 / stats.total_pages as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "  Relevant: {} ({:.1}%)",
        stats.relevant_pages, percentage
    );
    println!("  Failures: {}", stats.failures);
    if stats.abandoned > 0 {
        println!("  Abandoned: {}", stats.abandoned);
    }
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Relevant Pages by Depth:");
        for (depth, bucket) in &stats.depth_breakdown {
            println!("  Depth {} ({}):", depth, bucket.count);
            for url in &bucket.urls {
                println!("    - {}", url);
            }
        }
        println!();
    }
}
