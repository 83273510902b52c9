//! JSON persistence of crawl snapshots

use crate::output::CrawlResult;
use crate::RufusError;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// `semantic_results_<YYYYmmdd_HHMMSS>.json`
pub fn results_file_name(finished_at: &DateTime<Utc>) -> String {
    format!(
        "semantic_results_{}.json",
        finished_at.format("%Y%m%d_%H%M%S")
    )
}

/// Writes the snapshot into `dir`, creating it if needed
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written file
/// * `Err(RufusError)` - Serialization or IO failure
pub fn save_results(result: &CrawlResult, dir: &Path) -> Result<PathBuf, RufusError> {
    fs::create_dir_all(dir)?;

    let path = dir.join(results_file_name(&result.session.finished_at));
    let json = serde_json::to_string_pretty(result)?;
    fs::write(&path, json)?;

    tracing::info!("Results saved to {}", path.display());
    Ok(path)
}

/// Reads a snapshot written by [`save_results`]
pub fn load_results(path: &Path) -> Result<CrawlResult, RufusError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
