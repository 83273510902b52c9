//! Rufus main entry point
//!
//! This is the command-line interface for the Rufus semantic crawler.

use anyhow::Context;
use clap::Parser;
use rufus::config::{load_config_with_hash, validate, validate_max_depth, Config};
use rufus::crawler::{run_crawl, CrawlRequest};
use rufus::output::{print_summary, save_results};
use rufus::url::parse_start_url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Rufus: an instruction-guided semantic crawler
///
/// Rufus starts at a URL, keeps the pages that match a natural-language
/// instruction, and follows only the links that look promising. Results are
/// written as JSON.
#[derive(Parser, Debug)]
#[command(name = "rufus")]
#[command(version)]
#[command(about = "An instruction-guided semantic crawler", long_about = None)]
struct Cli {
    /// Where to start crawling (https:// is assumed when no scheme is given)
    #[arg(value_name = "START_URL")]
    start_url: String,

    /// What to look for, in plain language
    #[arg(value_name = "INSTRUCTION")]
    instruction: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Maximum link depth from the start URL
    #[arg(long)]
    max_depth: Option<u32>,

    /// Stop after dispatching this many pages
    #[arg(long)]
    max_pages: Option<usize>,

    /// Stop crawling after this many seconds
    #[arg(long, value_name = "SECS")]
    time_budget: Option<u64>,

    /// Number of concurrent workers
    #[arg(long)]
    workers: Option<usize>,

    /// Directory for the results file
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(&cli)?;

    if cli.dry_run {
        return handle_dry_run(&cli, &config);
    }

    handle_crawl(&cli, config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rufus=info,warn"),
            1 => EnvFilter::new("rufus=debug,info"),
            2 => EnvFilter::new("rufus=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, if any, and applies command-line overrides
fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(depth) = cli.max_depth {
        validate_max_depth(depth)?;
        config.crawler.max_depth = depth;
    }
    if let Some(pages) = cli.max_pages {
        config.crawler.max_pages = Some(pages);
    }
    if let Some(secs) = cli.time_budget {
        config.crawler.time_budget_secs = Some(secs);
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    if let Some(dir) = &cli.output {
        config.output.results_dir = dir.display().to_string();
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: validates input and shows what would be crawled
fn handle_dry_run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let start_url = parse_start_url(&cli.start_url)
        .with_context(|| format!("Invalid start URL: {}", cli.start_url))?;

    println!("=== Rufus Dry Run ===\n");

    println!("Session:");
    println!("  Start URL: {}", start_url);
    println!("  Instruction: {}", cli.instruction);

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Workers: {}", config.crawler.workers);
    match config.crawler.max_pages {
        Some(pages) => println!("  Max pages: {}", pages),
        None => println!("  Max pages: unlimited"),
    }
    match config.crawler.time_budget_secs {
        Some(secs) => println!("  Time budget: {}s", secs),
        None => println!("  Time budget: unlimited"),
    }
    println!("  Same host only: {}", config.crawler.same_host_only);

    println!("\nRelevance:");
    println!("  Page threshold: {}", config.relevance.threshold);
    println!(
        "  Link threshold: {} (strict {})",
        config.relevance.link_threshold, config.relevance.strict_link_threshold
    );

    println!("\nOracle:");
    println!("  Endpoint: {}", config.oracle.base_url);
    println!("  Model: {}", config.oracle.model);
    let credential = if config.oracle.api_key_from_env().is_some() {
        "set"
    } else {
        "MISSING"
    };
    println!("  {}: {}", config.oracle.api_key_env, credential);

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("Output: {}", config.output.results_dir);

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(cli: &Cli, config: Config) -> anyhow::Result<()> {
    let results_dir = PathBuf::from(&config.output.results_dir);

    let mut request = CrawlRequest::new(cli.instruction.clone(), cli.start_url.clone())
        .max_depth(config.crawler.max_depth);
    if let Some(pages) = config.crawler.max_pages {
        request = request.max_pages(pages);
    }
    if let Some(secs) = config.crawler.time_budget_secs {
        request = request.time_budget(Duration::from_secs(secs));
    }

    // Ctrl-C stops dispatching; the partial result is still written
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            on_signal.cancel();
        }
    });

    let result = match run_crawl(config, request, cancel).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    let path = save(&result, &results_dir)?;
    print_summary(&result);
    println!("Results written to {}", path.display());
    Ok(())
}

fn save(result: &rufus::CrawlResult, dir: &Path) -> anyhow::Result<PathBuf> {
    save_results(result, dir)
        .with_context(|| format!("Failed to write results to {}", dir.display()))
}
