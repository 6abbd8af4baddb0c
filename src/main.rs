//! Listing-Harvest main entry point
//!
//! This is the command-line interface for the Listing-Harvest property crawler.

use anyhow::Context;
use clap::Parser;
use listing_harvest::config::{load_config_with_hash, Config};
use listing_harvest::crawler::{expand_seeds, run_crawl};
use listing_harvest::output::print_summary;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Listing-Harvest: a resilient real-estate listing harvester
///
/// Listing-Harvest turns seed addresses and listing URLs into structured
/// property records, pacing its requests and backing off from block pages.
#[derive(Parser, Debug)]
#[command(name = "listing-harvest")]
#[command(version)]
#[command(about = "A resilient real-estate listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the seed requests without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Write records here instead of the configured output path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else {
        handle_crawl(&config, cli.output).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvest=info,warn"),
            1 => EnvFilter::new("listing_harvest=debug,info"),
            2 => EnvFilter::new("listing_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the seed requests
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let profile = config.site.resolve_profile()?;
    profile
        .compile()
        .with_context(|| format!("site profile '{}' does not compile", profile.name))?;
    let plan = expand_seeds(config, &profile)?;

    println!("=== Listing-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Site profile: {}", profile.name);
    println!("  Max requests: {}", config.crawler.max_requests_per_crawl);
    println!("  Max retries: {}", config.crawler.max_request_retries);
    println!("  Request timeout: {}s", config.crawler.request_timeout_seconds);
    println!(
        "  Pacing: {}-{}ms (backoff cap {}ms)",
        config.pacing.min_ms, config.pacing.max_ms, config.pacing.max_backoff_ms
    );

    println!("\nOutput:");
    println!("  {:?}: {}", config.output.format, config.output.path);

    println!("\nSeed Requests ({}):", plan.requests.len());
    for request in &plan.requests {
        match request.original_address() {
            Some(address) => println!("  - {} {} ({})", request.label(), request.url(), address),
            None => println!("  - {} {}", request.label(), request.url()),
        }
    }

    if let Some(warning) = &plan.budget_warning {
        println!("\n! {}", warning);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    tracing::info!(
        "Addresses: {}, start URLs: {}",
        config.addresses.len(),
        config.start_urls.len()
    );

    let summary = run_crawl(config, output.as_deref())
        .await
        .context("crawl failed")?;

    print_summary(&summary);
    Ok(())
}
