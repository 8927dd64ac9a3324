//! hibid-ingest main entry point
//!
//! This is the command-line interface for the HiBid listing ingestion engine.

use anyhow::{bail, Context};
use clap::Parser;
use hibid_ingest::config::{load_config, validate, Config};
use hibid_ingest::output::{format_item, format_run_history, print_summary};
use hibid_ingest::{open_storage, RunStatus, Storage};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit status for a run stopped by an interrupt
const EXIT_INTERRUPTED: u8 = 130;

/// hibid-ingest: a polite auction-listing scraper
///
/// Pages through open HiBid lots near a zip code, stores every raw lot
/// payload, and records an audit row for each scrape run.
#[derive(Parser, Debug)]
#[command(name = "hibid-ingest")]
#[command(version = "1.0.0")]
#[command(about = "A polite auction-listing scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (optional when --zip is given)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the search zip code
    #[arg(long)]
    zip: Option<String>,

    /// Override the search radius in miles
    #[arg(long, value_parser = ["10", "25", "50", "100", "250", "500"])]
    radius: Option<String>,

    /// Enable test mode (stop after --limit items)
    #[arg(long)]
    test: bool,

    /// Item limit for test mode
    #[arg(long)]
    limit: Option<usize>,

    /// Comma-separated list of category slugs to scrape
    #[arg(long, value_delimiter = ',')]
    categories: Option<Vec<String>>,

    /// Override the database URL
    #[arg(long)]
    db: Option<String>,

    /// Validate config and show the resolved search without scraping
    #[arg(long, conflicts_with_all = ["runs", "item"])]
    dry_run: bool,

    /// Show the most recent scrape runs and exit
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    runs: Option<usize>,

    /// Show one stored item and exit
    #[arg(long, value_name = "ITEM_ID", conflicts_with = "runs")]
    item: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.dry_run {
        handle_dry_run(&config).map(|()| ExitCode::SUCCESS)
    } else if let Some(limit) = cli.runs {
        handle_runs(&config, limit).await.map(|()| ExitCode::SUCCESS)
    } else if let Some(item_id) = &cli.item {
        handle_item(&config, item_id).await.map(|()| ExitCode::SUCCESS)
    } else {
        handle_scrape(&config).await
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("hibid_ingest=info,warn"),
            1 => EnvFilter::new("hibid_ingest=debug,info"),
            2 => EnvFilter::new("hibid_ingest=trace,debug"),
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

/// Loads the config file (if any) and applies command-line overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match (&cli.config, &cli.zip) {
        (Some(path), _) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Cannot load {}", path.display()))?
        }
        (None, Some(zip)) => Config::for_zip(zip.as_str()),
        (None, None) => bail!("Provide a configuration file or --zip"),
    };

    if let Some(zip) = &cli.zip {
        config.search.zip_code = zip.clone();
    }
    if let Some(radius) = &cli.radius {
        config.search.radius_miles = radius.parse().context("Invalid --radius")?;
    }
    if cli.test {
        config.search.test_mode = true;
    }
    if let Some(limit) = cli.limit {
        config.search.test_limit = limit;
    }
    if let Some(categories) = &cli.categories {
        config.search.categories = categories
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }
    if let Some(db) = &cli.db {
        config.storage.database_url = db.clone();
    }

    validate(&config)?;
    Ok(config)
}

/// Handles the --dry-run mode: shows the resolved search
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let search = &config.search;

    println!("=== hibid-ingest Dry Run ===\n");

    println!("Search:");
    println!("  Zip code: {}", search.zip_code);
    println!("  Radius: {} miles", search.radius_miles);
    if search.categories.is_empty() {
        println!("  Categories: all open lots");
    } else {
        println!("  Categories: {}", search.categories.join(", "));
    }
    if let Some(term) = &search.search_term {
        println!("  Search term: {}", term);
    }
    match search.item_cap() {
        Some(cap) => println!("  Test mode: stop after {} items", cap),
        None => println!("  Test mode: off"),
    }

    println!("\nSource:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  Page size: {}", config.source.page_size);
    println!(
        "  Delay between requests: {}-{}ms",
        config.rate_limit.min_delay_ms, config.rate_limit.max_delay_ms
    );
    println!(
        "  Retries: {} attempts, {}ms base backoff",
        config.retry.max_attempts, config.retry.backoff_base_ms
    );

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_url);

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --runs mode: shows recent run history
async fn handle_runs(config: &Config, limit: usize) -> anyhow::Result<()> {
    let storage = open_storage(&config.storage.database_url).await?;

    let runs = storage.recent_runs(limit).await?;
    let total_items = storage.count_items().await?;
    print!("{}", format_run_history(&runs, total_items));

    storage.close().await;
    Ok(())
}

/// Handles the --item mode: prints one stored item
async fn handle_item(config: &Config, item_id: &str) -> anyhow::Result<()> {
    let storage = open_storage(&config.storage.database_url).await?;

    let found = storage.get_item(item_id).await?;
    storage.close().await;

    match found {
        Some(item) => {
            print!("{}", format_item(&item)?);
            Ok(())
        }
        None => bail!("Item not found: {}", item_id),
    }
}

/// Handles the main scrape operation
async fn handle_scrape(config: &Config) -> anyhow::Result<ExitCode> {
    tracing::info!(
        "Scraping zip {} within {} miles (test mode: {})",
        config.search.zip_code,
        config.search.radius_miles,
        config.search.test_mode
    );

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone())?;

    let summary = hibid_ingest::run(config, &cancel).await?;
    print_summary(&summary);

    Ok(match summary.status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Interrupted => ExitCode::from(EXIT_INTERRUPTED),
        RunStatus::Running | RunStatus::Failed => ExitCode::FAILURE,
    })
}

/// Cancels `token` on ctrl-c, or on SIGTERM where the platform has it
fn spawn_shutdown_listener(token: CancellationToken) -> anyhow::Result<()> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Cannot install SIGTERM handler")?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let received = tokio::select! {
            result = tokio::signal::ctrl_c() => result.is_ok(),
            signal = terminate.recv() => signal.is_some(),
        };
        #[cfg(not(unix))]
        let received = tokio::signal::ctrl_c().await.is_ok();

        if received {
            tracing::warn!("Interrupt received, stopping after the current page");
            token.cancel();
        }
    });
    Ok(())
}
