//! Driftwatch main entry point
//!
//! This is the command-line interface for the Driftwatch change tracker.

use anyhow::{bail, Context};
use clap::Parser;
use driftwatch::config::{load_config_with_hash, Config};
use driftwatch::fetch::Fetcher;
use driftwatch::notify;
use driftwatch::runner::{run_all, sync_sources, WorkerContext};
use driftwatch::storage::{RunRecord, SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Driftwatch: change tracking for listing pages
///
/// Driftwatch fetches the listing pages of configured sources, extracts the
/// items on each page and keeps a version history per item, recording a new
/// version whenever an item's content changes.
#[derive(Parser, Debug)]
#[command(name = "driftwatch")]
#[command(version)]
#[command(about = "Change tracking for listing pages", long_about = None)]
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

    /// Only run the named source
    #[arg(long, value_name = "NAME")]
    source: Option<String>,

    /// Keep running on the configured schedule until interrupted
    #[arg(long, conflicts_with_all = ["dry_run", "runs", "history"])]
    watch: bool,

    /// Validate config and show the configured sources without fetching
    #[arg(long, conflicts_with_all = ["runs", "history"])]
    dry_run: bool,

    /// Show the most recent runs and exit
    #[arg(long, conflicts_with = "history")]
    runs: bool,

    /// Show an item's version history and exit
    #[arg(long, value_name = "ITEM_ID")]
    history: Option<i64>,
}

/// Number of runs shown by --runs
const RECENT_RUNS: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.runs {
        handle_runs(&config)?;
    } else if let Some(item_id) = cli.history {
        handle_history(&config, item_id)?;
    } else if cli.watch {
        handle_watch(&config, cli.source.as_deref()).await?;
    } else {
        handle_run_once(&config, cli.source.as_deref()).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftwatch=info,warn"),
            1 => EnvFilter::new("driftwatch=debug,info"),
            2 => EnvFilter::new("driftwatch=trace,debug"),
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

fn worker_context(config: &Config) -> anyhow::Result<WorkerContext> {
    let fetcher = Fetcher::new(&config.fetcher).context("Failed to build HTTP client")?;
    let notifier = notify::from_config(config.notify.as_ref());
    Ok(WorkerContext::new(&config.output, fetcher, notifier))
}

/// Runs the selected sources once and prints a line per run
async fn run_cycle(
    context: &WorkerContext,
    config: &Config,
    only: Option<&str>,
) -> anyhow::Result<Vec<RunRecord>> {
    let sources = {
        let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        sync_sources(&mut storage, config, only)?
    };

    if sources.is_empty() {
        tracing::warn!("No active sources configured");
        return Ok(Vec::new());
    }

    let mut results = run_all(context, sources).await;
    results.sort_by_key(|(source, _)| source.id);

    for (source, run) in &results {
        print_run_line(&source.name, run);
    }

    Ok(results.into_iter().map(|(_, run)| run).collect())
}

/// Handles the default mode: one pass over the selected sources
async fn handle_run_once(config: &Config, only: Option<&str>) -> anyhow::Result<()> {
    let context = worker_context(config)?;
    let runs = run_cycle(&context, config, only).await?;

    let failed = runs.iter().filter(|run| run.error_message.is_some()).count();
    if failed > 0 {
        tracing::warn!("{} of {} runs failed", failed, runs.len());
    }
    Ok(())
}

/// Handles --watch: repeats the pass every schedule interval until Ctrl-C
async fn handle_watch(config: &Config, only: Option<&str>) -> anyhow::Result<()> {
    let context = worker_context(config)?;
    let period = Duration::from_secs(config.schedule.interval_minutes * 60);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(
        "Watching; running every {} minutes",
        config.schedule.interval_minutes
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        }

        // Abandoned runs stay `running` in the store
        tokio::select! {
            result = run_cycle(&context, config, only) => {
                if let Err(e) = result {
                    tracing::error!("Scheduled pass failed: {:#}", e);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Interrupted during a pass, stopping");
                break;
            }
        }
    }

    Ok(())
}

fn print_run_line(source_name: &str, run: &RunRecord) {
    match &run.error_message {
        Some(message) => println!(
            "[{}] run {} {}: {}",
            source_name, run.id, run.status, message
        ),
        None => println!(
            "[{}] run {} {}: {} created, {} changed",
            source_name, run.id, run.status, run.created_items, run.changed_items
        ),
    }
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Driftwatch Dry Run ===\n");

    println!("Fetcher Configuration:");
    println!("  Timeout: {}s", config.fetcher.timeout_secs);
    println!("  User agent: {}", config.fetcher.user_agent);
    println!(
        "  Min host interval: {}ms",
        config.fetcher.min_host_interval_ms
    );
    println!("  Max redirects: {}", config.fetcher.max_redirects);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Snapshots: {}", config.output.snapshots_dir);
    println!("  Exports: {}", config.output.exports_dir);

    println!("\nSchedule: every {} minutes", config.schedule.interval_minutes);

    match config.notify.as_ref().and_then(|n| n.webhook_url.as_deref()) {
        Some(url) => println!("Notifications: {}", url),
        None => println!("Notifications: disabled"),
    }

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        let selectors = source.selectors();
        let mode = if selectors.list.is_some() {
            "structured"
        } else {
            "heuristic"
        };
        println!(
            "  - {} [{}] {} ({}{})",
            source.name,
            source.category.to_db_string(),
            source.url,
            mode,
            if source.active { "" } else { ", inactive" }
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would run {} active sources",
        config.sources.iter().filter(|s| s.active).count()
    );
}

/// Handles --runs: prints the most recent runs
fn handle_runs(config: &Config) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let runs = storage.list_runs(RECENT_RUNS)?;

    if runs.is_empty() {
        println!("No runs recorded yet");
        return Ok(());
    }

    println!(
        "{:>6}  {:>6}  {:<8}  {:<25}  {:>7}  {:>7}  MESSAGE",
        "RUN", "SOURCE", "STATUS", "STARTED", "CREATED", "CHANGED"
    );
    for run in runs {
        println!(
            "{:>6}  {:>6}  {:<8}  {:<25}  {:>7}  {:>7}  {}",
            run.id,
            run.source_id,
            run.status.to_db_string(),
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.created_items,
            run.changed_items,
            run.error_message.unwrap_or_default()
        );
    }

    Ok(())
}

/// Handles --history: prints an item's versions, newest first
fn handle_history(config: &Config, item_id: i64) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let item = match storage.get_item(item_id) {
        Ok(item) => item,
        Err(driftwatch::storage::StorageError::ItemNotFound(_)) => {
            bail!("No item with ID {}", item_id)
        }
        Err(e) => return Err(e.into()),
    };

    println!("Item {}: {}", item.id, item.title.as_deref().unwrap_or("(untitled)"));
    println!("  URL: {}", item.url);
    println!("  First seen: {}", item.first_seen);
    println!("  Last seen: {}", item.last_seen);

    let versions = storage.list_versions(item.id)?;
    println!("\nVersions ({}):", versions.len());
    for version in versions.iter().rev() {
        let marker = if Some(version.id) == item.latest_version_id {
            " (latest)"
        } else {
            ""
        };
        println!(
            "  v{} at {}{}",
            version.id,
            version.seen_at.format("%Y-%m-%d %H:%M:%S"),
            marker
        );
        println!(
            "    hash: {}",
            version.content_hash.as_deref().unwrap_or("-")
        );
        if let Some(price) = version.price_value {
            println!("    price: {}", price);
        }
        if let Some(snapshot) = &version.snapshot_path {
            println!("    snapshot: {}", snapshot);
        }
    }

    Ok(())
}
