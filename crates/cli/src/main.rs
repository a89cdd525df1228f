//! docrecon command-line tool.
//!
//! Scans the given repositories for documentation files, deduplicates them,
//! detects and resolves conflicts, persists the results, and prints a report.
//! With `--daemon` the same run repeats on a fixed interval until SIGINT or
//! SIGTERM.

mod scheduler;
mod signals;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docrecon_core::config::AppConfig;
use docrecon_core::pipeline::{Pipeline, PipelineState};
use docrecon_core::store::Database;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Documentation reconciliation across repositories.
#[derive(Parser, Debug)]
#[command(
    name = "docrecon",
    version,
    about = "Deduplicate and reconcile documentation files across repositories"
)]
struct Args {
    /// Path to an optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Repository to scan. Repeat for several; replaces the configured list.
    #[arg(short, long = "repo", value_name = "PATH")]
    repos: Vec<PathBuf>,

    /// Rerun the pipeline on an interval until interrupted.
    #[arg(long)]
    daemon: bool,

    /// Seconds between daemon runs.
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Minimum rule confidence for automatic resolution (0.0 to 1.0).
    #[arg(long)]
    threshold: Option<f64>,

    /// SQLite database file for persisted results.
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let filter =
        EnvFilter::try_new(&config.daemon.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let result = if args.daemon {
        run_daemon(config).await
    } else {
        run_once(config).await
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load the config file if one was given, apply flag overrides, validate.
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match args.config {
        Some(ref path) => {
            AppConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => AppConfig::default(),
    };

    if !args.repos.is_empty() {
        config.pipeline.repositories = args.repos.clone();
    }
    if let Some(secs) = args.interval {
        config.daemon.interval_secs = secs;
    }
    if let Some(threshold) = args.threshold {
        config.pipeline.auto_resolve_threshold = threshold;
    }
    if let Some(ref db) = args.db {
        config.store.database_path = Some(db.clone());
    }
    if let Some(ref level) = args.log_level {
        config.daemon.log_level = level.clone();
    }

    config
        .validate()
        .context("configuration validation failed")?;
    Ok(config)
}

/// Build the pipeline. A store that cannot be opened is reported through the
/// returned error strings and the run proceeds without persistence.
fn build_pipeline(config: &AppConfig) -> (Pipeline, Vec<String>) {
    let pipeline = Pipeline::from_config(config);
    let Some(ref path) = config.store.database_path else {
        return (pipeline, Vec::new());
    };

    match Database::new(path) {
        Ok(db) => {
            info!(path = %path.display(), "document store ready");
            (pipeline.with_store(Arc::new(db)), Vec::new())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "document store unavailable");
            (pipeline, vec![format!("store {}: {e}", path.display())])
        }
    }
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// One full run. `Ok(false)` when any stage recorded an error.
async fn run_once(config: AppConfig) -> Result<bool> {
    let (pipeline, startup_errors) = build_pipeline(&config);

    let mut state = PipelineState::new();
    state.errors = startup_errors;
    let state = pipeline.run_from(state).await;

    if let Some(ref report) = state.report {
        println!("{report}");
    }

    Ok(state.succeeded())
}

async fn run_daemon(config: AppConfig) -> Result<bool> {
    info!("========================================");
    info!("  docrecon daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Repositories  : {}", config.pipeline.repositories.len());
    info!("Interval      : {}s", config.daemon.interval_secs);
    info!("Threshold     : {}", config.pipeline.auto_resolve_threshold);
    match config.store.database_path {
        Some(ref path) => info!("Database      : {}", path.display()),
        None => info!("Database      : (none)"),
    }
    info!("========================================");

    let (pipeline, startup_errors) = build_pipeline(&config);
    for e in &startup_errors {
        warn!("{e}");
    }

    let sched = Arc::new(scheduler::Scheduler::new(
        Arc::new(pipeline),
        Duration::from_secs(config.daemon.interval_secs),
    ));

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let scheduler_shutdown = shutdown.clone();
    let scheduler_task = sched.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler_task.run(scheduler_shutdown).await;
    });

    signals::wait_for_shutdown().await;
    info!("Shutdown signal received, stopping...");

    // notify_one stores a permit, so a scheduler busy in a run still sees it.
    shutdown.notify_one();

    match tokio::time::timeout(Duration::from_secs(30), scheduler_handle).await {
        Ok(Ok(())) => info!("scheduler stopped gracefully"),
        Ok(Err(e)) => warn!("scheduler task error: {}", e),
        Err(_) => warn!("scheduler did not stop within 30s, forcing shutdown"),
    }

    let stats = sched.stats();
    info!(
        cycles = stats.total_cycles.load(std::sync::atomic::Ordering::SeqCst),
        failed_cycles = stats.total_errors.load(std::sync::atomic::Ordering::SeqCst),
        "docrecon daemon stopped"
    );
    Ok(true)
}
