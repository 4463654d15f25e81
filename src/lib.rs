// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod errors;
pub mod events;
pub mod logging;
pub mod poll;
pub mod run;
pub mod snapshot;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{ConfigFile, StoreMode, StoreSection};
use crate::events::EventBus;
use crate::poll::ChangePoller;
use crate::run::{CompletionWebhook, RunExecutor};
use crate::snapshot::{GitLabProvider, SnapshotProvider};
use crate::store::{MemoryStore, RunStore, SqliteStore};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - run store
/// - snapshot provider, executor and webhook
/// - commit poller (service mode)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let store = open_store(&cfg.store)?;
    if args.history {
        return print_history(store.as_ref());
    }

    let provider: Arc<dyn SnapshotProvider> = Arc::new(GitLabProvider::from_config(&cfg.repo)?);
    let bus = EventBus::new();
    let webhook = cfg
        .webhook
        .url
        .as_ref()
        .map(|url| CompletionWebhook::new(url.clone()));
    let executor = Arc::new(RunExecutor::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        bus.clone(),
        &cfg.runner,
        webhook,
    ));

    if args.run_now {
        return run_now(&executor, &bus).await;
    }

    // Service mode: mirror run activity to the console, poll for commits,
    // run until interrupted.
    let _follower = console::spawn_follower(bus.subscribe());

    let poller_handle = if cfg.poll.enabled {
        let poller = ChangePoller::new(provider, Arc::clone(&executor), bus.clone());
        Some(poller.spawn(Duration::from_secs(cfg.poll.interval_seconds)))
    } else {
        warn!("polling is disabled, no runs will start on their own");
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    if let Some(handle) = poller_handle {
        handle.stop().await;
    }
    Ok(())
}

/// Execute a single run immediately, streaming its output to stdout.
/// The process exit code reflects the run outcome.
async fn run_now(executor: &Arc<RunExecutor>, bus: &EventBus) -> Result<()> {
    // Subscribe before starting so no output chunk is missed.
    let follower = tokio::spawn(console::follow_run(bus.subscribe()));
    let run = executor.run_to_completion().await?;
    let _ = follower.await;

    match run.success() {
        Some(true) => Ok(()),
        _ => Err(anyhow!("run {} failed", run.id)),
    }
}

/// Print the stored run history, newest first.
fn print_history(store: &dyn RunStore) -> Result<()> {
    let runs = store.list_all()?;
    if runs.is_empty() {
        println!("no runs recorded");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:<9}  {}  {} bytes of output",
            run.id,
            run.state.as_str(),
            format_timestamp(run.created_at_ms),
            run.output.len()
        );
    }
    Ok(())
}

fn format_timestamp(ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| ms.to_string())
}

fn open_store(section: &StoreSection) -> Result<Arc<dyn RunStore>> {
    Ok(match section.mode {
        StoreMode::Sqlite => {
            info!(path = %section.path.display(), "opening run store");
            Arc::new(SqliteStore::open(&section.path)?)
        }
        StoreMode::Memory => {
            warn!("using in-memory run store, history is lost on exit");
            Arc::new(MemoryStore::new())
        }
    })
}

/// Simple dry-run output: print the effective configuration and exit.
fn print_dry_run(cfg: &ConfigFile) {
    println!("ciwatch dry-run");
    println!("  repo.url = {}", cfg.repo.url);
    println!("  repo.branch = {}", cfg.repo.branch);
    println!("  repo.username = {}", cfg.repo.username);
    println!(
        "  repo.token = {}",
        if cfg.repo.token.is_some() { "(set)" } else { "(unset)" }
    );
    println!("  repo.api_base = {}", cfg.repo.api_base);
    println!("  poll.enabled = {}", cfg.poll.enabled);
    println!("  poll.interval_seconds = {}", cfg.poll.interval_seconds);
    println!("  store.mode = {:?}", cfg.store.mode);
    println!("  store.path = {}", cfg.store.path.display());
    println!("  runner.entry_point = {}", cfg.runner.entry_point);
    println!("  runner.workdir = {}", cfg.runner.workdir.display());
    println!("  runner.max_parallel_runs = {}", cfg.runner.max_parallel_runs);
    match cfg.runner.timeout_seconds {
        Some(secs) => println!("  runner.timeout_seconds = {secs}"),
        None => println!("  runner.timeout_seconds = (none)"),
    }
    match &cfg.webhook.url {
        Some(url) => println!("  webhook.url = {url}"),
        None => println!("  webhook.url = (unset)"),
    }
}
