//! CLI entry point for the alist-mirror tool.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use alist_mirror::{
    Database, IdempotencyStore, MirrorConfig, NoopProgress, ProgressSink, Session,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};

mod cli;
mod progress_ui;

use cli::{Args, Command, SyncArgs};
use progress_ui::ConsoleProgress;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let result = match args.command {
        Command::Sync(sync) => run_sync(sync, args.quiet).await,
        Command::InitDb { path } => run_init_db(&path).await,
        Command::Status { db } => run_status(&db).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_sync(args: SyncArgs, quiet: bool) -> Result<()> {
    let mut config = MirrorConfig::from_source_url(&args.source_url, &args.output)?
        .with_workers(usize::from(args.workers))?
        .with_max_retries(u32::from(args.max_retries))
        .with_strict_completion(args.strict_completion);
    if let Some(db) = args.db {
        config = config.with_store_path(db);
    }

    info!(
        host = %config.redacted_host(),
        root = %config.root_path,
        output = %config.local_root.display(),
        store = %config.store_path.display(),
        "mirror starting"
    );

    let progress: Arc<dyn ProgressSink> = if args.no_progress || quiet {
        Arc::new(NoopProgress)
    } else {
        Arc::new(ConsoleProgress::new())
    };

    let session = Session::open(config, progress)
        .await
        .context("failed to start mirror session")?;
    let report = session.run().await;
    session.close().await;
    let report = report.context("mirror session aborted")?;

    let stats = &report.traversal;
    info!(
        outcome = ?report.root_outcome,
        queue_retried = report.retried,
        queue_recovered = report.recovered,
        queue_still_failing = report.still_failing,
        directories = stats.directories_completed(),
        skipped = stats.directories_skipped(),
        unreachable = stats.directories_unreachable(),
        pointers = stats.pointers_written(),
        downloaded = stats.files_downloaded(),
        bytes = stats.bytes_downloaded(),
        failed = stats.files_failed(),
        retries = stats.download_retries(),
        "mirror complete"
    );
    Ok(())
}

async fn run_init_db(path: &Path) -> Result<()> {
    let db = Database::new(path)
        .await
        .with_context(|| format!("failed to initialize {}", path.display()))?;
    db.close().await;
    println!("initialized {}", path.display());
    Ok(())
}

async fn run_status(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("database {} does not exist", path.display());
    }
    let store = IdempotencyStore::new(
        Database::new(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?,
    );

    let processed = store.processed_count().await?;
    let failed = store.list_failed_files().await?;

    println!("processed directories: {processed}");
    println!("queued failures: {}", failed.len());
    for task in &failed {
        println!("  {task}  {}", task.url);
    }

    store.database().clone().close().await;
    Ok(())
}
