//! CLI entry point for the legisfetch tool.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use legisfetch_core::discovery::ArchiveSource;
use legisfetch_core::{
    BlobStore, DiscoverySource, FetchDispatcher, FsBlobStore, HttpClient, IntegrityVerifier,
    Ledger, LedgerStore, ManifestSource, Pipeline, RateLimiter,
};

mod cli;

use cli::{Args, Command, RunArgs, StoreArgs, VerifyArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Load a local .env before anything reads the environment.
    dotenvy::dotenv().ok();

    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
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

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::Run(run_args) => run_pipeline(run_args, args.quiet).await,
        Command::Verify(verify_args) => run_verify(verify_args, args.quiet).await,
        Command::Status(store_args) => print_status(&store_args).await,
    }
}

/// Builds the shared progress bar, or `None` in quiet mode.
fn batch_progress(quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    Some(bar)
}

fn ledger_store(store_args: &StoreArgs) -> LedgerStore {
    let blob: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&store_args.store_root));
    LedgerStore::new(blob, &store_args.ledger_key)
}

async fn run_pipeline(run_args: RunArgs, quiet: bool) -> Result<()> {
    let base_url = Url::parse(&run_args.base_url)
        .with_context(|| format!("invalid base URL: {}", run_args.base_url))?;

    let source: Box<dyn DiscoverySource> = match (&run_args.manifest, &run_args.archive_url) {
        (Some(manifest), None) => Box::new(ManifestSource::new(manifest)),
        (None, Some(archive_url)) => Box::new(ArchiveSource::new(archive_url)),
        // clap's source group makes the remaining combinations unreachable.
        _ => anyhow::bail!("exactly one of --manifest or --archive-url is required"),
    };

    let blob: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&run_args.store.store_root));
    let store = LedgerStore::new(Arc::clone(&blob), &run_args.store.ledger_key);

    let rate_limiter = if run_args.rate_limit == 0 {
        Arc::new(RateLimiter::disabled())
    } else {
        Arc::new(RateLimiter::new(Duration::from_millis(run_args.rate_limit)))
    };

    // Scratch copies live in a temp dir that is cleaned up on exit.
    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    let dispatcher = Arc::new(FetchDispatcher::new(
        HttpClient::new(),
        blob,
        rate_limiter,
        &run_args.store.artifact_prefix,
        base_url,
        scratch.path(),
    ));

    let pipeline = Pipeline::new(
        store,
        source,
        dispatcher,
        usize::from(run_args.concurrency),
    );

    let progress = batch_progress(quiet);
    let summary = pipeline.run(progress.clone()).await?;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if summary.nothing_to_do {
        info!("nothing to do; ledger untouched");
        return Ok(());
    }

    info!(
        discovered = summary.discovered,
        new = summary.new_urls,
        retried = summary.retried,
        succeeded = summary.succeeded,
        not_found = summary.not_found,
        no_link = summary.no_link,
        no_id = summary.no_id,
        fetch_failed = summary.fetch_failed,
        ledger_size = summary.ledger_size,
        "pipeline run finished"
    );
    Ok(())
}

async fn run_verify(verify_args: VerifyArgs, quiet: bool) -> Result<()> {
    let blob: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&verify_args.store.store_root));
    let store = LedgerStore::new(Arc::clone(&blob), &verify_args.store.ledger_key);
    let verifier = Arc::new(IntegrityVerifier::new(
        blob,
        &verify_args.store.artifact_prefix,
    ));

    let progress = batch_progress(quiet);
    let summary = legisfetch_core::pipeline::run_verification(
        &store,
        &verifier,
        usize::from(verify_args.concurrency),
        progress.clone(),
    )
    .await?;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    info!(
        checked = summary.checked,
        readable = summary.readable,
        unreadable = summary.unreadable,
        newly_flagged = summary.newly_flagged,
        "verification finished"
    );
    Ok(())
}

async fn print_status(store_args: &StoreArgs) -> Result<()> {
    let store = ledger_store(store_args);
    let (ledger, existed) = store.load_or_empty().await?;

    if !existed {
        println!("no ledger snapshot at {}", store_args.store_root.display());
        return Ok(());
    }

    print_ledger_counts(&ledger);
    Ok(())
}

fn print_ledger_counts(ledger: &Ledger) {
    let downloaded = ledger.downloaded().count();
    let flagged_404 = ledger.records().filter(|r| r.is_404).count();
    let corrupted = ledger.records().filter(|r| r.is_corrupted).count();
    let retryable = ledger.retryable().count();

    println!("records:    {}", ledger.len());
    println!("downloaded: {downloaded}");
    println!("404:        {flagged_404}");
    println!("corrupted:  {corrupted}");
    println!("retryable:  {retryable}");
}
