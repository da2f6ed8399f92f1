//! Run orchestration: one logical pipeline run from discovery to the
//! published ledger snapshot.
//!
//! The run walks a fixed phase sequence:
//! `INIT → DISCOVER → PLAN → FETCH → MERGE → PUBLISH → DONE`. `FAILED`
//! is reachable only while establishing the baseline (discovery or
//! ledger access); individual fetch failures are data, not run failures.
//! An empty plan short-circuits straight to `DONE` without touching the
//! published snapshot, so aborting between phases is always safe: the
//! ledger is only written in `PUBLISH`.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use indicatif::ProgressBar;
use thiserror::Error;
use tracing::{info, instrument};

use crate::discovery::{DiscoveryError, DiscoverySource};
use crate::fetch::{DispatchError, FetchDispatcher};
use crate::ledger::{LedgerError, LedgerStore, MergeReport};
use crate::planner::plan;
use crate::verify::{IntegrityVerifier, VerifyError, VerifySummary};

/// Phase of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Run constructed, nothing attempted yet.
    Init,
    /// Discovery source enumeration.
    Discover,
    /// Diff planning against the ledger.
    Plan,
    /// Fetch batch over the work set.
    Fetch,
    /// Outcome fold into the in-memory ledger.
    Merge,
    /// Snapshot publish.
    Publish,
    /// Run finished cleanly.
    Done,
    /// Run aborted while establishing the baseline.
    Failed,
}

impl RunPhase {
    /// Returns the log representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Discover => "discover",
            Self::Plan => "plan",
            Self::Fetch => "fetch",
            Self::Merge => "merge",
            Self::Publish => "publish",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fatal pipeline errors. Everything here aborts the run and leaves the
/// previously published snapshot untouched.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Discovery failed; nothing to diff against.
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The ledger snapshot could not be read or written.
    #[error("ledger failure: {0}")]
    Ledger(#[from] LedgerError),

    /// The fetch worker pool itself failed (not an individual item).
    #[error("fetch batch failure: {0}")]
    Dispatch(#[from] DispatchError),

    /// The verify worker pool itself failed (not an individual artifact).
    #[error("verification batch failure: {0}")]
    Verify(#[from] VerifyError),
}

/// Counts reported by one pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Raw candidates produced by discovery (before de-duplication).
    pub discovered: usize,
    /// Newly discovered URLs in the work set.
    pub new_urls: usize,
    /// Retried URLs in the work set.
    pub retried: usize,
    /// Successful, durably stored downloads.
    pub succeeded: usize,
    /// Landing pages that returned 404.
    pub not_found: usize,
    /// Landing pages without a usable PDF affordance.
    pub no_link: usize,
    /// URLs that matched no identity pattern.
    pub no_id: usize,
    /// Transport or storage failures.
    pub fetch_failed: usize,
    /// Ledger size after the run.
    pub ledger_size: usize,
    /// True when the plan was empty and nothing was fetched or published.
    pub nothing_to_do: bool,
}

impl RunSummary {
    fn absorb_merge(&mut self, report: MergeReport) {
        self.succeeded = report.succeeded;
        self.not_found = report.flagged_404;
    }
}

/// One logical pipeline run over constructor-injected collaborators.
pub struct Pipeline {
    store: LedgerStore,
    source: Box<dyn DiscoverySource>,
    dispatcher: Arc<FetchDispatcher>,
    concurrency: usize,
}

impl Pipeline {
    /// Creates a pipeline run.
    #[must_use]
    pub fn new(
        store: LedgerStore,
        source: Box<dyn DiscoverySource>,
        dispatcher: Arc<FetchDispatcher>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            source,
            dispatcher,
            concurrency,
        }
    }

    /// Executes the run.
    ///
    /// The ledger is loaded once, mutated only in memory during `MERGE`,
    /// and republished whole in `PUBLISH`; aborting at any earlier point
    /// leaves the previous snapshot untouched. Completed item outcomes
    /// from an aborted fetch batch are simply dropped and those URLs stay
    /// retryable.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only for fatal conditions (discovery
    /// failure, ledger storage failure, worker-pool failure).
    #[instrument(skip_all, fields(source = self.source.name()))]
    pub async fn run(&self, progress: Option<ProgressBar>) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        info!(phase = %RunPhase::Discover, "discovering candidates");
        let discovered = self.source.discover().await?;
        summary.discovered = discovered.len();
        info!(candidates = discovered.len(), "discovery complete");

        // A missing snapshot is the empty ledger; any other ledger
        // failure means there is no baseline to diff against.
        let (mut ledger, existed) = self.store.load_or_empty().await?;
        info!(
            records = ledger.len(),
            snapshot_existed = existed,
            "ledger baseline loaded"
        );

        info!(phase = %RunPhase::Plan, "planning work set");
        let work = plan(&ledger, &discovered);
        summary.new_urls = work.newly_discovered();
        summary.retried = work.retries();

        if work.is_empty() {
            info!(phase = %RunPhase::Done, "nothing to do");
            summary.ledger_size = ledger.len();
            summary.nothing_to_do = true;
            return Ok(summary);
        }
        info!(
            total = work.len(),
            new = work.newly_discovered(),
            retries = work.retries(),
            "work set ready"
        );

        info!(phase = %RunPhase::Fetch, items = work.len(), "fetching");
        if let Some(bar) = &progress {
            bar.set_length(work.len() as u64);
        }
        let (outcomes, stats) = Arc::clone(&self.dispatcher)
            .process(&work, self.concurrency, progress)
            .await?;
        summary.no_link = stats.no_link();
        summary.no_id = stats.no_id();
        summary.fetch_failed = stats.fetch_failed();

        info!(phase = %RunPhase::Merge, outcomes = outcomes.len(), "merging outcomes");
        let today = Utc::now().date_naive();
        let report = ledger.merge(&work.new_entries(), &outcomes, today);
        summary.absorb_merge(report);
        summary.ledger_size = ledger.len();

        info!(phase = %RunPhase::Publish, records = ledger.len(), "publishing snapshot");
        self.store.persist(&ledger).await?;

        info!(
            phase = %RunPhase::Done,
            discovered = summary.discovered,
            new = summary.new_urls,
            retried = summary.retried,
            succeeded = summary.succeeded,
            not_found = summary.not_found,
            no_link = summary.no_link,
            no_id = summary.no_id,
            fetch_failed = summary.fetch_failed,
            ledger_size = summary.ledger_size,
            "run complete"
        );
        Ok(summary)
    }
}

/// Executes one independent verification pass: loads the ledger, checks
/// every downloaded artifact, folds the `is_corrupted` flags, and
/// republishes the snapshot.
///
/// An absent ledger means there is nothing to verify; the pass reports
/// zero counts and publishes nothing.
///
/// # Errors
///
/// Returns [`PipelineError`] on ledger storage failures or a verify
/// worker-pool failure.
#[instrument(skip_all)]
pub async fn run_verification(
    store: &LedgerStore,
    verifier: &Arc<IntegrityVerifier>,
    concurrency: usize,
    progress: Option<ProgressBar>,
) -> Result<VerifySummary, PipelineError> {
    let (mut ledger, existed) = store.load_or_empty().await?;
    if !existed || ledger.downloaded().next().is_none() {
        info!("no downloaded artifacts to verify");
        return Ok(VerifySummary::default());
    }

    let downloaded = ledger.downloaded().count();
    if let Some(bar) = &progress {
        bar.set_length(downloaded as u64);
    }

    let outcomes = Arc::clone(verifier)
        .verify(&ledger, concurrency, progress)
        .await?;
    let unreadable = outcomes.iter().filter(|o| !o.readable).count();
    let newly_flagged = ledger.apply_verification(&outcomes);
    store.persist(&ledger).await?;

    let summary = VerifySummary {
        checked: outcomes.len(),
        readable: outcomes.len() - unreadable,
        unreadable,
        newly_flagged,
    };
    info!(
        checked = summary.checked,
        readable = summary.readable,
        unreadable = summary.unreadable,
        newly_flagged = summary.newly_flagged,
        "verification pass complete"
    );
    Ok(summary)
}
