//! Fetch dispatcher: resolves, probes, downloads, and durably stores one
//! work item at a time, and runs batches through a bounded worker pool.
//!
//! The dispatcher never retries internally. A failed item stays eligible
//! in the next run's work set, so retry is a property of the planner, not
//! of this module.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::HttpClient;
use super::error::FetchError;
use super::identity::resolve_identity;
use super::limiter::RateLimiter;
use super::probe::{LinkProbe, find_pdf_link};
use crate::ledger::{DownloadOutcome, DownloadStatus};
use crate::planner::{WorkItem, WorkSet};
use crate::store::BlobStore;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Error type for dispatcher construction and batch processing.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Per-outcome counters for a fetch batch.
///
/// Atomic so concurrent worker tasks can update them without locking.
#[derive(Debug, Default)]
pub struct FetchStats {
    success: AtomicUsize,
    not_found: AtomicUsize,
    no_link: AtomicUsize,
    no_id: AtomicUsize,
    fetch_failed: AtomicUsize,
}

impl FetchStats {
    /// Creates a stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful, durably stored downloads.
    #[must_use]
    pub fn success(&self) -> usize {
        self.success.load(Ordering::SeqCst)
    }

    /// Landing pages that returned 404.
    #[must_use]
    pub fn not_found(&self) -> usize {
        self.not_found.load(Ordering::SeqCst)
    }

    /// Landing pages without a usable PDF affordance.
    #[must_use]
    pub fn no_link(&self) -> usize {
        self.no_link.load(Ordering::SeqCst)
    }

    /// URLs that matched no identity pattern.
    #[must_use]
    pub fn no_id(&self) -> usize {
        self.no_id.load(Ordering::SeqCst)
    }

    /// Transport or storage failures.
    #[must_use]
    pub fn fetch_failed(&self) -> usize {
        self.fetch_failed.load(Ordering::SeqCst)
    }

    /// Total items processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.success() + self.not_found() + self.no_link() + self.no_id() + self.fetch_failed()
    }

    fn record(&self, status: DownloadStatus) {
        let counter = match status {
            DownloadStatus::Success => &self.success,
            DownloadStatus::NotFound => &self.not_found,
            DownloadStatus::NoLink => &self.no_link,
            DownloadStatus::NoId => &self.no_id,
            DownloadStatus::FetchFailed => &self.fetch_failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fetch dispatcher with constructor-injected transport and storage.
pub struct FetchDispatcher {
    client: HttpClient,
    blob: Arc<dyn BlobStore>,
    limiter: Arc<RateLimiter>,
    /// Blob-store prefix for stored artifacts, e.g. `pdfs`.
    artifact_prefix: String,
    /// Base URL for absolutizing relative PDF affordance targets.
    base_url: Url,
    /// Directory for scratch copies while an artifact is in flight.
    scratch_dir: PathBuf,
}

impl FetchDispatcher {
    /// Creates a dispatcher.
    ///
    /// `scratch_dir` must exist; spooled artifact bytes land there until
    /// the blob-store put completes.
    #[must_use]
    pub fn new(
        client: HttpClient,
        blob: Arc<dyn BlobStore>,
        limiter: Arc<RateLimiter>,
        artifact_prefix: impl Into<String>,
        base_url: Url,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            blob,
            limiter,
            artifact_prefix: artifact_prefix.into(),
            base_url,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Returns the blob key for an artifact name.
    #[must_use]
    pub fn artifact_key(&self, artifact_name: &str) -> String {
        format!("{}/{artifact_name}", self.artifact_prefix)
    }

    /// Processes one work item through the full fetch sequence.
    ///
    /// Sub-steps run strictly in order: identity resolution, link probe,
    /// identity requirement, artifact fetch, durable store. Every step
    /// emits a structured log event. The result is always an outcome,
    /// never an error: per-item failures are data.
    #[instrument(skip(self, item), fields(url = %item.url, provenance = %item.provenance))]
    pub async fn dispatch(&self, item: &WorkItem) -> DownloadOutcome {
        // Step 1: identity resolution.
        let identity = resolve_identity(&item.url);
        debug!(
            doc_type = identity.doc_type,
            doc_id = identity.doc_id.as_deref().unwrap_or_default(),
            "identity resolved"
        );

        // Step 2: link probe.
        self.limiter.acquire(&item.url).await;
        let page = match self.client.fetch_page(&item.url).await {
            Ok(page) => page,
            Err(e) if e.is_not_found() => {
                info!(url = %item.url, "landing page returned 404");
                return DownloadOutcome::failed(&item.url, DownloadStatus::NotFound);
            }
            Err(e) => {
                warn!(url = %item.url, error = %e, "landing page fetch failed");
                return DownloadOutcome::failed(&item.url, DownloadStatus::FetchFailed);
            }
        };

        // Relative targets resolve against the page's final URL when it
        // shares the configured host, otherwise against the base URL.
        let join_base = if page.final_url.host_str() == self.base_url.host_str() {
            &page.final_url
        } else {
            &self.base_url
        };
        let pdf_url = match find_pdf_link(&page.body, join_base) {
            LinkProbe::Pdf(url) => url,
            LinkProbe::NoLink => {
                info!(url = %item.url, "no PDF affordance on landing page");
                return DownloadOutcome::failed(&item.url, DownloadStatus::NoLink);
            }
        };

        // Step 3: identity requirement; an artifact cannot be named
        // without an id, regardless of probe result.
        let Some(artifact_name) = identity.artifact_name() else {
            info!(url = %item.url, "no document id; artifact cannot be named");
            return DownloadOutcome::failed(&item.url, DownloadStatus::NoId);
        };

        // Step 4: artifact fetch, spooled to scratch.
        let scratch_path = self.scratch_dir.join(&artifact_name);
        self.limiter.acquire(&pdf_url).await;
        let bytes_written = match self.client.download_to_file(&pdf_url, &scratch_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %item.url, pdf_url = %pdf_url, error = %e, "artifact fetch failed");
                return DownloadOutcome::failed(&item.url, DownloadStatus::FetchFailed);
            }
        };
        debug!(artifact = %artifact_name, bytes = bytes_written, "artifact retrieved");

        // Step 5: durable store, then scratch cleanup. Retrieved but not
        // persisted does not count as downloaded.
        let outcome = match self.store_scratch(&artifact_name, &scratch_path).await {
            Ok(()) => {
                info!(url = %item.url, artifact = %artifact_name, "artifact stored");
                DownloadOutcome::success(&item.url, artifact_name)
            }
            Err(e) => {
                warn!(url = %item.url, artifact = %artifact_name, error = %e, "artifact store failed");
                DownloadOutcome::failed(&item.url, DownloadStatus::FetchFailed)
            }
        };

        if let Err(e) = tokio::fs::remove_file(&scratch_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %scratch_path.display(), error = %e, "failed to remove scratch copy");
            }
        }

        outcome
    }

    /// Uploads a scratch file to the blob store under the artifact prefix.
    async fn store_scratch(
        &self,
        artifact_name: &str,
        scratch_path: &std::path::Path,
    ) -> Result<(), FetchError> {
        let bytes = tokio::fs::read(scratch_path)
            .await
            .map_err(|e| FetchError::io(scratch_path, e))?;
        let key = self.artifact_key(artifact_name);
        self.blob
            .put(&key, &bytes)
            .await
            .map_err(|e| FetchError::storage(&key, e))?;
        Ok(())
    }

    /// Processes a whole work set through a bounded worker pool.
    ///
    /// Items have no ordering dependency on each other; outcomes are
    /// collected into one in-memory batch for the single-threaded merge
    /// that follows. Returned outcomes follow work-set order.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] only for pool-level failures; individual
    /// item failures are outcomes, not errors.
    #[instrument(skip_all, fields(items = work.len(), concurrency))]
    pub async fn process(
        self: Arc<Self>,
        work: &WorkSet,
        concurrency: usize,
        progress: Option<ProgressBar>,
    ) -> Result<(Vec<DownloadOutcome>, Arc<FetchStats>), DispatchError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(DispatchError::InvalidConcurrency { value: concurrency });
        }

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let stats = Arc::new(FetchStats::new());
        let mut handles = Vec::with_capacity(work.len());

        info!(items = work.len(), concurrency, "starting fetch batch");

        for item in work.items() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::SemaphoreClosed)?;

            let dispatcher = Arc::clone(&self);
            let stats = Arc::clone(&stats);
            let progress = progress.clone();
            let item = item.clone();

            handles.push(tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII).
                let _permit = permit;
                let outcome = dispatcher.dispatch(&item).await;
                stats.record(outcome.status);
                if let Some(bar) = progress {
                    bar.inc(1);
                }
                outcome
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await?);
        }

        info!(
            success = stats.success(),
            not_found = stats.not_found(),
            no_link = stats.no_link(),
            no_id = stats.no_id(),
            fetch_failed = stats.fetch_failed(),
            "fetch batch complete"
        );

        Ok((outcomes, stats))
    }
}
