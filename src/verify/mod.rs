//! Independent integrity verification of stored artifacts.
//!
//! The verifier re-reads every artifact the ledger says is downloaded and
//! runs a structural readability probe on the bytes. It is independently
//! schedulable from the fetch pipeline: same ledger, separate pass.
//!
//! The verifier only ever writes `is_corrupted`, and only ever sets it to
//! true. Clearing the flag requires a later fetch that produces a fresh
//! success for the URL.

pub mod pdf;

pub use pdf::{PdfCheckError, PdfSummary, check_pdf};

use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::ledger::{Ledger, VerificationOutcome};
use crate::store::BlobStore;

/// Counts reported by one verification pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VerifySummary {
    /// Records with `downloaded = true` that were checked.
    pub checked: usize,
    /// Artifacts that passed the structural probe.
    pub readable: usize,
    /// Artifacts that failed the probe or could not be fetched.
    pub unreadable: usize,
    /// Records newly flagged corrupted by the ledger fold.
    pub newly_flagged: usize,
}

/// Error type for verifier batch processing.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Integrity verifier with a constructor-injected blob store.
pub struct IntegrityVerifier {
    blob: Arc<dyn BlobStore>,
    /// Blob-store prefix the artifacts live under, e.g. `pdfs`.
    artifact_prefix: String,
}

impl IntegrityVerifier {
    /// Creates a verifier reading artifacts under `artifact_prefix`.
    #[must_use]
    pub fn new(blob: Arc<dyn BlobStore>, artifact_prefix: impl Into<String>) -> Self {
        Self {
            blob,
            artifact_prefix: artifact_prefix.into(),
        }
    }

    /// Checks one record's artifact.
    ///
    /// Storage-layer absence is itself a corruption signal, so a missing
    /// or unreadable blob yields `readable = false` rather than a
    /// separate category.
    #[instrument(skip(self), fields(url = %url, artifact = artifact_name))]
    pub async fn check_artifact(&self, url: &str, artifact_name: &str) -> VerificationOutcome {
        let key = format!("{}/{artifact_name}", self.artifact_prefix);
        let bytes = match self.blob.get(&key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "artifact could not be fetched from store");
                return VerificationOutcome::unreadable(url, e.to_string());
            }
        };

        match check_pdf(&bytes) {
            Ok(summary) => {
                debug!(key = %key, pages = summary.pages, "artifact readable");
                VerificationOutcome::readable(url)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "artifact failed structural probe");
                VerificationOutcome::unreadable(url, e.to_string())
            }
        }
    }

    /// Checks every downloaded record in the ledger through a bounded
    /// worker pool and returns the outcome batch.
    ///
    /// The ledger itself is not mutated here; callers fold the batch with
    /// [`Ledger::apply_verification`] afterwards, single-threaded.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] only for pool-level failures; per-artifact
    /// problems are outcomes, not errors.
    #[instrument(skip_all, fields(concurrency))]
    pub async fn verify(
        self: Arc<Self>,
        ledger: &Ledger,
        concurrency: usize,
        progress: Option<ProgressBar>,
    ) -> Result<Vec<VerificationOutcome>, VerifyError> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::new();

        for record in ledger.downloaded() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| VerifyError::SemaphoreClosed)?;

            let verifier = Arc::clone(&self);
            let progress = progress.clone();
            let url = record.url.clone();
            let artifact_name = record.artifact_name.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = match artifact_name {
                    Some(name) => verifier.check_artifact(&url, &name).await,
                    // Defensive: the artifact-name invariant should make
                    // this unreachable, but a hand-edited snapshot can
                    // violate it.
                    None => VerificationOutcome::unreadable(&url, "record has no artifact name"),
                };
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

        let unreadable = outcomes.iter().filter(|o| !o.readable).count();
        info!(
            checked = outcomes.len(),
            readable = outcomes.len() - unreadable,
            unreadable,
            "verification batch complete"
        );

        Ok(outcomes)
    }
}
