//! Ledger load/merge/persist.
//!
//! The ledger is the persisted mapping from URL to fetch/verification
//! status. This module owns the merge semantics: per-run fetch outcomes
//! and verification outcomes are collected into in-memory batches and
//! folded in single-threaded passes, then the whole snapshot is
//! republished atomically through the blob store.

mod error;
mod record;
mod snapshot;

pub use error::LedgerError;
pub use record::{DownloadOutcome, DownloadStatus, UrlRecord, VerificationOutcome};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::store::BlobStore;

/// Default blob-store key for the ledger snapshot.
pub const DEFAULT_LEDGER_KEY: &str = "ledger.csv";

/// A URL to append to the ledger, produced by the diff planner for
/// newly discovered URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    /// The discovered landing-page URL.
    pub url: String,
    /// Which discovery source produced it.
    pub provenance: String,
}

/// Counts reported by one merge pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Records appended for newly discovered URLs.
    pub appended: usize,
    /// Records flipped to downloaded by a success outcome.
    pub succeeded: usize,
    /// Records flagged 404 by a not-found outcome.
    pub flagged_404: usize,
    /// Not-found outcomes observed for records already downloaded.
    pub regressions: usize,
    /// Outcomes that left the record unchanged and retryable.
    pub still_pending: usize,
}

/// In-memory ledger keyed by URL.
///
/// Backed by a `BTreeMap` so iteration (and therefore snapshots and logs)
/// is deterministic in ascending URL order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ledger {
    records: BTreeMap<String, UrlRecord>,
}

impl Ledger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when the ledger has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a record by URL.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&UrlRecord> {
        self.records.get(url)
    }

    /// Returns true when the ledger contains `url`.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.records.contains_key(url)
    }

    /// Iterates all records in ascending URL order.
    pub fn records(&self) -> impl Iterator<Item = &UrlRecord> {
        self.records.values()
    }

    /// Iterates records eligible for a fetch retry (not downloaded, not
    /// flagged 404), in ascending URL order.
    pub fn retryable(&self) -> impl Iterator<Item = &UrlRecord> {
        self.records().filter(|record| record.is_retryable())
    }

    /// Iterates records with a stored artifact, in ascending URL order.
    pub fn downloaded(&self) -> impl Iterator<Item = &UrlRecord> {
        self.records().filter(|record| record.downloaded)
    }

    /// Inserts a record, replacing any record with the same URL.
    pub fn insert(&mut self, record: UrlRecord) {
        self.records.insert(record.url.clone(), record);
    }

    /// Folds one run's fetch outcomes into the ledger.
    ///
    /// Appends records for `new_entries` not already present (re-discovery
    /// of a known URL never creates a duplicate), then applies outcomes:
    /// success sets `downloaded`/`artifact_name` and clears `is_404`;
    /// not-found sets `is_404`; every other status leaves the record
    /// untouched and retryable. A not-found for a record that is already
    /// downloaded is a regression: logged, not fatal, `downloaded` kept.
    #[instrument(skip_all, fields(new_entries = new_entries.len(), outcomes = outcomes.len()))]
    pub fn merge(
        &mut self,
        new_entries: &[NewEntry],
        outcomes: &[DownloadOutcome],
        added_at: NaiveDate,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        for entry in new_entries {
            if self.contains(&entry.url) {
                debug!(url = %entry.url, "already in ledger; not appending");
                continue;
            }
            self.insert(UrlRecord::new(
                entry.url.clone(),
                entry.provenance.clone(),
                added_at,
            ));
            report.appended += 1;
        }

        for outcome in outcomes {
            let Some(record) = self.records.get_mut(&outcome.url) else {
                warn!(url = %outcome.url, "outcome for URL missing from ledger; dropped");
                continue;
            };
            match outcome.status {
                DownloadStatus::Success => {
                    record.downloaded = true;
                    record.is_404 = false;
                    record.artifact_name = outcome.artifact_name.clone();
                    report.succeeded += 1;
                }
                DownloadStatus::NotFound => {
                    if record.downloaded {
                        warn!(
                            url = %record.url,
                            artifact = record.artifact_name.as_deref().unwrap_or_default(),
                            "landing page now 404 for an already-downloaded record"
                        );
                        report.regressions += 1;
                    }
                    record.is_404 = true;
                    report.flagged_404 += 1;
                }
                DownloadStatus::NoLink | DownloadStatus::NoId | DownloadStatus::FetchFailed => {
                    report.still_pending += 1;
                }
            }
        }

        report
    }

    /// Folds verification outcomes into the ledger, independently of the
    /// fetch merge. Only ever sets `is_corrupted` to true; a record once
    /// flagged stays flagged until a later fetch succeeds for it. Never
    /// touches `downloaded` or `is_404`.
    ///
    /// Returns the number of records newly flagged corrupted.
    #[instrument(skip_all, fields(outcomes = outcomes.len()))]
    pub fn apply_verification(&mut self, outcomes: &[VerificationOutcome]) -> usize {
        let mut newly_flagged = 0;
        for outcome in outcomes {
            if outcome.readable {
                continue;
            }
            let Some(record) = self.records.get_mut(&outcome.url) else {
                warn!(url = %outcome.url, "verification outcome for URL missing from ledger");
                continue;
            };
            if !record.is_corrupted {
                newly_flagged += 1;
            }
            record.is_corrupted = true;
            warn!(
                url = %record.url,
                artifact = record.artifact_name.as_deref().unwrap_or_default(),
                detail = outcome.error_detail.as_deref().unwrap_or("unknown"),
                "artifact flagged corrupted"
            );
        }
        newly_flagged
    }
}

/// Loads and persists ledger snapshots through a blob store.
#[derive(Clone)]
pub struct LedgerStore {
    blob: Arc<dyn BlobStore>,
    key: String,
}

impl LedgerStore {
    /// Creates a store reading and publishing snapshots under `key`.
    #[must_use]
    pub fn new(blob: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            blob,
            key: key.into(),
        }
    }

    /// Returns the snapshot key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unavailable`] when no snapshot exists yet
    /// (callers treat this as the empty ledger), or another
    /// [`LedgerError`] when the read or decode fails.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn load(&self) -> Result<Ledger, LedgerError> {
        let bytes = match self.blob.get(&self.key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Err(LedgerError::unavailable(&self.key)),
            Err(e) => return Err(LedgerError::Storage(e)),
        };
        let ledger = snapshot::decode(&bytes)?;
        debug!(records = ledger.len(), "ledger snapshot loaded");
        Ok(ledger)
    }

    /// Loads the current snapshot, mapping a missing snapshot to the
    /// empty ledger. The boolean reports whether a snapshot existed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] for every failure other than a missing
    /// snapshot.
    pub async fn load_or_empty(&self) -> Result<(Ledger, bool), LedgerError> {
        match self.load().await {
            Ok(ledger) => Ok((ledger, true)),
            Err(e) if e.is_unavailable() => {
                info!(key = %self.key, "no prior ledger snapshot; starting empty");
                Ok((Ledger::new(), false))
            }
            Err(e) => Err(e),
        }
    }

    /// Publishes `ledger` as the new snapshot.
    ///
    /// Atomic from the caller's point of view: the blob store's `put`
    /// contract guarantees no half-written snapshot is ever visible.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when encoding or the store write fails.
    #[instrument(skip(self, ledger), fields(key = %self.key, records = ledger.len()))]
    pub async fn persist(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let bytes = snapshot::encode(ledger)?;
        self.blob.put(&self.key, &bytes).await?;
        info!(records = ledger.len(), "ledger snapshot published");
        Ok(())
    }
}
