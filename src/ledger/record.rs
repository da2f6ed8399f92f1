//! Ledger record types and per-run outcome types.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One persistent ledger row; the URL is the natural key.
///
/// A record is created exactly once, at first discovery, with all flags
/// false. It is mutated only by the merge step after a fetch attempt or by
/// the integrity verifier, and is never deleted by normal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The landing-page URL; unique and immutable once created.
    pub url: String,
    /// Which discovery source produced this URL; informational only.
    pub provenance: String,
    /// Date the record first entered the ledger; immutable.
    pub added_at: NaiveDate,
    /// True once a successful fetch has produced a stored artifact.
    #[serde(default)]
    pub downloaded: bool,
    /// True once a fetch conclusively determined the resource is gone.
    #[serde(default)]
    pub is_404: bool,
    /// Set only by the integrity verifier; never cleared automatically.
    #[serde(default)]
    pub is_corrupted: bool,
    /// Canonical stored-artifact name; present iff `downloaded` is true.
    #[serde(default)]
    pub artifact_name: Option<String>,
}

impl UrlRecord {
    /// Creates a freshly discovered record with all flags false.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        provenance: impl Into<String>,
        added_at: NaiveDate,
    ) -> Self {
        Self {
            url: url.into(),
            provenance: provenance.into(),
            added_at,
            downloaded: false,
            is_404: false,
            is_corrupted: false,
            artifact_name: None,
        }
    }

    /// Returns true when this record is eligible for a fetch retry:
    /// neither downloaded nor conclusively gone.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !self.downloaded && !self.is_404
    }

    /// Checks the artifact-name invariant: `artifact_name` is set iff
    /// `downloaded` is true.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        self.downloaded == self.artifact_name.is_some()
    }
}

/// Terminal classification of one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Artifact retrieved and durably stored.
    Success,
    /// The landing page returned HTTP 404; the resource does not exist.
    NotFound,
    /// The landing page has no usable PDF affordance.
    NoLink,
    /// The URL matched no identity pattern; the artifact cannot be named.
    NoId,
    /// Transport or storage failure; eligible for retry next run.
    FetchFailed,
}

impl DownloadStatus {
    /// Returns the log/string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::NoLink => "no_link",
            Self::NoId => "no_id",
            Self::FetchFailed => "fetch_failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ephemeral result of one processed URL in one run.
///
/// Never persisted directly; folded into the ledger by the merge step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// The URL this outcome belongs to.
    pub url: String,
    /// Terminal classification of the attempt.
    pub status: DownloadStatus,
    /// Stored-artifact name; present only for `Success`.
    pub artifact_name: Option<String>,
}

impl DownloadOutcome {
    /// Creates a success outcome carrying the stored artifact name.
    #[must_use]
    pub fn success(url: impl Into<String>, artifact_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: DownloadStatus::Success,
            artifact_name: Some(artifact_name.into()),
        }
    }

    /// Creates a non-success outcome for `status`.
    ///
    /// # Panics
    ///
    /// Debug-asserts that `status` is not `Success`; use
    /// [`DownloadOutcome::success`] for that case.
    #[must_use]
    pub fn failed(url: impl Into<String>, status: DownloadStatus) -> Self {
        debug_assert!(status != DownloadStatus::Success);
        Self {
            url: url.into(),
            status,
            artifact_name: None,
        }
    }
}

/// Ephemeral result of one integrity check in one verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// The URL whose artifact was checked.
    pub url: String,
    /// True when the artifact opened and yielded at least one unit of
    /// content.
    pub readable: bool,
    /// Error detail when unreadable.
    pub error_detail: Option<String>,
}

impl VerificationOutcome {
    /// Creates a readable outcome.
    #[must_use]
    pub fn readable(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            readable: true,
            error_detail: None,
        }
    }

    /// Creates an unreadable outcome with an error detail.
    #[must_use]
    pub fn unreadable(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            readable: false,
            error_detail: Some(detail.into()),
        }
    }
}
