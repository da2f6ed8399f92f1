//! Error types for ledger operations.

use thiserror::Error;

use crate::store::StorageError;

/// Errors that can occur loading, decoding, or persisting the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No prior snapshot exists. Callers treat this as "empty ledger",
    /// not as a fatal condition.
    #[error("no ledger snapshot found under key '{key}'")]
    Unavailable {
        /// The snapshot key that was probed.
        key: String,
    },

    /// The snapshot store could not be read or written.
    #[error("ledger storage error: {0}")]
    Storage(#[from] StorageError),

    /// The snapshot bytes could not be decoded or encoded.
    #[error("ledger snapshot malformed: {reason}")]
    Snapshot {
        /// What went wrong.
        reason: String,
    },

    /// The snapshot contains the same URL twice; the ledger key set must
    /// have no repeats.
    #[error("duplicate URL in ledger snapshot: {url}")]
    DuplicateUrl {
        /// The repeated URL.
        url: String,
    },
}

impl LedgerError {
    /// Creates an unavailable-snapshot error for `key`.
    #[must_use]
    pub fn unavailable(key: impl Into<String>) -> Self {
        Self::Unavailable { key: key.into() }
    }

    /// Creates a malformed-snapshot error.
    #[must_use]
    pub fn snapshot(reason: impl Into<String>) -> Self {
        Self::Snapshot {
            reason: reason.into(),
        }
    }

    /// Returns true when this error only means the snapshot does not
    /// exist yet.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
