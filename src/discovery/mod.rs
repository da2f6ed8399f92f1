//! Discovery source contract and implementations.
//!
//! Discovery is an external collaborator from the pipeline's point of
//! view: anything that can enumerate `(url, provenance)` pairs once per
//! run satisfies the contract. Output is finite and need not be
//! de-duplicated; the diff planner handles duplicates with set semantics.
//!
//! Two sources ship: [`ManifestSource`] reads a JSON manifest produced by
//! the out-of-scope browser-automation step, and [`ArchiveSource`]
//! downloads a bulk open-data ZIP archive. Any failure here is fatal to
//! the run; with no discovery baseline there is nothing to diff against.

mod archive;
mod backoff;
mod manifest;

pub use archive::ArchiveSource;
pub use backoff::BackoffPolicy;
pub use manifest::ManifestSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One raw discovery candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    /// The landing-page URL.
    pub url: String,
    /// Which discovery source produced it.
    pub provenance: String,
}

/// Errors produced by discovery sources. All of them abort the run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    ManifestIo {
        /// Manifest path.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest or an archive member could not be parsed.
    #[error("malformed discovery data in {context}: {reason}")]
    Malformed {
        /// File or archive member being parsed.
        context: String,
        /// What went wrong.
        reason: String,
    },

    /// The bulk archive could not be downloaded on any transport.
    #[error("archive download failed after {attempts} attempt(s) and fallback: {reason}")]
    ArchiveDownload {
        /// Attempts made on the primary transport.
        attempts: u32,
        /// Final error text.
        reason: String,
    },

    /// The downloaded archive is not a readable ZIP.
    #[error("archive unreadable: {0}")]
    ArchiveFormat(String),
}

impl DiscoveryError {
    /// Creates a malformed-data error.
    #[must_use]
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Contract for anything that can enumerate discovery candidates.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Returns the source's name for logs and summaries.
    fn name(&self) -> &str;

    /// Produces this run's candidates.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] on any failure; the caller treats every
    /// discovery failure as fatal for the run.
    async fn discover(&self) -> Result<Vec<DiscoveredUrl>, DiscoveryError>;
}

/// Parses manifest bytes: a JSON array of `{url, provenance}` entries.
///
/// Shared by the manifest source and the archive members, which use the
/// same format.
pub(crate) fn parse_manifest_entries(
    bytes: &[u8],
    context: &str,
) -> Result<Vec<DiscoveredUrl>, DiscoveryError> {
    serde_json::from_slice::<Vec<DiscoveredUrl>>(bytes)
        .map_err(|e| DiscoveryError::malformed(context, e.to_string()))
}
