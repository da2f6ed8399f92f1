//! Manifest-file discovery source.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{DiscoveredUrl, DiscoveryError, DiscoverySource, parse_manifest_entries};

/// Reads discovery candidates from a JSON manifest on disk.
///
/// The manifest is an array of `{url, provenance}` entries, typically
/// dropped by the browser-automation step that crawls the listing pages.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    /// Creates a source reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DiscoverySource for ManifestSource {
    fn name(&self) -> &str {
        "manifest"
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn discover(&self) -> Result<Vec<DiscoveredUrl>, DiscoveryError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| DiscoveryError::ManifestIo {
                path: self.path.display().to_string(),
                source: e,
            })?;
        let entries = parse_manifest_entries(&bytes, &self.path.display().to_string())?;
        debug!(entries = entries.len(), "manifest parsed");
        Ok(entries)
    }
}
