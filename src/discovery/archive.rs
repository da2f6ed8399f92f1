//! Bulk open-data archive discovery source.
//!
//! Downloads a ZIP archive of listing manifests over HTTP and extracts
//! `(url, provenance)` entries from its JSON members. The download is
//! the one operation that retries within a run: a fixed number of
//! attempts with increasing backoff on the primary client, then one
//! attempt on an alternate transport tuned for flaky mirrors (long
//! timeout, identity encoding, no connection reuse).

use std::io::{Cursor, Read};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use super::backoff::BackoffPolicy;
use super::{DiscoveredUrl, DiscoveryError, DiscoverySource, parse_manifest_entries};

/// Read timeout for the alternate transport; bulk archives are large and
/// the fallback exists precisely because the mirror is slow.
const FALLBACK_TIMEOUT_SECS: u64 = 300;

/// Primary transport timeout.
const PRIMARY_TIMEOUT_SECS: u64 = 120;

/// ZIP archive of JSON discovery manifests, fetched over HTTP.
pub struct ArchiveSource {
    archive_url: String,
    primary: Client,
    fallback: Client,
    backoff: BackoffPolicy,
}

impl ArchiveSource {
    /// Creates a source for `archive_url` with the default backoff.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builders fail with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new(archive_url: impl Into<String>) -> Self {
        Self::with_backoff(archive_url, BackoffPolicy::default())
    }

    /// Creates a source with an explicit backoff policy.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builders fail with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_backoff(archive_url: impl Into<String>, backoff: BackoffPolicy) -> Self {
        let primary = Client::builder()
            .timeout(Duration::from_secs(PRIMARY_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(crate::fetch::default_user_agent())
            .build()
            .expect("failed to build primary archive client");
        // Alternate transport: no compression negotiation, generous
        // timeout, and one connection per request.
        let fallback = Client::builder()
            .timeout(Duration::from_secs(FALLBACK_TIMEOUT_SECS))
            .gzip(false)
            .pool_max_idle_per_host(0)
            .user_agent(crate::fetch::default_user_agent())
            .build()
            .expect("failed to build fallback archive client");
        Self {
            archive_url: archive_url.into(),
            primary,
            fallback,
            backoff,
        }
    }

    /// Downloads the archive bytes: primary with retries, then fallback.
    async fn fetch_archive(&self) -> Result<Vec<u8>, DiscoveryError> {
        let mut last_error = String::new();

        for attempt in 1..=self.backoff.max_attempts() {
            match fetch_bytes(&self.primary, &self.archive_url).await {
                Ok(bytes) => {
                    debug!(attempt, bytes = bytes.len(), "archive downloaded");
                    return Ok(bytes);
                }
                Err(reason) => {
                    warn!(
                        attempt,
                        max_attempts = self.backoff.max_attempts(),
                        error = %reason,
                        "archive download attempt failed"
                    );
                    last_error = reason;
                    if attempt < self.backoff.max_attempts() {
                        tokio::time::sleep(self.backoff.delay_for(attempt)).await;
                    }
                }
            }
        }

        info!("primary transport exhausted; trying alternate transport");
        match fetch_bytes(&self.fallback, &self.archive_url).await {
            Ok(bytes) => {
                debug!(bytes = bytes.len(), "archive downloaded via alternate transport");
                Ok(bytes)
            }
            Err(reason) => Err(DiscoveryError::ArchiveDownload {
                attempts: self.backoff.max_attempts(),
                reason: format!("{last_error}; fallback: {reason}"),
            }),
        }
    }

    /// Extracts entries from every `.json` member of the archive.
    fn extract_entries(bytes: &[u8]) -> Result<Vec<DiscoveredUrl>, DiscoveryError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DiscoveryError::ArchiveFormat(e.to_string()))?;

        let mut entries = Vec::new();
        for index in 0..archive.len() {
            let mut member = archive
                .by_index(index)
                .map_err(|e| DiscoveryError::ArchiveFormat(e.to_string()))?;
            let name = member.name().to_string();
            if !name.to_ascii_lowercase().ends_with(".json") {
                continue;
            }
            let mut contents = Vec::new();
            member
                .read_to_end(&mut contents)
                .map_err(|e| DiscoveryError::ArchiveFormat(format!("{name}: {e}")))?;
            let member_entries = parse_manifest_entries(&contents, &name)?;
            debug!(member = %name, entries = member_entries.len(), "archive member parsed");
            entries.extend(member_entries);
        }
        Ok(entries)
    }
}

/// One GET returning the full body, with errors flattened to text.
async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    Ok(bytes.to_vec())
}

#[async_trait]
impl DiscoverySource for ArchiveSource {
    fn name(&self) -> &str {
        "archive"
    }

    #[instrument(skip(self), fields(url = %self.archive_url))]
    async fn discover(&self) -> Result<Vec<DiscoveredUrl>, DiscoveryError> {
        let bytes = self.fetch_archive().await?;
        let entries = Self::extract_entries(&bytes)?;
        info!(entries = entries.len(), "archive discovery complete");
        Ok(entries)
    }
}
