//! HTTP client wrapper for landing-page probes and artifact downloads.
//!
//! One client is created per run and reused across work items, taking
//! advantage of connection pooling. Every request carries its own
//! connect/read timeout so a stalled item never blocks other workers.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::error::FetchError;

/// Connection timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout in seconds, sized for landing pages and document PDFs.
pub const READ_TIMEOUT_SECS: u64 = 20;

/// Returns the default User-Agent: tool name and version.
#[must_use]
pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// A fetched landing page.
#[derive(Debug, Clone)]
pub struct PageFetch {
    /// Final URL after redirects; PDF links absolutize against this.
    pub final_url: Url,
    /// Page body.
    pub body: String,
}

/// HTTP client for page probes and streaming artifact downloads.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied timeout
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches a landing page as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::HttpStatus`] for non-success responses
    /// (a 404 here is the conclusive "resource does not exist" signal),
    /// [`FetchError::Timeout`] on timeouts, and [`FetchError::Network`]
    /// on transport failures.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<PageFetch, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        debug!(bytes = body.len(), final_url = %final_url, "landing page fetched");
        Ok(PageFetch { final_url, body })
    }

    /// Streams `url` into the file at `path`, returning bytes written.
    ///
    /// A partial file is removed when the stream fails, so an
    /// interrupted download never leaves truncated scratch data behind.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for invalid URLs, non-success responses,
    /// transport failures, and scratch IO failures.
    #[instrument(skip(self), fields(url = %url, path = %path.display()))]
    pub async fn download_to_file(&self, url: &str, path: &Path) -> Result<u64, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let file = File::create(path)
            .await
            .map_err(|e| FetchError::io(path, e))?;

        let result = stream_to_file(file, response, url, path).await;
        if result.is_err() {
            debug!(path = %path.display(), "removing partial scratch file after error");
            let _ = tokio::fs::remove_file(path).await;
        }
        let bytes_written = result?;

        debug!(bytes = bytes_written, "artifact streamed to scratch");
        Ok(bytes_written)
    }
}

/// Streams a response body to an open file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| FetchError::io(path, e))?;
    Ok(bytes_written)
}
