//! Per-host rate limiting for fetch requests.
//!
//! Enforces a minimum delay between requests to the same host; different
//! hosts proceed in parallel without waiting for each other. The
//! dispatcher acquires before the landing-page probe and again before the
//! artifact fetch.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Per-host rate limiter, shared across worker tasks via `Arc`.
///
/// `DashMap` gives lock-free access to per-host state; the inner
/// `tokio::sync::Mutex` makes the read-update of the last-request time
/// atomic. The host entry is cloned out of the map before awaiting so no
/// shard lock is held across an await point.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum delay between requests to the same host.
    min_delay: Duration,
    /// Whether rate limiting is disabled.
    disabled: bool,
    /// Last request time per host.
    hosts: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl RateLimiter {
    /// Creates a limiter with the given minimum per-host delay.
    #[must_use]
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            disabled: min_delay.is_zero(),
            hosts: DashMap::new(),
        }
    }

    /// Creates a disabled limiter; `acquire` returns immediately.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns true when rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured minimum delay.
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Waits until a request to `url`'s host is allowed, then records the
    /// request time. URLs without a parseable host are not limited.
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            return;
        };

        let state = self
            .hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut last_request = state.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                let wait = self.min_delay - elapsed;
                debug!(host = %host, wait_ms = wait.as_millis() as u64, "rate limit wait");
                tokio::time::sleep(wait).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire("https://example.fr/a").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_same_host_requests_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(120));
        let start = Instant::now();
        limiter.acquire("https://example.fr/a").await;
        limiter.acquire("https://example.fr/b").await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_different_hosts_do_not_wait() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire("https://one.example.fr/a").await;
        limiter.acquire("https://two.example.fr/a").await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_disabled_limiter_never_waits() {
        let limiter = RateLimiter::disabled();
        assert!(limiter.is_disabled());
        let start = Instant::now();
        limiter.acquire("https://example.fr/a").await;
        limiter.acquire("https://example.fr/b").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_unparseable_url_is_not_limited() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire("not a url").await;
        limiter.acquire("not a url").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
