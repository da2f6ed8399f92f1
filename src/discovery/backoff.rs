//! Backoff policy for the bulk archive download.
//!
//! The archive fetch is the one operation that retries within a run:
//! a small fixed number of attempts with increasing delays (plus jitter)
//! before the source falls back to its alternate transport.

use std::time::Duration;

use rand::Rng;

/// Default maximum attempts on the primary transport.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay before the first retry.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default delay cap.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default multiplier applied per attempt.
const DEFAULT_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to each delay.
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Increasing-backoff configuration.
///
/// Delay for attempt `n` (1-indexed) is
/// `min(base * multiplier^(n-1), max_delay) + jitter`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with custom settings; `max_attempts` is clamped
    /// to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            multiplier,
        }
    }

    /// Creates a policy with custom attempts and default delays.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A fast policy for tests: immediate retries.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Returns the configured attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay to sleep after a failed attempt (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(16).min(16);
        let factor = self.multiplier.powi(exponent);
        let scaled = self.base_delay.mul_f32(factor.max(0.0));
        let capped = scaled.min(self.max_delay);
        if capped.is_zero() {
            return capped;
        }
        let jitter = rand::thread_rng().gen_range(Duration::ZERO..=MAX_JITTER);
        capped + jitter
    }
}
