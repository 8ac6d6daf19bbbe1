//! Transport-level retry policy with exponential backoff on throttling.
//!
//! [`BackoffConfig`] controls how failed model calls are retried. Rate-limit
//! responses wait `rate_limit_base * multiplier^attempt` (2 s, 4 s, 8 s with
//! the standard settings); any other transient failure waits a fixed
//! `transient_delay`. Optional jitter is only ever added on top of the base
//! delay, so the computed wait is a lower bound.

use std::time::Duration;

/// Configuration for transport-level retry.
///
/// # Example
///
/// ```
/// use review_insight::backend::BackoffConfig;
/// use std::time::Duration;
///
/// let standard = BackoffConfig::standard();
/// assert_eq!(standard.max_attempts, 3);
/// assert_eq!(standard.rate_limit_delay(2), Duration::from_secs(8));
///
/// let single = BackoffConfig::none();
/// assert_eq!(single.max_attempts, 1);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Total number of attempts per call, including the first. Minimum 1.
    pub max_attempts: u32,

    /// Wait after the first throttled attempt. Default: 2 seconds.
    pub rate_limit_base: Duration,

    /// Multiplier applied per throttled attempt. Default: 2.0.
    pub multiplier: f64,

    /// Fixed wait after a non-throttling transient failure. Default: 2 seconds.
    pub transient_delay: Duration,

    /// Cap for any single wait. A provider `Retry-After` above this cap makes
    /// the invoker give up instead of stalling the caller. Default: 60 seconds.
    pub max_delay: Duration,

    /// Upper bound of random jitter added on top of each wait. Default: zero.
    pub jitter: Duration,

    /// Whether to honour `Retry-After` headers from the provider. Default: `true`.
    pub respect_retry_after: bool,

    /// Bound on a single model call. Default: 30 seconds.
    pub attempt_timeout: Duration,
}

impl BackoffConfig {
    /// A single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::standard()
        }
    }

    /// Three attempts, 2 s / 4 s / 8 s throttling backoff, 2 s fixed delay
    /// for other transient failures, 30 s per attempt.
    pub fn standard() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_base: Duration::from_secs(2),
            multiplier: 2.0,
            transient_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: Duration::ZERO,
            respect_retry_after: true,
            attempt_timeout: Duration::from_secs(30),
        }
    }

    /// Set the number of attempts (floored at 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the jitter upper bound.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Wait after throttled attempt N (0-indexed), capped at `max_delay`.
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let base = self.rate_limit_base.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped) + self.sample_jitter()
    }

    /// Wait after a non-throttling transient failure.
    pub fn transient_delay(&self) -> Duration {
        self.transient_delay.min(self.max_delay) + self.sample_jitter()
    }

    fn sample_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(fastrand::f64() * self.jitter.as_secs_f64())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::standard()
    }
}
