//! Rate limiter backend contract.
//!
//! Both stores implement the same sliding-window semantics over a shared
//! trait: a continuous window of `window_secs` ending at the current instant,
//! request timestamps older than the window are discarded, and a request is
//! admitted only while fewer than `limit` timestamps remain. A denied request
//! is never recorded.

use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Outcome of an admission check.
///
/// Denial is a normal outcome, not an error. `retry_after_secs` is populated
/// only when `allowed` is false.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    /// Whether the request was admitted and recorded
    pub allowed: bool,

    /// Seconds until a retry can succeed (denials only)
    pub retry_after_secs: Option<u64>,
}

impl Admission {
    /// An admitted request.
    pub fn granted() -> Self {
        Self {
            allowed: true,
            retry_after_secs: None,
        }
    }

    /// A denied request with retry guidance.
    pub fn denied(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            retry_after_secs: Some(retry_after_secs),
        }
    }
}

/// Rate limiting errors.
///
/// Store failures are kept distinct from configuration mistakes so callers
/// can apply an outage policy (fail-open or fail-closed) to the former only.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("rate limiter misconfigured: {0}")]
    Config(String),
}

/// Backend storage for the sliding-window rate limiter.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    /// Check whether a request for `key` fits the budget, recording its
    /// timestamp when admitted.
    async fn is_allowed(
        &self,
        key: &str,
        limit: u32,
        window_secs: u64,
    ) -> Result<Admission, RateLimitError>;

    /// Drop all recorded requests for `key`.
    async fn reset(&self, key: &str) -> Result<(), RateLimitError>;

    /// Remaining budget for `key` based on the currently stored count,
    /// clamped to `0..=limit`. Never mutates state, so counts that have
    /// aged out of the window but not yet been purged are still included.
    async fn get_remaining(&self, key: &str, limit: u32) -> Result<u32, RateLimitError>;
}

/// Current time as fractional seconds since the Unix epoch.
pub(crate) fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Seconds a denied client must wait for the oldest in-window request to
/// age out. Rounded up past the window boundary so a retry at exactly the
/// advertised time succeeds.
pub(crate) fn retry_after_secs(oldest: f64, window_secs: u64, now: f64) -> u64 {
    (oldest + window_secs as f64 - now).max(0.0) as u64 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_constructors() {
        let granted = Admission::granted();
        assert!(granted.allowed);
        assert_eq!(granted.retry_after_secs, None);

        let denied = Admission::denied(7);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, Some(7));
    }

    #[test]
    fn test_retry_after_bounds() {
        let now = 1_000_000.0;
        // Oldest request just recorded: full window plus the round-up second.
        assert_eq!(retry_after_secs(now, 60, now), 61);
        // Oldest request about to age out.
        assert_eq!(retry_after_secs(now - 59.5, 60, now), 1);
        // Already past the boundary clamps instead of underflowing.
        assert_eq!(retry_after_secs(now - 61.0, 60, now), 1);
    }
}
