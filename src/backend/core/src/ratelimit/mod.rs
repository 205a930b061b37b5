//! Sliding-window rate limiting.
//!
//! A continuous-window limiter with two interchangeable stores behind
//! [`RateLimiterBackend`]: a process-local in-memory store and a Redis
//! sorted-set store for deployments with multiple instances. Enforcement
//! happens at two levels:
//!
//! - [`RateLimitLayer`]: a tower layer applying the global per-client budget
//!   to every route not explicitly excluded
//! - [`RouteRateLimit`]: a guard invoked inside individual handlers for
//!   routes with stricter budgets
//!
//! The backend is constructed once at startup and injected wherever it is
//! needed; there is no global limiter state.

pub mod backend;
pub mod guard;
pub mod memory;
pub mod middleware;
pub mod redis;

pub use backend::{Admission, RateLimitError, RateLimiterBackend};
pub use guard::{QuotaGrant, RouteRateLimit, RouteRateLimited};
pub use memory::InMemoryRateLimiter;
pub use middleware::{extract_client_key, KeyExtractor, RateLimitConfig, RateLimitLayer};
pub use redis::RedisRateLimiter;

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Start the periodic expired-key sweep for the in-memory store.
pub fn start_cleanup_task(
    limiter: Arc<InMemoryRateLimiter>,
    window_secs: u64,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        loop {
            interval_timer.tick().await;
            let removed = limiter.cleanup_expired(window_secs);
            debug!(removed, "Swept expired rate limit keys");
        }
    });
}
