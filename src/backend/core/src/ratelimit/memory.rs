//! In-memory sliding-window rate limiter.
//!
//! Keeps a per-key log of admission timestamps. Expired entries are purged
//! lazily on every check; `cleanup_expired` additionally sweeps keys that
//! have gone fully idle so the map does not grow without bound. State is
//! process-local and volatile.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;

use super::backend::{now_ts, retry_after_secs, Admission, RateLimitError, RateLimiterBackend};

/// Process-local rate limiter backed by per-key timestamp logs.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    /// Ascending admission timestamps per key
    logs: DashMap<String, VecDeque<f64>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Purge expired timestamps across all keys and drop keys whose logs
    /// emptied out. Returns the number of keys removed.
    ///
    /// Purely advisory: `is_allowed` purges lazily per key, so correctness
    /// never depends on this sweep running.
    pub fn cleanup_expired(&self, window_secs: u64) -> usize {
        let cutoff = now_ts() - window_secs as f64;
        let before = self.logs.len();

        self.logs.retain(|_, log| {
            while log.front().is_some_and(|&ts| ts < cutoff) {
                log.pop_front();
            }
            !log.is_empty()
        });

        before.saturating_sub(self.logs.len())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.logs.len()
    }

    /// Record a raw timestamp for a key. Timestamps must be appended in
    /// ascending order.
    #[cfg(test)]
    fn record_at(&self, key: &str, ts: f64) {
        self.logs.entry(key.to_string()).or_default().push_back(ts);
    }
}

#[async_trait]
impl RateLimiterBackend for InMemoryRateLimiter {
    async fn is_allowed(
        &self,
        key: &str,
        limit: u32,
        window_secs: u64,
    ) -> Result<Admission, RateLimitError> {
        let now = now_ts();
        let cutoff = now - window_secs as f64;

        // The entry guard serializes concurrent checks for the same key,
        // so purge + count + record is atomic per key.
        let mut entry = self.logs.entry(key.to_string()).or_default();
        let log = entry.value_mut();

        while log.front().is_some_and(|&ts| ts < cutoff) {
            log.pop_front();
        }

        if (log.len() as u32) < limit {
            log.push_back(now);
            Ok(Admission::granted())
        } else {
            let retry_after = log
                .front()
                .map(|&oldest| retry_after_secs(oldest, window_secs, now))
                .unwrap_or(window_secs);
            Ok(Admission::denied(retry_after))
        }
    }

    async fn reset(&self, key: &str) -> Result<(), RateLimitError> {
        self.logs.remove(key);
        Ok(())
    }

    async fn get_remaining(&self, key: &str, limit: u32) -> Result<u32, RateLimitError> {
        let count = self.logs.get(key).map(|log| log.len() as u32).unwrap_or(0);
        Ok(limit.saturating_sub(count))
    }
}
