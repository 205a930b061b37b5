//! Redis-backed sliding-window rate limiter.
//!
//! Stores per-key admission timestamps in a sorted set scored by the
//! timestamp itself. The purge-and-count step runs as one atomic pipeline,
//! so concurrent checks against the same key from any number of processes
//! see a consistent count and the budget is shared across instances.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::debug;

use super::backend::{now_ts, retry_after_secs, Admission, RateLimitError, RateLimiterBackend};

const DEFAULT_KEY_PREFIX: &str = "sift:ratelimit:";

/// Distributed rate limiter backed by Redis sorted sets.
pub struct RedisRateLimiter {
    client: redis::Client,
    key_prefix: String,
}

impl RedisRateLimiter {
    /// Create a limiter over an existing client with the default key prefix.
    pub fn new(client: redis::Client) -> Self {
        Self::with_prefix(client, DEFAULT_KEY_PREFIX)
    }

    /// Create a limiter with a custom key prefix.
    pub fn with_prefix(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    /// Create a limiter from a Redis URL.
    pub fn from_url(url: &str) -> Result<Self, RateLimitError> {
        Ok(Self::new(redis::Client::open(url)?))
    }

    async fn conn(&self) -> Result<MultiplexedConnection, RateLimitError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl RateLimiterBackend for RedisRateLimiter {
    async fn is_allowed(
        &self,
        key: &str,
        limit: u32,
        window_secs: u64,
    ) -> Result<Admission, RateLimitError> {
        let mut conn = self.conn().await?;
        let storage_key = self.storage_key(key);
        let now = now_ts();
        let cutoff = now - window_secs as f64;

        // Atomic purge-and-count keeps concurrent checks consistent.
        let (_purged, count): (u64, u32) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&storage_key)
            .arg(0)
            .arg(cutoff)
            .cmd("ZCARD")
            .arg(&storage_key)
            .query_async(&mut conn)
            .await?;

        if count >= limit {
            // Oldest surviving timestamp determines when budget frees up.
            let oldest: Vec<(String, f64)> = redis::cmd("ZRANGE")
                .arg(&storage_key)
                .arg(0)
                .arg(0)
                .arg("WITHSCORES")
                .query_async(&mut conn)
                .await?;

            let retry_after = oldest
                .first()
                .map(|(_, ts)| retry_after_secs(*ts, window_secs, now))
                .unwrap_or(window_secs);

            debug!(key, limit, retry_after, "rate limit budget exhausted");
            return Ok(Admission::denied(retry_after));
        }

        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(&storage_key)
            .arg(now)
            .arg(now.to_string())
            .ignore()
            .cmd("EXPIRE")
            .arg(&storage_key)
            .arg(window_secs)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(Admission::granted())
    }

    async fn reset(&self, key: &str) -> Result<(), RateLimitError> {
        let mut conn = self.conn().await?;
        redis::cmd("DEL")
            .arg(self.storage_key(key))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_remaining(&self, key: &str, limit: u32) -> Result<u32, RateLimitError> {
        let mut conn = self.conn().await?;

        // Deliberately count-only: no purge, so timestamps that aged out
        // since the last check may still be included. Reads stay cheap and
        // the next is_allowed corrects the count.
        let count: u32 = redis::cmd("ZCARD")
            .arg(self.storage_key(key))
            .query_async(&mut conn)
            .await?;

        Ok(limit.saturating_sub(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_limiter() -> RedisRateLimiter {
        RedisRateLimiter::from_url("redis://localhost:6379").unwrap()
    }

    #[test]
    fn test_storage_key_prefix() {
        let limiter = test_limiter();
        assert_eq!(limiter.storage_key("1.2.3.4"), "sift:ratelimit:1.2.3.4");

        let limiter =
            RedisRateLimiter::with_prefix(redis::Client::open("redis://localhost").unwrap(), "rl:");
        assert_eq!(limiter.storage_key("abc"), "rl:abc");
    }

    // The following tests require a running Redis instance.

    #[tokio::test]
    #[ignore]
    async fn test_allows_then_blocks() {
        let limiter = test_limiter();
        let key = format!("test:{}", uuid::Uuid::new_v4());

        for _ in 0..3 {
            assert!(limiter.is_allowed(&key, 3, 60).await.unwrap().allowed);
        }

        let admission = limiter.is_allowed(&key, 3, 60).await.unwrap();
        assert!(!admission.allowed);
        let retry_after = admission.retry_after_secs.unwrap();
        assert!(retry_after > 0 && retry_after <= 61);

        limiter.reset(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_reset_restores_budget() {
        let limiter = test_limiter();
        let key = format!("test:{}", uuid::Uuid::new_v4());

        assert!(limiter.is_allowed(&key, 1, 60).await.unwrap().allowed);
        assert!(!limiter.is_allowed(&key, 1, 60).await.unwrap().allowed);

        limiter.reset(&key).await.unwrap();
        assert!(limiter.is_allowed(&key, 1, 60).await.unwrap().allowed);

        limiter.reset(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_get_remaining_counts_stored() {
        let limiter = test_limiter();
        let key = format!("test:{}", uuid::Uuid::new_v4());

        assert_eq!(limiter.get_remaining(&key, 5).await.unwrap(), 5);
        limiter.is_allowed(&key, 5, 60).await.unwrap();
        limiter.is_allowed(&key, 5, 60).await.unwrap();
        assert_eq!(limiter.get_remaining(&key, 5).await.unwrap(), 3);

        limiter.reset(&key).await.unwrap();
    }
}
