//! Evaluation job queue.
//!
//! The API process enqueues evaluation IDs; worker processes dequeue them.
//! The Redis backend is a plain list shared across instances; the in-memory
//! backend exists for tests and single-process development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ErrorCode, Result, SiftError};

/// Default Redis list key for evaluation jobs.
pub const DEFAULT_QUEUE_KEY: &str = "sift:jobs:evaluations";

/// A queued evaluation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationJob {
    /// Evaluation row this job processes
    pub evaluation_id: Uuid,

    /// When the job was enqueued
    pub enqueued_at: DateTime<Utc>,
}

impl EvaluationJob {
    pub fn new(evaluation_id: Uuid) -> Self {
        Self {
            evaluation_id,
            enqueued_at: Utc::now(),
        }
    }
}

/// Trait for queue backends.
#[async_trait]
pub trait EvaluationQueue: Send + Sync {
    /// Enqueue a job.
    async fn enqueue(&self, job: EvaluationJob) -> Result<()>;

    /// Dequeue the oldest job, waiting briefly when the queue is empty.
    async fn dequeue(&self) -> Result<Option<EvaluationJob>>;

    /// Get the current queue length.
    async fn len(&self) -> Result<usize>;

    /// Check if the queue is empty.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// In-memory queue backend for testing and development.
pub struct InMemoryQueueBackend {
    queue: Arc<RwLock<VecDeque<EvaluationJob>>>,
}

impl InMemoryQueueBackend {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(RwLock::new(VecDeque::new())),
        }
    }
}

impl Default for InMemoryQueueBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvaluationQueue for InMemoryQueueBackend {
    async fn enqueue(&self, job: EvaluationJob) -> Result<()> {
        self.queue.write().await.push_back(job);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<EvaluationJob>> {
        Ok(self.queue.write().await.pop_front())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.queue.read().await.len())
    }
}

/// Redis-backed queue backend for production use.
pub struct RedisQueueBackend {
    client: redis::Client,
    queue_key: String,
}

impl RedisQueueBackend {
    /// Create a new Redis queue backend over the given list key.
    pub fn new(client: redis::Client, queue_key: impl Into<String>) -> Self {
        Self {
            client,
            queue_key: queue_key.into(),
        }
    }

    /// Obtain an async multiplexed connection from the Redis client.
    async fn get_conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                SiftError::with_internal(
                    ErrorCode::QueueUnavailable,
                    "Failed to get Redis connection for job queue",
                    e.to_string(),
                )
            })
    }
}

#[async_trait]
impl EvaluationQueue for RedisQueueBackend {
    async fn enqueue(&self, job: EvaluationJob) -> Result<()> {
        let serialized = serde_json::to_string(&job)?;

        let mut conn = self.get_conn().await?;
        redis::cmd("RPUSH")
            .arg(&self.queue_key)
            .arg(&serialized)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| {
                SiftError::with_internal(
                    ErrorCode::QueueError,
                    "Failed to enqueue job to Redis",
                    e.to_string(),
                )
            })?;

        tracing::debug!(
            queue = %self.queue_key,
            evaluation_id = %job.evaluation_id,
            "Evaluation job enqueued"
        );
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<EvaluationJob>> {
        let mut conn = self.get_conn().await?;

        // BLPOP with a 5-second timeout so we don't block indefinitely
        let result: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.queue_key)
            .arg(5_u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                SiftError::with_internal(
                    ErrorCode::QueueError,
                    "Failed to dequeue job from Redis",
                    e.to_string(),
                )
            })?;

        match result {
            Some((_key, value)) => {
                let job: EvaluationJob = serde_json::from_str(&value)?;
                tracing::debug!(
                    queue = %self.queue_key,
                    evaluation_id = %job.evaluation_id,
                    "Evaluation job dequeued"
                );
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.get_conn().await?;
        let length: usize = redis::cmd("LLEN")
            .arg(&self.queue_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                SiftError::with_internal(
                    ErrorCode::QueueError,
                    "Failed to get Redis queue length",
                    e.to_string(),
                )
            })?;

        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_queue_round_trip() {
        let queue = InMemoryQueueBackend::new();
        let id = Uuid::now_v7();

        queue.enqueue(EvaluationJob::new(id)).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);

        let job = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(job.evaluation_id, id);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_queue_is_fifo() {
        let queue = InMemoryQueueBackend::new();
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();

        queue.enqueue(EvaluationJob::new(first)).await.unwrap();
        queue.enqueue(EvaluationJob::new(second)).await.unwrap();

        assert_eq!(queue.dequeue().await.unwrap().unwrap().evaluation_id, first);
        assert_eq!(queue.dequeue().await.unwrap().unwrap().evaluation_id, second);
        assert!(queue.dequeue().await.unwrap().is_none());
    }
}
