//! Asynchronous evaluation jobs.
//!
//! Submission and execution are decoupled: the HTTP layer creates a queued
//! evaluation row and pushes its ID onto the queue; a worker process drains
//! the queue and runs the pipeline. Queue backends mirror the rate limiter's
//! split, in-memory for development and Redis for real deployments.

pub mod pipeline;
pub mod queue;
pub mod worker;

pub use pipeline::{EvaluationInput, EvaluationPipeline};
pub use queue::{
    EvaluationJob, EvaluationQueue, InMemoryQueueBackend, RedisQueueBackend, DEFAULT_QUEUE_KEY,
};
pub use worker::{EvaluationWorker, WorkerConfig, WorkerDeps, WorkerHandle, WorkerStats};
