#![allow(clippy::result_large_err)]
//! # Sift Core
//!
//! Backend for an AI-assisted candidate screening service: applicants upload
//! a CV and a project report, evaluations are queued for asynchronous
//! processing, and results are fetched once a worker completes them.
//!
//! ## Architecture
//!
//! - **Rate Limiting**: Sliding-window limiter with in-memory and Redis
//!   stores, applied globally as a Tower layer and per-route as a guard
//! - **API**: Axum handlers for upload, evaluation submission, and results
//! - **Jobs**: Redis-backed queue plus a concurrency-bounded worker driving
//!   the evaluation pipeline
//! - **Storage**: Validated PDF persistence with generated filenames
//! - **Telemetry**: Structured logging and Prometheus metrics

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod ratelimit;
pub mod repositories;
pub mod storage;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result, SiftError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{build_router, AppState};
    pub use crate::config::Config;
    pub use crate::db::{Database, DocumentType, EvaluationStatus};
    pub use crate::error::{ErrorCode, ErrorContext, Result, SiftError};
    pub use crate::jobs::{
        EvaluationJob, EvaluationPipeline, EvaluationQueue, EvaluationWorker, WorkerConfig,
    };
    pub use crate::ratelimit::{
        Admission, InMemoryRateLimiter, RateLimitConfig, RateLimitError, RateLimitLayer,
        RateLimiterBackend, RedisRateLimiter, RouteRateLimit,
    };
    pub use crate::repositories::{DocumentRepository, EvaluationRepository, EvaluationResult};
    pub use crate::storage::UploadStore;
}
