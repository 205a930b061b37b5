//! HTTP API for Sift.
//!
//! Routes:
//!
//! - `POST /upload` - multipart CV + project report upload
//! - `POST /evaluate` - queue an evaluation (guarded by a stricter budget)
//! - `GET /result/:id` - evaluation status and results
//! - `GET /health` - liveness and rate limit summary
//! - `GET /metrics` - Prometheus metrics
//!
//! The global rate limiter is a Tower layer applied in [`build_router`] when
//! enabled; the `/evaluate` budget is enforced inside the handler through
//! [`RouteRateLimit`] carried in [`AppState`].

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RateLimitSettings;
use crate::jobs::EvaluationQueue;
use crate::ratelimit::{RateLimitConfig, RateLimitLayer, RateLimiterBackend, RouteRateLimit};
use crate::repositories::{DocumentRepository, EvaluationRepository};
use crate::storage::UploadStore;
use crate::telemetry::MetricsHandle;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentRepository,
    pub evaluations: EvaluationRepository,
    pub upload_store: UploadStore,
    pub queue: Arc<dyn EvaluationQueue>,
    pub evaluate_guard: RouteRateLimit,
    pub rate_limit: RateLimitSettings,
    pub metrics: MetricsHandle,
}

/// Build the API router.
///
/// When a limiter backend is supplied, the global budget wraps every route
/// except the configured exclusions; `/evaluate` additionally passes through
/// its own stricter guard inside the handler.
pub fn build_router(state: AppState, limiter: Option<Arc<dyn RateLimiterBackend>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/upload", post(handlers::upload_documents))
        .route("/evaluate", post(handlers::submit_evaluation))
        .route("/result/:id", get(handlers::get_result))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics));

    if let Some(backend) = limiter {
        let config = RateLimitConfig {
            limit: state.rate_limit.requests_per_minute,
            window_secs: state.rate_limit.window_secs,
            exclude_paths: state.rate_limit.exclude_paths.clone(),
            fail_open: state.rate_limit.fail_open,
        };
        router = router.layer(RateLimitLayer::new(backend, config));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
