//! End-to-end tests for rate limiting through a real router.
//!
//! Tests cover:
//! - Quota headers on admitted requests
//! - 429 denial shape once the budget is exhausted
//! - Excluded path bypass
//! - Per-client isolation
//! - The per-route guard used by the evaluation endpoint
//! - Store-outage policy (fail-open vs fail-closed)

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use sift_core::ratelimit::{
    Admission, InMemoryRateLimiter, RateLimitConfig, RateLimitError, RateLimitLayer,
    RateLimiterBackend, RouteRateLimit,
};
use std::sync::Arc;
use tower::ServiceExt;

fn app(limit: u32, exclude_paths: Vec<String>) -> Router {
    let backend = Arc::new(InMemoryRateLimiter::new());
    let config = RateLimitConfig {
        limit,
        window_secs: 60,
        exclude_paths,
        fail_open: true,
    };

    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/health", get(|| async { "ok" }))
        .layer(RateLimitLayer::new(backend, config))
}

async fn send(app: &Router, path: &str, client: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(path)
                .header("X-Forwarded-For", client)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Global Middleware
// ============================================================================

#[tokio::test]
async fn test_admitted_request_carries_quota_headers() {
    let app = app(2, vec![]);

    let response = send(&app, "/ping", "203.0.113.1").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "2");
    assert_eq!(
        response.headers().get("X-RateLimit-Remaining").unwrap(),
        "1"
    );
    assert_eq!(response.headers().get("X-RateLimit-Window").unwrap(), "60");
}

#[tokio::test]
async fn test_request_over_budget_gets_429() {
    let app = app(2, vec![]);

    send(&app, "/ping", "203.0.113.2").await;
    send(&app, "/ping", "203.0.113.2").await;
    let response = send(&app, "/ping", "203.0.113.2").await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "2");
    assert_eq!(
        response.headers().get("X-RateLimit-Remaining").unwrap(),
        "0"
    );
    assert!(response.headers().contains_key("Retry-After"));
    assert!(response.headers().contains_key("X-RateLimit-Reset"));

    let body = body_json(response).await;
    assert_eq!(body["detail"], "Rate limit exceeded");
    let retry_after = body["retry_after"].as_u64().unwrap();
    assert!(retry_after >= 1 && retry_after <= 61);
}

#[tokio::test]
async fn test_denied_request_does_not_consume_budget() {
    let app = app(1, vec![]);

    send(&app, "/ping", "203.0.113.3").await;

    // Hammer the denied path; the single recorded request still expires on
    // its original schedule, so the denial count must stay stable.
    for _ in 0..5 {
        let response = send(&app, "/ping", "203.0.113.3").await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert!(body["retry_after"].as_u64().unwrap() <= 61);
    }
}

#[tokio::test]
async fn test_excluded_path_bypasses_limiter() {
    let app = app(1, vec!["/health".to_string()]);

    for _ in 0..5 {
        let response = send(&app, "/health", "203.0.113.4").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key("X-RateLimit-Limit"));
    }

    // The budget was untouched by the excluded traffic.
    let response = send(&app, "/ping", "203.0.113.4").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let app = app(1, vec![]);

    assert_eq!(
        send(&app, "/ping", "203.0.113.5").await.status(),
        StatusCode::OK
    );
    assert_eq!(
        send(&app, "/ping", "203.0.113.5").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        send(&app, "/ping", "203.0.113.6").await.status(),
        StatusCode::OK
    );
}

// ============================================================================
// Route Guard
// ============================================================================

async fn guarded(State(guard): State<RouteRateLimit>, headers: HeaderMap) -> Response {
    match guard.admit(&headers, None).await {
        Ok(grant) => {
            let mut response = StatusCode::OK.into_response();
            grant.apply(response.headers_mut());
            response
        }
        Err(rejection) => rejection.into_response(),
    }
}

fn guarded_app(limit: u32) -> Router {
    let backend = Arc::new(InMemoryRateLimiter::new());
    let guard = RouteRateLimit::new(backend, limit, 60).unwrap();

    Router::new()
        .route("/evaluate", post(guarded))
        .with_state(guard)
}

async fn post_evaluate(app: &Router, client: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/evaluate")
                .header("X-Forwarded-For", client)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_guard_stamps_quota_on_success() {
    let app = guarded_app(3);

    let response = post_evaluate(&app, "203.0.113.7").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "3");
    assert_eq!(
        response.headers().get("X-RateLimit-Remaining").unwrap(),
        "2"
    );
    assert_eq!(response.headers().get("X-RateLimit-Window").unwrap(), "60");
}

#[tokio::test]
async fn test_guard_denial_shape() {
    let app = guarded_app(1);

    post_evaluate(&app, "203.0.113.8").await;
    let response = post_evaluate(&app, "203.0.113.8").await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "1");
    assert_eq!(
        response.headers().get("X-RateLimit-Remaining").unwrap(),
        "0"
    );
    assert!(response.headers().contains_key("Retry-After"));
    // The route guard denial carries no reset header, unlike the middleware.
    assert!(!response.headers().contains_key("X-RateLimit-Reset"));

    let body = body_json(response).await;
    assert_eq!(body["detail"], "Rate limit exceeded");
    assert!(body.get("retry_after").is_none());
}

// ============================================================================
// Store Outage Policy
// ============================================================================

/// Backend standing in for an unreachable store: every call fails the way a
/// Redis connection refusal would.
struct UnreachableStore;

fn store_down() -> RateLimitError {
    RateLimitError::Store(redis::RedisError::from(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    )))
}

#[async_trait::async_trait]
impl RateLimiterBackend for UnreachableStore {
    async fn is_allowed(
        &self,
        _key: &str,
        _limit: u32,
        _window_secs: u64,
    ) -> Result<Admission, RateLimitError> {
        Err(store_down())
    }

    async fn reset(&self, _key: &str) -> Result<(), RateLimitError> {
        Err(store_down())
    }

    async fn get_remaining(&self, _key: &str, _limit: u32) -> Result<u32, RateLimitError> {
        Err(store_down())
    }
}

fn outage_app(fail_open: bool) -> Router {
    let config = RateLimitConfig {
        limit: 5,
        window_secs: 60,
        exclude_paths: vec![],
        fail_open,
    };

    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .layer(RateLimitLayer::new(Arc::new(UnreachableStore), config))
}

fn outage_guard_app(fail_open: bool) -> Router {
    let guard = RouteRateLimit::new(Arc::new(UnreachableStore), 3, 60)
        .unwrap()
        .fail_open(fail_open);

    Router::new()
        .route("/evaluate", post(guarded))
        .with_state(guard)
}

#[tokio::test]
async fn test_middleware_fails_open_without_quota_headers() {
    let app = outage_app(true);

    // Unchecked admission; no quota headers, since the real budget is unknown.
    for _ in 0..10 {
        let response = send(&app, "/ping", "203.0.113.10").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key("X-RateLimit-Limit"));
        assert!(!response.headers().contains_key("X-RateLimit-Remaining"));
        assert!(!response.headers().contains_key("X-RateLimit-Window"));
    }
}

#[tokio::test]
async fn test_middleware_fails_closed_with_503() {
    let app = outage_app(false);

    let response = send(&app, "/ping", "203.0.113.11").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_guard_fails_open_with_degraded_grant() {
    let app = outage_guard_app(true);

    let response = post_evaluate(&app, "203.0.113.12").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("X-RateLimit-Limit"));
    assert!(!response.headers().contains_key("X-RateLimit-Remaining"));
    assert!(!response.headers().contains_key("X-RateLimit-Window"));
}

#[tokio::test]
async fn test_guard_fails_closed_with_503() {
    let app = outage_guard_app(false);

    let response = post_evaluate(&app, "203.0.113.13").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_guard_and_middleware_budgets_are_independent_keys() {
    // The server wires the guard and the middleware onto separate stores;
    // exhausting the route budget must leave the global budget untouched.
    let shared_client = "203.0.113.9";

    let middleware_app = app(5, vec![]);
    let guard_app = guarded_app(1);

    post_evaluate(&guard_app, shared_client).await;
    let denied = post_evaluate(&guard_app, shared_client).await;
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = send(&middleware_app, "/ping", shared_client).await;
    assert_eq!(response.status(), StatusCode::OK);
}
