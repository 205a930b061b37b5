//! Rate limiting middleware.
//!
//! Tower layer applying the global per-client budget in front of the
//! router. The backend is injected as a trait object so the same layer
//! works against the in-memory and Redis stores.
//!
//! # Example
//!
//! ```rust,ignore
//! use sift_core::ratelimit::{InMemoryRateLimiter, RateLimitConfig, RateLimitLayer};
//!
//! let backend = Arc::new(InMemoryRateLimiter::new());
//! let app = Router::new()
//!     .route("/evaluate", post(submit_evaluation))
//!     .layer(RateLimitLayer::new(backend, RateLimitConfig::default()));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use metrics::counter;
use std::{
    net::SocketAddr,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

use super::backend::{RateLimitError, RateLimiterBackend};
use crate::error::SiftError;

/// Function extracting the rate limit key from a request.
pub type KeyExtractor = Arc<dyn Fn(&HeaderMap, Option<SocketAddr>) -> String + Send + Sync>;

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Middleware-level rate limit configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per client per window
    pub limit: u32,

    /// Sliding window length in seconds
    pub window_secs: u64,

    /// Path prefixes that bypass the limiter entirely
    pub exclude_paths: Vec<String>,

    /// Forward requests unchecked when the store is down; false returns 503
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window_secs: 60,
            exclude_paths: Vec::new(),
            fail_open: true,
        }
    }
}

impl RateLimitConfig {
    fn is_excluded(&self, path: &str) -> bool {
        self.exclude_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Client Key Extraction
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract the rate limit key for a request.
///
/// Prefers the first entry of X-Forwarded-For (the originating client when
/// the service sits behind a proxy), then the peer address, then a shared
/// "unknown" bucket.
pub fn extract_client_key(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("X-Forwarded-For") {
        if let Ok(value) = forwarded.to_str() {
            let first = value.split(',').next().unwrap_or(value).trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Denial Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Build the 429 response for a denied request.
pub(crate) fn rate_limited_response(limit: u32, retry_after_secs: u64) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from_str(&limit.to_string()).unwrap(),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&retry_after_secs.to_string()).unwrap(),
    );
    headers.insert(
        "Retry-After",
        HeaderValue::from_str(&retry_after_secs.to_string()).unwrap(),
    );

    let body = serde_json::json!({
        "detail": "Rate limit exceeded",
        "retry_after": retry_after_secs,
    });

    (StatusCode::TOO_MANY_REQUESTS, headers, axum::Json(body)).into_response()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Rate limiting layer for Tower.
#[derive(Clone)]
pub struct RateLimitLayer {
    backend: Arc<dyn RateLimiterBackend>,
    config: Arc<RateLimitConfig>,
    key_fn: KeyExtractor,
}

impl RateLimitLayer {
    /// Create a new rate limit layer with the default key extractor.
    pub fn new(backend: Arc<dyn RateLimiterBackend>, config: RateLimitConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            key_fn: Arc::new(extract_client_key),
        }
    }

    /// Replace the key extractor.
    pub fn with_key_fn(mut self, key_fn: KeyExtractor) -> Self {
        self.key_fn = key_fn;
        self
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            backend: self.backend.clone(),
            config: self.config.clone(),
            key_fn: self.key_fn.clone(),
        }
    }
}

/// Rate limiting service.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    backend: Arc<dyn RateLimiterBackend>,
    config: Arc<RateLimitConfig>,
    key_fn: KeyExtractor,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let backend = self.backend.clone();
        let config = self.config.clone();
        let key_fn = self.key_fn.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = request.uri().path().to_string();
            if config.is_excluded(&path) {
                return inner.call(request).await;
            }

            let remote_addr = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0);
            let key = key_fn(request.headers(), remote_addr);

            match backend.is_allowed(&key, config.limit, config.window_secs).await {
                Ok(admission) if admission.allowed => {
                    // Post-admission count, so the budget consumed by this
                    // request is already reflected.
                    let remaining = match backend.get_remaining(&key, config.limit).await {
                        Ok(remaining) => Some(remaining),
                        Err(e) => {
                            warn!(error = %e, "Failed to read remaining budget");
                            None
                        }
                    };

                    let mut response = inner.call(request).await?;

                    let headers = response.headers_mut();
                    headers.insert(
                        "X-RateLimit-Limit",
                        HeaderValue::from_str(&config.limit.to_string()).unwrap(),
                    );
                    if let Some(remaining) = remaining {
                        headers.insert(
                            "X-RateLimit-Remaining",
                            HeaderValue::from_str(&remaining.to_string()).unwrap(),
                        );
                    }
                    headers.insert(
                        "X-RateLimit-Window",
                        HeaderValue::from_str(&config.window_secs.to_string()).unwrap(),
                    );

                    Ok(response)
                }
                Ok(admission) => {
                    counter!(
                        "sift_rate_limit_rejected_total",
                        "path" => path
                    )
                    .increment(1);

                    Ok(rate_limited_response(
                        config.limit,
                        admission.retry_after_secs.unwrap_or(config.window_secs),
                    ))
                }
                Err(RateLimitError::Store(e)) if config.fail_open => {
                    warn!(
                        error = %e,
                        "Rate limit store unavailable, forwarding request unchecked"
                    );
                    inner.call(request).await
                }
                Err(e) => {
                    counter!("sift_rate_limit_store_errors_total").increment(1);
                    Ok(SiftError::rate_limit_store_unavailable(e.to_string()).into_response())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_key_prefers_forwarded_for() {
        let headers = headers_with("X-Forwarded-For", "203.0.113.9, 10.0.0.1");
        let addr: SocketAddr = "127.0.0.1:4444".parse().unwrap();

        assert_eq!(extract_client_key(&headers, Some(addr)), "203.0.113.9");
    }

    #[test]
    fn test_key_falls_back_to_peer_addr() {
        let addr: SocketAddr = "192.0.2.4:5000".parse().unwrap();
        assert_eq!(extract_client_key(&HeaderMap::new(), Some(addr)), "192.0.2.4");
    }

    #[test]
    fn test_key_unknown_without_any_source() {
        assert_eq!(extract_client_key(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_exclusion_matches_prefixes() {
        let config = RateLimitConfig {
            exclude_paths: vec!["/health".to_string(), "/metrics".to_string()],
            ..Default::default()
        };

        assert!(config.is_excluded("/health"));
        assert!(config.is_excluded("/health/live"));
        assert!(config.is_excluded("/metrics"));
        assert!(!config.is_excluded("/evaluate"));
    }

    #[test]
    fn test_denial_response_shape() {
        let response = rate_limited_response(60, 12);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get("X-RateLimit-Remaining").unwrap(),
            "0"
        );
        assert_eq!(response.headers().get("Retry-After").unwrap(), "12");
        assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "60");
    }
}
