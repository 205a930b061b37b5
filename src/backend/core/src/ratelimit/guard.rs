//! Per-endpoint admission gate.
//!
//! Applies a stricter, route-specific budget independently of the global
//! middleware. Handlers call [`RouteRateLimit::admit`] as a guard clause at
//! the top; the returned grant stamps quota headers onto the successful
//! response, while a rejection renders the 429 (or 503 under fail-closed)
//! directly.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use metrics::counter;
use std::{net::SocketAddr, sync::Arc};
use tracing::warn;

use super::backend::{RateLimitError, RateLimiterBackend};
use super::middleware::extract_client_key;
use crate::error::SiftError;

/// Route-level rate limiter handed to handlers through application state.
#[derive(Clone)]
pub struct RouteRateLimit {
    backend: Arc<dyn RateLimiterBackend>,
    limit: u32,
    window_secs: u64,
    fail_open: bool,
}

impl std::fmt::Debug for RouteRateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRateLimit")
            .field("limit", &self.limit)
            .field("window_secs", &self.window_secs)
            .field("fail_open", &self.fail_open)
            .finish_non_exhaustive()
    }
}

impl RouteRateLimit {
    /// Create a route guard. Zero limits and zero windows are configuration
    /// mistakes and are rejected up front rather than silently denying or
    /// admitting everything.
    pub fn new(
        backend: Arc<dyn RateLimiterBackend>,
        limit: u32,
        window_secs: u64,
    ) -> Result<Self, RateLimitError> {
        if limit == 0 {
            return Err(RateLimitError::Config(
                "limit must be greater than zero".to_string(),
            ));
        }
        if window_secs == 0 {
            return Err(RateLimitError::Config(
                "window must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            backend,
            limit,
            window_secs,
            fail_open: true,
        })
    }

    /// Set the store-outage policy.
    pub fn fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    /// Check the caller against this route's budget.
    ///
    /// Returns a [`QuotaGrant`] on admission. When the store is down and the
    /// guard is fail-open, the request is admitted with a degraded grant that
    /// stamps no headers.
    pub async fn admit(
        &self,
        headers: &HeaderMap,
        remote_addr: Option<SocketAddr>,
    ) -> Result<QuotaGrant, RouteRateLimited> {
        let key = extract_client_key(headers, remote_addr);

        match self
            .backend
            .is_allowed(&key, self.limit, self.window_secs)
            .await
        {
            Ok(admission) if admission.allowed => {
                let remaining = match self.backend.get_remaining(&key, self.limit).await {
                    Ok(remaining) => Some(remaining),
                    Err(e) => {
                        warn!(error = %e, "Failed to read remaining route budget");
                        None
                    }
                };

                Ok(QuotaGrant {
                    limit: self.limit,
                    remaining,
                    window_secs: self.window_secs,
                    degraded: false,
                })
            }
            Ok(admission) => {
                counter!("sift_rate_limit_rejected_total", "path" => "route_guard")
                    .increment(1);

                Err(RouteRateLimited::Denied {
                    limit: self.limit,
                    retry_after_secs: admission.retry_after_secs.unwrap_or(self.window_secs),
                })
            }
            Err(RateLimitError::Store(e)) if self.fail_open => {
                warn!(
                    error = %e,
                    "Rate limit store unavailable, admitting request unchecked"
                );
                Ok(QuotaGrant {
                    limit: self.limit,
                    remaining: None,
                    window_secs: self.window_secs,
                    degraded: true,
                })
            }
            Err(e) => Err(RouteRateLimited::StoreUnavailable(
                SiftError::rate_limit_store_unavailable(e.to_string()),
            )),
        }
    }
}

/// Quota headers for an admitted request.
#[derive(Debug, Clone)]
pub struct QuotaGrant {
    limit: u32,
    remaining: Option<u32>,
    window_secs: u64,
    degraded: bool,
}

impl QuotaGrant {
    /// Stamp quota headers onto a response. No-op for degraded grants, where
    /// the real budget is unknown.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if self.degraded {
            return;
        }

        headers.insert(
            "X-RateLimit-Limit",
            HeaderValue::from_str(&self.limit.to_string()).unwrap(),
        );
        if let Some(remaining) = self.remaining {
            headers.insert(
                "X-RateLimit-Remaining",
                HeaderValue::from_str(&remaining.to_string()).unwrap(),
            );
        }
        headers.insert(
            "X-RateLimit-Window",
            HeaderValue::from_str(&self.window_secs.to_string()).unwrap(),
        );
    }
}

/// Rejection from a route guard.
#[derive(Debug)]
pub enum RouteRateLimited {
    /// Budget exhausted
    Denied { limit: u32, retry_after_secs: u64 },

    /// Store down while configured fail-closed
    StoreUnavailable(SiftError),
}

impl IntoResponse for RouteRateLimited {
    fn into_response(self) -> Response {
        match self {
            Self::Denied {
                limit,
                retry_after_secs,
            } => {
                let mut headers = HeaderMap::new();
                headers.insert(
                    "X-RateLimit-Limit",
                    HeaderValue::from_str(&limit.to_string()).unwrap(),
                );
                headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
                headers.insert(
                    "Retry-After",
                    HeaderValue::from_str(&retry_after_secs.to_string()).unwrap(),
                );

                let body = serde_json::json!({ "detail": "Rate limit exceeded" });

                (StatusCode::TOO_MANY_REQUESTS, headers, axum::Json(body)).into_response()
            }
            Self::StoreUnavailable(error) => error.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::memory::InMemoryRateLimiter;

    fn backend() -> Arc<InMemoryRateLimiter> {
        Arc::new(InMemoryRateLimiter::new())
    }

    #[test]
    fn test_zero_limit_is_config_error() {
        let err = RouteRateLimit::new(backend(), 0, 60).unwrap_err();
        assert!(matches!(err, RateLimitError::Config(_)));
    }

    #[test]
    fn test_zero_window_is_config_error() {
        let err = RouteRateLimit::new(backend(), 10, 0).unwrap_err();
        assert!(matches!(err, RateLimitError::Config(_)));
    }

    #[tokio::test]
    async fn test_admit_grants_then_denies() {
        let guard = RouteRateLimit::new(backend(), 2, 60).unwrap();
        let headers = HeaderMap::new();

        let grant = guard.admit(&headers, None).await.unwrap();
        let mut response_headers = HeaderMap::new();
        grant.apply(&mut response_headers);
        assert_eq!(response_headers.get("X-RateLimit-Limit").unwrap(), "2");
        assert_eq!(response_headers.get("X-RateLimit-Remaining").unwrap(), "1");
        assert_eq!(response_headers.get("X-RateLimit-Window").unwrap(), "60");

        guard.admit(&headers, None).await.unwrap();

        let rejection = guard.admit(&headers, None).await.unwrap_err();
        match rejection {
            RouteRateLimited::Denied {
                limit,
                retry_after_secs,
            } => {
                assert_eq!(limit, 2);
                assert!(retry_after_secs > 0 && retry_after_secs <= 61);
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_denial_renders_429_with_headers() {
        let rejection = RouteRateLimited::Denied {
            limit: 5,
            retry_after_secs: 30,
        };

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "5");
        assert_eq!(
            response.headers().get("X-RateLimit-Remaining").unwrap(),
            "0"
        );
        assert_eq!(response.headers().get("Retry-After").unwrap(), "30");
    }

    #[tokio::test]
    async fn test_separate_clients_have_separate_budgets() {
        let guard = RouteRateLimit::new(backend(), 1, 60).unwrap();

        let mut headers_a = HeaderMap::new();
        headers_a.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.1"));
        let mut headers_b = HeaderMap::new();
        headers_b.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.2"));

        assert!(guard.admit(&headers_a, None).await.is_ok());
        assert!(guard.admit(&headers_a, None).await.is_err());
        assert!(guard.admit(&headers_b, None).await.is_ok());
    }
}
