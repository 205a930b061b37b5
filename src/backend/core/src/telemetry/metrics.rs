//! Prometheus metrics.
//!
//! Installs the global recorder and keeps the handle used to render the
//! `/metrics` endpoint. Counters themselves are emitted at the point of use
//! via the `metrics` macros.

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Handle for rendering collected metrics.
///
/// A disabled handle renders an empty body, which keeps tests that build the
/// full router from fighting over the process-global recorder.
#[derive(Clone)]
pub struct MetricsHandle {
    inner: Option<PrometheusHandle>,
}

impl MetricsHandle {
    /// Handle that records nothing and renders an empty exposition.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.inner
            .as_ref()
            .map(|handle| handle.render())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHandle")
            .field("enabled", &self.inner.is_some())
            .finish()
    }
}

/// Install the Prometheus recorder and register metric descriptions.
pub fn init_metrics() -> anyhow::Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!("sift_errors_total", "Total errors by code and category");
    describe_counter!(
        "sift_rate_limit_rejected_total",
        "Requests denied by the rate limiter, by path"
    );
    describe_counter!(
        "sift_rate_limit_store_errors_total",
        "Rate limit store failures while configured fail-closed"
    );
    describe_counter!(
        "sift_evaluations_processed_total",
        "Evaluation jobs processed by the worker, by outcome"
    );

    Ok(MetricsHandle {
        inner: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_handle_renders_empty() {
        let handle = MetricsHandle::disabled();
        assert_eq!(handle.render(), "");
    }
}
