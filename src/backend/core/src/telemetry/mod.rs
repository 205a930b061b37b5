//! Telemetry: structured logging and Prometheus metrics.
//!
//! # Example
//!
//! ```rust,no_run
//! use sift_core::config::LoggingSettings;
//! use sift_core::telemetry::init_telemetry;
//!
//! let metrics = init_telemetry(&LoggingSettings::default()).expect("telemetry init");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init_metrics, MetricsHandle};

use crate::config::LoggingSettings;

/// Initialize logging and metrics. Call once at startup.
///
/// Returns the metrics handle used to render the `/metrics` endpoint.
pub fn init_telemetry(logging: &LoggingSettings) -> anyhow::Result<MetricsHandle> {
    let handle = init_metrics()?;
    init_logging(logging)?;
    Ok(handle)
}
