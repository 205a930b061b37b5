//! Structured logging with JSON and pretty formats.
//!
//! JSON output is the production default; flipping `logging.json` off gives
//! a human-readable format for local development. The level string accepts
//! full `EnvFilter` directives, so per-module levels like
//! `info,sift_core::ratelimit=debug` work.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Initialize the tracing subscriber.
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&settings.level)?;

    if settings.json {
        let fmt_layer = fmt::layer().json().with_target(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer().pretty().with_target(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
