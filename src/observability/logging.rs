//! # Logging
//!
//! Tracing subscriber setup for the controller binary.
//!
//! The filter comes from `RUST_LOG` when set and defaults to
//! `cloudsecret_controller=info`; the output format comes from
//! [`LogFormat`](crate::config::LogFormat).

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "cloudsecret_controller=info,kube_runtime=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Install the global tracing subscriber
///
/// # Errors
/// Fails if a global subscriber has already been installed.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    match format {
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
