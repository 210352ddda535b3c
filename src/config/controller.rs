//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_ERROR_BACKOFF_MAX_SECS, DEFAULT_ERROR_BACKOFF_MIN_SECS,
    DEFAULT_GCP_SECRET_MANAGER_ENDPOINT, DEFAULT_METRICS_PORT, DEFAULT_RESOLVER_MAX_ATTEMPTS,
    DEFAULT_RESOLVER_TIMEOUT_SECS, DEFAULT_RETRY_FLOOR_SECS, DEFAULT_SERVER_POLL_INTERVAL_MS,
    DEFAULT_SERVER_STARTUP_TIMEOUT_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::str::FromStr;
use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line (default, for log aggregation)
    #[default]
    Json,
    /// Human readable text
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "plain" | "pretty" => Ok(Self::Text),
            other => Err(format!("unsupported log format: {other}")),
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port of the metrics/probe HTTP server
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// Readiness poll interval while waiting for the HTTP server (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Log output format
    pub log_format: LogFormat,
    /// Restrict the watch to a single namespace (cluster-wide when `None`)
    pub watch_namespace: Option<String>,
    /// Requeue floor after a cycle with resolution failures (seconds)
    pub retry_floor_secs: u64,
    /// First delay of the store-error Fibonacci backoff (seconds)
    pub error_backoff_min_secs: u64,
    /// Ceiling of the store-error Fibonacci backoff (seconds)
    pub error_backoff_max_secs: u64,
    /// Delay before the watch stream is restarted after it ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// GCP Secret Manager REST endpoint
    pub gcp_endpoint: String,
    /// Attempts per reference before the resolver gives up on transient failures
    pub resolver_max_attempts: u32,
    /// Per-request timeout of the resolver HTTP client (seconds)
    pub resolver_timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            log_format: LogFormat::Json,
            watch_namespace: None,
            retry_floor_secs: DEFAULT_RETRY_FLOOR_SECS,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            gcp_endpoint: DEFAULT_GCP_SECRET_MANAGER_ENDPOINT.to_string(),
            resolver_max_attempts: DEFAULT_RESOLVER_MAX_ATTEMPTS,
            resolver_timeout_secs: DEFAULT_RESOLVER_TIMEOUT_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            metrics_port: parsed_or(&lookup, "METRICS_PORT", defaults.metrics_port),
            server_startup_timeout_secs: parsed_or(
                &lookup,
                "SERVER_STARTUP_TIMEOUT_SECS",
                defaults.server_startup_timeout_secs,
            ),
            server_poll_interval_ms: parsed_or(
                &lookup,
                "SERVER_POLL_INTERVAL_MS",
                defaults.server_poll_interval_ms,
            ),
            log_format: parsed_or(&lookup, "LOG_FORMAT", defaults.log_format),
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty()),
            retry_floor_secs: parsed_or(&lookup, "RETRY_FLOOR_SECS", defaults.retry_floor_secs)
                .max(1),
            error_backoff_min_secs: parsed_or(
                &lookup,
                "ERROR_BACKOFF_MIN_SECS",
                defaults.error_backoff_min_secs,
            ),
            error_backoff_max_secs: parsed_or(
                &lookup,
                "ERROR_BACKOFF_MAX_SECS",
                defaults.error_backoff_max_secs,
            ),
            watch_restart_delay_secs: parsed_or(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            gcp_endpoint: lookup("GCP_SECRET_MANAGER_ENDPOINT")
                .map(|endpoint| endpoint.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gcp_endpoint),
            resolver_max_attempts: parsed_or(
                &lookup,
                "RESOLVER_MAX_ATTEMPTS",
                defaults.resolver_max_attempts,
            )
            .max(1),
            resolver_timeout_secs: parsed_or(
                &lookup,
                "RESOLVER_TIMEOUT_SECS",
                defaults.resolver_timeout_secs,
            ),
        }
    }

    /// Requeue floor applied after partial resolution failures, at least one second
    #[must_use]
    pub fn retry_floor(&self) -> Duration {
        Duration::from_secs(self.retry_floor_secs.max(1))
    }

    /// Per-request timeout of the resolver HTTP client
    #[must_use]
    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver_timeout_secs)
    }

    /// Delay before restarting an ended watch stream
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read a key and parse it, or return the default value
fn parsed_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = ControllerConfig::from_lookup(|_| None);
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(config.retry_floor(), Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.watch_namespace.is_none());
        assert_eq!(config.gcp_endpoint, DEFAULT_GCP_SECRET_MANAGER_ENDPOINT);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("METRICS_PORT", "9090"),
            ("LOG_FORMAT", "TEXT"),
            ("WATCH_NAMESPACE", "team-a"),
            ("RETRY_FLOOR_SECS", "10"),
            ("GCP_SECRET_MANAGER_ENDPOINT", "http://localhost:1234/"),
        ]));
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.watch_namespace.as_deref(), Some("team-a"));
        assert_eq!(config.retry_floor(), Duration::from_secs(10));
        assert_eq!(config.gcp_endpoint, "http://localhost:1234");
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("METRICS_PORT", "not-a-port"),
            ("LOG_FORMAT", "xml"),
            ("WATCH_NAMESPACE", "  "),
            ("RESOLVER_MAX_ATTEMPTS", "0"),
        ]));
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.watch_namespace.is_none());
        // At least one attempt is always made
        assert_eq!(config.resolver_max_attempts, 1);
    }

    #[test]
    fn test_zero_retry_floor_is_raised_to_one_second() {
        let config = ControllerConfig::from_lookup(lookup_from(&[("RETRY_FLOOR_SECS", "0")]));
        assert_eq!(config.retry_floor_secs, 1);
        assert_eq!(config.retry_floor(), Duration::from_secs(1));

        let direct = ControllerConfig {
            retry_floor_secs: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(direct.retry_floor(), Duration::from_secs(1));
    }
}
