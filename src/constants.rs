//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables (see [`crate::config::ControllerConfig`]).

/// API group of the `CloudSecret` custom resource
pub const API_GROUP: &str = "secrets.cloudsecret.dev";

/// Field manager / controller name reported to the Kubernetes API
pub const CONTROLLER_NAME: &str = "cloudsecret-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default sync period applied when a `CloudSecret` omits `syncPeriod` (seconds)
pub const DEFAULT_SYNC_PERIOD_SECS: u64 = 60;

/// Requeue floor used after a cycle in which at least one reference failed to resolve (seconds)
///
/// A cycle with failures is retried after this interval when the resource's
/// sync period is longer. It never lengthens a shorter sync period.
pub const DEFAULT_RETRY_FLOOR_SECS: u64 = 5;

/// Default Fibonacci backoff starting value for store errors (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff ceiling for store errors (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default GCP Secret Manager REST endpoint
pub const DEFAULT_GCP_SECRET_MANAGER_ENDPOINT: &str = "https://secretmanager.googleapis.com";

/// GCE/GKE metadata server token endpoint (Workload Identity)
pub const GCP_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Default number of attempts the GCP resolver makes for transient failures
pub const DEFAULT_RESOLVER_MAX_ATTEMPTS: u32 = 3;

/// Default per-request timeout of the GCP resolver (seconds)
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 30;

/// Base delay between resolver retry attempts (milliseconds), doubled per attempt
pub const RESOLVER_RETRY_BASE_DELAY_MS: u64 = 200;

/// Refresh cached access tokens this long before they expire (seconds)
pub const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;
