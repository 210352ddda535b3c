//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::CloudSecret;
use crate::observability::metrics;
use kube_runtime::controller::Action;
use kube_runtime::reflector::ObjectRef;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing resource does not
/// slow down the others. It is reset by the next successful reconcile.
pub fn handle_reconciliation_error(
    obj: Arc<CloudSecret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = ObjectRef::from_obj(obj.as_ref());

    let error_span = tracing::error_span!(
        "controller.watch.reconciliation_error",
        resource.name = key.name.as_str(),
        resource.namespace = key.namespace.as_deref().unwrap_or_default(),
        error.kind = error.kind()
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", key, error);
    metrics::increment_reconciliation_errors();

    let (backoff_seconds, error_count) = ctx.next_error_backoff(&key.to_string());

    let backoff = Duration::from_secs(backoff_seconds);
    let now = chrono::Utc::now();
    let next_trigger_time = chrono::Duration::from_std(backoff).map_or(now, |d| now + d);
    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}), next attempt at {}",
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(backoff)
}

/// Classification of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// RBAC revoked or token expired
    Unauthorized,
    /// Resource version too old; the watch restarts on its own
    Expired,
    /// API server throttling or storage reinitializing
    Throttled,
    /// CRD missing or object deleted
    NotFound,
    Other,
}

/// Classify a watch stream error from its debug rendering
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorClass {
    // 404 first: a plain-text 404 body surfaces as a serde error that also mentions WatchFailed
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found {
        WatchErrorClass::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        WatchErrorClass::Expired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        WatchErrorClass::Throttled
    } else if is_not_found {
        WatchErrorClass::NotFound
    } else {
        WatchErrorClass::Other
    }
}

/// Handle a watch stream error
///
/// Logs the error according to its class and waits `restart_delay` where a
/// restart without pause would only hammer the API server.
pub async fn handle_watch_stream_error(error_string: &str, restart_delay: Duration) {
    let error_span = tracing::warn_span!("controller.watch.error", error = %error_string);

    async move {
        match classify_watch_error(error_string) {
            WatchErrorClass::Unauthorized => {
                error!(
                    "Watch authentication failed (401 Unauthorized): check the controller's ServiceAccount and its RBAC bindings for cloudsecrets"
                );
                tokio::time::sleep(restart_delay).await;
            }
            WatchErrorClass::Expired => {
                warn!(error_type = "410", "watch.error.resource_version_expired");
            }
            WatchErrorClass::Throttled => {
                warn!(
                    "API server throttling (429), backing off for {}s",
                    restart_delay.as_secs()
                );
                tokio::time::sleep(restart_delay).await;
            }
            WatchErrorClass::NotFound => {
                warn!(
                    "Resource not found (404), the CloudSecret CRD may be missing: {}",
                    error_string
                );
            }
            WatchErrorClass::Other => {
                error!("Controller stream error: {}", error_string);
            }
        }
    }
    .instrument(error_span)
    .await;
}
