//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::store::{StateStore, StoreError};
use crate::provider::SecretResolver;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Errors that end a reconciliation cycle
///
/// Resolution failures are not listed here: they only shape the payload and
/// the requeue interval.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Reading an object from the store failed for a reason other than "not found"
    #[error("failed to read {kind} {name}: {source}")]
    StoreRead {
        kind: &'static str,
        name: String,
        source: StoreError,
    },
    /// Creating, updating or deleting the managed Secret failed
    #[error("failed to {operation} Secret {name}: {source}")]
    StoreWrite {
        operation: &'static str,
        name: String,
        source: StoreError,
    },
}

impl ReconcilerError {
    /// Short label used for metrics and structured logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::StoreRead { .. } => "store-read",
            ReconcilerError::StoreWrite { .. } => "store-write",
        }
    }
}

/// What happened to the managed Secret during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildAction {
    /// The `CloudSecret` no longer exists; nothing was touched
    ParentNotFound,
    /// No references are declared; the Secret was left as it was
    LeftAsIs,
    /// The Secret payload was replaced with the resolved values
    Replaced,
    /// Nothing resolved, so the Secret was deleted
    Deleted,
}

/// Result of a successful reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// When to reconcile again; `None` when the parent is gone
    pub requeue_after: Option<Duration>,
    /// Whether the requeue interval was shortened because a reference failed
    pub accelerated: bool,
    /// Whether the managed Secret was created during this cycle
    pub child_created: bool,
    pub child: ChildAction,
    /// Number of references resolved
    pub resolved: usize,
    /// Number of references that failed to resolve
    pub failed: usize,
}

impl ReconcileOutcome {
    pub(crate) fn parent_not_found() -> Self {
        Self {
            requeue_after: None,
            accelerated: false,
            child_created: false,
            child: ChildAction::ParentNotFound,
            resolved: 0,
            failed: 0,
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Shared reconciliation context handed to every reconcile call
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn StateStore>,
    pub resolver: Arc<dyn SecretResolver>,
    /// Requeue interval used after a cycle with resolution failures
    pub retry_floor: Duration,
    // Backoff state per resource (identified by namespace/name), used by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    error_backoff_min_secs: u64,
    error_backoff_max_secs: u64,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("retry_floor", &self.retry_floor)
            .field("error_backoff_min_secs", &self.error_backoff_min_secs)
            .field("error_backoff_max_secs", &self.error_backoff_max_secs)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        resolver: Arc<dyn SecretResolver>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            retry_floor: config.retry_floor(),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            error_backoff_min_secs: config.error_backoff_min_secs,
            error_backoff_max_secs: config.error_backoff_max_secs,
        }
    }

    /// Record a failure for `resource_key` and return the next backoff
    /// in seconds together with the consecutive error count
    pub fn next_error_backoff(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(resource_key.to_string()).or_insert_with(|| {
                    BackoffState::new(self.error_backoff_min_secs, self.error_backoff_max_secs)
                });
                state.increment_error();
                (state.backoff.next_backoff_seconds(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using maximum backoff", e);
                (self.error_backoff_max_secs, 0)
            }
        }
    }

    /// Forget the failure history of `resource_key` after a successful cycle
    ///
    /// The entry is dropped rather than zeroed so that deleted resources do
    /// not linger in the map.
    pub fn reset_backoff(&self, resource_key: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(resource_key);
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }

    /// Number of resources with a recorded failure history
    #[must_use]
    pub fn tracked_backoffs(&self) -> usize {
        self.backoff_states.lock().map_or(0, |states| states.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::store::MockStateStore;
    use crate::provider::MockSecretResolver;

    fn reconciler() -> Reconciler {
        let config = ControllerConfig {
            error_backoff_min_secs: 5,
            error_backoff_max_secs: 20,
            ..ControllerConfig::default()
        };
        Reconciler::new(
            Arc::new(MockStateStore::new()),
            Arc::new(MockSecretResolver::new()),
            &config,
        )
    }

    #[test]
    fn test_error_backoff_is_tracked_per_resource() {
        let ctx = reconciler();
        assert_eq!(ctx.next_error_backoff("a/one"), (5, 1));
        assert_eq!(ctx.next_error_backoff("a/one"), (5, 2));
        assert_eq!(ctx.next_error_backoff("a/one"), (10, 3));
        assert_eq!(ctx.next_error_backoff("a/two"), (5, 1));
        assert_eq!(ctx.next_error_backoff("a/one"), (15, 4));
        assert_eq!(ctx.next_error_backoff("a/one"), (20, 5));
    }

    #[test]
    fn test_reset_backoff_starts_over() {
        let ctx = reconciler();
        ctx.next_error_backoff("a/one");
        ctx.next_error_backoff("a/one");
        ctx.next_error_backoff("a/one");
        ctx.reset_backoff("a/one");
        assert_eq!(ctx.next_error_backoff("a/one"), (5, 1));
    }

    #[test]
    fn test_reset_backoff_drops_entry() {
        let ctx = reconciler();
        ctx.next_error_backoff("a/one");
        ctx.next_error_backoff("a/two");
        assert_eq!(ctx.tracked_backoffs(), 2);

        ctx.reset_backoff("a/one");
        ctx.reset_backoff("a/never-failed");

        assert_eq!(ctx.tracked_backoffs(), 1);
    }

    #[test]
    fn test_error_kind_labels() {
        let read = ReconcilerError::StoreRead {
            kind: "CloudSecret",
            name: "ns/db".to_string(),
            source: StoreError::MissingNamespace("db".to_string()),
        };
        assert_eq!(read.kind(), "store-read");
        assert!(read.to_string().contains("failed to read CloudSecret ns/db"));
    }
}
