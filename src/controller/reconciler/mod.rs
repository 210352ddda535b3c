//! # Reconciler
//!
//! Core reconciliation logic for `CloudSecret` resources.
//!
//! The reconciler:
//! - Ensures the managed Secret of each `CloudSecret` exists
//! - Resolves every declared reference through a [`SecretResolver`](crate::provider::SecretResolver)
//! - Replaces the Secret payload with the values that resolved
//! - Deletes the Secret when nothing resolved
//! - Requeues after the sync period, or sooner when a reference failed
//!
//! The cycle itself is stateless; everything it needs is read from the
//! [`StateStore`](crate::controller::store::StateStore) on each invocation.

pub mod reconcile;
pub mod resolve;
pub mod types;

// Re-export public API
pub use reconcile::{reconcile, reconcile_cloud_secret};
pub use resolve::{accelerated_requeue, resolve_all, ResolvedPayload};
pub use types::{BackoffState, ChildAction, ReconcileOutcome, Reconciler, ReconcilerError};
