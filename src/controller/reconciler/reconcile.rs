//! # Reconciliation Logic
//!
//! One reconciliation cycle of a `CloudSecret`:
//!
//! 1. Fetch the `CloudSecret`; when it is gone there is nothing to do
//! 2. Fetch the managed Secret, creating it empty when absent
//! 3. Stop here when no references are declared
//! 4. Resolve every reference
//! 5. Shorten the requeue interval to the retry floor if anything failed
//! 6. Delete the Secret when nothing resolved, otherwise replace its payload

use super::resolve::{accelerated_requeue, resolve_all};
use super::types::{ChildAction, ReconcileOutcome, Reconciler, ReconcilerError};
use crate::controller::store::StateStore;
use crate::crd::CloudSecret;
use crate::observability::metrics;
use crate::provider::SecretResolver;
use kube_runtime::controller::Action;
use kube_runtime::reflector::ObjectRef;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, Instrument};

/// Reconcile the `CloudSecret` identified by `key`
///
/// # Errors
/// Returns a [`ReconcilerError`] when the store cannot be read (other than
/// "not found") or when creating, updating or deleting the managed Secret
/// fails. Resolution failures never surface here.
pub async fn reconcile_cloud_secret(
    key: &ObjectRef<CloudSecret>,
    store: &dyn StateStore,
    resolver: &dyn SecretResolver,
    retry_floor: Duration,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let Some(parent) = store
        .get_cloud_secret(key)
        .await
        .map_err(|source| ReconcilerError::StoreRead {
            kind: "CloudSecret",
            name: key.to_string(),
            source,
        })?
    else {
        debug!("CloudSecret {} not found, nothing to reconcile", key);
        return Ok(ReconcileOutcome::parent_not_found());
    };

    let base = parent.sync_period();

    let child_ref = parent.child_secret_ref();
    let child_name = child_ref.to_string();
    let existing = store
        .get_secret(&child_ref)
        .await
        .map_err(|source| ReconcilerError::StoreRead {
            kind: "Secret",
            name: child_name.clone(),
            source,
        })?;

    let (mut child, child_created) = match existing {
        Some(secret) => (secret, false),
        None => {
            let created = store
                .create_secret(&parent.init_child_secret())
                .await
                .map_err(|source| ReconcilerError::StoreWrite {
                    operation: "create",
                    name: child_name.clone(),
                    source,
                })?;
            metrics::increment_child_secret_operation("create");
            info!("Created managed Secret {}", child_name);
            (created, true)
        }
    };

    if parent.spec.data.is_empty() {
        debug!("CloudSecret {} declares no references", key);
        return Ok(ReconcileOutcome {
            requeue_after: Some(base),
            accelerated: false,
            child_created,
            child: ChildAction::LeftAsIs,
            resolved: 0,
            failed: 0,
        });
    }

    let payload = resolve_all(resolver, &parent.spec.data).await;
    let requeue_after = accelerated_requeue(base, retry_floor, payload.any_failed());
    let resolved = payload.data.len();
    let failed = payload.failures.len();

    let child_action = if payload.data.is_empty() {
        store
            .delete_secret(&child)
            .await
            .map_err(|source| ReconcilerError::StoreWrite {
                operation: "delete",
                name: child_name.clone(),
                source,
            })?;
        metrics::increment_child_secret_operation("delete");
        info!(
            "No reference of {} resolved, deleted managed Secret {}",
            key, child_name
        );
        ChildAction::Deleted
    } else {
        child.data = Some(payload.data);
        child.string_data = None;
        store
            .update_secret(&child)
            .await
            .map_err(|source| ReconcilerError::StoreWrite {
                operation: "update",
                name: child_name.clone(),
                source,
            })?;
        metrics::increment_child_secret_operation("update");
        info!(resolved, failed, "Updated managed Secret {}", child_name);
        ChildAction::Replaced
    };

    Ok(ReconcileOutcome {
        requeue_after: Some(requeue_after),
        accelerated: requeue_after < base,
        child_created,
        child: child_action,
        resolved,
        failed,
    })
}

/// Reconcile entry point driven by the kube-runtime `Controller`
///
/// # Errors
/// Propagates the [`ReconcilerError`] of the cycle so the error policy can
/// schedule a retry.
pub async fn reconcile(
    obj: Arc<CloudSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = ObjectRef::from_obj(obj.as_ref());
    let span = tracing::info_span!(
        "controller.reconcile",
        resource.name = key.name.as_str(),
        resource.namespace = key.namespace.as_deref().unwrap_or_default()
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations();

        let result = reconcile_cloud_secret(
            &key,
            ctx.store.as_ref(),
            ctx.resolver.as_ref(),
            ctx.retry_floor,
        )
        .await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.reset_backoff(&key.to_string());
        Ok(requeue_action(&outcome))
    }
    .instrument(span)
    .await
}

/// Turn a cycle outcome into a controller action
fn requeue_action(outcome: &ReconcileOutcome) -> Action {
    match outcome.requeue_after {
        Some(interval) if !interval.is_zero() => {
            let reason = if outcome.accelerated {
                "retry-floor"
            } else {
                "sync-period"
            };
            metrics::increment_requeues_total(reason);
            debug!(
                requeue_after_secs = interval.as_secs(),
                reason, "reconcile.requeue"
            );
            Action::requeue(interval)
        }
        _ => Action::await_change(),
    }
}
