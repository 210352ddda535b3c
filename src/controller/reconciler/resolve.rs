//! # Reference Resolution
//!
//! Resolves every reference of a `CloudSecret` into a fresh payload.

use crate::observability::metrics;
use crate::provider::{ResolveError, SecretResolver};
use futures::future::join_all;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Payload built from one round of resolutions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolvedPayload {
    /// Keys whose reference resolved, with the resolved bytes
    pub data: BTreeMap<String, ByteString>,
    /// Keys whose reference failed, with the reason
    pub failures: BTreeMap<String, ResolveError>,
}

impl ResolvedPayload {
    #[must_use]
    pub fn any_failed(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Resolve all `(key, reference)` pairs concurrently
///
/// Every pair is attempted; a failure never prevents the others from being
/// resolved. Failed keys are absent from `data`.
pub async fn resolve_all(
    resolver: &dyn SecretResolver,
    references: &BTreeMap<String, String>,
) -> ResolvedPayload {
    let results = join_all(references.iter().map(|(key, reference)| async move {
        (key, reference, resolver.resolve(reference).await)
    }))
    .await;

    let mut payload = ResolvedPayload::default();
    for (key, reference, result) in results {
        match result {
            Ok(bytes) => {
                debug!(secret.key = key.as_str(), "reference.resolved");
                payload.data.insert(key.clone(), ByteString(bytes));
            }
            Err(e) => {
                warn!(
                    secret.key = key.as_str(),
                    secret.reference = reference.as_str(),
                    error.kind = e.kind(),
                    "Failed to resolve reference: {}",
                    e
                );
                metrics::increment_reference_failures(e.kind());
                payload.failures.insert(key.clone(), e);
            }
        }
    }
    metrics::increment_references_resolved(payload.data.len() as u64);
    payload
}

/// Requeue interval after a resolution round
///
/// Any failure shortens the interval to `floor`, but only when `base` is
/// longer; the interval is never lengthened. A zero floor would stop periodic
/// syncing altogether, so it leaves `base` untouched.
#[must_use]
pub fn accelerated_requeue(base: Duration, floor: Duration, any_failed: bool) -> Duration {
    if any_failed && !floor.is_zero() && base > floor {
        floor
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockSecretResolver;

    const FLOOR: Duration = Duration::from_secs(5);

    #[test]
    fn test_accelerated_requeue_uses_floor_on_failure() {
        assert_eq!(accelerated_requeue(Duration::from_secs(60), FLOOR, true), FLOOR);
    }

    #[test]
    fn test_accelerated_requeue_never_lengthens() {
        assert_eq!(
            accelerated_requeue(Duration::from_secs(3), FLOOR, true),
            Duration::from_secs(3)
        );
        assert_eq!(accelerated_requeue(FLOOR, FLOOR, true), FLOOR);
    }

    #[test]
    fn test_accelerated_requeue_ignores_zero_floor() {
        assert_eq!(
            accelerated_requeue(Duration::from_secs(60), Duration::ZERO, true),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_accelerated_requeue_keeps_base_without_failure() {
        assert_eq!(
            accelerated_requeue(Duration::from_secs(60), FLOOR, false),
            Duration::from_secs(60)
        );
    }

    #[tokio::test]
    async fn test_resolve_all_attempts_every_key() {
        let mut resolver = MockSecretResolver::new();
        resolver.expect_resolve().times(3).returning(|reference| {
            if reference.ends_with("/broken/versions/1") {
                Err(ResolveError::NotFound(reference.to_string()))
            } else {
                Ok(reference.as_bytes().to_vec())
            }
        });

        let references = BTreeMap::from([
            ("a".to_string(), "projects/p/secrets/a/versions/1".to_string()),
            ("b".to_string(), "projects/p/secrets/broken/versions/1".to_string()),
            ("c".to_string(), "projects/p/secrets/c/versions/1".to_string()),
        ]);

        let payload = resolve_all(&resolver, &references).await;

        assert!(payload.any_failed());
        assert_eq!(payload.data.len(), 2);
        assert_eq!(
            payload.data["a"],
            ByteString(b"projects/p/secrets/a/versions/1".to_vec())
        );
        assert!(!payload.data.contains_key("b"));
        assert_eq!(
            payload.failures["b"],
            ResolveError::NotFound("projects/p/secrets/broken/versions/1".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_all_without_references() {
        let resolver = MockSecretResolver::new();
        let payload = resolve_all(&resolver, &BTreeMap::new()).await;
        assert_eq!(payload, ResolvedPayload::default());
        assert!(!payload.any_failed());
    }
}
