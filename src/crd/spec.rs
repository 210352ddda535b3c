//! # CloudSecret Spec
//!
//! The user-authored desired state. The controller only ever reads it.

use crate::constants::{CONTROLLER_NAME, DEFAULT_SYNC_PERIOD_SECS};
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube::{CustomResource, Resource, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// CloudSecret Custom Resource Definition
///
/// Declares a Kubernetes `Secret` whose values live in Google Cloud Secret Manager.
///
/// # Example
///
/// ```yaml
/// apiVersion: secrets.cloudsecret.dev/v1
/// kind: CloudSecret
/// metadata:
///   name: database-credentials
///   namespace: default
/// spec:
///   syncPeriod: 300
///   data:
///     username: projects/my-project/secrets/db-username/versions/latest
///     password: projects/my-project/secrets/db-password/versions/3
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(
    kind = "CloudSecret",
    group = "secrets.cloudsecret.dev",
    version = "v1",
    namespaced,
    shortname = "csec",
    printcolumn = r#"{"name":"Sync Period", "type":"integer", "jsonPath":".spec.syncPeriod"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CloudSecretSpec {
    /// Seconds between two synchronisations of the managed Secret
    #[serde(default = "default_sync_period")]
    pub sync_period: u64,
    /// Secret key -> Secret Manager version reference
    /// (`projects/<project>/secrets/<secret>/versions/<version>`)
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

#[must_use]
pub fn default_sync_period() -> u64 {
    DEFAULT_SYNC_PERIOD_SECS
}

impl CloudSecret {
    /// Base requeue interval of this resource
    #[must_use]
    pub fn sync_period(&self) -> Duration {
        Duration::from_secs(self.spec.sync_period)
    }

    /// Name of the managed Secret
    ///
    /// The child is a different kind living in the same namespace, so the
    /// parent's name is reused as is.
    #[must_use]
    pub fn child_secret_name(&self) -> String {
        self.name_any()
    }

    /// Identity of the managed Secret
    #[must_use]
    pub fn child_secret_ref(&self) -> ObjectRef<Secret> {
        let child = ObjectRef::new(&self.child_secret_name());
        match self.namespace() {
            Some(ns) => child.within(&ns),
            None => child,
        }
    }

    /// Build the empty managed Secret owned by this resource
    ///
    /// The owner reference is only set once the resource has been persisted
    /// (it needs a UID); Kubernetes garbage-collects the Secret with its owner.
    #[must_use]
    pub fn init_child_secret(&self) -> Secret {
        let labels = BTreeMap::from([(
            "app.kubernetes.io/managed-by".to_string(),
            CONTROLLER_NAME.to_string(),
        )]);

        Secret {
            metadata: ObjectMeta {
                name: Some(self.child_secret_name()),
                namespace: self.namespace(),
                labels: Some(labels),
                owner_references: self.controller_owner_ref(&()).map(|owner| vec![owner]),
                ..ObjectMeta::default()
            },
            type_: Some("Opaque".to_string()),
            ..Secret::default()
        }
    }
}
