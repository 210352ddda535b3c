//! # State Store
//!
//! Object persistence used by the reconciler: read access to `CloudSecret`
//! resources and read/write access to the Secrets they own.
//!
//! [`KubeStateStore`] is the production implementation over `kube::Api`;
//! tests substitute their own implementation of [`StateStore`].

use crate::constants::CONTROLLER_NAME;
use crate::crd::CloudSecret;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use kube_runtime::reflector::ObjectRef;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::debug;

/// Errors returned by a [`StateStore`]
///
/// "Not found" on reads is not an error; it is reported as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The Kubernetes API rejected the request or could not be reached
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    /// Optimistic concurrency conflict (the object changed since it was read)
    #[error("conflict writing {name}: {message}")]
    Conflict { name: String, message: String },
    /// The object carries no namespace, so it cannot be addressed
    #[error("{0} has no namespace")]
    MissingNamespace(String),
}

/// Persistence operations needed by the reconciler
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch a `CloudSecret`; `Ok(None)` when it does not exist
    async fn get_cloud_secret(
        &self,
        key: &ObjectRef<CloudSecret>,
    ) -> Result<Option<CloudSecret>, StoreError>;

    /// Fetch a Secret; `Ok(None)` when it does not exist
    async fn get_secret(&self, key: &ObjectRef<Secret>) -> Result<Option<Secret>, StoreError>;

    /// Create a Secret, returning the persisted object
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Replace a Secret, returning the persisted object
    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Delete a Secret
    async fn delete_secret(&self, secret: &Secret) -> Result<(), StoreError>;
}

/// [`StateStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStateStore {
    client: Client,
}

impl std::fmt::Debug for KubeStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStateStore").finish_non_exhaustive()
    }
}

impl KubeStateStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets_in(&self, namespace: Option<&str>, name: &str) -> Result<Api<Secret>, StoreError> {
        let namespace = namespace.ok_or_else(|| StoreError::MissingNamespace(name.to_string()))?;
        Ok(Api::namespaced(self.client.clone(), namespace))
    }

    fn secrets_for(&self, secret: &Secret) -> Result<Api<Secret>, StoreError> {
        self.secrets_in(secret.metadata.namespace.as_deref(), &secret.name_any())
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(CONTROLLER_NAME.to_string()),
        ..PostParams::default()
    }
}

/// Map a write error, surfacing 409 responses as [`StoreError::Conflict`]
fn write_error(name: &str, error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(response) if response.code == 409 => StoreError::Conflict {
            name: name.to_string(),
            message: response.message.clone(),
        },
        other => StoreError::Kube(other),
    }
}

#[async_trait]
impl StateStore for KubeStateStore {
    async fn get_cloud_secret(
        &self,
        key: &ObjectRef<CloudSecret>,
    ) -> Result<Option<CloudSecret>, StoreError> {
        let namespace = key
            .namespace
            .as_deref()
            .ok_or_else(|| StoreError::MissingNamespace(key.name.clone()))?;
        let api: Api<CloudSecret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn get_secret(&self, key: &ObjectRef<Secret>) -> Result<Option<Secret>, StoreError> {
        let api = self.secrets_in(key.namespace.as_deref(), &key.name)?;
        Ok(api.get_opt(&key.name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let name = secret.name_any();
        debug!(secret.name = name.as_str(), "store.secret.create");
        self.secrets_for(secret)?
            .create(&post_params(), secret)
            .await
            .map_err(|e| write_error(&name, e))
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let name = secret.name_any();
        debug!(secret.name = name.as_str(), "store.secret.update");
        self.secrets_for(secret)?
            .replace(&name, &post_params(), secret)
            .await
            .map_err(|e| write_error(&name, e))
    }

    async fn delete_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        let name = secret.name_any();
        debug!(secret.name = name.as_str(), "store.secret.delete");
        match self
            .secrets_for(secret)?
            .delete(&name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            // Already gone: the desired end state is reached
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
            Err(e) => Err(write_error(&name, e)),
        }
    }
}
