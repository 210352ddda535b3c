//! Common test utilities
//!
//! Provides rustls setup for the Pact tests and in-memory implementations of
//! the reconciler's collaborators for the reconciliation tests.

#![allow(dead_code, reason = "each test crate uses a different subset")]

use async_trait::async_trait;
use cloudsecret_controller::controller::store::{StateStore, StoreError};
use cloudsecret_controller::crd::{CloudSecret, CloudSecretSpec};
use cloudsecret_controller::provider::{ResolveError, SecretResolver};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use kube_runtime::reflector::ObjectRef;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const NAMESPACE: &str = "team-a";

/// Build a persisted-looking `CloudSecret` in [`NAMESPACE`]
pub fn cloud_secret(name: &str, sync_period: u64, refs: &[(&str, &str)]) -> CloudSecret {
    let mut cs = CloudSecret::new(
        name,
        CloudSecretSpec {
            sync_period,
            data: refs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        },
    );
    cs.metadata.namespace = Some(NAMESPACE.to_string());
    cs.metadata.uid = Some(format!("uid-{name}"));
    cs
}

pub fn key(name: &str) -> ObjectRef<CloudSecret> {
    ObjectRef::new(name).within(NAMESPACE)
}

/// Store operation that should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    GetCloudSecret,
    GetSecret,
    Create,
    Update,
    Delete,
}

/// Write operation recorded by [`InMemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create(String),
    Update(String),
    Delete(String),
}

/// [`StateStore`] keeping objects in memory, with resource versions
#[derive(Default)]
pub struct InMemoryStore {
    cloud_secrets: Mutex<HashMap<String, CloudSecret>>,
    secrets: Mutex<HashMap<String, Secret>>,
    writes: Mutex<Vec<Write>>,
    fail_on: Mutex<Option<FailOn>>,
    next_version: Mutex<u64>,
}

fn object_key(namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}", namespace.unwrap_or_default(), name)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_cloud_secret(&self, cs: CloudSecret) {
        let key = object_key(cs.namespace().as_deref(), &cs.name_any());
        self.cloud_secrets.lock().unwrap().insert(key, cs);
    }

    pub fn remove_cloud_secret(&self, name: &str) {
        self.cloud_secrets
            .lock()
            .unwrap()
            .remove(&object_key(Some(NAMESPACE), name));
    }

    /// Seed a managed Secret with string values
    pub fn put_secret(&self, name: &str, data: &[(&str, &str)]) {
        let mut secret = Secret::default();
        secret.metadata.name = Some(name.to_string());
        secret.metadata.namespace = Some(NAMESPACE.to_string());
        secret.metadata.resource_version = Some(self.bump_version());
        secret.data = Some(
            data.iter()
                .map(|(k, v)| {
                    (
                        (*k).to_string(),
                        k8s_openapi::ByteString(v.as_bytes().to_vec()),
                    )
                })
                .collect(),
        );
        self.secrets
            .lock()
            .unwrap()
            .insert(object_key(Some(NAMESPACE), name), secret);
    }

    pub fn secret(&self, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&object_key(Some(NAMESPACE), name))
            .cloned()
    }

    /// Payload of a managed Secret as UTF-8 strings
    pub fn payload(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.secret(name).map(|secret| {
            secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, String::from_utf8(v.0).unwrap()))
                .collect()
        })
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    pub fn fail_on(&self, op: FailOn) {
        *self.fail_on.lock().unwrap() = Some(op);
    }

    fn check(&self, op: FailOn, name: &str) -> Result<(), StoreError> {
        if *self.fail_on.lock().unwrap() != Some(op) {
            return Ok(());
        }
        Err(match op {
            FailOn::GetCloudSecret | FailOn::GetSecret => {
                StoreError::MissingNamespace(name.to_string())
            }
            FailOn::Create | FailOn::Update | FailOn::Delete => StoreError::Conflict {
                name: name.to_string(),
                message: "injected failure".to_string(),
            },
        })
    }

    fn bump_version(&self) -> String {
        let mut version = self.next_version.lock().unwrap();
        *version += 1;
        version.to_string()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn get_cloud_secret(
        &self,
        key: &ObjectRef<CloudSecret>,
    ) -> Result<Option<CloudSecret>, StoreError> {
        self.check(FailOn::GetCloudSecret, &key.name)?;
        Ok(self
            .cloud_secrets
            .lock()
            .unwrap()
            .get(&object_key(key.namespace.as_deref(), &key.name))
            .cloned())
    }

    async fn get_secret(&self, key: &ObjectRef<Secret>) -> Result<Option<Secret>, StoreError> {
        self.check(FailOn::GetSecret, &key.name)?;
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&object_key(key.namespace.as_deref(), &key.name))
            .cloned())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let name = secret.name_any();
        self.check(FailOn::Create, &name)?;
        let key = object_key(secret.metadata.namespace.as_deref(), &name);
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&key) {
            return Err(StoreError::Conflict {
                name,
                message: "already exists".to_string(),
            });
        }
        let mut created = secret.clone();
        created.metadata.resource_version = Some(self.bump_version());
        secrets.insert(key.clone(), created.clone());
        self.writes.lock().unwrap().push(Write::Create(key));
        Ok(created)
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let name = secret.name_any();
        self.check(FailOn::Update, &name)?;
        let key = object_key(secret.metadata.namespace.as_deref(), &name);
        let mut secrets = self.secrets.lock().unwrap();
        let current_version = secrets
            .get(&key)
            .and_then(|s| s.metadata.resource_version.clone());
        if current_version.is_none() || current_version != secret.metadata.resource_version {
            return Err(StoreError::Conflict {
                name,
                message: "the object has been modified".to_string(),
            });
        }
        let mut updated = secret.clone();
        updated.metadata.resource_version = Some(self.bump_version());
        secrets.insert(key.clone(), updated.clone());
        self.writes.lock().unwrap().push(Write::Update(key));
        Ok(updated)
    }

    async fn delete_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        let name = secret.name_any();
        self.check(FailOn::Delete, &name)?;
        let key = object_key(secret.metadata.namespace.as_deref(), &name);
        self.secrets.lock().unwrap().remove(&key);
        self.writes.lock().unwrap().push(Write::Delete(key));
        Ok(())
    }
}

/// [`SecretResolver`] answering from a script; unknown references are not found
#[derive(Default)]
pub struct ScriptedResolver {
    answers: Mutex<HashMap<String, Result<Vec<u8>, ResolveError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(&self, reference: &str, value: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(reference.to_string(), Ok(value.as_bytes().to_vec()));
    }

    pub fn fail(&self, reference: &str) {
        self.answers.lock().unwrap().insert(
            reference.to_string(),
            Err(ResolveError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            }),
        );
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl SecretResolver for ScriptedResolver {
    async fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolveError> {
        self.calls.lock().unwrap().push(reference.to_string());
        self.answers
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or_else(|| Err(ResolveError::NotFound(reference.to_string())))
    }
}
