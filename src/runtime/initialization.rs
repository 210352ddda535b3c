//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::controller::store::KubeStateStore;
use crate::crd::CloudSecret;
use crate::observability;
use crate::provider::gcp::SecretManagerREST;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Instrument};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// API for the watched `CloudSecret` resources
    pub cloud_secrets: Api<CloudSecret>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup with the GCP Secret Manager resolver
///
/// # Errors
/// Fails when any of the steps above fails.
pub async fn initialize(config: &ControllerConfig) -> Result<InitializationResult> {
    // Must happen before any TLS connection is opened
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    observability::logging::init_tracing(config.log_format)?;

    info!("Starting CloudSecret controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState::new());

    // Start server in background task, then wait for it to bind before proceeding
    let server_state_clone = server_state.clone();
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let cloud_secrets: Api<CloudSecret> = match &config.watch_namespace {
        Some(namespace) => {
            info!("Watching CloudSecret resources in namespace {}", namespace);
            Api::namespaced(client.clone(), namespace)
        }
        None => {
            info!("Watching CloudSecret resources in all namespaces");
            Api::all(client.clone())
        }
    };

    let resolver = SecretManagerREST::from_config(config)
        .context("Failed to create GCP Secret Manager client")?;
    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeStateStore::new(client)),
        Arc::new(resolver),
        config,
    ));

    check_crd_queryable(&cloud_secrets).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        cloud_secrets,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        // Set by start_server once bound
        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log the existing `CloudSecret` resources, or warn when the CRD cannot be listed
///
/// The watch picks up existing resources on its own; this only surfaces a
/// missing CRD or RBAC problem early.
async fn check_crd_queryable(cloud_secrets: &Api<CloudSecret>) {
    let startup_span = tracing::info_span!(
        "controller.startup.check_crd",
        operation = "list_cloud_secrets"
    );

    async move {
        match cloud_secrets.list(&ListParams::default()).await {
            Ok(list) => {
                let mut by_namespace: BTreeMap<String, usize> = BTreeMap::new();
                for item in &list.items {
                    let namespace = item.metadata.namespace.clone().unwrap_or_default();
                    *by_namespace.entry(namespace).or_default() += 1;
                }
                info!(
                    "CRD is queryable, found {} existing CloudSecret resources",
                    list.items.len()
                );
                for (namespace, count) in by_namespace {
                    info!("  {}: {} resource(s)", namespace, count);
                }
            }
            Err(e) => {
                warn!(
                    "Failed to list CloudSecret resources ({}); is the CRD installed? Run: crdgen | kubectl apply -f -",
                    e
                );
            }
        }
    }
    .instrument(startup_span)
    .await;
}
