//! # CloudSecret Controller
//!
//! A Kubernetes controller that keeps `Secret` objects synchronized with
//! values stored in Google Cloud Secret Manager.
//!
//! ## Overview
//!
//! For every `CloudSecret` resource the controller:
//!
//! 1. **Ensures the managed Secret** - Creates an empty, owned `Secret` of the same name
//! 2. **Resolves references** - Fetches each `spec.data` secret version from Secret Manager
//! 3. **Replaces the payload** - Writes exactly the values that resolved
//! 4. **Tears down on total failure** - Deletes the `Secret` when nothing resolved
//! 5. **Resyncs** - Requeues after `spec.syncPeriod`, or after 5 seconds when a reference failed
//!
//! ## Features
//!
//! - **Workload Identity**: Access tokens come from the GKE metadata server
//! - **Namespace scoping**: Watches one namespace or the whole cluster
//! - **Prometheus metrics**: Exposes metrics for monitoring and observability
//! - **Health probes**: HTTP endpoints for liveness and readiness checks
//!
//! Settings come from environment variables (see [`ControllerConfig`]); the
//! command-line flags below take precedence.

use anyhow::Result;
use clap::Parser;
use cloudsecret_controller::config::{ControllerConfig, LogFormat};
use cloudsecret_controller::runtime::{initialization, watch_loop};
use std::str::FromStr;

/// CloudSecret controller
#[derive(Parser, Debug)]
#[command(name = "cloudsecret-controller", version)]
#[command(about = "Syncs Kubernetes Secrets from Google Cloud Secret Manager", long_about = None)]
struct Args {
    /// Port of the metrics and probe server [env: METRICS_PORT]
    #[arg(long, value_name = "PORT")]
    metrics_port: Option<u16>,

    /// Log output format: json or text [env: LOG_FORMAT]
    #[arg(long, value_name = "FORMAT", value_parser = LogFormat::from_str)]
    log_format: Option<LogFormat>,

    /// Only watch CloudSecret resources in this namespace [env: WATCH_NAMESPACE]
    #[arg(short, long)]
    namespace: Option<String>,
}

impl Args {
    /// Apply command-line overrides on top of the environment configuration
    fn apply(self, mut config: ControllerConfig) -> ControllerConfig {
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(namespace) = self.namespace {
            config.watch_namespace = Some(namespace);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().apply(ControllerConfig::from_env());

    let init = initialization::initialize(&config).await?;

    watch_loop::run_watch_loop(
        init.cloud_secrets,
        init.reconciler,
        init.server_state,
        &config,
    )
    .await
}
