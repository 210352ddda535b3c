//! # Watch Loop
//!
//! Controller watch loop that monitors `CloudSecret` resources and triggers
//! reconciliation when they change or their requeue interval elapses.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::CloudSecret;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Run the controller watch loop
///
/// Only `CloudSecret` resources are watched; managed Secrets are revisited
/// on the requeue interval. The loop restarts the controller when its stream
/// ends and exits once SIGTERM or SIGINT has been received, after in-flight
/// reconciliations finish.
///
/// # Errors
/// Currently never fails; the signature leaves room for startup errors.
pub async fn run_watch_loop(
    cloud_secrets: Api<CloudSecret>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: &ControllerConfig,
) -> Result<(), anyhow::Error> {
    let restart_delay = config.watch_restart_delay();

    // Flipped once on SIGTERM/SIGINT; stops the restart loop
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_server_state = server_state.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        let _ = shutdown_tx.send(true);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if *shutdown_rx.borrow() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");
        info!(parent: &watch_span, "Starting controller watch loop...");

        Controller::new(cloud_secrets.clone(), watcher::Config::default())
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, reconciler.clone())
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => debug!(resource = %obj, "watch.event.success"),
                    Err(e) => handle_watch_stream_error(&format!("{e:?}"), restart_delay).await,
                }
            })
            .await;

        if *shutdown_rx.borrow() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        // The stream also ends on a signal; the signal task flips the flag shortly after
        let mut shutdown = shutdown_rx.clone();
        tokio::select! {
            () = tokio::time::sleep(restart_delay) => {}
            _ = shutdown.wait_for(|requested| *requested) => {}
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Resolve on SIGINT, or SIGTERM on Unix
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
