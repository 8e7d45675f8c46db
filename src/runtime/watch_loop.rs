//! # Watch Loop
//!
//! Runs the kube-runtime `Controller` over `SplunkEnterprise` resources until a
//! shutdown signal arrives.
//!
//! On SIGINT/SIGTERM the readiness probe flips to not-ready, the shutdown token
//! is cancelled (aborting in-flight API calls) and the controller stops taking
//! new work once running reconciliations return.

use crate::config::ControllerConfig;
use crate::controller::reconciler::reconcile;
use crate::runtime::error_policy::{handle_controller_error, handle_reconciliation_error};
use crate::runtime::initialization::InitializationResult;
use futures::StreamExt;
use kube_runtime::controller::Config;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

pub async fn run_watch_loop(init: InitializationResult, config: &ControllerConfig) {
    let InitializationResult {
        instances,
        reconciler,
        server_state,
        shutdown,
        ..
    } = init;

    {
        let server_state = Arc::clone(&server_state);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("Received shutdown signal, initiating graceful shutdown...");
            server_state.set_ready(false);
            shutdown.cancel();
        });
    }

    info!(
        "Starting controller watch loop (max {} concurrent reconciliations)",
        config.max_concurrent_reconciliations
    );
    server_state.set_ready(true);

    let ctx = Arc::clone(&reconciler);
    Controller::new(instances, watcher::Config::default().any_semantic())
        .with_config(Config::default().concurrency(config.max_concurrent_reconciliations))
        .graceful_shutdown_on(shutdown.cancelled_owned())
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| {
            let ctx = Arc::clone(&ctx);
            async move {
                match result {
                    Ok((obj, _action)) => debug!("Reconciled {}", obj),
                    Err(e) => handle_controller_error(&e, &ctx),
                }
            }
        })
        .instrument(tracing::info_span!("controller.watch", operation = "watch_loop"))
        .await;

    server_state.set_ready(false);
    info!("Controller watch loop stopped");
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
