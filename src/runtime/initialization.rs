//! # Initialization
//!
//! Operator startup: tracing, rustls, metrics, HTTP server, Kubernetes client,
//! version gate and reconciler wiring.

use crate::config::{ControllerConfig, LogFormat};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::SplunkEnterprise;
use crate::observability;
use crate::runtime::version_gate::check_cluster_version;
use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    /// `SplunkEnterprise` API scoped to the watched namespace(s)
    pub instances: Api<SplunkEnterprise>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    /// Cancelled on shutdown; aborts in-flight API calls
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL`, a bare level applying to this crate only
fn env_filter(config: &ControllerConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.log_level.contains('=') {
            EnvFilter::new(&config.log_level)
        } else {
            EnvFilter::new(format!("splunk_operator={}", config.log_level))
        }
    })
}

pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config));
    match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}

pub async fn initialize(config: &ControllerConfig) -> Result<InitializationResult> {
    init_tracing(config)?;

    // Required for rustls 0.23+; a provider may already be installed by a dependency
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting Splunk operator");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_port = config.metrics_port;
    let server_handle = {
        let state = Arc::clone(&server_state);
        tokio::spawn(async move {
            if let Err(e) = start_server(server_port, state).await {
                error!("HTTP server error: {}", e);
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    if config.enforce_version_gate {
        check_cluster_version(&client)
            .await
            .context("Kubernetes API server version check failed")?;
    } else if let Err(e) = check_cluster_version(&client).await {
        warn!("Ignoring Kubernetes version check failure: {:#}", e);
    }

    let shutdown = CancellationToken::new();
    let reconciler = Arc::new(Reconciler::for_cluster(
        client.clone(),
        config,
        shutdown.clone(),
    ));

    let instances: Api<SplunkEnterprise> = match &config.watch_namespace {
        Some(namespace) => {
            info!("Watching SplunkEnterprise resources in namespace {}", namespace);
            Api::namespaced(client.clone(), namespace)
        }
        None => {
            info!("Watching SplunkEnterprise resources in all namespaces");
            Api::all(client.clone())
        }
    };

    info!("Operator initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        instances,
        reconciler,
        server_state,
        shutdown,
    })
}

/// Wait for the HTTP server to bind
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.listening() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > SERVER_STARTUP_TIMEOUT {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                SERVER_STARTUP_TIMEOUT.as_secs()
            ));
        }

        tokio::time::sleep(SERVER_POLL_INTERVAL).await;
    }
}
