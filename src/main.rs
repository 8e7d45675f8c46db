//! # Splunk Operator
//!
//! Kubernetes operator for `SplunkEnterprise` resources.
//!
//! Configuration comes from environment variables (see `ControllerConfig`);
//! the flags below override the most commonly changed ones.

use anyhow::Result;
use clap::Parser;
use splunk_operator::config::ControllerConfig;
use splunk_operator::runtime::initialization::initialize;
use splunk_operator::runtime::watch_loop::run_watch_loop;

#[derive(Debug, Parser)]
#[command(name = "splunk-operator", version, about = "Kubernetes operator for Splunk Enterprise", long_about = None)]
struct Args {
    /// Port for /metrics, /healthz and /readyz
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Only watch SplunkEnterprise resources in this namespace
    #[arg(short, long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Start even if the API server version is outside the supported range
    #[arg(long)]
    skip_version_check: bool,
}

impl Args {
    fn apply(self, mut config: ControllerConfig) -> ControllerConfig {
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(namespace) = self.namespace.filter(|ns| !ns.trim().is_empty()) {
            config.watch_namespace = Some(namespace);
        }
        if self.skip_version_check {
            config.enforce_version_gate = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().apply(ControllerConfig::from_env());

    let init = initialize(&config).await?;
    run_watch_loop(init, &config).await;

    Ok(())
}
