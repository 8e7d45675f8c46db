//! # Controller Configuration
//!
//! Operator-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_MINUTES, DEFAULT_BACKOFF_MIN_MINUTES, DEFAULT_CLIENT_CALL_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
    DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
};
use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "text" | "plain" => Some(LogFormat::Text),
            _ => None,
        }
    }
}

/// Operator-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Fallback requeue interval when no backoff state can be computed (seconds)
    pub reconciliation_error_requeue_secs: u64,
    /// Fibonacci backoff floor for failed reconciliations (minutes)
    pub backoff_min_minutes: u64,
    /// Fibonacci backoff ceiling for failed reconciliations (minutes)
    pub backoff_max_minutes: u64,
    /// Timeout applied to each Kubernetes API call made while reconciling (seconds)
    pub client_call_timeout_secs: u64,
    /// Maximum concurrent reconciliations across distinct resources
    pub max_concurrent_reconciliations: u16,
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Refuse to start when the API server version is outside the supported range
    pub enforce_version_gate: bool,
    /// Default log directive when `RUST_LOG` is unset
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            client_call_timeout_secs: DEFAULT_CLIENT_CALL_TIMEOUT_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_namespace: None,
            enforce_version_gate: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            metrics_port: parsed_or(&lookup, "METRICS_PORT", defaults.metrics_port),
            reconciliation_error_requeue_secs: parsed_or(
                &lookup,
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                defaults.reconciliation_error_requeue_secs,
            ),
            backoff_min_minutes: parsed_or(
                &lookup,
                "BACKOFF_MIN_MINUTES",
                defaults.backoff_min_minutes,
            ),
            backoff_max_minutes: parsed_or(
                &lookup,
                "BACKOFF_MAX_MINUTES",
                defaults.backoff_max_minutes,
            ),
            client_call_timeout_secs: parsed_or(
                &lookup,
                "CLIENT_CALL_TIMEOUT_SECS",
                defaults.client_call_timeout_secs,
            ),
            max_concurrent_reconciliations: parsed_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            watch_namespace: lookup("WATCH_NAMESPACE")
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty()),
            enforce_version_gate: bool_or(
                &lookup,
                "ENFORCE_VERSION_GATE",
                defaults.enforce_version_gate,
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
        }
    }

    /// Fallback requeue interval for failed reconciliations
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    /// Per-call timeout for Kubernetes API requests
    pub fn client_call_timeout(&self) -> Duration {
        Duration::from_secs(self.client_call_timeout_secs)
    }
}

fn parsed_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(default)
}
