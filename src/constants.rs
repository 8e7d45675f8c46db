//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the `SplunkEnterprise` custom resource
pub const API_GROUP: &str = "enterprise.splunk.com";

/// API version of the `SplunkEnterprise` custom resource
pub const API_VERSION: &str = "enterprise.splunk.com/v1alpha1";

/// Kind of the managed custom resource
pub const RESOURCE_KIND: &str = "SplunkEnterprise";

/// Finalizer token: delete the PersistentVolumeClaims owned by the instance
pub const FINALIZER_DELETE_PVC: &str = "enterprise.splunk.com/delete-pvc";

/// Label key shared by every object the operator creates
pub const LABEL_APP: &str = "app";

/// Value of the `app` label
pub const LABEL_APP_VALUE: &str = "splunk";

/// Label key naming the owning `SplunkEnterprise` instance
pub const LABEL_FOR: &str = "for";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "splunk-operator";

/// Lowest Kubernetes API server version the operator supports
pub const MIN_KUBE_API_VERSION: &str = "v1.14.8";

/// Highest Kubernetes API server version the operator supports
pub const MAX_KUBE_API_VERSION: &str = "v1.16.2";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default requeue interval for reconciliation errors when backoff state is unavailable (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default Fibonacci backoff floor (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;

/// Default Fibonacci backoff ceiling (minutes)
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Default timeout applied to every call against the Kubernetes API (seconds)
pub const DEFAULT_CLIENT_CALL_TIMEOUT_SECS: u64 = 30;

/// Default maximum number of concurrent reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default Splunk container image
pub const DEFAULT_IMAGE: &str = "splunk/splunk:latest";

/// Default size of the `/opt/splunk/etc` volume
pub const DEFAULT_ETC_STORAGE: &str = "1Gi";

/// Default size of the `/opt/splunk/var` volume
pub const DEFAULT_VAR_STORAGE: &str = "50Gi";

/// Upper bound on `spec.replicas`
pub const MAX_REPLICAS: i32 = 100;
