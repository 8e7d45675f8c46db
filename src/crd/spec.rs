//! # SplunkEnterprise Spec
//!
//! Main CRD specification types and default values.

use crate::constants;
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};

/// SplunkEnterprise Custom Resource Definition
///
/// Describes one desired Splunk Enterprise deployment. The operator keeps the
/// workload in line with this spec and removes the instance's storage claims
/// once deletion is requested.
///
/// # Example
///
/// ```yaml
/// apiVersion: enterprise.splunk.com/v1alpha1
/// kind: SplunkEnterprise
/// metadata:
///   name: example
///   namespace: splunk
///   finalizers:
///     - enterprise.splunk.com/delete-pvc
/// spec:
///   image: splunk/splunk:8.0
///   replicas: 3
///   varStorage: 100Gi
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "SplunkEnterprise",
    group = "enterprise.splunk.com",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::SplunkEnterpriseStatus",
    shortname = "splunk",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SplunkEnterpriseSpec {
    /// Splunk container image
    #[serde(default = "default_image")]
    pub image: String,
    /// Image pull policy for the Splunk container
    #[serde(default)]
    pub image_pull_policy: Option<ImagePullPolicy>,
    /// Number of Splunk pods
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    /// Storage class used for both volume claims (cluster default when unset)
    #[serde(default)]
    pub storage_class_name: Option<String>,
    /// Size of the claim mounted at `/opt/splunk/etc`
    #[serde(default = "default_etc_storage")]
    pub etc_storage: String,
    /// Size of the claim mounted at `/opt/splunk/var`
    #[serde(default = "default_var_storage")]
    pub var_storage: String,
    /// Location of a `default.yml` passed to the container as `SPLUNK_DEFAULTS_URL`
    #[serde(default)]
    pub defaults_url: Option<String>,
    /// Location of the Splunk license passed as `SPLUNK_LICENSE_URI`
    #[serde(default)]
    pub license_url: Option<String>,
}

/// Kubernetes image pull policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ImagePullPolicy {
    Always,
    IfNotPresent,
    Never,
}

impl ImagePullPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ImagePullPolicy::Always => "Always",
            ImagePullPolicy::IfNotPresent => "IfNotPresent",
            ImagePullPolicy::Never => "Never",
        }
    }
}

pub fn default_image() -> String {
    constants::DEFAULT_IMAGE.to_string()
}

pub fn default_replicas() -> i32 {
    1
}

pub fn default_etc_storage() -> String {
    constants::DEFAULT_ETC_STORAGE.to_string()
}

pub fn default_var_storage() -> String {
    constants::DEFAULT_VAR_STORAGE.to_string()
}

/// Canonical kind and apiVersion of the managed resource.
///
/// Objects handed out by some clients arrive without type metadata; the
/// reconciler always reports these values instead of trusting the payload.
#[must_use]
pub fn canonical_type_meta() -> TypeMeta {
    TypeMeta {
        api_version: constants::API_VERSION.to_string(),
        kind: constants::RESOURCE_KIND.to_string(),
    }
}

impl SplunkEnterprise {
    /// Whether deletion has been requested for this instance
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Finalizer tokens in stored order
    #[must_use]
    pub fn finalizer_tokens(&self) -> &[String] {
        self.metadata.finalizers.as_deref().unwrap_or_default()
    }

    /// Whether `token` is present in the finalizer list
    #[must_use]
    pub fn has_finalizer(&self, token: &str) -> bool {
        self.finalizer_tokens().iter().any(|f| f == token)
    }
}
