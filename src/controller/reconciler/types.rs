//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::client::{
    CallContext, ClientError, KubeResourceClient, ResourceClient,
};
use crate::controller::reconciler::finalizers::{
    FinalizerError, FinalizerProcessor, FinalizerRegistry,
};
use crate::controller::reconciler::provision::{ProvisionError, Provisioner, StatefulSetProvisioner};
use crate::controller::reconciler::validation::{SpecValidator, ValidationError, Validator};
use kube::ResourceExt;
use kube_runtime::reflector::{Lookup, ObjectRef};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Namespaced identity of a `SplunkEnterprise`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of an object the watch stream refers to
    pub fn for_ref<K: Lookup + ?Sized>(obj: &ObjectRef<K>) -> Self {
        Self::new(
            obj.namespace.clone().unwrap_or_else(|| "default".to_string()),
            obj.name.clone(),
        )
    }

    /// Identity of an object as delivered by the API server
    pub fn for_resource<K: kube::Resource>(resource: &K) -> Self {
        Self {
            namespace: ResourceExt::namespace(resource).unwrap_or_else(|| "default".to_string()),
            name: resource.name_any(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Result of one successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Ask the dispatcher to run this key again
    pub requeue: bool,
}

impl ReconcileOutcome {
    #[must_use]
    pub fn done() -> Self {
        Self { requeue: false }
    }

    #[must_use]
    pub fn requeue() -> Self {
        Self { requeue: true }
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to fetch SplunkEnterprise {key}: {source}")]
    Fetch { key: ObjectKey, source: ClientError },
    #[error("validation failed for SplunkEnterprise {key}: {source}")]
    Validation {
        key: ObjectKey,
        source: ValidationError,
    },
    #[error("reconciliation failed for SplunkEnterprise {key}: {source}")]
    Provisioning {
        key: ObjectKey,
        source: ProvisionError,
    },
    #[error("unable to delete SplunkEnterprise {key}: {source}")]
    Deletion {
        key: ObjectKey,
        source: FinalizerError,
    },
    #[error("failed to update status of SplunkEnterprise {key}: {source}")]
    Status { key: ObjectKey, source: ClientError },
}

impl ReconcilerError {
    #[must_use]
    pub fn key(&self) -> &ObjectKey {
        match self {
            ReconcilerError::Fetch { key, .. }
            | ReconcilerError::Validation { key, .. }
            | ReconcilerError::Provisioning { key, .. }
            | ReconcilerError::Deletion { key, .. }
            | ReconcilerError::Status { key, .. } => key,
        }
    }

    /// Stage of the reconciliation that failed, used as a log field and metric label
    #[must_use]
    pub fn phase(&self) -> &'static str {
        match self {
            ReconcilerError::Fetch { .. } => "fetch",
            ReconcilerError::Validation { .. } => "validation",
            ReconcilerError::Provisioning { .. } => "provisioning",
            ReconcilerError::Deletion { .. } => "deletion",
            ReconcilerError::Status { .. } => "status",
        }
    }

    /// Whether retrying without an external change can succeed.
    ///
    /// An invalid spec or an unknown finalizer stays broken until someone edits the object.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcilerError::Validation { .. } => false,
            ReconcilerError::Deletion { source, .. } => source.is_retryable(),
            ReconcilerError::Fetch { .. }
            | ReconcilerError::Provisioning { .. }
            | ReconcilerError::Status { .. } => true,
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciler context shared by every reconciliation
///
/// Holds the collaborators a reconciliation calls into. It never holds
/// resource state: each reconciliation re-fetches the object it works on.
pub struct Reconciler {
    pub(crate) resources: Arc<dyn ResourceClient>,
    pub(crate) validator: Arc<dyn Validator>,
    pub(crate) provisioner: Arc<dyn Provisioner>,
    pub(crate) finalizers: FinalizerProcessor,
    pub(crate) calls: CallContext,
    /// Delay before re-running a key whose outcome asked for a requeue
    pub requeue_after: Duration,
    /// Fallback delay when backoff state is unavailable
    pub error_requeue_after: Duration,
    backoff_bounds: (u64, u64),
    // Per-resource backoff (namespace/name), owned by the error policy
    backoff_states: Mutex<HashMap<ObjectKey, BackoffState>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("finalizers", &self.finalizers)
            .field("calls", &self.calls)
            .field("requeue_after", &self.requeue_after)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Build a reconciler from its collaborators.
    ///
    /// The finalizer registry starts with the storage-claim cleanup registered
    /// against `resources`; use [`Reconciler::with_finalizer_registry`] to replace it.
    pub fn new(
        resources: Arc<dyn ResourceClient>,
        validator: Arc<dyn Validator>,
        provisioner: Arc<dyn Provisioner>,
        calls: CallContext,
    ) -> Self {
        let registry = FinalizerRegistry::with_defaults(Arc::clone(&resources));
        let config = ControllerConfig::default();
        Self {
            finalizers: FinalizerProcessor::new(Arc::clone(&resources), registry),
            resources,
            validator,
            provisioner,
            calls,
            requeue_after: Duration::from_secs(5),
            error_requeue_after: config.reconciliation_error_requeue_duration(),
            backoff_bounds: (config.backoff_min_minutes, config.backoff_max_minutes),
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Wire the reconciler against a live cluster
    pub fn for_cluster(
        client: kube::Client,
        config: &ControllerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let resources: Arc<dyn ResourceClient> =
            Arc::new(KubeResourceClient::new(client.clone()));
        let calls = CallContext::new(shutdown, config.client_call_timeout());
        Self::new(
            resources,
            Arc::new(SpecValidator),
            Arc::new(StatefulSetProvisioner::new(client)),
            calls,
        )
        .with_error_backoff(
            config.backoff_min_minutes,
            config.backoff_max_minutes,
            config.reconciliation_error_requeue_duration(),
        )
    }

    #[must_use]
    pub fn with_finalizer_registry(mut self, registry: FinalizerRegistry) -> Self {
        self.finalizers = FinalizerProcessor::new(Arc::clone(&self.resources), registry);
        self
    }

    #[must_use]
    pub fn with_error_backoff(
        mut self,
        min_minutes: u64,
        max_minutes: u64,
        fallback: Duration,
    ) -> Self {
        self.backoff_bounds = (min_minutes, max_minutes);
        self.error_requeue_after = fallback;
        self
    }

    #[must_use]
    pub fn with_requeue_after(mut self, requeue_after: Duration) -> Self {
        self.requeue_after = requeue_after;
        self
    }

    /// Record a failure for `key` and return how long to wait before retrying
    pub fn next_backoff(&self, key: &ObjectKey) -> (Duration, u32) {
        let (min_minutes, max_minutes) = self.backoff_bounds;
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(key.clone())
                    .or_insert_with(|| BackoffState::new(min_minutes, max_minutes));
                state.increment_error();
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using default backoff", e);
                (self.error_requeue_after, 0)
            }
        }
    }

    /// Forget accumulated failures for `key`; returns whether it was backing off
    pub fn reset_backoff(&self, key: &ObjectKey) -> bool {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .remove(key)
                .is_some_and(|state| state.error_count > 0),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("ns", "foo").to_string(), "ns/foo");
    }

    #[test]
    fn test_retryability_by_phase() {
        let key = ObjectKey::new("ns", "foo");
        let fetch = ReconcilerError::Fetch {
            key: key.clone(),
            source: ClientError::Conflict,
        };
        assert!(fetch.is_retryable());
        assert_eq!(fetch.phase(), "fetch");

        let invalid = ReconcilerError::Validation {
            key: key.clone(),
            source: ValidationError::Replicas { value: 0, max: 100 },
        };
        assert!(!invalid.is_retryable());

        let unknown = ReconcilerError::Deletion {
            key: key.clone(),
            source: FinalizerError::Unrecognized {
                key: key.clone(),
                token: "bogus".to_string(),
            },
        };
        assert!(!unknown.is_retryable());
        assert_eq!(unknown.key(), &key);

        let cleanup = ReconcilerError::Deletion {
            key: key.clone(),
            source: FinalizerError::Cleanup {
                token: "t".to_string(),
                source: ClientError::Conflict,
            },
        };
        assert!(cleanup.is_retryable());
    }
}
