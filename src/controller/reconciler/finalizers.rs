//! # Finalizer Processing
//!
//! Discharges the cleanup obligations attached to a `SplunkEnterprise` whose
//! deletion has been requested.
//!
//! Each finalizer token maps to a [`CleanupAction`] in a [`FinalizerRegistry`].
//! Tokens are processed strictly in stored order. A token is removed, and the
//! removal persisted, only after its action succeeded. An unknown token stops
//! the pass: its obligation cannot be discharged and must not be dropped.
//!
//! Removals are persisted as the pass goes. Tokens handled before a failure
//! stay removed; the failing token and everything after it stay on the object.

use crate::constants::FINALIZER_DELETE_PVC;
use crate::controller::reconciler::client::{CallContext, ClientError, ResourceClient};
use crate::controller::reconciler::storage::StorageClaimCleanup;
use crate::controller::reconciler::types::ObjectKey;
use crate::crd::SplunkEnterprise;
use crate::observability::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FinalizerError {
    #[error("finalizer in SplunkEnterprise {key} not recognized: {token}")]
    Unrecognized { key: ObjectKey, token: String },
    #[error("cleanup for finalizer {token} failed: {source}")]
    Cleanup { token: String, source: ClientError },
    #[error("failed to remove finalizer {token}: {source}")]
    Persist { token: String, source: ClientError },
}

impl FinalizerError {
    /// Unknown tokens need an operator; everything else is an API failure worth retrying
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FinalizerError::Unrecognized { .. })
    }
}

/// Cleanup performed before a finalizer token may be removed
#[async_trait]
pub trait CleanupAction: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Discharge the obligation for `resource`. Must be idempotent: a failed
    /// pass is retried from the start.
    async fn cleanup(
        &self,
        resource: &SplunkEnterprise,
        calls: &CallContext,
    ) -> Result<(), ClientError>;
}

/// Finalizer token -> cleanup action
#[derive(Clone, Default)]
pub struct FinalizerRegistry {
    actions: BTreeMap<String, Arc<dyn CleanupAction>>,
}

impl fmt::Debug for FinalizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.actions.keys()).finish()
    }
}

impl FinalizerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every finalizer the operator itself adds
    #[must_use]
    pub fn with_defaults(resources: Arc<dyn ResourceClient>) -> Self {
        Self::new().register(
            FINALIZER_DELETE_PVC,
            Arc::new(StorageClaimCleanup::new(resources)),
        )
    }

    #[must_use]
    pub fn register(mut self, token: impl Into<String>, action: Arc<dyn CleanupAction>) -> Self {
        self.actions.insert(token.into(), action);
        self
    }

    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<&Arc<dyn CleanupAction>> {
        self.actions.get(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

/// Walks a deleting resource's finalizers and removes each once discharged
#[derive(Clone)]
pub struct FinalizerProcessor {
    resources: Arc<dyn ResourceClient>,
    registry: FinalizerRegistry,
}

impl fmt::Debug for FinalizerProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizerProcessor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl FinalizerProcessor {
    #[must_use]
    pub fn new(resources: Arc<dyn ResourceClient>, registry: FinalizerRegistry) -> Self {
        Self {
            resources,
            registry,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &FinalizerRegistry {
        &self.registry
    }

    /// Process every finalizer on a resource whose deletion was requested.
    ///
    /// Returns `Ok(true)` once every token present at the start of the pass has
    /// been discharged and removed, and `Ok(false)` when there was nothing to
    /// discharge.
    pub async fn process_deletion(
        &self,
        mut resource: SplunkEnterprise,
        calls: &CallContext,
    ) -> Result<bool, FinalizerError> {
        let key = ObjectKey::for_resource(&resource);

        // Deletion intent is honoured even if the timestamp looks premature
        warn_if_deletion_not_due(&resource, &key, Utc::now());

        info!("Deletion requested for SplunkEnterprise {}", key);

        let pending: Vec<String> = resource.finalizer_tokens().to_vec();
        if pending.is_empty() {
            info!("No finalizers left on SplunkEnterprise {}", key);
            return Ok(false);
        }

        for token in &pending {
            // Duplicates were dropped together with their first occurrence
            if !resource.has_finalizer(token) {
                debug!("Finalizer {} already removed from {}", token, key);
                continue;
            }

            let action = self
                .registry
                .lookup(token)
                .ok_or_else(|| FinalizerError::Unrecognized {
                    key: key.clone(),
                    token: token.clone(),
                })?;

            debug!("Running {} cleanup for {}", action.name(), key);
            action
                .cleanup(&resource, calls)
                .await
                .map_err(|source| FinalizerError::Cleanup {
                    token: token.clone(),
                    source,
                })?;

            resource = self.remove_finalizer(resource, &key, token, calls).await?;
        }

        info!("Deletion complete for SplunkEnterprise {}", key);
        Ok(true)
    }

    /// Drop every occurrence of `token` and persist; returns the stored object
    async fn remove_finalizer(
        &self,
        mut resource: SplunkEnterprise,
        key: &ObjectKey,
        token: &str,
        calls: &CallContext,
    ) -> Result<SplunkEnterprise, FinalizerError> {
        info!("Removing finalizer for SplunkEnterprise {}: {}", key, token);

        resource.metadata.finalizers = Some(without_token(resource.finalizer_tokens(), token));
        let stored = calls
            .run("update", self.resources.update(&resource))
            .await
            .map_err(|source| FinalizerError::Persist {
                token: token.to_string(),
                source,
            })?;

        metrics::increment_finalizers_removed();
        Ok(stored)
    }
}

/// `finalizers` without any occurrence of `token`, order preserved
#[must_use]
pub fn without_token(finalizers: &[String], token: &str) -> Vec<String> {
    finalizers
        .iter()
        .filter(|f| f.as_str() != token)
        .cloned()
        .collect()
}

/// Deletion timestamp as a chrono instant
fn deletion_requested_at(resource: &SplunkEnterprise) -> Option<DateTime<Utc>> {
    let timestamp = resource.metadata.deletion_timestamp.as_ref()?;
    let raw = serde_json::to_value(timestamp).ok()?;
    DateTime::parse_from_rfc3339(raw.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Log when the deletion timestamp is not strictly before `now`.
/// Returns whether a warning was emitted.
fn warn_if_deletion_not_due(resource: &SplunkEnterprise, key: &ObjectKey, now: DateTime<Utc>) -> bool {
    match deletion_requested_at(resource) {
        Some(requested) if requested >= now => {
            warn!(
                "DeletionTimestamp is in the future for SplunkEnterprise {} (now='{}', deletionTimestamp='{}')",
                key,
                now.to_rfc3339(),
                requested.to_rfc3339()
            );
            true
        }
        _ => false,
    }
}
