//! # Reconciliation Logic
//!
//! Entry point for one `SplunkEnterprise` key.
//!
//! ## Reconciliation Flow
//!
//! 1. Re-fetch the object; a missing object needs no work
//! 2. Deletion requested: discharge every finalizer (see `finalizers`)
//! 3. Otherwise validate the spec, then provision it
//! 4. Report the phase on the status subresource when it changed

use crate::controller::reconciler::status::update_phase;
use crate::controller::reconciler::types::{
    ObjectKey, ReconcileOutcome, Reconciler, ReconcilerError,
};
use crate::crd::{canonical_type_meta, Phase, SplunkEnterprise};
use crate::observability::metrics;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

impl Reconciler {
    /// Reconcile the object identified by `key`.
    ///
    /// Only a missing object is treated as success; every other failure is
    /// returned so the dispatcher can decide whether to retry.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!(
            "reconcile",
            resource.name = %key.name,
            resource.namespace = %key.namespace,
            resource.kind = tracing::field::Empty,
            resource.api_version = tracing::field::Empty,
        );

        let start = Instant::now();
        metrics::increment_reconciliations();
        let result = self.reconcile_key(key).instrument(span).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        result
    }

    async fn reconcile_key(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcilerError> {
        let resource = match self.calls.run("get", self.resources.get(key)).await {
            Ok(resource) => resource,
            Err(e) if e.is_not_found() => {
                debug!("SplunkEnterprise {} not found, nothing to do", key);
                // Nothing will reconcile this key again
                self.reset_backoff(key);
                return Ok(ReconcileOutcome::done());
            }
            Err(source) => {
                return Err(ReconcilerError::Fetch {
                    key: key.clone(),
                    source,
                })
            }
        };

        let types = canonical_type_meta();
        let span = tracing::Span::current();
        span.record("resource.kind", types.kind.as_str());
        span.record("resource.api_version", types.api_version.as_str());

        if resource.is_deleting() {
            return self.reconcile_deletion(key, resource).await;
        }

        info!("Reconciling SplunkEnterprise {}", key);

        if let Err(source) = self.validator.validate(&resource.spec) {
            error!("Validation error for {}: {}", key, source);
            metrics::increment_validation_failures();
            let message = format!("Validation failed: {source}");
            if let Err(e) = update_phase(
                self.resources.as_ref(),
                &self.calls,
                &resource,
                Phase::Failed,
                Some(&message),
            )
            .await
            {
                warn!("Failed to record validation failure on {}: {}", key, e);
            }
            return Err(ReconcilerError::Validation {
                key: key.clone(),
                source,
            });
        }

        self.provisioner
            .reconcile_to_spec(&resource, &self.calls)
            .await
            .map_err(|source| ReconcilerError::Provisioning {
                key: key.clone(),
                source,
            })?;

        let changed = update_phase(
            self.resources.as_ref(),
            &self.calls,
            &resource,
            Phase::Ready,
            None,
        )
        .await
        .map_err(|source| ReconcilerError::Status {
            key: key.clone(),
            source,
        })?;
        if changed {
            info!("SplunkEnterprise {} is Ready", key);
        }

        Ok(ReconcileOutcome::done())
    }

    async fn reconcile_deletion(
        &self,
        key: &ObjectKey,
        resource: SplunkEnterprise,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        match self.finalizers.process_deletion(resource, &self.calls).await {
            Ok(true) => {
                metrics::increment_deletions();
                Ok(ReconcileOutcome::done())
            }
            // Nothing held the object; look again once the control plane has removed it
            Ok(false) => Ok(ReconcileOutcome::requeue()),
            Err(source) => Err(ReconcilerError::Deletion {
                key: key.clone(),
                source,
            }),
        }
    }
}

/// kube-runtime entry point
///
/// Backoff for the key is reset once a reconciliation succeeds; failures are
/// handed to the error policy.
pub async fn reconcile(
    resource: Arc<SplunkEnterprise>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::for_resource(resource.as_ref());
    let outcome = ctx.reconcile(&key).await?;

    if ctx.reset_backoff(&key) {
        debug!("Reset backoff for {} after successful reconciliation", key);
    }

    if outcome.requeue {
        metrics::increment_requeues("requested");
        Ok(Action::requeue(ctx.requeue_after))
    } else {
        Ok(Action::await_change())
    }
}
