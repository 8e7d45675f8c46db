//! # Error Policy
//!
//! What the watch loop does with a failed reconciliation.
//!
//! Retryable failures are requeued with per-resource Fibonacci backoff. A spec
//! that failed validation, or a finalizer nobody knows how to discharge, will
//! fail the same way until the object is edited, so those wait for the next change.

use crate::controller::reconciler::{ObjectKey, Reconciler, ReconcilerError};
use crate::crd::SplunkEnterprise;
use crate::observability::metrics;
use kube_runtime::controller::{self, Action};
use kube_runtime::watcher;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub fn handle_reconciliation_error(
    obj: Arc<SplunkEnterprise>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = ObjectKey::for_resource(obj.as_ref());
    let error_span = tracing::error_span!(
        "controller.watch.reconciliation_error",
        resource.name = %key.name,
        resource.namespace = %key.namespace,
        phase = error.phase(),
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", key, error);
    metrics::increment_reconciliation_errors(error.phase());

    if !error.is_retryable() {
        warn!(
            "Not retrying {} until the resource changes ({} failure)",
            key,
            error.phase()
        );
        metrics::increment_requeues("await-change");
        return Action::await_change();
    }

    let (delay, error_count) = ctx.next_backoff(&key);
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        "Retrying {} with Fibonacci backoff: {}s (error count: {}, next retry at {})",
        key,
        delay.as_secs(),
        error_count,
        next_trigger_time.to_rfc3339()
    );

    metrics::increment_requeues("error-backoff");
    Action::requeue(delay)
}

/// Log an item of the controller's result stream.
///
/// Reconciler failures were already handled by [`handle_reconciliation_error`].
/// A scheduled retry for an object that is gone drops the object's backoff.
pub fn handle_controller_error(
    error: &controller::Error<ReconcilerError, watcher::Error>,
    ctx: &Reconciler,
) {
    match error {
        controller::Error::ReconcilerFailed(err, obj) => {
            debug!("Reconciliation of {} failed: {}", obj, err);
        }
        controller::Error::ObjectNotFound(obj) => {
            debug!("Object {} disappeared before reconciliation", obj);
            ctx.reset_backoff(&ObjectKey::for_ref(obj));
        }
        controller::Error::QueueError(err) => {
            warn!("Watch stream error: {}", err);
        }
        other => {
            error!("Controller error: {}", other);
        }
    }
}
