//! # Status Updates
//!
//! Writes the phase of a `SplunkEnterprise` to its status subresource.
//! Unchanged status is never rewritten: every write produces a watch event
//! and would trigger another reconciliation.

use crate::controller::reconciler::client::{CallContext, ClientError, ResourceClient};
use crate::crd::{Phase, SplunkEnterprise, SplunkEnterpriseStatus};
use tracing::debug;

/// Status to write for `phase`, or `None` when the current status already says so.
///
/// `lastTransitionTime` only moves when the phase changes.
#[must_use]
pub fn desired_status(
    resource: &SplunkEnterprise,
    phase: Phase,
    message: Option<&str>,
    now: &str,
) -> Option<SplunkEnterpriseStatus> {
    let current = resource.status.clone().unwrap_or_default();
    let generation = resource.metadata.generation;

    if current.phase == Some(phase)
        && current.message.as_deref() == message
        && current.observed_generation == generation
    {
        return None;
    }

    let last_transition_time = if current.phase == Some(phase) {
        current.last_transition_time
    } else {
        Some(now.to_string())
    };

    Some(SplunkEnterpriseStatus {
        phase: Some(phase),
        message: message.map(str::to_string),
        observed_generation: generation,
        last_transition_time,
    })
}

/// Write `phase` to the status subresource. Returns whether anything was written.
pub async fn update_phase(
    resources: &dyn ResourceClient,
    calls: &CallContext,
    resource: &SplunkEnterprise,
    phase: Phase,
    message: Option<&str>,
) -> Result<bool, ClientError> {
    let now = chrono::Utc::now().to_rfc3339();
    let Some(status) = desired_status(resource, phase, message, &now) else {
        debug!(
            "Skipping status update - unchanged: phase={}, message={:?}",
            phase.as_str(),
            message
        );
        return Ok(false);
    };

    calls
        .run("update_status", resources.update_status(resource, &status))
        .await?;
    Ok(true)
}
