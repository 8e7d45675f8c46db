//! # SplunkEnterprise Status
//!
//! Status reported by the operator after each reconciliation.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a `SplunkEnterprise`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum Phase {
    Pending,
    Ready,
    Failed,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pending => "Pending",
            Phase::Ready => "Ready",
            Phase::Failed => "Failed",
        }
    }
}

/// Status of the SplunkEnterprise resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SplunkEnterpriseStatus {
    /// Current phase
    #[serde(default)]
    pub phase: Option<Phase>,
    /// Human-readable detail for the phase (validation errors land here)
    #[serde(default)]
    pub message: Option<String>,
    /// Generation of the spec the phase was computed from
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// When the phase last changed (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
}
