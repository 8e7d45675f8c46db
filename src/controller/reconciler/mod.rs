//! # Reconciler
//!
//! Reconciliation of `SplunkEnterprise` resources.
//!
//! - `reconcile`: entry point, branches on deletion intent
//! - `finalizers`: finalizer registry and deletion-time processing
//! - `storage`: cleanup of the instance's PersistentVolumeClaims
//! - `validation` / `provision`: the active branch's collaborators
//! - `client`: the only path to cluster state, with cancellation and timeouts

pub mod client;
pub mod finalizers;
pub mod provision;
pub mod reconcile;
pub mod status;
pub mod storage;
pub mod types;
pub mod validation;

pub use client::{CallContext, ClientError, KubeResourceClient, ResourceClient};
pub use finalizers::{CleanupAction, FinalizerError, FinalizerProcessor, FinalizerRegistry};
pub use provision::{ProvisionError, Provisioner, StatefulSetProvisioner};
pub use reconcile::reconcile;
pub use storage::{claim_selector, instance_labels, StorageClaimCleanup};
pub use types::{BackoffState, ObjectKey, ReconcileOutcome, Reconciler, ReconcilerError};
pub use validation::{SpecValidator, ValidationError, Validator};
