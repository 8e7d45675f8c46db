//! # Prelude
//!
//! Commonly used types, importable with `use splunk_operator::prelude::*;`.

pub use crate::crd::*;

pub use crate::controller::reconciler::{
    reconcile, CallContext, CleanupAction, ClientError, FinalizerError, FinalizerProcessor,
    FinalizerRegistry, ObjectKey, ProvisionError, Provisioner, ReconcileOutcome, Reconciler,
    ReconcilerError, ResourceClient, SpecValidator, ValidationError, Validator,
};

pub use crate::config::{ControllerConfig, LogFormat};

pub use crate::runtime::version_gate::{check_supported, VersionError};
