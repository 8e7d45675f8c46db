//! # Custom Resource Definitions
//!
//! CRD types for the Splunk operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `SplunkEnterprise` specification, defaults and identity helpers
//! - `status.rs` - Status reported back on the resource

mod spec;
mod status;

// Re-export all public types
pub use spec::{
    canonical_type_meta, default_etc_storage, default_image, default_replicas, default_var_storage,
    ImagePullPolicy, SplunkEnterprise, SplunkEnterpriseSpec,
};
pub use status::{Phase, SplunkEnterpriseStatus};
