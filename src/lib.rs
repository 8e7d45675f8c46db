//! Splunk Operator Library
//!
//! Reconciles `SplunkEnterprise` resources: provisions a Splunk deployment
//! for each active instance and deletes the instance's storage claims once
//! deletion is requested.
//!
//! ## Quick Start
//!
//! ```rust
//! use splunk_operator::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
