//! # Observability
//!
//! Prometheus metrics for the operator.

pub mod metrics;

pub use metrics::*;
