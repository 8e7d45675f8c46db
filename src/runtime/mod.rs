//! # Runtime
//!
//! Process-level wiring around the reconciler.
//!
//! - `initialization`: tracing, metrics, HTTP server, client and reconciler setup
//! - `watch_loop`: the kube-runtime controller and shutdown handling
//! - `error_policy`: requeue decisions for failed reconciliations
//! - `version_gate`: Kubernetes API server version check

pub mod error_policy;
pub mod initialization;
pub mod version_gate;
pub mod watch_loop;
