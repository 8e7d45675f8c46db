//! # Configuration
//!
//! Operator-level settings.
//!
//! - `controller`: settings loaded from environment variables

mod controller;

pub use controller::{ControllerConfig, LogFormat};
