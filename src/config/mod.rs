//! # Configuration
//!
//! Controller configuration loaded from environment variables.
//!
//! Environment variables are populated from a ConfigMap using `envFrom` in the
//! deployment. A handful of settings can additionally be overridden on the
//! command line of the controller binary.

mod controller;

pub use controller::{ControllerConfig, LogFormat};
