//! # Custom Resource Definitions
//!
//! CRD types for the CloudSecret Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `CloudSecret` resource, defaults and the derived child `Secret`

mod spec;

// Re-export all public types
pub use spec::{default_sync_period, CloudSecret, CloudSecretSpec};
