//! # CRD Generator
//!
//! Generates the `CloudSecret` CustomResourceDefinition YAML from the Rust
//! type definition using the `kube` crate's `CustomResourceExt` trait.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/cloudsecret.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use cloudsecret_controller::crd::CloudSecret;
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let yaml =
        serde_yaml::to_string(&CloudSecret::crd()).context("Failed to serialize CRD to YAML")?;
    print!("{yaml}");
    Ok(())
}
