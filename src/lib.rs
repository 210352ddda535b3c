//! CloudSecret Controller Library
//!
//! Keeps Kubernetes `Secret` objects synchronized with values stored in
//! Google Cloud Secret Manager, as declared by `CloudSecret` resources.
//!
//! - [`crd`]: the `CloudSecret` custom resource
//! - [`controller`]: reconciliation logic, state store and probe server
//! - [`provider`]: secret resolvers for external secret managers
//! - [`runtime`]: controller bootstrap and watch loop
//! - [`config`], [`constants`], [`observability`]: ambient plumbing

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod provider;
pub mod runtime;
