//! # GCP Provider
//!
//! Google Cloud Secret Manager resolver.
//!
//! References have the form `projects/<project>/secrets/<secret>/versions/<version>`,
//! where `<version>` is a version number or an alias such as `latest`.

mod reference;
mod rest;

pub use reference::{parse_version_reference, SecretVersionRef};
pub use rest::SecretManagerREST;
