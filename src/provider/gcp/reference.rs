//! Secret version reference parsing.

use crate::provider::ResolveError;

/// A parsed `projects/*/secrets/*/versions/*` reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretVersionRef<'a> {
    pub project: &'a str,
    pub secret: &'a str,
    pub version: &'a str,
}

impl SecretVersionRef<'_> {
    /// Resource name as used in REST paths
    #[must_use]
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/secrets/{}/versions/{}",
            self.project, self.secret, self.version
        )
    }
}

/// Parse a secret version reference
///
/// # Errors
/// Returns [`ResolveError::InvalidReference`] if the reference does not have
/// exactly the `projects/<p>/secrets/<s>/versions/<v>` shape with non-empty segments.
pub fn parse_version_reference(reference: &str) -> Result<SecretVersionRef<'_>, ResolveError> {
    let invalid = || ResolveError::InvalidReference(reference.to_string());
    let segments: Vec<&str> = reference.split('/').collect();

    match segments.as_slice() {
        ["projects", project, "secrets", secret, "versions", version]
            if [project, secret, version]
                .iter()
                .all(|s| !s.is_empty() && !s.contains(char::is_whitespace)) =>
        {
            Ok(SecretVersionRef {
                project: *project,
                secret: *secret,
                version: *version,
            })
        }
        _ => Err(invalid()),
    }
}
