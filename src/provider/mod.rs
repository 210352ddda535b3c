//! # Provider Modules
//!
//! Secret resolvers for external secret managers.
//!
//! A resolver turns an opaque external reference into the secret bytes it
//! designates. Each provider implements the [`SecretResolver`] trait.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// Why a single reference could not be resolved
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The reference is not a locator this provider understands
    #[error("invalid secret reference '{0}'")]
    InvalidReference(String),
    /// The referenced secret or version does not exist
    #[error("secret version not found: {0}")]
    NotFound(String),
    /// The controller's identity may not access the secret
    #[error("permission denied accessing {0}")]
    PermissionDenied(String),
    /// No credentials could be obtained for the provider
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The provider returned an error response
    #[error("provider API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    /// The request could not be delivered or timed out
    #[error("transport error: {0}")]
    Transport(String),
    /// The provider response could not be decoded
    #[error("malformed provider response: {0}")]
    Decode(String),
}

impl ResolveError {
    /// Whether another attempt may succeed without any change on our side
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ResolveError::Transport(_) => true,
            ResolveError::Api { status, .. } => *status == 429 || *status >= 500,
            ResolveError::InvalidReference(_)
            | ResolveError::NotFound(_)
            | ResolveError::PermissionDenied(_)
            | ResolveError::Authentication(_)
            | ResolveError::Decode(_) => false,
        }
    }

    /// Short label used for metrics and structured logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::InvalidReference(_) => "invalid_reference",
            ResolveError::NotFound(_) => "not_found",
            ResolveError::PermissionDenied(_) => "permission_denied",
            ResolveError::Authentication(_) => "authentication",
            ResolveError::Api { .. } => "api",
            ResolveError::Transport(_) => "transport",
            ResolveError::Decode(_) => "decode",
        }
    }
}

/// Resolves external secret references to their payload
///
/// Implementations apply their own retry policy for transient failures; an
/// error returned here is final for the current reconciliation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Fetch the payload designated by `reference`
    async fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolveError>;
}

// Provider implementations
pub mod gcp;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ResolveError::Transport("reset".into()).is_transient());
        assert!(ResolveError::Api { status: 503, message: String::new() }.is_transient());
        assert!(ResolveError::Api { status: 429, message: String::new() }.is_transient());
        assert!(!ResolveError::Api { status: 400, message: String::new() }.is_transient());
        assert!(!ResolveError::NotFound("x".into()).is_transient());
        assert!(!ResolveError::PermissionDenied("x".into()).is_transient());
        assert!(!ResolveError::InvalidReference("x".into()).is_transient());
    }
}
