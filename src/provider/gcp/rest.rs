//! GCP Secret Manager REST Client
//!
//! Native REST implementation of the Secret Manager `versions.access` call.
//! Uses reqwest for HTTP requests and the metadata server for OAuth2 tokens
//! (Workload Identity).
//!
//! References:
//! - [Access a secret version](https://cloud.google.com/secret-manager/docs/reference/rest/v1/projects.secrets.versions/access)

use super::reference::parse_version_reference;
use crate::config::ControllerConfig;
use crate::constants::{
    DEFAULT_RESOLVER_TIMEOUT_SECS, GCP_METADATA_TOKEN_URL, RESOLVER_RETRY_BASE_DELAY_MS,
    TOKEN_EXPIRY_MARGIN_SECS,
};
use crate::observability::metrics;
use crate::provider::{ResolveError, SecretResolver};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn, Instrument};
use zeroize::Zeroizing;

const PROVIDER: &str = "gcp";

/// Response from accessing a secret version
///
/// Returned by `GET /v1/projects/{project}/secrets/{secret}/versions/{version}:access`.
#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

/// Secret payload; `data` is base64-encoded on the wire
#[derive(Debug, Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: String,
}

/// GCP API error response wrapper
#[derive(Debug, Deserialize)]
struct GcpErrorResponse {
    error: GcpError,
}

#[derive(Debug, Deserialize)]
struct GcpError {
    message: String,
    #[serde(default)]
    status: String,
}

/// OAuth2 access token response from the GCP metadata server
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: Zeroizing<String>,
    refresh_at: Instant,
}

/// Where access tokens come from
enum Credentials {
    /// Fixed token (`GCP_ACCESS_TOKEN`), used against emulators and mock servers
    Static(Zeroizing<String>),
    /// Metadata server token, cached until shortly before it expires
    Metadata {
        url: String,
        cached: RwLock<Option<CachedToken>>,
    },
}

/// GCP Secret Manager REST client
pub struct SecretManagerREST {
    http_client: Client,
    base_url: String,
    credentials: Credentials,
    max_attempts: u32,
    request_timeout: Duration,
}

impl std::fmt::Debug for SecretManagerREST {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let credentials = match self.credentials {
            Credentials::Static(_) => "static",
            Credentials::Metadata { .. } => "metadata-server",
        };
        f.debug_struct("SecretManagerREST")
            .field("base_url", &self.base_url)
            .field("credentials", &credentials)
            .field("max_attempts", &self.max_attempts)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl SecretManagerREST {
    /// Create a client from the controller configuration
    ///
    /// Uses `GCP_ACCESS_TOKEN` when set, otherwise Workload Identity through
    /// the metadata server.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ControllerConfig) -> Result<Self> {
        let request_timeout = config.resolver_timeout();
        let http_client = build_http_client(request_timeout)?;

        let credentials = match std::env::var("GCP_ACCESS_TOKEN") {
            Ok(token) if !token.is_empty() => {
                info!("Using static access token from GCP_ACCESS_TOKEN");
                Credentials::Static(Zeroizing::new(token))
            }
            _ => {
                info!("Using Workload Identity authentication (metadata server)");
                Credentials::Metadata {
                    url: GCP_METADATA_TOKEN_URL.to_string(),
                    cached: RwLock::new(None),
                }
            }
        };

        info!(
            "Initialized GCP Secret Manager client for endpoint {}",
            config.gcp_endpoint
        );

        Ok(Self {
            http_client,
            base_url: config.gcp_endpoint.trim_end_matches('/').to_string(),
            credentials,
            max_attempts: config.resolver_max_attempts.max(1),
            request_timeout,
        })
    }

    /// Create a client with a fixed token against an arbitrary endpoint
    ///
    /// Requests time out after the default resolver timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_static_token(
        base_url: impl Into<String>,
        token: impl Into<String>,
        max_attempts: u32,
    ) -> Result<Self> {
        let request_timeout = Duration::from_secs(DEFAULT_RESOLVER_TIMEOUT_SECS);
        Ok(Self {
            http_client: build_http_client(request_timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: Credentials::Static(Zeroizing::new(token.into())),
            max_attempts: max_attempts.max(1),
            request_timeout,
        })
    }

    /// Timeout applied to every HTTP request of this client
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Current access token, fetching a new one from the metadata server if needed
    async fn access_token(&self) -> Result<Zeroizing<String>, ResolveError> {
        let (url, cached) = match &self.credentials {
            Credentials::Static(token) => return Ok(token.clone()),
            Credentials::Metadata { url, cached } => (url, cached),
        };

        if let Some(token) = cached.read().await.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.token.clone());
            }
        }

        let mut guard = cached.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.fetch_metadata_token(url).await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    async fn fetch_metadata_token(&self, url: &str) -> Result<CachedToken, ResolveError> {
        let response = self
            .http_client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| ResolveError::Authentication(format!("metadata server unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Authentication(format!(
                "metadata server returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ResolveError::Authentication(format!("failed to parse metadata token response: {e}"))
        })?;
        debug!("Retrieved access token from metadata server (Workload Identity)");

        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS));
        Ok(CachedToken {
            token: Zeroizing::new(token.access_token),
            refresh_at: Instant::now() + lifetime,
        })
    }

    /// Drop a cached metadata token so the next call fetches a new one
    async fn invalidate_token(&self) {
        if let Credentials::Metadata { cached, .. } = &self.credentials {
            cached.write().await.take();
        }
    }

    /// Single `versions.access` call
    async fn access_once(&self, resource_name: &str) -> Result<Vec<u8>, ResolveError> {
        let token = self.access_token().await?;
        let url = format!("{}/v1/{}:access", self.base_url, resource_name);

        let start = Instant::now();
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token.as_str())
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()));
        metrics::record_provider_operation(PROVIDER, start.elapsed().as_secs_f64());
        let response = response?;

        let status = response.status();
        if status.is_success() {
            let access: AccessSecretVersionResponse = response
                .json()
                .await
                .map_err(|e| ResolveError::Decode(e.to_string()))?;
            return general_purpose::STANDARD
                .decode(access.payload.data.as_bytes())
                .map_err(|e| ResolveError::Decode(format!("invalid base64 payload: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => ResolveError::NotFound(resource_name.to_string()),
            StatusCode::FORBIDDEN => ResolveError::PermissionDenied(resource_name.to_string()),
            StatusCode::UNAUTHORIZED => {
                self.invalidate_token().await;
                ResolveError::Authentication(error_message(&body))
            }
            other => ResolveError::Api {
                status: other.as_u16(),
                message: error_message(&body),
            },
        })
    }
}

/// Extract the message of a GCP error body, falling back to the raw text
fn error_message(body: &str) -> String {
    match serde_json::from_str::<GcpErrorResponse>(body) {
        Ok(parsed) if parsed.error.status.is_empty() => parsed.error.message,
        Ok(parsed) => format!("{} ({})", parsed.error.message, parsed.error.status),
        Err(_) => body.to_string(),
    }
}

/// Delay before retry `attempt` (1-based)
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(RESOLVER_RETRY_BASE_DELAY_MS << (attempt - 1).min(6))
}

#[async_trait]
impl SecretResolver for SecretManagerREST {
    async fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolveError> {
        let version = parse_version_reference(reference)?;
        let resource_name = version.resource_name();

        let span = tracing::debug_span!(
            "gcp.secret.access",
            project.id = version.project,
            secret.name = version.secret,
            secret.version = version.version
        );

        async move {
            let mut attempt = 1;
            loop {
                match self.access_once(&resource_name).await {
                    Ok(payload) => return Ok(payload),
                    Err(e) if e.is_transient() && attempt < self.max_attempts => {
                        let delay = retry_delay(attempt);
                        warn!(
                            error = %e,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Transient error accessing secret version, retrying"
                        );
                        metrics::increment_provider_retries(PROVIDER);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_rustls() {
        // Ignore the error when another test already installed it
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    #[test]
    fn test_retry_delay_doubles() {
        assert_eq!(retry_delay(1), Duration::from_millis(200));
        assert_eq!(retry_delay(2), Duration::from_millis(400));
        assert_eq!(retry_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_error_message_from_gcp_body() {
        let body = r#"{"error":{"code":404,"message":"Secret [x] not found","status":"NOT_FOUND"}}"#;
        assert_eq!(error_message(body), "Secret [x] not found (NOT_FOUND)");
        assert_eq!(error_message("upstream connect error"), "upstream connect error");
    }

    #[tokio::test]
    async fn test_invalid_reference_fails_without_request() {
        init_rustls();
        // Port 9 (discard) is never contacted: the reference is rejected first
        let client = SecretManagerREST::with_static_token("http://127.0.0.1:9", "t", 3).unwrap();
        let result = client.resolve("secrets/db-password").await;
        assert_eq!(
            result,
            Err(ResolveError::InvalidReference("secrets/db-password".to_string()))
        );
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        init_rustls();
        let client =
            SecretManagerREST::with_static_token("http://localhost", "super-secret", 1).unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("static"));
    }

    #[test]
    fn test_static_token_client_has_request_timeout() {
        init_rustls();
        let client = SecretManagerREST::with_static_token("http://localhost", "t", 1).unwrap();
        assert_eq!(
            client.request_timeout(),
            Duration::from_secs(DEFAULT_RESOLVER_TIMEOUT_SECS)
        );
    }
}
