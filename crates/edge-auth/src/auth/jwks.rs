//! JWKS sources.
//!
//! The key set cache pulls its JWKS document through the [`JwksSource`]
//! trait. Production uses [`HttpJwksSource`] against the identity provider's
//! `/.well-known/jwks.json`; [`StaticJwksSource`] serves a preloaded document
//! (inline configuration and tests).

use crate::errors::KeySetError;
use crate::keys::JwksDocument;
use async_trait::async_trait;
use std::time::Duration;
use tracing::instrument;

/// Default HTTP timeout for a JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Somewhere a JWKS document can be read from.
#[async_trait]
pub trait JwksSource: Send + Sync {
    /// Retrieve and parse the current JWKS document.
    async fn fetch(&self) -> Result<JwksDocument, KeySetError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Fetches the JWKS document over HTTP(S).
pub struct HttpJwksSource {
    jwks_url: String,
    http_client: reqwest::Client,
}

impl HttpJwksSource {
    #[must_use]
    pub fn new(jwks_url: String) -> Self {
        Self::with_timeout(jwks_url, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a source with a custom request timeout.
    #[must_use]
    pub fn with_timeout(jwks_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "edge.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.jwks_url
    }
}

#[async_trait]
impl JwksSource for HttpJwksSource {
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn fetch(&self) -> Result<JwksDocument, KeySetError> {
        tracing::debug!(target: "edge.auth.jwks", "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "edge.auth.jwks", error = %e, "Failed to fetch JWKS");
                KeySetError::Fetch(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "edge.auth.jwks",
                status = %status,
                "JWKS endpoint returned error"
            );
            return Err(KeySetError::Fetch(format!("HTTP status {status}")));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target: "edge.auth.jwks", error = %e, "Failed to read JWKS response");
            KeySetError::Fetch(e.to_string())
        })?;

        let document = JwksDocument::from_slice(&body).inspect_err(|e| {
            tracing::error!(target: "edge.auth.jwks", error = %e, "Failed to parse JWKS response");
        })?;

        tracing::debug!(
            target: "edge.auth.jwks",
            key_count = document.keys.len(),
            "JWKS fetched"
        );
        Ok(document)
    }

    fn describe(&self) -> String {
        self.jwks_url.clone()
    }
}

/// Serves a fixed JWKS document.
///
/// The body is parsed on every fetch so a malformed inline document fails
/// population the same way a malformed HTTP response would.
#[derive(Debug, Clone)]
pub struct StaticJwksSource {
    body: String,
}

impl StaticJwksSource {
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl JwksSource for StaticJwksSource {
    async fn fetch(&self) -> Result<JwksDocument, KeySetError> {
        JwksDocument::from_slice(self.body.as_bytes())
    }

    fn describe(&self) -> String {
        "inline".to_string()
    }
}
