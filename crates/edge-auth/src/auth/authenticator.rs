//! Token authenticator.
//!
//! Runs the per-request verification pipeline. The stages are strictly
//! ordered and fail fast; the first failing stage decides the reason.
//!
//! 1. Credential cookie present and non-empty (`NoCredential`)
//! 2. Token structurally decodable with a `kid` (`MalformedToken`)
//! 3. `iss` equals the configured issuer (`WrongIssuer`)
//! 4. `token_use` is `access` (`WrongTokenUse`)
//! 5. `kid` found in the key set (`ServiceNotReady`, `UnknownKey`,
//!    `ServiceUnavailable`)
//! 6. Signature, algorithm, `exp` and `nbf` verified (`SignatureInvalid`)
//! 7. `Authorization` headers removed, verified claims attached
//!
//! Stages 3 and 4 read unverified claims. They only reject early, they never
//! accept.

use crate::auth::claims::AccessClaims;
use crate::auth::key_set::{KeySetCache, LookupError};
use crate::auth::token::{extract_credential, InboundToken};
use crate::auth::verification_key::VerificationPolicy;
use crate::errors::RejectReason;
use crate::observability::metrics;
use axum::http::{header::AUTHORIZATION, HeaderMap, Request};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Outcome of authenticating one request.
#[derive(Debug)]
pub enum Verdict<B> {
    /// The request, sanitized, with [`AccessClaims`] in its extensions.
    Accepted(Request<B>),
    Rejected(RejectReason),
}

/// Verifies the credential cookie of inbound requests.
#[derive(Clone)]
pub struct TokenAuthenticator {
    key_set: KeySetCache,
    policy: Arc<VerificationPolicy>,
    cookie_name: Arc<str>,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("issuer", &self.policy.issuer)
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl TokenAuthenticator {
    #[must_use]
    pub fn new(
        key_set: KeySetCache,
        policy: VerificationPolicy,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            key_set,
            policy: Arc::new(policy),
            cookie_name: Arc::from(cookie_name.into()),
        }
    }

    #[must_use]
    pub fn key_set(&self) -> &KeySetCache {
        &self.key_set
    }

    /// Authenticate `request`, producing exactly one verdict.
    #[instrument(skip_all, fields(outcome))]
    pub async fn authenticate<B>(&self, mut request: Request<B>) -> Verdict<B> {
        let started = Instant::now();
        let result = self.verify_credential(request.headers()).await;
        metrics::record_verdict(
            result.as_ref().map(|_| ()).map_err(|reason| *reason),
            started.elapsed(),
        );

        match result {
            Ok(claims) => {
                tracing::Span::current().record("outcome", "accepted");
                strip_authorization(request.headers_mut());
                request.extensions_mut().insert(claims);
                Verdict::Accepted(request)
            }
            Err(reason) => {
                tracing::Span::current().record("outcome", reason.code());
                Verdict::Rejected(reason)
            }
        }
    }

    /// Run pipeline stages 1-6 against `headers`.
    ///
    /// # Errors
    ///
    /// Returns the `RejectReason` of the first failing stage.
    pub async fn verify_credential(&self, headers: &HeaderMap) -> Result<AccessClaims, RejectReason> {
        let raw = extract_credential(headers, &self.cookie_name).ok_or_else(|| {
            tracing::debug!(target: "edge.auth.token", "No credential cookie");
            RejectReason::NoCredential
        })?;

        let token = InboundToken::decode(raw).map_err(|e| {
            tracing::debug!(target: "edge.auth.token", error = %e, "Malformed token");
            RejectReason::MalformedToken
        })?;

        if token.claims().iss.as_deref() != Some(self.policy.issuer.as_str()) {
            tracing::debug!(
                target: "edge.auth.token",
                iss = ?token.claims().iss,
                "Token issuer mismatch"
            );
            return Err(RejectReason::WrongIssuer);
        }

        if !token.claims().is_access_token() {
            tracing::debug!(
                target: "edge.auth.token",
                token_use = ?token.claims().token_use,
                "Token is not an access token"
            );
            return Err(RejectReason::WrongTokenUse);
        }

        let key = self.key_set.lookup(token.kid()).await.map_err(|e| {
            tracing::debug!(target: "edge.auth.token", kid = %token.kid(), error = %e, "Key lookup failed");
            match e {
                LookupError::NotReady => RejectReason::ServiceNotReady,
                LookupError::NotFound => RejectReason::UnknownKey,
                LookupError::Unavailable => RejectReason::ServiceUnavailable,
            }
        })?;

        let claims = key.verify(&token, &self.policy).map_err(|e| {
            tracing::debug!(
                target: "edge.auth.token",
                kid = %token.kid(),
                alg = %token.header().alg,
                error = %e,
                "Token verification failed"
            );
            RejectReason::SignatureInvalid
        })?;

        tracing::debug!(target: "edge.auth.token", kid = %token.kid(), "Token verified");
        Ok(claims)
    }
}

/// Remove every `Authorization` header. Idempotent.
pub fn strip_authorization(headers: &mut HeaderMap) {
    // `remove` drops all values stored under the name
    headers.remove(AUTHORIZATION);
}
