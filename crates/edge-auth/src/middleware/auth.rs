//! Authentication middleware for protected content.
//!
//! Runs the [`TokenAuthenticator`] on every request. Accepted requests are
//! forwarded with their `Authorization` headers removed and the verified
//! [`AccessClaims`] in extensions; rejected requests get the
//! [`ChallengeResponder`] response and never reach the inner service.

use crate::auth::{AccessClaims, TokenAuthenticator, Verdict};
use crate::challenge::ChallengeResponder;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone, Debug)]
pub struct AuthState {
    pub authenticator: TokenAuthenticator,
    pub challenge: ChallengeResponder,
}

/// Gate a request on its credential cookie.
///
/// # Response
///
/// - 302 to the hosted login page (401 when none is configured) for
///   credential failures
/// - 503 while the key set is loading or after it failed to load
/// - Otherwise the inner service's response
#[instrument(skip_all, name = "edge.middleware.auth", fields(path = %req.uri().path()))]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    req: Request,
    next: Next,
) -> Response {
    match state.authenticator.authenticate(req).await {
        Verdict::Accepted(req) => next.run(req).await,
        Verdict::Rejected(reason) => {
            tracing::info!(
                target: "edge.middleware.auth",
                reason = reason.code(),
                "Request rejected"
            );
            state.challenge.respond(reason)
        }
    }
}

/// Access to the verified claims of an accepted request.
pub trait ClaimsExt {
    /// `None` if the request did not pass through [`require_auth`].
    fn claims(&self) -> Option<&AccessClaims>;
}

impl<B> ClaimsExt for axum::http::Request<B> {
    fn claims(&self) -> Option<&AccessClaims> {
        self.extensions().get::<AccessClaims>()
    }
}
