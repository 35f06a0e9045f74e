//! Challenge responses for rejected requests.
//!
//! Rejection reasons stay distinct up to this point; the HTTP response is
//! deliberately coarse. The reason is logged, never sent to the client.
//!
//! | Reason | Login configured | Response |
//! |---|---|---|
//! | `ServiceNotReady` | either | 503 + `Retry-After` |
//! | `ServiceUnavailable` | either | 503 |
//! | any other | yes | 302 to the hosted login page |
//! | any other | no | 401 + `WWW-Authenticate` |

use crate::errors::RejectReason;
use axum::{
    http::{
        header::{CACHE_CONTROL, LOCATION, RETRY_AFTER, WWW_AUTHENTICATE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Seconds a client should wait before retrying while keys load.
pub const NOT_READY_RETRY_AFTER_SECONDS: u64 = 1;

const REALM: &str = "edge-auth";

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Turns a [`RejectReason`] into the response sent to the client.
#[derive(Debug, Clone, Default)]
pub struct ChallengeResponder {
    login_url: Option<HeaderValue>,
}

impl ChallengeResponder {
    /// Responder that redirects to `login_url`, or answers 401 when `None`.
    ///
    /// A URL that is not a valid header value is ignored with a warning.
    #[must_use]
    pub fn new(login_url: Option<&str>) -> Self {
        let login_url = login_url.and_then(|url| {
            HeaderValue::from_str(url)
                .inspect_err(|e| {
                    tracing::warn!(
                        target: "edge.challenge",
                        error = %e,
                        "Login URL is not a valid header value, falling back to 401"
                    );
                })
                .ok()
        });
        Self { login_url }
    }

    #[must_use]
    pub fn redirects(&self) -> bool {
        self.login_url.is_some()
    }

    /// Build the response for `reason`.
    #[must_use]
    pub fn respond(&self, reason: RejectReason) -> Response {
        tracing::debug!(
            target: "edge.challenge",
            reason = reason.code(),
            redirect = self.redirects(),
            "Challenging rejected request"
        );

        match reason {
            RejectReason::ServiceNotReady => {
                let mut response = error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_NOT_READY",
                    "Service is starting, please retry shortly",
                );
                response.headers_mut().insert(
                    RETRY_AFTER,
                    HeaderValue::from(NOT_READY_RETRY_AFTER_SECONDS),
                );
                response
            }
            RejectReason::ServiceUnavailable => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable",
            ),
            _ => match &self.login_url {
                Some(location) => {
                    let mut response = StatusCode::FOUND.into_response();
                    let headers = response.headers_mut();
                    headers.insert(LOCATION, location.clone());
                    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
                    response
                }
                None => unauthorized(reason),
            },
        }
    }
}

fn unauthorized(reason: RejectReason) -> Response {
    let mut response = error_response(
        StatusCode::UNAUTHORIZED,
        "UNAUTHENTICATED",
        "Authentication required",
    );

    // No error code when the client sent no credential at all
    let challenge = if reason == RejectReason::NoCredential {
        format!("Bearer realm=\"{REALM}\"")
    } else {
        format!("Bearer realm=\"{REALM}\", error=\"invalid_token\"")
    };
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(WWW_AUTHENTICATE, value);
    }
    response
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        },
    };
    (status, Json(body)).into_response()
}
