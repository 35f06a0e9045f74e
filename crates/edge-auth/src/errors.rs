//! Edge auth error types.
//!
//! Three families, kept apart on purpose:
//!
//! - [`KeyConversionError`] - a JWK could not be turned into key material
//! - [`KeySetError`] - the trusted key set could not be (re)built
//! - [`RejectReason`] - why a single request was refused
//!
//! Conversion and key-set errors are fatal to the cache. Reject reasons are
//! local to one request and stay distinguishable all the way to the
//! challenge responder, which is the only place they are collapsed into a
//! user-facing response.

use thiserror::Error;

/// Errors raised while converting a JSON Web Key into a key document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyConversionError {
    /// A field is not valid base64url (or is empty).
    #[error("Malformed base64url encoding in field '{field}'")]
    MalformedEncoding { field: &'static str },

    /// A field required for the requested key kind is absent.
    #[error("Missing required JWK field '{0}'")]
    MissingField(&'static str),

    /// The `crv` value is not one of the supported named curves.
    #[error("Unsupported curve '{0}'")]
    UnsupportedCurve(String),

    /// The EC point (supplied or derived) is not a valid point on the curve.
    #[error("Invalid key for curve {curve}: {reason}")]
    InvalidCurvePoint {
        curve: &'static str,
        reason: &'static str,
    },

    /// The `kty` value is neither `RSA` nor `EC`.
    #[error("Unsupported key type '{0}'")]
    UnsupportedKeyType(String),

    /// The decoded key could not be written as DER.
    #[error("Key encoding failed: {0}")]
    Encoding(String),
}

impl From<der::Error> for KeyConversionError {
    fn from(err: der::Error) -> Self {
        KeyConversionError::Encoding(err.to_string())
    }
}

/// Errors raised while populating or refreshing the key set.
#[derive(Debug, Clone, Error)]
pub enum KeySetError {
    /// The JWKS document could not be retrieved.
    #[error("JWKS fetch failed: {0}")]
    Fetch(String),

    /// The JWKS document was retrieved but is not a valid key set.
    #[error("Invalid JWKS document: {0}")]
    Document(String),

    /// One key in the set could not be converted.
    #[error("Key '{kid}' could not be converted: {source}")]
    Conversion {
        kid: String,
        #[source]
        source: KeyConversionError,
    },

    /// Two keys in the set share the same identifier.
    #[error("Duplicate key identifier '{0}' in JWKS")]
    DuplicateKid(String),

    /// The JWKS document contains no keys.
    #[error("JWKS document contains no keys")]
    EmptyKeySet,

    /// `begin_populate` was called after population already started.
    #[error("Key set population already started")]
    AlreadyStarted,

    /// Another population or refresh is still running.
    #[error("Key set refresh already in progress")]
    RefreshInProgress,
}

/// Why a request was rejected by the token authenticator.
///
/// Each variant is independently observable; [`RejectReason::code`] gives a
/// stable machine-readable identifier for logs, metrics and tests.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash)]
pub enum RejectReason {
    #[error("No credential cookie present")]
    NoCredential,

    #[error("Credential is not a well-formed token")]
    MalformedToken,

    #[error("Token issuer does not match")]
    WrongIssuer,

    #[error("Token is not an access token")]
    WrongTokenUse,

    #[error("Token signed by an unknown key")]
    UnknownKey,

    #[error("Token signature or validity window rejected")]
    SignatureInvalid,

    #[error("Key set not ready yet")]
    ServiceNotReady,

    #[error("Key set unavailable")]
    ServiceUnavailable,
}

impl RejectReason {
    /// All reasons, in pipeline order.
    pub const ALL: [RejectReason; 8] = [
        RejectReason::NoCredential,
        RejectReason::MalformedToken,
        RejectReason::WrongIssuer,
        RejectReason::WrongTokenUse,
        RejectReason::ServiceNotReady,
        RejectReason::UnknownKey,
        RejectReason::ServiceUnavailable,
        RejectReason::SignatureInvalid,
    ];

    /// Stable snake_case identifier (used as a metric label and redirect hint).
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            RejectReason::NoCredential => "no_credential",
            RejectReason::MalformedToken => "malformed_token",
            RejectReason::WrongIssuer => "wrong_issuer",
            RejectReason::WrongTokenUse => "wrong_token_use",
            RejectReason::UnknownKey => "unknown_key",
            RejectReason::SignatureInvalid => "signature_invalid",
            RejectReason::ServiceNotReady => "service_not_ready",
            RejectReason::ServiceUnavailable => "service_unavailable",
        }
    }

    /// Whether the rejection is caused by the gate itself rather than the
    /// caller's credential.
    #[must_use]
    pub fn is_availability(self) -> bool {
        matches!(
            self,
            RejectReason::ServiceNotReady | RejectReason::ServiceUnavailable
        )
    }
}
