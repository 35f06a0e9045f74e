//! Token verification.
//!
//! - `jwks` - Where the trusted key set comes from
//! - `key_set` - The lazily populated, refreshable key set cache
//! - `verification_key` - One trusted key and its signature check
//! - `token` - Credential extraction and structural decoding
//! - `claims` - Access token claims
//! - `authenticator` - The per-request verification pipeline

pub mod authenticator;
pub mod claims;
pub mod jwks;
pub mod key_set;
pub mod token;
pub mod verification_key;

pub use authenticator::{strip_authorization, TokenAuthenticator, Verdict};
pub use claims::AccessClaims;
pub use jwks::{HttpJwksSource, JwksSource, StaticJwksSource};
pub use key_set::{KeySet, KeySetCache, KeySetState, KeySetStatus, LookupError};
pub use token::{extract_credential, InboundToken};
pub use verification_key::{JwsAlgorithm, VerificationKey, VerificationPolicy};
