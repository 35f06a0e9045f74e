//! Edge authentication gate.
//!
//! Verifies a JWT access token carried in a cookie before serving content.
//! Trusted keys come from the identity provider's JWKS document and are
//! converted to canonical DER/PEM key material once per key set.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth::TokenAuthenticator
//!                                           |-> auth::KeySetCache -> auth::JwksSource
//!                                           |                     -> keys::encode
//!                                           '-> challenge::ChallengeResponder
//! ```
//!
//! # Modules
//!
//! - `auth` - Key set cache, token decoding and the verification pipeline
//! - `challenge` - Rejection reason to HTTP response mapping
//! - `config` - Service configuration from environment
//! - `errors` - Conversion, key set and rejection error types
//! - `handlers` - Health and metrics endpoints
//! - `keys` - JWK to DER/PEM encoding
//! - `middleware` - Axum authentication middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `tasks` - Background key set refresh

pub mod auth;
pub mod challenge;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod keys;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod tasks;
