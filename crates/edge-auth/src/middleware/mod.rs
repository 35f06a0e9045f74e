//! HTTP middleware for the edge gate.
//!
//! # Components
//!
//! - `auth` - Credential cookie verification in front of protected content

pub mod auth;

pub use auth::{require_auth, AuthState, ClaimsExt};
