//! # Edge Auth Test Utilities
//!
//! Shared test utilities for the edge auth gate.
//!
//! This crate provides:
//! - Fixed RSA and EC key fixtures with their JWKs
//! - Token signing for RS*/PS*/ES256/ES384/ES512
//! - A fluent `TestTokenBuilder` for access-token claims
//! - Helpers for mocking a JWKS endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use edge_auth_test_utils::*;
//!
//! let jwks = jwks_json(&[TestKey::Rsa1, TestKey::EcP521]);
//! let token = TestTokenBuilder::new(TestKey::EcP521)
//!     .username("alice")
//!     .expires_in(300)
//!     .build();
//! ```

pub mod crypto_fixtures;
pub mod jwks_mock;
pub mod token_builders;

pub use crypto_fixtures::*;
pub use jwks_mock::*;
pub use token_builders::*;
