//! Background tasks for the edge gate.
//!
//! # Tasks
//!
//! - `key_set_refresh` - Periodically re-fetches the JWKS to pick up key rotations

pub mod key_set_refresh;

pub use key_set_refresh::start_key_set_refresh;
