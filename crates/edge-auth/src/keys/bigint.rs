//! Base64url big-integer decoding for JWK numeric fields.
//!
//! JWK integers (`n`, `e`, `d`, curve coordinates, ...) are unsigned
//! big-endian byte strings in base64url. A set high bit in the first byte is
//! part of the magnitude, never a sign.

use crate::errors::KeyConversionError;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use rsa::BigUint;
use zeroize::Zeroize;

/// URL-safe engine that accepts both padded and unpadded input.
///
/// Some JWKS publishers keep the trailing `=`; the key bytes are identical
/// either way.
const JWK_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Whether the decoded bytes are private key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    /// Public values (`n`, `e`, `x`, `y`).
    Public,
    /// Private values; the intermediate byte buffer is zeroized after use.
    Secret,
}

/// Decode a base64url JWK field into an unsigned big integer.
///
/// # Errors
///
/// Returns `KeyConversionError::MalformedEncoding` if `value` is empty or not
/// valid base64url.
pub fn decode_uint(
    field: &'static str,
    value: &str,
    sensitivity: Sensitivity,
) -> Result<BigUint, KeyConversionError> {
    let mut bytes = decode_bytes(field, value)?;
    let integer = BigUint::from_bytes_be(&bytes);
    if sensitivity == Sensitivity::Secret {
        bytes.zeroize();
    }
    Ok(integer)
}

/// Decode a base64url JWK field into raw bytes.
///
/// # Errors
///
/// Returns `KeyConversionError::MalformedEncoding` if `value` is empty or not
/// valid base64url.
pub fn decode_bytes(field: &'static str, value: &str) -> Result<Vec<u8>, KeyConversionError> {
    if value.is_empty() {
        tracing::debug!(target: "edge.keys", field, "Empty base64url field");
        return Err(KeyConversionError::MalformedEncoding { field });
    }

    JWK_BASE64.decode(value).map_err(|e| {
        tracing::debug!(target: "edge.keys", field, error = %e, "Invalid base64url field");
        KeyConversionError::MalformedEncoding { field }
    })
}

/// Encode bytes as unpadded base64url.
#[must_use]
pub fn encode_bytes(bytes: &[u8]) -> String {
    JWK_BASE64.encode(bytes)
}
