//! Inbound credential extraction and structural decoding.
//!
//! Nothing here verifies a signature. [`InboundToken::decode`] only proves the
//! credential has the shape of a compact JWS so later pipeline stages can
//! read its header and claims.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any base64 or JSON work
//! - Raw token text is never logged

use crate::auth::claims::AccessClaims;
use axum::http::{header::COOKIE, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum accepted token size in bytes (8KB).
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Why a credential is not a well-formed token.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TokenFormatError {
    #[error("Token exceeds {MAX_TOKEN_SIZE_BYTES} bytes")]
    TooLarge,

    #[error("Token does not have exactly three segments")]
    SegmentCount,

    #[error("Token has an empty segment")]
    EmptySegment,

    #[error("Token {0} segment is not valid base64url")]
    Encoding(&'static str),

    #[error("Token {0} segment is not a JSON object")]
    Json(&'static str),

    #[error("Token header has no key id")]
    MissingKid,
}

/// JOSE header fields the gate uses.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub typ: Option<String>,
}

/// Structurally decoded bearer credential.
pub struct InboundToken<'a> {
    raw: &'a str,
    signing_input: &'a str,
    header: TokenHeader,
    kid: String,
    claims: AccessClaims,
    signature: Vec<u8>,
}

impl<'a> InboundToken<'a> {
    /// Decode a compact JWS without verifying it.
    ///
    /// # Errors
    ///
    /// Returns a `TokenFormatError` describing the first structural problem.
    pub fn decode(raw: &'a str) -> Result<Self, TokenFormatError> {
        if raw.len() > MAX_TOKEN_SIZE_BYTES {
            return Err(TokenFormatError::TooLarge);
        }

        let mut segments = raw.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenFormatError::SegmentCount);
        };
        if header_b64.is_empty() || payload_b64.is_empty() || signature_b64.is_empty() {
            return Err(TokenFormatError::EmptySegment);
        }

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenFormatError::Encoding("header"))?;
        let header: TokenHeader = serde_json::from_slice::<Map<String, Value>>(&header_bytes)
            .and_then(|map| serde_json::from_value(Value::Object(map)))
            .map_err(|_| TokenFormatError::Json("header"))?;
        let kid = header
            .kid
            .clone()
            .filter(|kid| !kid.is_empty())
            .ok_or(TokenFormatError::MissingKid)?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenFormatError::Encoding("payload"))?;
        let claims: AccessClaims = serde_json::from_slice::<Map<String, Value>>(&payload_bytes)
            .and_then(|map| serde_json::from_value(Value::Object(map)))
            .map_err(|_| TokenFormatError::Json("payload"))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenFormatError::Encoding("signature"))?;

        // header.payload, exactly as received
        let signing_input_len = header_b64.len() + 1 + payload_b64.len();
        let signing_input = raw
            .get(..signing_input_len)
            .ok_or(TokenFormatError::SegmentCount)?;

        Ok(Self {
            raw,
            signing_input,
            header,
            kid,
            claims,
            signature,
        })
    }

    /// The compact token as received.
    #[must_use]
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// `base64url(header) || '.' || base64url(payload)`.
    #[must_use]
    pub fn signing_input(&self) -> &'a str {
        self.signing_input
    }

    #[must_use]
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Unverified claims. Only trust them after signature verification.
    #[must_use]
    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }

    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

/// Find the credential cookie among the request's `Cookie` headers.
///
/// Cookie pairs are split on `;` and matched by exact name. Returns `None`
/// when the cookie is absent or has an empty value.
pub fn extract_credential<'h>(headers: &'h HeaderMap, cookie_name: &str) -> Option<&'h str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == cookie_name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn b64(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json.as_bytes())
    }

    fn token(header: &str, payload: &str) -> String {
        format!("{}.{}.{}", b64(header), b64(payload), URL_SAFE_NO_PAD.encode(b"sig"))
    }

    fn cookies(values: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(COOKIE, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_extract_credential_exact_name() {
        let headers = cookies(&["theme=dark; edge-auth-token=abc.def.ghi; other=1"]);
        assert_eq!(
            extract_credential(&headers, "edge-auth-token"),
            Some("abc.def.ghi")
        );
        // Prefix of another cookie name must not match
        let headers = cookies(&["edge-auth-token-old=stale"]);
        assert_eq!(extract_credential(&headers, "edge-auth-token"), None);
    }

    #[test]
    fn test_extract_credential_across_multiple_headers() {
        let headers = cookies(&["a=1", "b=2; session=tok"]);
        assert_eq!(extract_credential(&headers, "session"), Some("tok"));
    }

    #[test]
    fn test_extract_credential_absent_or_empty() {
        assert_eq!(extract_credential(&HeaderMap::new(), "session"), None);
        assert_eq!(extract_credential(&cookies(&["session="]), "session"), None);
        assert_eq!(extract_credential(&cookies(&["session"]), "session"), None);
    }

    #[test]
    fn test_decode_valid_token() {
        let raw = token(
            r#"{"alg":"RS256","kid":"k1","typ":"JWT"}"#,
            r#"{"iss":"https://issuer","token_use":"access","exp":100}"#,
        );
        let parsed = InboundToken::decode(&raw).unwrap();
        assert_eq!(parsed.kid(), "k1");
        assert_eq!(parsed.header().alg, "RS256");
        assert_eq!(parsed.claims().iss.as_deref(), Some("https://issuer"));
        assert_eq!(parsed.signature(), b"sig");
        assert_eq!(parsed.raw(), raw);
        let dot = raw.rfind('.').unwrap();
        assert_eq!(parsed.signing_input(), &raw[..dot]);
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let raw = "a".repeat(MAX_TOKEN_SIZE_BYTES + 1);
        assert_eq!(
            InboundToken::decode(&raw).err(),
            Some(TokenFormatError::TooLarge)
        );
    }

    #[test]
    fn test_decode_rejects_segment_count() {
        assert_eq!(
            InboundToken::decode("a.b").err(),
            Some(TokenFormatError::SegmentCount)
        );
        assert_eq!(
            InboundToken::decode("a.b.c.d").err(),
            Some(TokenFormatError::SegmentCount)
        );
        assert_eq!(
            InboundToken::decode("a..c").err(),
            Some(TokenFormatError::EmptySegment)
        );
    }

    #[test]
    fn test_decode_rejects_missing_kid() {
        let raw = token(r#"{"alg":"RS256"}"#, r#"{"iss":"x"}"#);
        assert_eq!(
            InboundToken::decode(&raw).err(),
            Some(TokenFormatError::MissingKid)
        );
    }

    #[test]
    fn test_decode_rejects_non_object_segments() {
        let raw = token(r#"["RS256"]"#, r#"{"iss":"x"}"#);
        assert_eq!(
            InboundToken::decode(&raw).err(),
            Some(TokenFormatError::Json("header"))
        );

        let raw = token(r#"{"alg":"RS256","kid":"k"}"#, "42");
        assert_eq!(
            InboundToken::decode(&raw).err(),
            Some(TokenFormatError::Json("payload"))
        );
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let raw = format!("{}.!!!.{}", b64(r#"{"alg":"RS256","kid":"k"}"#), b64("s"));
        assert_eq!(
            InboundToken::decode(&raw).err(),
            Some(TokenFormatError::Encoding("payload"))
        );
    }
}
