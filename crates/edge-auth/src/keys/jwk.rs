//! JSON Web Key model.
//!
//! JWKS entries are deserialized into the permissive [`RawJwk`] shape and then
//! validated once into the tagged [`Jwk`] enum, so the encoders downstream
//! never deal with a missing `kid` or an unknown key type.

use crate::errors::{KeySetError, KeyConversionError};
use der::asn1::ObjectIdentifier;
use serde::Deserialize;
use std::fmt;
use zeroize::Zeroizing;

const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// Named curves supported for EC keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedCurve {
    P256,
    P384,
    P521,
}

impl NamedCurve {
    /// Parse the JWK `crv` value.
    ///
    /// # Errors
    ///
    /// Returns `KeyConversionError::UnsupportedCurve` for any other name.
    pub fn from_jwk_name(name: &str) -> Result<Self, KeyConversionError> {
        match name {
            "P-256" => Ok(NamedCurve::P256),
            "P-384" => Ok(NamedCurve::P384),
            "P-521" => Ok(NamedCurve::P521),
            other => Err(KeyConversionError::UnsupportedCurve(other.to_string())),
        }
    }

    /// JWK `crv` name.
    #[must_use]
    pub fn jwk_name(self) -> &'static str {
        match self {
            NamedCurve::P256 => "P-256",
            NamedCurve::P384 => "P-384",
            NamedCurve::P521 => "P-521",
        }
    }

    /// Object identifier of the named curve.
    #[must_use]
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            NamedCurve::P256 => SECP256R1,
            NamedCurve::P384 => SECP384R1,
            NamedCurve::P521 => SECP521R1,
        }
    }

    /// Field element width in bytes (coordinate and scalar length).
    #[must_use]
    pub fn field_width(self) -> usize {
        match self {
            NamedCurve::P256 => 32,
            NamedCurve::P384 => 48,
            NamedCurve::P521 => 66,
        }
    }

    /// JWS algorithm that signs with this curve.
    #[must_use]
    pub fn jws_algorithm(self) -> &'static str {
        match self {
            NamedCurve::P256 => "ES256",
            NamedCurve::P384 => "ES384",
            NamedCurve::P521 => "ES512",
        }
    }
}

impl fmt::Display for NamedCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jwk_name())
    }
}

/// A JWKS entry exactly as published, before validation.
///
/// Private members are wiped on drop even when validation rejects the key.
#[derive(Clone, Default, Deserialize)]
pub struct RawJwk {
    #[serde(default)]
    pub kty: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    // RSA
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub p: Option<Zeroizing<String>>,
    #[serde(default)]
    pub q: Option<Zeroizing<String>>,
    #[serde(default)]
    pub dp: Option<Zeroizing<String>>,
    #[serde(default)]
    pub dq: Option<Zeroizing<String>>,
    #[serde(default)]
    pub qi: Option<Zeroizing<String>>,

    // EC
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,

    // Private exponent (RSA) or scalar (EC)
    #[serde(default)]
    pub d: Option<Zeroizing<String>>,
}

impl fmt::Debug for RawJwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawJwk")
            .field("kty", &self.kty)
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .field("crv", &self.crv)
            .field("has_private", &self.d.is_some())
            .finish_non_exhaustive()
    }
}

/// A JWKS document: `{"keys": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<RawJwk>,
}

impl JwksDocument {
    /// Parse a JWKS document from its JSON body.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::Document` if the body is not a JSON object with
    /// a `keys` array of objects.
    pub fn from_slice(body: &[u8]) -> Result<Self, KeySetError> {
        serde_json::from_slice(body).map_err(|e| KeySetError::Document(e.to_string()))
    }
}

/// A validated JSON Web Key.
#[derive(Clone)]
pub enum Jwk {
    Rsa(RsaJwk),
    Ec(EcJwk),
}

/// RSA key fields. Private members are present only for private JWKs.
#[derive(Clone)]
pub struct RsaJwk {
    pub kid: String,
    pub alg: Option<String>,
    pub n: String,
    pub e: String,
    pub d: Option<Zeroizing<String>>,
    pub p: Option<Zeroizing<String>>,
    pub q: Option<Zeroizing<String>>,
    pub dp: Option<Zeroizing<String>>,
    pub dq: Option<Zeroizing<String>>,
    pub qi: Option<Zeroizing<String>>,
}

/// EC key fields. `x`/`y` may be absent when the scalar `d` is given.
#[derive(Clone)]
pub struct EcJwk {
    pub kid: String,
    pub alg: Option<String>,
    pub curve: NamedCurve,
    pub x: Option<String>,
    pub y: Option<String>,
    pub d: Option<Zeroizing<String>>,
}

impl Jwk {
    #[must_use]
    pub fn kid(&self) -> &str {
        match self {
            Jwk::Rsa(key) => &key.kid,
            Jwk::Ec(key) => &key.kid,
        }
    }

    /// Declared `alg`, if the publisher set one.
    #[must_use]
    pub fn alg(&self) -> Option<&str> {
        match self {
            Jwk::Rsa(key) => key.alg.as_deref(),
            Jwk::Ec(key) => key.alg.as_deref(),
        }
    }

    #[must_use]
    pub fn has_private_material(&self) -> bool {
        match self {
            Jwk::Rsa(key) => key.d.is_some(),
            Jwk::Ec(key) => key.d.is_some(),
        }
    }
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Jwk::Rsa(key) => f
                .debug_struct("Jwk::Rsa")
                .field("kid", &key.kid)
                .field("alg", &key.alg)
                .field("private", &"[REDACTED]")
                .finish(),
            Jwk::Ec(key) => f
                .debug_struct("Jwk::Ec")
                .field("kid", &key.kid)
                .field("alg", &key.alg)
                .field("crv", &key.curve)
                .field("private", &"[REDACTED]")
                .finish(),
        }
    }
}

impl TryFrom<RawJwk> for Jwk {
    type Error = KeyConversionError;

    /// Validate the key type, identifier and the fields every key of that
    /// type needs. Private members stay optional here; the encoder checks
    /// them when private output is requested.
    fn try_from(raw: RawJwk) -> Result<Self, Self::Error> {
        let kty = raw.kty.ok_or(KeyConversionError::MissingField("kty"))?;
        let kid = raw
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(KeyConversionError::MissingField("kid"))?;

        match kty.as_str() {
            "RSA" => Ok(Jwk::Rsa(RsaJwk {
                kid,
                alg: raw.alg,
                n: raw.n.ok_or(KeyConversionError::MissingField("n"))?,
                e: raw.e.ok_or(KeyConversionError::MissingField("e"))?,
                d: raw.d,
                p: raw.p,
                q: raw.q,
                dp: raw.dp,
                dq: raw.dq,
                qi: raw.qi,
            })),
            "EC" => {
                let crv = raw.crv.ok_or(KeyConversionError::MissingField("crv"))?;
                let curve = NamedCurve::from_jwk_name(&crv)?;
                let d = raw.d;
                // Without a scalar the public point must be published
                if d.is_none() {
                    if raw.x.is_none() {
                        return Err(KeyConversionError::MissingField("x"));
                    }
                    if raw.y.is_none() {
                        return Err(KeyConversionError::MissingField("y"));
                    }
                }
                Ok(Jwk::Ec(EcJwk {
                    kid,
                    alg: raw.alg,
                    curve,
                    x: raw.x,
                    y: raw.y,
                    d,
                }))
            }
            other => Err(KeyConversionError::UnsupportedKeyType(other.to_string())),
        }
    }
}

impl Jwk {
    /// Parse and validate a single JWK from JSON.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::Document` for invalid JSON and
    /// `KeySetError::Conversion` when the key fails validation.
    pub fn from_json(json: &str) -> Result<Self, KeySetError> {
        let raw: RawJwk =
            serde_json::from_str(json).map_err(|e| KeySetError::Document(e.to_string()))?;
        let kid = raw.kid.clone().unwrap_or_default();
        Jwk::try_from(raw).map_err(|source| KeySetError::Conversion { kid, source })
    }
}
