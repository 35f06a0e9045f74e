//! JWK to key-material encoding.
//!
//! [`encode`] turns a validated [`Jwk`] into a canonical DER document plus
//! its PEM armour:
//!
//! | Key       | Public output (label)                | Private output (label)          |
//! |-----------|--------------------------------------|---------------------------------|
//! | RSA       | PKCS#1 `RSAPublicKey` (`RSA PUBLIC KEY`) | PKCS#1 `RSAPrivateKey` (`RSA PRIVATE KEY`) |
//! | EC        | `SubjectPublicKeyInfo` (`PUBLIC KEY`)    | SEC1 `ECPrivateKey` (`EC PRIVATE KEY`)     |
//!
//! Encoding is deterministic; the same JWK always yields byte-identical
//! output.

pub mod bigint;
mod ec;
pub mod jwk;
mod rsa;

pub use jwk::{EcJwk, Jwk, JwksDocument, NamedCurve, RawJwk, RsaJwk};

use crate::errors::KeyConversionError;
use zeroize::Zeroizing;

/// Which half of the key pair to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyVisibility {
    Public,
    Private,
}

/// Key family of an encoded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    Rsa,
    Ec(NamedCurve),
}

/// An encoded key: DER bytes and the equivalent PEM text.
///
/// Both buffers are wiped on drop, which matters for private documents.
pub struct KeyDocument {
    family: KeyFamily,
    visibility: KeyVisibility,
    der: Zeroizing<Vec<u8>>,
    pem: Zeroizing<String>,
    public_point: Option<Vec<u8>>,
}

impl KeyDocument {
    fn new(
        family: KeyFamily,
        visibility: KeyVisibility,
        der: Zeroizing<Vec<u8>>,
        public_point: Option<Vec<u8>>,
    ) -> Self {
        let label = pem_label(family, visibility);
        let pem = Zeroizing::new(pem::encode(&pem::Pem::new(label, der.to_vec())));
        Self {
            family,
            visibility,
            der,
            pem,
            public_point,
        }
    }

    #[must_use]
    pub fn family(&self) -> KeyFamily {
        self.family
    }

    #[must_use]
    pub fn visibility(&self) -> KeyVisibility {
        self.visibility
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }

    #[must_use]
    pub fn pem_label(&self) -> &'static str {
        pem_label(self.family, self.visibility)
    }

    /// Uncompressed SEC1 public point (`0x04 || X || Y`) for EC keys.
    #[must_use]
    pub fn public_point(&self) -> Option<&[u8]> {
        self.public_point.as_deref()
    }
}

impl std::fmt::Debug for KeyDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDocument")
            .field("family", &self.family)
            .field("visibility", &self.visibility)
            .field("der_len", &self.der.len())
            .finish_non_exhaustive()
    }
}

fn pem_label(family: KeyFamily, visibility: KeyVisibility) -> &'static str {
    match (family, visibility) {
        (KeyFamily::Rsa, KeyVisibility::Public) => "RSA PUBLIC KEY",
        (KeyFamily::Rsa, KeyVisibility::Private) => "RSA PRIVATE KEY",
        (KeyFamily::Ec(_), KeyVisibility::Public) => "PUBLIC KEY",
        (KeyFamily::Ec(_), KeyVisibility::Private) => "EC PRIVATE KEY",
    }
}

/// Encode a JWK as a DER/PEM key document.
///
/// # Errors
///
/// Returns a `KeyConversionError` when a field needed for `visibility` is
/// missing or malformed, or an EC point fails validation.
pub fn encode(jwk: &Jwk, visibility: KeyVisibility) -> Result<KeyDocument, KeyConversionError> {
    let document = match jwk {
        Jwk::Rsa(key) => {
            let der = match visibility {
                KeyVisibility::Public => Zeroizing::new(rsa::encode_public(key)?),
                KeyVisibility::Private => rsa::encode_private(key)?,
            };
            KeyDocument::new(KeyFamily::Rsa, visibility, der, None)
        }
        Jwk::Ec(key) => {
            let material = ec::material(key)?;
            let der = match visibility {
                KeyVisibility::Public => Zeroizing::new(ec::encode_public(key.curve, &material)?),
                KeyVisibility::Private => ec::encode_private(key.curve, &material)?,
            };
            KeyDocument::new(
                KeyFamily::Ec(key.curve),
                visibility,
                der,
                Some(material.point),
            )
        }
    };

    tracing::trace!(
        target: "edge.keys",
        kid = %jwk.kid(),
        family = ?document.family,
        visibility = ?visibility,
        "Encoded key document"
    );

    Ok(document)
}
