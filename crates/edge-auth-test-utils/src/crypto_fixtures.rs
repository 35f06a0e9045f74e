//! Fixed key fixtures for testing.
//!
//! Every key is checked in under `fixtures/` as a private JWK, so tests are
//! reproducible and the expected DER encodings can be generated once with
//! an independent tool.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey};
use serde_json::{json, Map, Value};
use signature::Signer;
use std::str::FromStr;

/// Members that only exist on private JWKs.
const PRIVATE_MEMBERS: [&str; 6] = ["d", "p", "q", "dp", "dq", "qi"];

/// A fixture key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKey {
    /// 2048-bit RSA, kid `rsa-key-1`.
    Rsa1,
    /// 2048-bit RSA, kid `rsa-key-2`.
    Rsa2,
    /// P-256, kid `ec-p256-key`.
    EcP256,
    /// P-384, kid `ec-p384-key`.
    EcP384,
    /// P-521, kid `ec-p521-key`.
    EcP521,
}

impl TestKey {
    pub const ALL: [TestKey; 5] = [
        TestKey::Rsa1,
        TestKey::Rsa2,
        TestKey::EcP256,
        TestKey::EcP384,
        TestKey::EcP521,
    ];

    /// Base name of the fixture files (`fixtures/<name>.jwk.json`).
    pub fn fixture_name(self) -> &'static str {
        match self {
            TestKey::Rsa1 => "rsa-1",
            TestKey::Rsa2 => "rsa-2",
            TestKey::EcP256 => "ec-p256",
            TestKey::EcP384 => "ec-p384",
            TestKey::EcP521 => "ec-p521",
        }
    }

    pub fn kid(self) -> &'static str {
        match self {
            TestKey::Rsa1 => "rsa-key-1",
            TestKey::Rsa2 => "rsa-key-2",
            TestKey::EcP256 => "ec-p256-key",
            TestKey::EcP384 => "ec-p384-key",
            TestKey::EcP521 => "ec-p521-key",
        }
    }

    /// The algorithm declared in the key's JWK.
    pub fn alg(self) -> &'static str {
        match self {
            TestKey::Rsa1 | TestKey::Rsa2 => "RS256",
            TestKey::EcP256 => "ES256",
            TestKey::EcP384 => "ES384",
            TestKey::EcP521 => "ES512",
        }
    }

    pub fn is_rsa(self) -> bool {
        matches!(self, TestKey::Rsa1 | TestKey::Rsa2)
    }

    /// The full private JWK as checked in.
    pub fn private_jwk_json(self) -> &'static str {
        match self {
            TestKey::Rsa1 => include_str!("../fixtures/rsa-1.jwk.json"),
            TestKey::Rsa2 => include_str!("../fixtures/rsa-2.jwk.json"),
            TestKey::EcP256 => include_str!("../fixtures/ec-p256.jwk.json"),
            TestKey::EcP384 => include_str!("../fixtures/ec-p384.jwk.json"),
            TestKey::EcP521 => include_str!("../fixtures/ec-p521.jwk.json"),
        }
    }

    pub fn private_jwk(self) -> Value {
        serde_json::from_str(self.private_jwk_json()).expect("fixture JWK is valid JSON")
    }

    /// The JWK with every private member removed, as a JWKS would publish it.
    pub fn public_jwk(self) -> Value {
        let mut jwk = self.private_jwk();
        let members = jwk.as_object_mut().expect("fixture JWK is an object");
        for name in PRIVATE_MEMBERS {
            members.remove(name);
        }
        jwk
    }

    /// Sign `signing_input` and return the base64url signature.
    ///
    /// RSA keys honour `alg` when it names an RSA algorithm and fall back to
    /// RS256 otherwise. EC keys always sign with their own curve, so a
    /// mismatched `alg` header still yields a structurally valid token.
    pub fn sign(self, alg: &str, signing_input: &str) -> String {
        let message = signing_input.as_bytes();
        match self {
            TestKey::Rsa1 | TestKey::Rsa2 => {
                let algorithm = Algorithm::from_str(alg)
                    .ok()
                    .filter(|a| {
                        matches!(
                            a,
                            Algorithm::RS256
                                | Algorithm::RS384
                                | Algorithm::RS512
                                | Algorithm::PS256
                                | Algorithm::PS384
                                | Algorithm::PS512
                        )
                    })
                    .unwrap_or(Algorithm::RS256);
                jsonwebtoken::crypto::sign(message, &self.rsa_encoding_key(), algorithm)
                    .expect("RSA signing succeeds")
            }
            TestKey::EcP256 => {
                let key = p256::ecdsa::SigningKey::from_bytes(
                    &p256::SecretKey::from_slice(&self.ec_scalar())
                        .expect("valid P-256 scalar")
                        .to_bytes(),
                )
                .expect("valid P-256 signing key");
                let sig: p256::ecdsa::Signature = key.sign(message);
                URL_SAFE_NO_PAD.encode(sig.to_bytes())
            }
            TestKey::EcP384 => {
                let key = p384::ecdsa::SigningKey::from_bytes(
                    &p384::SecretKey::from_slice(&self.ec_scalar())
                        .expect("valid P-384 scalar")
                        .to_bytes(),
                )
                .expect("valid P-384 signing key");
                let sig: p384::ecdsa::Signature = key.sign(message);
                URL_SAFE_NO_PAD.encode(sig.to_bytes())
            }
            TestKey::EcP521 => {
                let key = p521::ecdsa::SigningKey::from_bytes(
                    &p521::SecretKey::from_slice(&self.ec_scalar())
                        .expect("valid P-521 scalar")
                        .to_bytes(),
                )
                .expect("valid P-521 signing key");
                let sig: p521::ecdsa::Signature = key.sign(message);
                URL_SAFE_NO_PAD.encode(sig.to_bytes())
            }
        }
    }

    fn rsa_encoding_key(self) -> EncodingKey {
        let pem: &[u8] = match self {
            TestKey::Rsa1 => include_bytes!("../fixtures/rsa-1.pem"),
            TestKey::Rsa2 => include_bytes!("../fixtures/rsa-2.pem"),
            other => panic!("{other:?} is not an RSA key"),
        };
        EncodingKey::from_rsa_pem(pem).expect("fixture RSA PEM is valid")
    }

    fn ec_scalar(self) -> Vec<u8> {
        let jwk = self.private_jwk();
        let d = jwk["d"].as_str().expect("EC fixture has d");
        URL_SAFE_NO_PAD.decode(d).expect("d is base64url")
    }
}

/// A JWKS document containing the public JWKs of `keys`.
pub fn jwks_json(keys: &[TestKey]) -> String {
    jwks_from_values(keys.iter().map(|k| k.public_jwk()).collect())
}

/// A JWKS document from arbitrary JWK values.
pub fn jwks_from_values(keys: Vec<Value>) -> String {
    json!({ "keys": keys }).to_string()
}

/// Replace one member of `jwk`, or remove it when `value` is `None`.
pub fn with_member(mut jwk: Value, name: &str, value: Option<&str>) -> Value {
    let members: &mut Map<String, Value> = jwk.as_object_mut().expect("JWK is an object");
    match value {
        Some(v) => {
            members.insert(name.to_string(), Value::String(v.to_string()));
        }
        None => {
            members.remove(name);
        }
    }
    jwk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_jwk_has_no_private_members() {
        for key in TestKey::ALL {
            let jwk = key.public_jwk();
            for name in PRIVATE_MEMBERS {
                assert!(jwk.get(name).is_none(), "{key:?} leaks {name}");
            }
            assert_eq!(jwk["kid"], key.kid());
            assert_eq!(jwk["alg"], key.alg());
        }
    }

    #[test]
    fn test_ec_signatures_are_fixed_width() {
        let cases = [
            (TestKey::EcP256, 64),
            (TestKey::EcP384, 96),
            (TestKey::EcP521, 132),
        ];
        for (key, len) in cases {
            let sig = URL_SAFE_NO_PAD.decode(key.sign(key.alg(), "a.b")).unwrap();
            assert_eq!(sig.len(), len, "{key:?}");
        }
    }

    #[test]
    fn test_rsa_signature_length() {
        let sig = URL_SAFE_NO_PAD
            .decode(TestKey::Rsa1.sign("RS256", "a.b"))
            .unwrap();
        assert_eq!(sig.len(), 256);
    }

    #[test]
    fn test_jwks_json_lists_keys_in_order() {
        let doc: Value = serde_json::from_str(&jwks_json(&[TestKey::Rsa2, TestKey::EcP256])).unwrap();
        assert_eq!(doc["keys"][0]["kid"], "rsa-key-2");
        assert_eq!(doc["keys"][1]["kid"], "ec-p256-key");
    }
}
