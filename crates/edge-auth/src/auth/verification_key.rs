//! Trusted verification keys.
//!
//! A [`VerificationKey`] is built once per JWKS entry during population and
//! shared read-only afterwards. It owns the encoded public key document and a
//! prepared verifier, so the request path does no key parsing.
//!
//! RSA and ES256/ES384 signatures go through `jsonwebtoken`. `jsonwebtoken`
//! has no ES512, so P-521 keys are verified with the `p521` crate and the
//! registered claims are checked here.

use crate::auth::claims::AccessClaims;
use crate::auth::token::InboundToken;
use crate::errors::KeyConversionError;
use crate::keys::{self, Jwk, KeyDocument, KeyFamily, KeyVisibility, NamedCurve};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use p521::ecdsa::{Signature as P521Signature, VerifyingKey as P521VerifyingKey};
use signature::Verifier as _;
use std::fmt;
use thiserror::Error;

/// JWS algorithms a trusted key may be used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JwsAlgorithm {
    Rs256,
    Rs384,
    Rs512,
    Ps256,
    Ps384,
    Ps512,
    Es256,
    Es384,
    Es512,
}

const RSA_ALGORITHMS: &[JwsAlgorithm] = &[
    JwsAlgorithm::Rs256,
    JwsAlgorithm::Rs384,
    JwsAlgorithm::Rs512,
    JwsAlgorithm::Ps256,
    JwsAlgorithm::Ps384,
    JwsAlgorithm::Ps512,
];

impl JwsAlgorithm {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RS256" => Some(JwsAlgorithm::Rs256),
            "RS384" => Some(JwsAlgorithm::Rs384),
            "RS512" => Some(JwsAlgorithm::Rs512),
            "PS256" => Some(JwsAlgorithm::Ps256),
            "PS384" => Some(JwsAlgorithm::Ps384),
            "PS512" => Some(JwsAlgorithm::Ps512),
            "ES256" => Some(JwsAlgorithm::Es256),
            "ES384" => Some(JwsAlgorithm::Es384),
            "ES512" => Some(JwsAlgorithm::Es512),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            JwsAlgorithm::Rs256 => "RS256",
            JwsAlgorithm::Rs384 => "RS384",
            JwsAlgorithm::Rs512 => "RS512",
            JwsAlgorithm::Ps256 => "PS256",
            JwsAlgorithm::Ps384 => "PS384",
            JwsAlgorithm::Ps512 => "PS512",
            JwsAlgorithm::Es256 => "ES256",
            JwsAlgorithm::Es384 => "ES384",
            JwsAlgorithm::Es512 => "ES512",
        }
    }

    /// Algorithms a key of `family` can verify.
    #[must_use]
    pub fn for_family(family: KeyFamily) -> &'static [JwsAlgorithm] {
        match family {
            KeyFamily::Rsa => RSA_ALGORITHMS,
            KeyFamily::Ec(NamedCurve::P256) => &[JwsAlgorithm::Es256],
            KeyFamily::Ec(NamedCurve::P384) => &[JwsAlgorithm::Es384],
            KeyFamily::Ec(NamedCurve::P521) => &[JwsAlgorithm::Es512],
        }
    }

    fn as_jsonwebtoken(self) -> Option<Algorithm> {
        match self {
            JwsAlgorithm::Rs256 => Some(Algorithm::RS256),
            JwsAlgorithm::Rs384 => Some(Algorithm::RS384),
            JwsAlgorithm::Rs512 => Some(Algorithm::RS512),
            JwsAlgorithm::Ps256 => Some(Algorithm::PS256),
            JwsAlgorithm::Ps384 => Some(Algorithm::PS384),
            JwsAlgorithm::Ps512 => Some(Algorithm::PS512),
            JwsAlgorithm::Es256 => Some(Algorithm::ES256),
            JwsAlgorithm::Es384 => Some(Algorithm::ES384),
            JwsAlgorithm::Es512 => None,
        }
    }
}

/// Claim constraints applied during signature verification.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    /// Required `iss` value.
    pub issuer: String,
    /// Tolerance applied to `exp` and `nbf`.
    pub leeway_seconds: u64,
}

/// Why a structurally valid token failed verification.
///
/// All variants surface to callers as a single signature rejection; the
/// detail is for logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error("Algorithm '{0}' is not allowed for this key")]
    AlgorithmNotAllowed(String),

    #[error("Signature does not verify")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("Claim validation failed: {0}")]
    Claims(String),
}

enum Verifier {
    Jwt(DecodingKey),
    P521(P521VerifyingKey),
}

/// A trusted key, ready to verify tokens.
pub struct VerificationKey {
    kid: String,
    document: KeyDocument,
    algorithms: Vec<JwsAlgorithm>,
    verifier: Verifier,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("family", &self.document.family())
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Encode the public half of `jwk` and prepare its verifier.
    ///
    /// # Errors
    ///
    /// Returns the `KeyConversionError` raised while encoding the key.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyConversionError> {
        let document = keys::encode(jwk, KeyVisibility::Public)?;
        let family = document.family();

        let verifier = match family {
            KeyFamily::Rsa => Verifier::Jwt(DecodingKey::from_rsa_der(document.der())),
            KeyFamily::Ec(NamedCurve::P521) => {
                let point = document
                    .public_point()
                    .ok_or(KeyConversionError::MissingField("x"))?;
                let key = P521VerifyingKey::from_sec1_bytes(point).map_err(|_| {
                    KeyConversionError::InvalidCurvePoint {
                        curve: NamedCurve::P521.jwk_name(),
                        reason: "point rejected by verifier",
                    }
                })?;
                Verifier::P521(key)
            }
            KeyFamily::Ec(curve) => {
                let key = DecodingKey::from_ec_pem(document.pem().as_bytes()).map_err(|_| {
                    KeyConversionError::InvalidCurvePoint {
                        curve: curve.jwk_name(),
                        reason: "point rejected by verifier",
                    }
                })?;
                Verifier::Jwt(key)
            }
        };

        let family_algorithms = JwsAlgorithm::for_family(family);
        let algorithms: Vec<JwsAlgorithm> = match jwk.alg() {
            Some(declared) => family_algorithms
                .iter()
                .copied()
                .filter(|alg| alg.name() == declared)
                .collect(),
            None => family_algorithms.to_vec(),
        };
        if algorithms.is_empty() {
            tracing::warn!(
                target: "edge.auth.key_set",
                kid = %jwk.kid(),
                alg = ?jwk.alg(),
                "Declared algorithm does not match key type; key will reject every token"
            );
        }

        Ok(Self {
            kid: jwk.kid().to_string(),
            document,
            algorithms,
            verifier,
        })
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    #[must_use]
    pub fn family(&self) -> KeyFamily {
        self.document.family()
    }

    /// Encoded public key document.
    #[must_use]
    pub fn document(&self) -> &KeyDocument {
        &self.document
    }

    #[must_use]
    pub fn algorithms(&self) -> &[JwsAlgorithm] {
        &self.algorithms
    }

    /// Verify `token`'s signature and registered claims.
    ///
    /// # Errors
    ///
    /// Returns a `VerificationFailure` if the header algorithm is not allowed
    /// for this key, the signature does not verify, or `exp`/`nbf`/`iss`
    /// fail under `policy`.
    pub fn verify(
        &self,
        token: &InboundToken<'_>,
        policy: &VerificationPolicy,
    ) -> Result<AccessClaims, VerificationFailure> {
        let alg_name = token.header().alg.as_str();
        let alg = JwsAlgorithm::from_name(alg_name)
            .filter(|alg| self.algorithms.contains(alg))
            .ok_or_else(|| VerificationFailure::AlgorithmNotAllowed(alg_name.to_string()))?;

        match (&self.verifier, alg.as_jsonwebtoken()) {
            (Verifier::Jwt(key), Some(algorithm)) => verify_jwt(token, key, algorithm, policy),
            (Verifier::P521(key), None) => verify_p521(token, key, policy),
            _ => Err(VerificationFailure::AlgorithmNotAllowed(alg_name.to_string())),
        }
    }
}

fn verify_jwt(
    token: &InboundToken<'_>,
    key: &DecodingKey,
    algorithm: Algorithm,
    policy: &VerificationPolicy,
) -> Result<AccessClaims, VerificationFailure> {
    let mut validation = Validation::new(algorithm);
    validation.leeway = policy.leeway_seconds;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.set_issuer(&[policy.issuer.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss"]);

    decode::<AccessClaims>(token.raw(), key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => VerificationFailure::BadSignature,
            ErrorKind::ExpiredSignature => VerificationFailure::Expired,
            ErrorKind::ImmatureSignature => VerificationFailure::NotYetValid,
            _ => VerificationFailure::Claims(e.to_string()),
        })
}

fn verify_p521(
    token: &InboundToken<'_>,
    key: &P521VerifyingKey,
    policy: &VerificationPolicy,
) -> Result<AccessClaims, VerificationFailure> {
    let signature =
        P521Signature::from_slice(token.signature()).map_err(|_| VerificationFailure::BadSignature)?;
    key.verify(token.signing_input().as_bytes(), &signature)
        .map_err(|_| VerificationFailure::BadSignature)?;

    let claims = token.claims().clone();
    validate_registered_claims(&claims, policy, jsonwebtoken::get_current_timestamp())?;
    Ok(claims)
}

/// `iss`, `exp` and `nbf` checks with the same semantics `jsonwebtoken`
/// applies: expired when `exp < now - leeway`, immature when
/// `nbf > now + leeway`.
fn validate_registered_claims(
    claims: &AccessClaims,
    policy: &VerificationPolicy,
    now: u64,
) -> Result<(), VerificationFailure> {
    if claims.iss.as_deref() != Some(policy.issuer.as_str()) {
        return Err(VerificationFailure::Claims("issuer mismatch".to_string()));
    }

    let now = i64::try_from(now).unwrap_or(i64::MAX);
    let leeway = i64::try_from(policy.leeway_seconds).unwrap_or(i64::MAX);

    let exp = claims
        .exp
        .ok_or_else(|| VerificationFailure::Claims("missing exp".to_string()))?;
    if exp < now.saturating_sub(leeway) {
        return Err(VerificationFailure::Expired);
    }

    if let Some(nbf) = claims.nbf {
        if nbf > now.saturating_add(leeway) {
            return Err(VerificationFailure::NotYetValid);
        }
    }

    Ok(())
}
