//! Elliptic-curve key encoding (SubjectPublicKeyInfo and SEC1).
//!
//! The public point is always checked against the curve before anything is
//! encoded. When the JWK only carries the private scalar, the point is
//! derived from it; when it carries both, they must agree.

use super::bigint::decode_bytes;
use super::jwk::{EcJwk, NamedCurve};
use crate::errors::KeyConversionError;
use der::oid::AssociatedOid;
use der::Encode;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint};
use p256::elliptic_curve::{AffinePoint, CurveArithmetic, FieldBytesSize, PublicKey, SecretKey};
use pkcs8::EncodePublicKey;
use sec1::{EcParameters, EcPrivateKey};
use zeroize::Zeroizing;

/// Validated key material for one EC JWK.
pub(crate) struct EcMaterial {
    /// Uncompressed SEC1 point: `0x04 || X || Y`.
    pub point: Vec<u8>,
    /// Private scalar left-padded to the field width.
    pub scalar: Option<Zeroizing<Vec<u8>>>,
}

/// Decode and validate the JWK's point and optional scalar.
pub(crate) fn material(jwk: &EcJwk) -> Result<EcMaterial, KeyConversionError> {
    let curve = jwk.curve;
    let width = curve.field_width();

    let scalar = match jwk.d.as_ref() {
        Some(d) => {
            let raw = Zeroizing::new(decode_bytes("d", d)?);
            Some(left_pad(&raw, width, curve, "scalar longer than field width")?)
        }
        None => None,
    };

    let supplied = match (jwk.x.as_deref(), jwk.y.as_deref()) {
        (Some(x), Some(y)) => {
            let x = decode_bytes("x", x)?;
            let y = decode_bytes("y", y)?;
            let x = left_pad(&x, width, curve, "coordinate longer than field width")?;
            let y = left_pad(&y, width, curve, "coordinate longer than field width")?;

            let mut point = Vec::with_capacity(1 + 2 * width);
            point.push(0x04);
            point.extend_from_slice(&x);
            point.extend_from_slice(&y);
            Some(point)
        }
        (None, None) => None,
        (Some(_), None) => return Err(KeyConversionError::MissingField("y")),
        (None, Some(_)) => return Err(KeyConversionError::MissingField("x")),
    };

    let supplied = supplied.as_deref();
    let secret = scalar.as_deref().map(Vec::as_slice);
    let point = match curve {
        NamedCurve::P256 => validated_point::<p256::NistP256>(curve, supplied, secret),
        NamedCurve::P384 => validated_point::<p384::NistP384>(curve, supplied, secret),
        NamedCurve::P521 => validated_point::<p521::NistP521>(curve, supplied, secret),
    }?;

    Ok(EcMaterial { point, scalar })
}

/// Resolve the public point for curve `C`.
///
/// `supplied` is an uncompressed point, `scalar` a field-width big-endian
/// private scalar. At least one of them is present.
fn validated_point<C>(
    curve: NamedCurve,
    supplied: Option<&[u8]>,
    scalar: Option<&[u8]>,
) -> Result<Vec<u8>, KeyConversionError>
where
    C: CurveArithmetic,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
{
    let derived = match scalar {
        Some(scalar) => {
            let secret = SecretKey::<C>::from_slice(scalar).map_err(|_| {
                tracing::debug!(target: "edge.keys", curve = %curve, "Scalar out of range");
                invalid(curve, "scalar is zero or not below the group order")
            })?;
            Some(
                secret
                    .public_key()
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec(),
            )
        }
        None => None,
    };

    match (supplied, derived) {
        (Some(point), derived) => {
            PublicKey::<C>::from_sec1_bytes(point).map_err(|_| {
                tracing::debug!(target: "edge.keys", curve = %curve, "Point not on curve");
                invalid(curve, "point is not on the curve")
            })?;
            if let Some(derived) = derived {
                if derived.as_slice() != point {
                    return Err(invalid(curve, "public point does not match private scalar"));
                }
            }
            Ok(point.to_vec())
        }
        (None, Some(derived)) => Ok(derived),
        (None, None) => Err(KeyConversionError::MissingField("x")),
    }
}

fn left_pad(
    bytes: &[u8],
    width: usize,
    curve: NamedCurve,
    reason: &'static str,
) -> Result<Zeroizing<Vec<u8>>, KeyConversionError> {
    if bytes.len() > width {
        return Err(invalid(curve, reason));
    }
    let mut padded = Zeroizing::new(vec![0u8; width - bytes.len()]);
    padded.extend_from_slice(bytes);
    Ok(padded)
}

fn invalid(curve: NamedCurve, reason: &'static str) -> KeyConversionError {
    KeyConversionError::InvalidCurvePoint {
        curve: curve.jwk_name(),
        reason,
    }
}

/// `SubjectPublicKeyInfo` with id-ecPublicKey and the named curve parameter.
pub(crate) fn encode_public(
    curve: NamedCurve,
    material: &EcMaterial,
) -> Result<Vec<u8>, KeyConversionError> {
    match curve {
        NamedCurve::P256 => public_key_der::<p256::NistP256>(curve, &material.point),
        NamedCurve::P384 => public_key_der::<p384::NistP384>(curve, &material.point),
        NamedCurve::P521 => public_key_der::<p521::NistP521>(curve, &material.point),
    }
}

fn public_key_der<C>(curve: NamedCurve, point: &[u8]) -> Result<Vec<u8>, KeyConversionError>
where
    C: CurveArithmetic + AssociatedOid,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
{
    let key = PublicKey::<C>::from_sec1_bytes(point)
        .map_err(|_| invalid(curve, "point is not on the curve"))?;
    let document = key
        .to_public_key_der()
        .map_err(|e| KeyConversionError::Encoding(e.to_string()))?;
    Ok(document.as_bytes().to_vec())
}

/// SEC1 `ECPrivateKey` (version 1) with both optional fields populated.
pub(crate) fn encode_private(
    curve: NamedCurve,
    material: &EcMaterial,
) -> Result<Zeroizing<Vec<u8>>, KeyConversionError> {
    let scalar = material
        .scalar
        .as_ref()
        .ok_or(KeyConversionError::MissingField("d"))?;

    let key = EcPrivateKey {
        private_key: scalar.as_slice(),
        parameters: Some(EcParameters::NamedCurve(curve.oid())),
        public_key: Some(material.point.as_slice()),
    };
    Ok(Zeroizing::new(key.to_der()?))
}
