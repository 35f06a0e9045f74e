//! PKCS#1 encoding for RSA JWKs.
//!
//! Integers go through `UintRef`, which drops redundant leading zeros and
//! adds the `0x00` sign byte when the high bit is set.

use super::bigint::{decode_uint, Sensitivity};
use super::jwk::RsaJwk;
use crate::errors::KeyConversionError;
use der::asn1::UintRef;
use der::Encode;
use pkcs1::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

/// `RSAPublicKey ::= SEQUENCE { modulus, publicExponent }`
pub(crate) fn encode_public(jwk: &RsaJwk) -> Result<Vec<u8>, KeyConversionError> {
    let n = decode_uint("n", &jwk.n, Sensitivity::Public)?.to_bytes_be();
    let e = decode_uint("e", &jwk.e, Sensitivity::Public)?.to_bytes_be();

    let key = RsaPublicKey {
        modulus: UintRef::new(&n)?,
        public_exponent: UintRef::new(&e)?,
    };
    Ok(key.to_der()?)
}

/// `RSAPrivateKey` (two-prime, version 0).
///
/// All eight integers are required; the multi-prime `otherPrimeInfos` form is
/// not produced.
pub(crate) fn encode_private(jwk: &RsaJwk) -> Result<Zeroizing<Vec<u8>>, KeyConversionError> {
    let n = decode_uint("n", &jwk.n, Sensitivity::Public)?.to_bytes_be();
    let e = decode_uint("e", &jwk.e, Sensitivity::Public)?.to_bytes_be();

    let d = secret_magnitude("d", jwk.d.as_ref())?;
    let p = secret_magnitude("p", jwk.p.as_ref())?;
    let q = secret_magnitude("q", jwk.q.as_ref())?;
    let dp = secret_magnitude("dp", jwk.dp.as_ref())?;
    let dq = secret_magnitude("dq", jwk.dq.as_ref())?;
    let qi = secret_magnitude("qi", jwk.qi.as_ref())?;

    let key = RsaPrivateKey {
        modulus: UintRef::new(&n)?,
        public_exponent: UintRef::new(&e)?,
        private_exponent: UintRef::new(&d)?,
        prime1: UintRef::new(&p)?,
        prime2: UintRef::new(&q)?,
        exponent1: UintRef::new(&dp)?,
        exponent2: UintRef::new(&dq)?,
        coefficient: UintRef::new(&qi)?,
        other_prime_infos: None,
    };
    Ok(Zeroizing::new(key.to_der()?))
}

/// Big-endian magnitude of a private member, wiped on drop.
fn secret_magnitude(
    field: &'static str,
    value: Option<&Zeroizing<String>>,
) -> Result<Zeroizing<Vec<u8>>, KeyConversionError> {
    let value = value.ok_or(KeyConversionError::MissingField(field))?;
    let integer = Zeroizing::new(decode_uint(field, value, Sensitivity::Secret)?);
    Ok(Zeroizing::new(integer.to_bytes_be()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::keys::bigint::encode_bytes;

    fn public_jwk(n: &[u8], e: &[u8]) -> RsaJwk {
        RsaJwk {
            kid: "test".to_string(),
            alg: None,
            n: encode_bytes(n),
            e: encode_bytes(e),
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            qi: None,
        }
    }

    #[test]
    fn test_public_key_layout() {
        let der = encode_public(&public_jwk(&[0x80, 0x01], &[0x01, 0x00, 0x01])).unwrap();
        assert_eq!(
            der,
            vec![
                0x30, 0x0A, // SEQUENCE
                0x02, 0x03, 0x00, 0x80, 0x01, // modulus, sign-padded
                0x02, 0x03, 0x01, 0x00, 0x01, // publicExponent 65537
            ]
        );
    }

    #[test]
    fn test_integers_sign_padded_only_when_high_bit_set() {
        for first in [0x01u8, 0x7F, 0x80, 0xFF] {
            let der = encode_public(&public_jwk(&[first, 0x01], &[0x03])).unwrap();
            let modulus = if first & 0x80 != 0 {
                vec![0x02, 0x03, 0x00, first, 0x01]
            } else {
                vec![0x02, 0x02, first, 0x01]
            };
            assert_eq!(der.get(2..2 + modulus.len()).unwrap(), modulus.as_slice());
        }
    }

    #[test]
    fn test_redundant_leading_zeros_dropped() {
        let der = encode_public(&public_jwk(&[0x00, 0x00, 0x7F], &[0x03])).unwrap();
        assert_eq!(der, vec![0x30, 0x06, 0x02, 0x01, 0x7F, 0x02, 0x01, 0x03]);
    }

    #[test]
    fn test_private_requires_every_member() {
        let mut jwk = public_jwk(&[0x7F], &[0x03]);
        let err = encode_private(&jwk).unwrap_err();
        assert_eq!(err, KeyConversionError::MissingField("d"));

        let one = Some(Zeroizing::new(encode_bytes(&[0x01])));
        jwk.d = one.clone();
        jwk.p = one.clone();
        jwk.q = one.clone();
        jwk.dp = one.clone();
        jwk.dq = one;
        let err = encode_private(&jwk).unwrap_err();
        assert_eq!(err, KeyConversionError::MissingField("qi"));
    }

    #[test]
    fn test_private_key_layout() {
        let mut jwk = public_jwk(&[0x7F], &[0x03]);
        let small = |b: u8| Some(Zeroizing::new(encode_bytes(&[b])));
        jwk.d = small(0x81);
        jwk.p = small(0x02);
        jwk.q = small(0x03);
        jwk.dp = small(0x04);
        jwk.dq = small(0x05);
        jwk.qi = small(0x06);

        let der = encode_private(&jwk).unwrap();
        assert_eq!(
            der.as_slice(),
            &[
                0x30, 0x1C, // SEQUENCE
                0x02, 0x01, 0x00, // version
                0x02, 0x01, 0x7F, // n
                0x02, 0x01, 0x03, // e
                0x02, 0x02, 0x00, 0x81, // d, sign-padded
                0x02, 0x01, 0x02, // p
                0x02, 0x01, 0x03, // q
                0x02, 0x01, 0x04, // dp
                0x02, 0x01, 0x05, // dq
                0x02, 0x01, 0x06, // qi
            ]
        );
    }

    #[test]
    fn test_malformed_modulus_names_field() {
        let mut jwk = public_jwk(&[0x01], &[0x03]);
        jwk.n = "***".to_string();
        assert_eq!(
            encode_public(&jwk).unwrap_err(),
            KeyConversionError::MalformedEncoding { field: "n" }
        );
    }
}
