//! Builder patterns for test tokens.

use crate::crypto_fixtures::TestKey;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Map, Value};

/// Region used for the test issuer.
pub const TEST_REGION: &str = "us-east-1";

/// User pool used for the test issuer.
pub const TEST_USER_POOL_ID: &str = "us-east-1_TestPool1";

/// Issuer matching [`TEST_REGION`] and [`TEST_USER_POOL_ID`].
pub const TEST_ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_TestPool1";

/// Cookie name used by router tests.
pub const TEST_COOKIE_NAME: &str = "edge-auth-token";

/// Current Unix time in seconds.
pub fn now() -> i64 {
    jsonwebtoken::get_current_timestamp() as i64
}

/// Builder for signed access tokens.
///
/// Defaults to a valid access token from [`TEST_ISSUER`] that expires in one
/// hour, signed by `key` with the key's own `kid` and `alg`.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new(TestKey::Rsa1)
///     .username("alice")
///     .with_scope("openid profile")
///     .expires_in(-120)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    key: TestKey,
    alg: String,
    kid: Option<String>,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    pub fn new(key: TestKey) -> Self {
        let now = now();
        let claims = json!({
            "iss": TEST_ISSUER,
            "token_use": "access",
            "sub": "0f8d6d3c-test-subject",
            "client_id": "test-client",
            "username": "test-user",
            "scope": "openid",
            "iat": now,
            "exp": now + 3600,
        });
        Self {
            key,
            alg: key.alg().to_string(),
            kid: Some(key.kid().to_string()),
            claims: claims.as_object().cloned().unwrap_or_default(),
        }
    }

    pub fn issuer(self, iss: &str) -> Self {
        self.claim("iss", json!(iss))
    }

    pub fn token_use(self, token_use: &str) -> Self {
        self.claim("token_use", json!(token_use))
    }

    pub fn username(self, username: &str) -> Self {
        self.claim("username", json!(username))
    }

    pub fn with_scope(self, scope: &str) -> Self {
        self.claim("scope", json!(scope))
    }

    /// Set `exp` relative to now; negative values produce expired tokens.
    pub fn expires_in(self, seconds: i64) -> Self {
        self.claim("exp", json!(now() + seconds))
    }

    /// Set `nbf` relative to now.
    pub fn not_before_in(self, seconds: i64) -> Self {
        self.claim("nbf", json!(now() + seconds))
    }

    /// Set any claim.
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Override the `alg` header. The signature is still made with the
    /// builder's key.
    pub fn alg(mut self, alg: &str) -> Self {
        self.alg = alg.to_string();
        self
    }

    pub fn kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// The claims as they will be signed.
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign and serialize the token in compact form.
    pub fn build(self) -> String {
        let mut header = json!({ "alg": self.alg, "typ": "JWT" });
        if let Some(kid) = &self.kid {
            header["kid"] = json!(kid);
        }
        sign_compact(self.key, &header, &Value::Object(self.claims))
    }
}

/// Sign arbitrary header and payload JSON with `key`.
pub fn sign_compact(key: TestKey, header: &Value, payload: &Value) -> String {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    );
    let alg = header["alg"].as_str().unwrap_or(key.alg());
    let signature = key.sign(alg, &signing_input);
    format!("{signing_input}.{signature}")
}

/// Flip one bit in the token's signature.
pub fn tamper_signature(token: &str) -> String {
    let (signing_input, signature) = token.rsplit_once('.').expect("compact token");
    let mut bytes = URL_SAFE_NO_PAD.decode(signature).expect("signature is base64url");
    bytes[0] ^= 0x01;
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Replace the payload while keeping the original signature.
pub fn swap_payload(token: &str, payload: &Value) -> String {
    let mut parts = token.split('.');
    let header = parts.next().expect("header segment");
    let _ = parts.next().expect("payload segment");
    let signature = parts.next().expect("signature segment");
    format!(
        "{header}.{}.{signature}",
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

/// A `Cookie` header value carrying `token` under [`TEST_COOKIE_NAME`].
pub fn credential_cookie(token: &str) -> String {
    format!("theme=dark; {TEST_COOKIE_NAME}={token}; lang=en")
}
