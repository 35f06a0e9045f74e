//! Verification pipeline tests.
//!
//! Each rejection reason is produced in isolation, and combinations check
//! that the earliest failing stage wins.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::{header, HeaderValue, Request};
use edge_auth::auth::{
    AccessClaims, HttpJwksSource, KeySetCache, StaticJwksSource, TokenAuthenticator,
    VerificationPolicy, Verdict,
};
use edge_auth::errors::RejectReason;
use edge_auth_test_utils::{
    credential_cookie, jwks_json, jwks_url, mount_jwks_status, mount_slow_jwks, tamper_signature,
    TestKey, TestTokenBuilder, TEST_COOKIE_NAME, TEST_ISSUER,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

fn policy() -> VerificationPolicy {
    VerificationPolicy {
        issuer: TEST_ISSUER.to_string(),
        leeway_seconds: 60,
    }
}

fn authenticator_with(cache: KeySetCache) -> TokenAuthenticator {
    TokenAuthenticator::new(cache, policy(), TEST_COOKIE_NAME)
}

fn static_authenticator(keys: &[TestKey]) -> TokenAuthenticator {
    authenticator_with(KeySetCache::new(
        Arc::new(StaticJwksSource::new(jwks_json(keys))),
        Duration::from_millis(500),
    ))
}

fn request_with_cookie(cookie: Option<&str>) -> Request<()> {
    let mut builder = Request::builder().uri("/index.html");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(()).unwrap()
}

async fn reason_for(authenticator: &TokenAuthenticator, token: &str) -> RejectReason {
    match authenticator
        .authenticate(request_with_cookie(Some(&credential_cookie(token))))
        .await
    {
        Verdict::Rejected(reason) => reason,
        Verdict::Accepted(_) => unreachable!("token was accepted"),
    }
}

#[tokio::test]
async fn test_valid_token_is_accepted_and_sanitized() {
    let authenticator = static_authenticator(&[TestKey::Rsa1, TestKey::EcP521]);

    for key in [TestKey::Rsa1, TestKey::EcP521] {
        let token = TestTokenBuilder::new(key).username("alice").build();
        let mut request = request_with_cookie(Some(&credential_cookie(&token)));
        request
            .headers_mut()
            .append(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        request
            .headers_mut()
            .append(header::AUTHORIZATION, HeaderValue::from_static("Bearer other"));

        let Verdict::Accepted(forwarded) = authenticator.authenticate(request).await else {
            unreachable!("{key:?} token rejected");
        };

        assert!(forwarded.headers().get(header::AUTHORIZATION).is_none());
        assert!(forwarded.headers().get(header::COOKIE).is_some());
        assert_eq!(forwarded.uri().path(), "/index.html");
        let claims = forwarded.extensions().get::<AccessClaims>().unwrap();
        assert_eq!(claims.username.as_deref(), Some("alice"));
    }
}

#[tokio::test]
async fn test_missing_cookie_is_no_credential() {
    let authenticator = static_authenticator(&[TestKey::Rsa1]);

    for cookie in [None, Some("theme=dark"), Some("edge-auth-token=")] {
        let verdict = authenticator.authenticate(request_with_cookie(cookie)).await;
        assert!(
            matches!(verdict, Verdict::Rejected(RejectReason::NoCredential)),
            "{cookie:?}"
        );
    }

    // Rejections before the key lookup never trigger population
    assert_eq!(authenticator.key_set().status().state, "uninitialized");
}

#[tokio::test]
async fn test_cookie_name_must_match_exactly() {
    let authenticator = static_authenticator(&[TestKey::Rsa1]);
    let token = TestTokenBuilder::new(TestKey::Rsa1).build();

    let cookie = format!("x-edge-auth-token={token}; edge-auth-token-old={token}");
    let verdict = authenticator
        .authenticate(request_with_cookie(Some(&cookie)))
        .await;
    assert!(matches!(verdict, Verdict::Rejected(RejectReason::NoCredential)));
}

#[tokio::test]
async fn test_garbage_is_malformed() {
    let authenticator = static_authenticator(&[TestKey::Rsa1]);

    for token in ["not-a-jwt", "a.b", "a.b.c.d", "e30.e30.c2ln"] {
        assert_eq!(
            reason_for(&authenticator, token).await,
            RejectReason::MalformedToken,
            "{token}"
        );
    }

    let no_kid = TestTokenBuilder::new(TestKey::Rsa1).without_kid().build();
    assert_eq!(
        reason_for(&authenticator, &no_kid).await,
        RejectReason::MalformedToken
    );
}

#[tokio::test]
async fn test_foreign_issuer_is_wrong_issuer() {
    let authenticator = static_authenticator(&[TestKey::Rsa1]);

    let token = TestTokenBuilder::new(TestKey::Rsa1)
        .issuer("https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Other")
        .build();
    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::WrongIssuer
    );

    let token = TestTokenBuilder::new(TestKey::Rsa1)
        .without_claim("iss")
        .build();
    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::WrongIssuer
    );
}

#[tokio::test]
async fn test_id_token_is_wrong_token_use() {
    let authenticator = static_authenticator(&[TestKey::Rsa1]);

    let token = TestTokenBuilder::new(TestKey::Rsa1).token_use("id").build();
    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::WrongTokenUse
    );
}

#[tokio::test]
async fn test_unlisted_kid_is_unknown_key() {
    let authenticator = static_authenticator(&[TestKey::Rsa1]);

    let token = TestTokenBuilder::new(TestKey::Rsa2).build();
    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::UnknownKey
    );
}

#[tokio::test]
async fn test_bad_signature_and_expiry_are_signature_invalid() {
    let authenticator = static_authenticator(&[TestKey::Rsa1, TestKey::EcP256]);

    let tampered = tamper_signature(&TestTokenBuilder::new(TestKey::EcP256).build());
    assert_eq!(
        reason_for(&authenticator, &tampered).await,
        RejectReason::SignatureInvalid
    );

    let expired = TestTokenBuilder::new(TestKey::Rsa1).expires_in(-3600).build();
    assert_eq!(
        reason_for(&authenticator, &expired).await,
        RejectReason::SignatureInvalid
    );

    let wrong_alg = TestTokenBuilder::new(TestKey::EcP256).alg("HS256").build();
    assert_eq!(
        reason_for(&authenticator, &wrong_alg).await,
        RejectReason::SignatureInvalid
    );
}

#[tokio::test]
async fn test_earliest_failing_stage_wins() {
    let authenticator = static_authenticator(&[TestKey::Rsa1]);

    // Wrong issuer, id token, unknown kid and expired at once
    let token = TestTokenBuilder::new(TestKey::Rsa2)
        .issuer("https://elsewhere")
        .token_use("id")
        .expires_in(-3600)
        .build();
    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::WrongIssuer
    );

    // Id token from an unknown key
    let token = TestTokenBuilder::new(TestKey::Rsa2).token_use("id").build();
    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::WrongTokenUse
    );

    // Unknown key with a broken signature
    let token = tamper_signature(&TestTokenBuilder::new(TestKey::Rsa2).build());
    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::UnknownKey
    );
}

#[tokio::test]
async fn test_slow_jwks_is_service_not_ready() {
    let server = MockServer::start().await;
    mount_slow_jwks(&server, &jwks_json(&[TestKey::Rsa1]), Duration::from_secs(2)).await;

    let cache = KeySetCache::new(
        Arc::new(HttpJwksSource::new(jwks_url(&server))),
        Duration::from_millis(50),
    );
    let authenticator = authenticator_with(cache);
    let token = TestTokenBuilder::new(TestKey::Rsa1).build();

    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::ServiceNotReady
    );

    // Population keeps going in the background and eventually serves the token
    let settled = authenticator
        .key_set()
        .wait_settled(Duration::from_secs(5))
        .await;
    assert!(settled.is_some());
    let verdict = authenticator
        .authenticate(request_with_cookie(Some(&credential_cookie(&token))))
        .await;
    assert!(matches!(verdict, Verdict::Accepted(_)));
}

#[tokio::test]
async fn test_failed_jwks_is_service_unavailable() {
    let server = MockServer::start().await;
    mount_jwks_status(&server, 500).await;

    let authenticator = authenticator_with(KeySetCache::new(
        Arc::new(HttpJwksSource::new(jwks_url(&server))),
        Duration::from_secs(2),
    ));
    let token = TestTokenBuilder::new(TestKey::Rsa1).build();

    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::ServiceUnavailable
    );
    // No automatic retry from the request path
    assert_eq!(
        reason_for(&authenticator, &token).await,
        RejectReason::ServiceUnavailable
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_verify_credential_returns_claims() {
    let authenticator = static_authenticator(&[TestKey::EcP384]);
    let token = TestTokenBuilder::new(TestKey::EcP384)
        .with_scope("openid profile")
        .build();

    let request = request_with_cookie(Some(&credential_cookie(&token)));
    let claims = authenticator
        .verify_credential(request.headers())
        .await
        .unwrap();
    assert!(claims.has_scope("profile"));
    assert!(claims.is_access_token());
}
