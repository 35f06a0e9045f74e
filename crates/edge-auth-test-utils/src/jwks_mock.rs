//! Mock JWKS endpoint helpers.

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock JWKS document is served from.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Full JWKS URL on `server`.
pub fn jwks_url(server: &MockServer) -> String {
    format!("{}{JWKS_PATH}", server.uri())
}

/// Serve `body` as the JWKS document.
pub async fn mount_jwks(server: &MockServer, body: &str) {
    mount_jwks_response(server, ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .await;
}

/// Serve `body` after `delay`, for exercising the not-ready window.
pub async fn mount_slow_jwks(server: &MockServer, body: &str, delay: Duration) {
    mount_jwks_response(
        server,
        ResponseTemplate::new(200)
            .set_body_raw(body, "application/json")
            .set_delay(delay),
    )
    .await;
}

/// Answer JWKS requests with `status` and an empty body.
pub async fn mount_jwks_status(server: &MockServer, status: u16) {
    mount_jwks_response(server, ResponseTemplate::new(status)).await;
}

async fn mount_jwks_response(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(response)
        .mount(server)
        .await;
}
