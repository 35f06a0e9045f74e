//! Health check handler.
//!
//! The gate is healthy once its trusted key set is loaded. Until then every
//! protected request would be answered with 503, so the probe reports the
//! same.

use crate::auth::KeySetStatus;
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// ## Example Response
///
/// ```json
/// {
///   "state": "ready",
///   "key_count": 2
/// }
/// ```
///
/// Returns 200 when the key set is `ready`, 503 otherwise. A failed key set
/// includes its error message.
#[instrument(skip_all, name = "edge.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<KeySetStatus>) {
    let status = state.key_set.status();
    let code = if status.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}
