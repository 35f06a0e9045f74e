//! HTTP routes for the edge gate.
//!
//! Defines the Axum router and application state.

use crate::auth::KeySetCache;
use crate::handlers;
use crate::middleware::{require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub key_set: KeySetCache,

    pub auth: Arc<AuthState>,

    /// Directory served to authenticated clients.
    pub content_dir: PathBuf,
}

/// Build the application routes.
///
/// - `/health` - Key set readiness (public)
/// - `/metrics` - Prometheus scrape endpoint (public)
/// - everything else - static content from `content_dir`, behind
///   [`require_auth`]
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(Arc::clone(&state));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Every request to the content directory passes through the gate
    let protected_content = ServiceBuilder::new()
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            require_auth,
        ))
        .service(ServeDir::new(&state.content_dir));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    public_routes
        .merge(metrics_routes)
        .fallback_service(protected_content)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}
