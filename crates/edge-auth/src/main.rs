//! Edge auth gate
//!
//! Serves a content directory to clients holding a valid access token
//! cookie, redirecting everyone else to the hosted login page.

use edge_auth::auth::{
    HttpJwksSource, JwksSource, KeySetCache, StaticJwksSource, TokenAuthenticator,
    VerificationPolicy,
};
use edge_auth::challenge::ChallengeResponder;
use edge_auth::config::{Config, LogFormat};
use edge_auth::middleware::AuthState;
use edge_auth::observability::metrics::init_metrics_recorder;
use edge_auth::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "edge_auth=info,edge=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.as_ref().map(|c| c.log_format).unwrap_or_default());

    info!("Starting edge auth gate");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let issuer = config.issuer();
    info!(
        issuer = %issuer,
        bind_address = %config.bind_address,
        content_dir = %config.content_dir.display(),
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        login_redirect = config.login.is_some(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        anyhow::anyhow!(e)
    })?;

    let source: Arc<dyn JwksSource> = match &config.jwks_json {
        Some(document) => {
            info!("Using inline JWKS document");
            Arc::new(StaticJwksSource::new(document.clone()))
        }
        None => {
            info!(jwks_url = %config.jwks_url, "Using remote JWKS endpoint");
            Arc::new(HttpJwksSource::with_timeout(
                config.jwks_url.clone(),
                config.jwks_fetch_timeout,
            ))
        }
    };

    let key_set = KeySetCache::new(source, config.key_set_ready_timeout);
    // Population runs in the background; early requests wait up to the ready budget
    let _population = key_set.begin_populate()?;

    let cancel_token = CancellationToken::new();
    let refresh_handle = config
        .key_set_refresh_interval
        .map(|interval| key_set.spawn_refresh_task(interval, cancel_token.child_token()));

    let authenticator = TokenAuthenticator::new(
        key_set.clone(),
        VerificationPolicy {
            issuer,
            leeway_seconds: config.jwt_clock_skew_seconds,
        },
        config.cookie_name.clone(),
    );
    let login_url = config.login_url();
    let state = Arc::new(AppState {
        key_set,
        auth: Arc::new(AuthState {
            authenticator,
            challenge: ChallengeResponder::new(login_url.as_deref()),
        }),
        content_dir: config.content_dir.clone(),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Edge auth gate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    cancel_token.cancel();
    if let Some(handle) = refresh_handle {
        if let Err(e) = handle.await {
            error!("Key set refresh task ended abnormally: {}", e);
        }
    }

    info!("Edge auth gate shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT) and cancels background
/// tasks when one arrives.
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    cancel_token.cancel();
}
