//! Scheduled key set refresh.
//!
//! Calls [`KeySetCache::refresh`] on a fixed interval. A failed refresh of a
//! `Ready` cache keeps the current keys, so a JWKS outage only delays key
//! rotation.
//!
//! # Graceful Shutdown
//!
//! The task exits when its cancellation token is cancelled. A refresh that is
//! already running completes first.

use crate::auth::key_set::KeySetCache;
use crate::errors::KeySetError;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Minimum accepted refresh interval.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Run the refresh loop until `cancel_token` is cancelled.
///
/// The first refresh happens one `interval` after start; initial population
/// is the caller's job.
#[instrument(skip_all, name = "edge.task.key_set_refresh")]
pub async fn start_key_set_refresh(
    cache: KeySetCache,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "edge.task.key_set_refresh",
        interval_seconds = interval.as_secs(),
        "Starting key set refresh task"
    );

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_refresh(&cache).await;
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "edge.task.key_set_refresh",
                    "Key set refresh task received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}

/// Run a single refresh and log the outcome.
pub(crate) async fn run_refresh(cache: &KeySetCache) {
    match cache.refresh().await {
        Ok(set) => {
            debug!(
                target: "edge.task.key_set_refresh",
                key_count = set.len(),
                "Scheduled refresh complete"
            );
        }
        Err(KeySetError::RefreshInProgress) => {
            debug!(
                target: "edge.task.key_set_refresh",
                "Refresh already in progress, skipping tick"
            );
        }
        Err(e) => {
            warn!(
                target: "edge.task.key_set_refresh",
                error = %e,
                "Scheduled refresh failed"
            );
        }
    }
}
