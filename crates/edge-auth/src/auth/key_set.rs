//! Trusted key set cache.
//!
//! The cache holds the verification keys built from the identity provider's
//! JWKS document and is the only shared state on the request path.
//!
//! State machine:
//!
//! ```text
//! Uninitialized --begin_populate/populate/first lookup--> Populating
//! Populating --all keys converted--> Ready(set)
//! Populating --fetch or conversion failure--> Failed(cause)
//! Ready/Failed --refresh--> see `refresh`
//! ```
//!
//! State lives in a `tokio::sync::watch` channel. The key set inside `Ready`
//! is built completely before it is published, so readers see either no key
//! set or the whole one, never a partial map.

use crate::auth::jwks::JwksSource;
use crate::auth::verification_key::VerificationKey;
use crate::errors::KeySetError;
use crate::keys::{Jwk, JwksDocument};
use crate::observability::metrics;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Default bounded wait for a request that arrives while populating.
pub const DEFAULT_READY_BUDGET: Duration = Duration::from_millis(500);

/// Immutable map of trusted keys by `kid`.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<VerificationKey>>,
}

impl KeySet {
    /// Convert every entry of `document` into a verification key.
    ///
    /// # Errors
    ///
    /// - `KeySetError::EmptyKeySet` - the document has no keys
    /// - `KeySetError::Conversion` - any single key fails to convert
    /// - `KeySetError::DuplicateKid` - two entries share a `kid`
    pub fn from_document(document: JwksDocument) -> Result<Self, KeySetError> {
        if document.keys.is_empty() {
            return Err(KeySetError::EmptyKeySet);
        }

        let mut keys = HashMap::with_capacity(document.keys.len());
        for raw in document.keys {
            let kid = raw.kid.clone().unwrap_or_default();
            let key = Jwk::try_from(raw)
                .and_then(|jwk| VerificationKey::from_jwk(&jwk))
                .map_err(|source| KeySetError::Conversion {
                    kid: kid.clone(),
                    source,
                })?;

            if keys.insert(kid.clone(), Arc::new(key)).is_some() {
                return Err(KeySetError::DuplicateKid(kid));
            }
        }

        Ok(Self { keys })
    }

    #[must_use]
    pub fn get(&self, kid: &str) -> Option<Arc<VerificationKey>> {
        self.keys.get(kid).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key identifiers, sorted.
    #[must_use]
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }
}

/// Lifecycle state of the cache.
#[derive(Debug, Clone, Default)]
pub enum KeySetState {
    #[default]
    Uninitialized,
    Populating,
    Ready(Arc<KeySet>),
    Failed(Arc<KeySetError>),
}

impl KeySetState {
    /// `Ready` or `Failed`.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, KeySetState::Ready(_) | KeySetState::Failed(_))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            KeySetState::Uninitialized => "uninitialized",
            KeySetState::Populating => "populating",
            KeySetState::Ready(_) => "ready",
            KeySetState::Failed(_) => "failed",
        }
    }
}

/// Why a key lookup produced no key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Population did not settle within the ready budget.
    #[error("Key set not ready within budget")]
    NotReady,
    /// The key set is ready but has no key with this `kid`.
    #[error("No key with this identifier")]
    NotFound,
    /// Population failed.
    #[error("Key set unavailable")]
    Unavailable,
}

/// Snapshot of the cache for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeySetStatus {
    pub state: &'static str,
    pub key_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeySetStatus {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == "ready"
    }
}

struct Inner {
    source: Arc<dyn JwksSource>,
    state: watch::Sender<KeySetState>,
    ready_budget: Duration,
    refresh_lock: Mutex<()>,
}

/// Shared handle to the trusted key set.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone)]
pub struct KeySetCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("source", &self.inner.source.describe())
            .field("state", &self.inner.state.borrow().name())
            .field("ready_budget", &self.inner.ready_budget)
            .finish()
    }
}

impl KeySetCache {
    /// Create an uninitialized cache over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn JwksSource>, ready_budget: Duration) -> Self {
        let (state, _) = watch::channel(KeySetState::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                source,
                state,
                ready_budget,
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    /// Move to `Populating` and run population on a background task.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::AlreadyStarted` unless the cache is
    /// `Uninitialized`.
    pub fn begin_populate(&self) -> Result<JoinHandle<()>, KeySetError> {
        self.claim_population()?;
        let cache = self.clone();
        Ok(tokio::spawn(async move {
            // Outcome is published through the state channel
            let _ = cache.run_population("populate").await;
        }))
    }

    /// Populate inline and return the resulting key set.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::AlreadyStarted` unless the cache is
    /// `Uninitialized`, or the population failure.
    pub async fn populate(&self) -> Result<Arc<KeySet>, KeySetError> {
        self.claim_population()?;
        self.run_population("populate").await
    }

    /// Re-fetch the JWKS and replace the key set.
    ///
    /// - From `Uninitialized` this behaves like [`KeySetCache::populate`].
    /// - From `Failed` the state goes through `Populating` again.
    /// - From `Ready` the current set stays visible while fetching; a
    ///   successful fetch swaps in the new set, a failed one keeps the old
    ///   set and returns the error.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::RefreshInProgress` if another population or
    /// refresh is running, otherwise the fetch or conversion failure.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Arc<KeySet>, KeySetError> {
        let _guard = self
            .inner
            .refresh_lock
            .try_lock()
            .map_err(|_| KeySetError::RefreshInProgress)?;

        let mut keep_current = false;
        let claimed = self.inner.state.send_if_modified(|state| match state {
            KeySetState::Uninitialized | KeySetState::Failed(_) => {
                *state = KeySetState::Populating;
                true
            }
            KeySetState::Ready(_) => {
                keep_current = true;
                false
            }
            KeySetState::Populating => false,
        });

        if keep_current {
            let started = Instant::now();
            let result = self.load().await;
            metrics::record_key_set_population("refresh", result.is_ok(), started.elapsed());
            return match result {
                Ok(set) => {
                    self.publish_ready(&set);
                    tracing::info!(
                        target: "edge.auth.key_set",
                        key_count = set.len(),
                        "Key set refreshed"
                    );
                    Ok(set)
                }
                Err(e) => {
                    tracing::warn!(
                        target: "edge.auth.key_set",
                        error = %e,
                        "Key set refresh failed, keeping current keys"
                    );
                    Err(e)
                }
            };
        }

        if !claimed {
            return Err(KeySetError::RefreshInProgress);
        }
        self.run_population("refresh").await
    }

    /// Find the trusted key for `kid`.
    ///
    /// An `Uninitialized` cache starts population lazily. While population
    /// is running, the caller waits at most the ready budget.
    ///
    /// # Errors
    ///
    /// Returns a `LookupError` when no key can be returned.
    pub async fn lookup(&self, kid: &str) -> Result<Arc<VerificationKey>, LookupError> {
        // The borrow guard must not live across an await
        let settled = settled_lookup(&self.inner.state.borrow(), kid);
        if let Some(result) = settled {
            return result;
        }

        let uninitialized = matches!(*self.inner.state.borrow(), KeySetState::Uninitialized);
        if uninitialized {
            tracing::debug!(target: "edge.auth.key_set", "First lookup, starting lazy population");
            // Losing the race to another caller is fine
            let _ = self.begin_populate();
        }

        let mut rx = self.inner.state.subscribe();
        let result = match tokio::time::timeout(
            self.inner.ready_budget,
            rx.wait_for(KeySetState::is_settled),
        )
        .await
        {
            Ok(Ok(state)) => settled_lookup(&state, kid).unwrap_or(Err(LookupError::NotReady)),
            Ok(Err(_)) => Err(LookupError::Unavailable),
            Err(_) => {
                tracing::debug!(
                    target: "edge.auth.key_set",
                    budget_ms = self.inner.ready_budget.as_millis(),
                    "Key set not ready within budget"
                );
                Err(LookupError::NotReady)
            }
        };
        result
    }

    /// Wait until the cache is `Ready` or `Failed`, up to `budget`.
    ///
    /// Returns the settled state, or `None` on timeout.
    pub async fn wait_settled(&self, budget: Duration) -> Option<KeySetState> {
        let mut rx = self.inner.state.subscribe();
        let settled = match tokio::time::timeout(budget, rx.wait_for(KeySetState::is_settled))
            .await
        {
            Ok(Ok(state)) => Some(state.clone()),
            _ => None,
        };
        settled
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> KeySetState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<KeySetState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> KeySetStatus {
        let state = self.inner.state.borrow();
        KeySetStatus {
            state: state.name(),
            key_count: match &*state {
                KeySetState::Ready(set) => set.len(),
                _ => 0,
            },
            error: match &*state {
                KeySetState::Failed(e) => Some(e.to_string()),
                _ => None,
            },
        }
    }

    /// Run [`KeySetCache::refresh`] every `interval` until `cancel_token` fires.
    #[must_use]
    pub fn spawn_refresh_task(
        &self,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(crate::tasks::key_set_refresh::start_key_set_refresh(
            self.clone(),
            interval,
            cancel_token,
        ))
    }

    fn claim_population(&self) -> Result<(), KeySetError> {
        let claimed = self.inner.state.send_if_modified(|state| {
            if matches!(state, KeySetState::Uninitialized) {
                *state = KeySetState::Populating;
                true
            } else {
                false
            }
        });
        if claimed {
            Ok(())
        } else {
            Err(KeySetError::AlreadyStarted)
        }
    }

    /// Load from `Populating` and publish `Ready` or `Failed`.
    #[instrument(skip(self), fields(source = %self.inner.source.describe()))]
    async fn run_population(&self, trigger: &'static str) -> Result<Arc<KeySet>, KeySetError> {
        let started = Instant::now();
        let result = self.load().await;
        metrics::record_key_set_population(trigger, result.is_ok(), started.elapsed());

        match &result {
            Ok(set) => {
                self.publish_ready(set);
                tracing::info!(
                    target: "edge.auth.key_set",
                    key_count = set.len(),
                    duration_ms = started.elapsed().as_millis(),
                    "Key set ready"
                );
            }
            Err(e) => {
                self.inner
                    .state
                    .send_replace(KeySetState::Failed(Arc::new(e.clone())));
                metrics::set_key_set_keys(0);
                tracing::error!(
                    target: "edge.auth.key_set",
                    error = %e,
                    "Key set population failed"
                );
            }
        }
        result
    }

    async fn load(&self) -> Result<Arc<KeySet>, KeySetError> {
        let document = self.inner.source.fetch().await?;
        KeySet::from_document(document).map(Arc::new)
    }

    fn publish_ready(&self, set: &Arc<KeySet>) {
        metrics::set_key_set_keys(set.len());
        self.inner
            .state
            .send_replace(KeySetState::Ready(Arc::clone(set)));
    }
}

/// Lookup result if `state` is settled, `None` otherwise.
fn settled_lookup(
    state: &KeySetState,
    kid: &str,
) -> Option<Result<Arc<VerificationKey>, LookupError>> {
    match state {
        KeySetState::Ready(set) => Some(set.get(kid).ok_or(LookupError::NotFound)),
        KeySetState::Failed(_) => Some(Err(LookupError::Unavailable)),
        KeySetState::Uninitialized | KeySetState::Populating => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::StaticJwksSource;
    use crate::errors::KeyConversionError;

    const RSA_A: &str = r#"{"kty":"RSA","kid":"a","n":"wN3x","e":"AQAB"}"#;
    const RSA_B: &str = r#"{"kty":"RSA","kid":"b","n":"AQAB","e":"AQAB"}"#;

    fn document(keys: &[&str]) -> String {
        format!(r#"{{"keys":[{}]}}"#, keys.join(","))
    }

    fn cache(body: String) -> KeySetCache {
        KeySetCache::new(Arc::new(StaticJwksSource::new(body)), DEFAULT_READY_BUDGET)
    }

    #[test]
    fn test_key_set_from_document() {
        let set = KeySet::from_document(
            JwksDocument::from_slice(document(&[RSA_B, RSA_A]).as_bytes()).unwrap(),
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.kids(), vec!["a", "b"]);
        assert!(set.get("a").is_some());
        assert!(set.get("c").is_none());
    }

    #[test]
    fn test_key_set_rejects_empty_document() {
        let err = KeySet::from_document(JwksDocument { keys: vec![] }).unwrap_err();
        assert!(matches!(err, KeySetError::EmptyKeySet));
    }

    #[test]
    fn test_key_set_rejects_duplicate_kid() {
        let err = KeySet::from_document(
            JwksDocument::from_slice(document(&[RSA_A, RSA_A]).as_bytes()).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, KeySetError::DuplicateKid(kid) if kid == "a"));
    }

    #[test]
    fn test_key_set_one_bad_key_fails_all() {
        let bad = r#"{"kty":"EC","kid":"bad","crv":"P-256","x":"AQ","y":"AQ"}"#;
        let err = KeySet::from_document(
            JwksDocument::from_slice(document(&[RSA_A, bad]).as_bytes()).unwrap(),
        )
        .unwrap_err();
        match err {
            KeySetError::Conversion { kid, source } => {
                assert_eq!(kid, "bad");
                assert!(matches!(source, KeyConversionError::InvalidCurvePoint { .. }));
            }
            other => unreachable!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_populate_moves_to_ready() {
        let cache = cache(document(&[RSA_A]));
        assert_eq!(cache.status().state, "uninitialized");

        let set = cache.populate().await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(cache.status().is_ready());
        assert_eq!(cache.status().key_count, 1);
        assert!(cache.lookup("a").await.is_ok());
        assert_eq!(cache.lookup("zzz").await.unwrap_err(), LookupError::NotFound);
    }

    #[tokio::test]
    async fn test_populate_twice_is_already_started() {
        let cache = cache(document(&[RSA_A]));
        cache.populate().await.unwrap();
        assert!(matches!(
            cache.populate().await,
            Err(KeySetError::AlreadyStarted)
        ));
        assert!(matches!(
            cache.begin_populate(),
            Err(KeySetError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_failed_population_makes_lookups_unavailable() {
        let cache = cache("not json".to_string());
        assert!(cache.populate().await.is_err());

        let status = cache.status();
        assert_eq!(status.state, "failed");
        assert!(status.error.is_some());
        assert_eq!(cache.lookup("a").await.unwrap_err(), LookupError::Unavailable);
    }

    #[tokio::test]
    async fn test_first_lookup_populates_lazily() {
        let cache = cache(document(&[RSA_A]));
        let key = cache.lookup("a").await.unwrap();
        assert_eq!(key.kid(), "a");
        assert!(cache.status().is_ready());
    }

    #[tokio::test]
    async fn test_begin_populate_settles() {
        let cache = cache(document(&[RSA_A, RSA_B]));
        let handle = cache.begin_populate().unwrap();
        handle.await.unwrap();
        assert!(matches!(cache.state(), KeySetState::Ready(set) if set.len() == 2));
    }

    #[tokio::test]
    async fn test_refresh_from_uninitialized_populates() {
        let cache = cache(document(&[RSA_A]));
        cache.refresh().await.unwrap();
        assert!(cache.status().is_ready());
    }

    #[tokio::test]
    async fn test_refresh_from_failed_retries() {
        let cache = cache("{}".to_string());
        assert!(cache.populate().await.is_err());
        // Source is still broken: stays failed
        assert!(cache.refresh().await.is_err());
        assert_eq!(cache.status().state, "failed");
    }

    #[test]
    fn test_status_serializes_without_empty_error() {
        let status = KeySetStatus {
            state: "ready",
            key_count: 2,
            error: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, serde_json::json!({"state": "ready", "key_count": 2}));
    }
}
