//! Access-token lifecycle per account.
//!
//! Each `env_key` owns a slot guarded by an async mutex. The first caller for
//! a key adopts the stored access token without touching the network. Once a
//! token is rejected, the caller holding the mutex performs the refresh
//! exchange while every other caller for that key queues on the same mutex. A
//! generation counter, bumped after every finished exchange, lets queued
//! callers tell "an exchange finished while I waited" apart from "nobody tried
//! yet":
//!
//! ```text
//! Cold ──get_token (stored token)────────▶ Idle (no network)
//! Cold ──get_token (stored token empty)──▶ Refreshing
//! Idle ──get_token (cached)──────────────▶ Idle (no network)
//! Idle ──invalidate / rejected token─────▶ Refreshing on next get_token
//! Refreshing ──exchange ok──▶ persist triple, cache token ──▶ Idle
//! Refreshing ──exchange err─▶ remember failure, store untouched ──▶ Idle
//! ```
//!
//! Callers that were queued behind a failed exchange receive that failure
//! instead of starting a second exchange, so one cycle never issues duplicate
//! refreshes for the same account.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::error::CredentialError;
use super::refresher::TokenRefresher;
use super::store::CredentialStore;
use super::types::Credential;

#[derive(Default)]
struct SlotState {
    token: Option<String>,
    /// The stored access token was adopted or rejected; from now on an empty
    /// slot means "refresh".
    warmed: bool,
    last_failure: Option<String>,
}

#[derive(Default)]
struct RefreshSlot {
    state: Mutex<SlotState>,
    generation: AtomicU64,
}

pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    slots: DashMap<String, Arc<RefreshSlot>>,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, env_key: &str) -> Arc<RefreshSlot> {
        self.slots
            .entry(env_key.to_string())
            .or_insert_with(|| Arc::new(RefreshSlot::default()))
            .clone()
    }

    /// Returns a usable access token for `env_key`.
    ///
    /// The first call for an account hands out the stored access token. Later
    /// calls serve the cached token and only refresh after it was invalidated,
    /// or when the stored token is empty.
    ///
    /// # Errors
    /// * `NotFound` when the account was never bootstrapped
    /// * `RefreshFailed` / `Network` when the exchange fails, including for
    ///   callers that were waiting on someone else's failed exchange
    #[instrument(skip(self))]
    pub async fn get_token(&self, env_key: &str) -> Result<String, CredentialError> {
        let slot = self.slot(env_key);
        let seen_generation = slot.generation.load(Ordering::Acquire);

        let mut state = slot.state.lock().await;

        if let Some(token) = &state.token {
            return Ok(token.clone());
        }

        if !state.warmed {
            let credential = self.load(env_key).await?;
            state.warmed = true;
            let stored = credential.tokens.access_token;
            if !stored.is_empty() {
                debug!("Using stored access token for {env_key}");
                state.token = Some(stored.clone());
                return Ok(stored);
            }
            info!("Stored access token for {env_key} is empty, refreshing");
        }

        if slot.generation.load(Ordering::Acquire) != seen_generation
            && let Some(reason) = &state.last_failure
        {
            debug!("Refresh for {env_key} failed while waiting, sharing the failure");
            return Err(CredentialError::RefreshFailed(reason.clone()));
        }

        let outcome = self.exchange(env_key).await;
        match &outcome {
            Ok(token) => {
                state.token = Some(token.clone());
                state.last_failure = None;
            }
            Err(e) => {
                state.token = None;
                state.last_failure = Some(e.to_string());
            }
        }
        slot.generation.fetch_add(1, Ordering::AcqRel);

        outcome
    }

    /// Drops the cached token so the next `get_token` refreshes.
    pub async fn invalidate(&self, env_key: &str) {
        let slot = self.slot(env_key);
        let mut state = slot.state.lock().await;
        state.warmed = true;
        if state.token.take().is_some() {
            info!("Invalidated cached access token for {env_key}");
        }
    }

    /// Drops the cached token only if it is still the one that was rejected.
    ///
    /// Several operations may see a 401 for the same stale token; only the
    /// first invalidation forces a refresh, later ones find the fresh token
    /// already cached and leave it alone.
    pub async fn invalidate_token(&self, env_key: &str, rejected: &str) {
        let slot = self.slot(env_key);
        let mut state = slot.state.lock().await;
        if !state.warmed {
            // Rejected before anything was cached: the stored token is stale
            state.warmed = true;
            info!("Stored access token for {env_key} was rejected, refresh scheduled");
        } else if state.token.as_deref() == Some(rejected) {
            state.token = None;
            info!("Access token for {env_key} was rejected, refresh scheduled");
        } else {
            debug!("Rejected token for {env_key} was already replaced");
        }
    }

    async fn load(&self, env_key: &str) -> Result<Credential, CredentialError> {
        self.store
            .get(env_key)
            .await?
            .ok_or_else(|| CredentialError::NotFound(env_key.to_string()))
    }

    /// One refresh exchange. Must only run while the slot mutex is held.
    async fn exchange(&self, env_key: &str) -> Result<String, CredentialError> {
        let credential = self.load(env_key).await?;

        info!("Refreshing access token for {env_key}");
        let refreshed = match self.refresher.refresh(&credential.tokens).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!("Token refresh for {env_key} failed: {e}");
                return Err(e);
            }
        };

        let merged = credential.tokens.merged_with(refreshed);

        // The upstream side has already rotated the tokens, so the new access
        // token stays usable for this process even if persisting it fails.
        if let Err(e) = self.store.put(env_key, &merged).await {
            error!("Refreshed tokens for {env_key} could not be persisted: {e}");
        } else {
            info!("Persisted refreshed tokens for {env_key}");
        }

        Ok(merged.access_token)
    }
}
