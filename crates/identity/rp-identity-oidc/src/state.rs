//! Anti-CSRF state management for the authorization redirect.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const STATE_BYTES: usize = 32;

/// Opaque, unguessable value binding one authorization request to its callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateToken(String);

impl StateToken {
    fn generate() -> Self {
        let mut bytes = [0u8; STATE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A state that has been issued and not yet redeemed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingState {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingState {
    /// Expiry saturates at the latest representable time.
    pub fn new(ttl_seconds: u64) -> Self {
        let created_at = Utc::now();
        let expires_at = i64::try_from(ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Storage of pending states.
///
/// Implementations must make `validate_and_consume` an atomic check-and-delete:
/// for concurrent calls with the same value exactly one may observe `true`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Generate a fresh state, record it as pending and return it.
    async fn issue(&self) -> StateToken;

    /// Remove the state and return `true` iff it was pending and unexpired.
    async fn validate_and_consume(&self, state: &str) -> bool;

    /// Drop expired states, returning how many were removed.
    async fn cleanup_expired(&self) -> usize;

    async fn pending_count(&self) -> usize;
}

/// In-memory implementation of [`StateStore`].
///
/// Pending states live for the lifetime of the process only and are not shared
/// between instances.
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<String, PendingState>>>,
    ttl_seconds: u64,
}

impl InMemoryStateStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            ttl_seconds,
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new(600)
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn issue(&self) -> StateToken {
        let mut states = self.states.write().await;

        loop {
            let token = StateToken::generate();
            if let Entry::Vacant(entry) = states.entry(token.0.clone()) {
                entry.insert(PendingState::new(self.ttl_seconds));
                debug!("Issued state {}", token);
                return token;
            }
        }
    }

    async fn validate_and_consume(&self, state: &str) -> bool {
        let mut states = self.states.write().await;

        match states.remove(state) {
            Some(pending) if pending.is_expired() => {
                debug!("Rejected expired state {}", state);
                false
            }
            Some(_) => {
                debug!("Consumed state {}", state);
                true
            }
            None => false,
        }
    }

    async fn cleanup_expired(&self) -> usize {
        let mut states = self.states.write().await;
        let before = states.len();

        states.retain(|_, pending| !pending.is_expired());

        let removed = before - states.len();
        if removed > 0 {
            debug!("Cleaned up {} expired states", removed);
        }
        removed
    }

    async fn pending_count(&self) -> usize {
        self.states.read().await.len()
    }
}
