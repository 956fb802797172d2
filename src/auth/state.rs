// OAuth2 State Store
// One-time anti-forgery tokens binding a login redirect to its callback

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::AuthError;
use super::security::redact_id;

const DEFAULT_STATE_TTL_SECS: i64 = 300;

/// Registry of outstanding OAuth2 state parameters.
///
/// `consume` must check and remove in one step so that two callbacks racing on
/// the same value cannot both succeed. A shared store (e.g. Redis) can replace
/// the in-process implementation without touching the login flow.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Issue a new state value remembering where the login started
    async fn issue(&self, origin_hint: &str) -> Result<String, AuthError>;

    /// Consume a state value, returning its origin hint.
    /// Unknown, already consumed and expired values yield `InvalidState`.
    async fn consume(&self, state: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Clone)]
struct StateEntry {
    issued_at: DateTime<Utc>,
    origin_hint: String,
}

/// In-process state store guarded by a mutex
pub struct InMemoryStateStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, StateEntry>>,
}

impl InMemoryStateStore {
    /// Fails when `ttl` does not fit a timestamp offset
    pub fn new(ttl: std::time::Duration) -> Result<Self, AuthError> {
        let ttl = Duration::from_std(ttl).map_err(|_| {
            AuthError::invalid_config("auth.state_ttl_secs", "is out of range")
        })?;

        Ok(Self::with_ttl(ttl))
    }

    fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of outstanding (possibly expired, not yet purged) states
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry older than the TTL
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        self.purge_locked(&mut entries, Utc::now())
    }

    fn purge_locked(
        &self,
        entries: &mut HashMap<String, StateEntry>,
        now: DateTime<Utc>,
    ) -> usize {
        let initial_count = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = initial_count - entries.len();

        if removed > 0 {
            debug!("Purged {} expired OAuth state entries", removed);
        }

        removed
    }

    fn is_expired(&self, entry: &StateEntry, now: DateTime<Utc>) -> bool {
        now - entry.issued_at >= self.ttl
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_STATE_TTL_SECS))
    }
}

/// 256 bits from the thread-local CSPRNG, hex encoded
fn generate_state() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn issue(&self, origin_hint: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let state = generate_state();

        let mut entries = self.entries.lock().await;
        self.purge_locked(&mut entries, now);
        entries.insert(
            state.clone(),
            StateEntry {
                issued_at: now,
                origin_hint: origin_hint.to_string(),
            },
        );

        debug!(state = %redact_id(&state), "Issued OAuth state");
        Ok(state)
    }

    async fn consume(&self, state: &str) -> Result<String, AuthError> {
        let now = Utc::now();

        let mut entries = self.entries.lock().await;
        let entry = entries.remove(state);
        self.purge_locked(&mut entries, now);
        drop(entries);

        match entry {
            Some(entry) if !self.is_expired(&entry, now) => {
                debug!(state = %redact_id(state), "Consumed OAuth state");
                Ok(entry.origin_hint)
            }
            Some(_) => {
                warn!(state = %redact_id(state), "OAuth state expired before callback");
                Err(AuthError::InvalidState)
            }
            None => {
                warn!(state = %redact_id(state), "Unknown or reused OAuth state");
                Err(AuthError::InvalidState)
            }
        }
    }
}
