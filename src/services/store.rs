//! Key-value repository used by every game component.
//!
//! All durable player state lives behind [`KvStore`]. Components never keep
//! state between requests; they read, decide, and write back through the
//! store. Read-modify-write goes through [`atomic_update`], which retries a
//! compare-and-swap with exponential backoff and jitter.

use crate::services::{MemoryStore, RedisStore};
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable")]
    Unavailable,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Contention on {key} after {attempts} attempts")]
    Contention { key: String, attempts: u32 },

    #[error("Timed out: {0}")]
    Timeout(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal key-value contract. Values are opaque strings (JSON for records).
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// Get and delete in one step.
    fn take(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Write only if the key is absent. Returns whether the write happened.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Replace `expected` (None = absent) with `new` (None = delete).
    /// Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = StoreResult<bool>> + Send;
}

/// Logical key layout.
pub mod keys {
    pub const KEY_PREFIX: &str = "slotkeeper:";

    /// Canonical player id: trimmed, lowercase, no leading '@'.
    pub fn normalize_player(name: &str) -> String {
        name.trim().trim_start_matches('@').to_lowercase()
    }

    pub fn balance(player: &str) -> String {
        format!("{}balance:{}", KEY_PREFIX, player)
    }

    pub fn buff(player: &str, kind: &str) -> String {
        format!("{}buff:{}:{}", KEY_PREFIX, player, kind)
    }

    pub fn token(player: &str, token: &str) -> String {
        format!("{}token:{}:{}", KEY_PREFIX, player, token)
    }

    pub fn free_spins(player: &str) -> String {
        format!("{}freespins:{}", KEY_PREFIX, player)
    }

    pub fn streak(player: &str) -> String {
        format!("{}streak:{}", KEY_PREFIX, player)
    }

    pub fn cooldown(player: &str) -> String {
        format!("{}cooldown:{}", KEY_PREFIX, player)
    }

    pub fn peek(player: &str) -> String {
        format!("{}peek:{}", KEY_PREFIX, player)
    }

    pub fn hourly_jackpot(hour_stamp: &str) -> String {
        format!("{}jackpot:hourly:{}", KEY_PREFIX, hour_stamp)
    }

    pub fn escalation(id: &str) -> String {
        format!("{}escalation:{}", KEY_PREFIX, id)
    }
}

/// Retry schedule for contended compare-and-swap loops.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay for the given attempt (1-based) plus up to 50% jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let capped = exp.min(self.max_delay);
        let jitter_ms = rand::thread_rng().gen_range(0..=capped.as_millis() as u64 / 2);
        capped + Duration::from_millis(jitter_ms)
    }
}

/// What an update closure wants done with the current value.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    Set(T),
    Delete,
    /// Leave the value as it is; the update is not applied.
    Abort,
}

/// Result of [`atomic_update`].
#[derive(Debug, Clone, PartialEq)]
pub struct Updated<T> {
    pub previous: Option<T>,
    pub current: Option<T>,
    pub applied: bool,
}

/// Read a JSON record. Corrupt values read as absent.
pub async fn get_json<S, T>(store: &S, key: &str) -> StoreResult<Option<T>>
where
    S: KvStore + ?Sized,
    T: DeserializeOwned,
{
    let raw = store.get(key).await?;
    Ok(raw.and_then(|s| decode(key, &s)))
}

/// Write a JSON record.
pub async fn set_json<S, T>(store: &S, key: &str, value: &T, ttl: Option<Duration>) -> StoreResult<()>
where
    S: KvStore + ?Sized,
    T: Serialize,
{
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw, ttl).await
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Discarding unreadable record at {}: {}", key, e);
            None
        }
    }
}

/// Read-verify-write a JSON record with compare-and-swap.
///
/// `apply` sees the current value and decides the mutation; it may run more
/// than once when the swap loses a race, so it must be free of side effects.
/// Returning [`Mutation::Abort`] stops without writing.
pub async fn atomic_update<S, T, F>(
    store: &S,
    key: &str,
    ttl: Option<Duration>,
    policy: &RetryPolicy,
    mut apply: F,
) -> StoreResult<Updated<T>>
where
    S: KvStore + ?Sized,
    T: Serialize + DeserializeOwned + Clone,
    F: FnMut(Option<&T>) -> Mutation<T>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let raw = store.get(key).await?;
        let previous: Option<T> = raw.as_deref().and_then(|s| decode(key, s));

        let (new_raw, current) = match apply(previous.as_ref()) {
            Mutation::Abort => {
                return Ok(Updated {
                    current: previous.clone(),
                    previous,
                    applied: false,
                })
            }
            Mutation::Delete => (None, None),
            Mutation::Set(value) => (Some(serde_json::to_string(&value)?), Some(value)),
        };

        if store
            .compare_and_swap(key, raw.as_deref(), new_raw.as_deref(), ttl)
            .await?
        {
            return Ok(Updated {
                previous,
                current,
                applied: true,
            });
        }

        debug!("CAS conflict on {} (attempt {}/{})", key, attempt, attempts);
        if attempt < attempts {
            tokio::time::sleep(policy.backoff_delay(attempt)).await;
        }
    }

    Err(StoreError::Contention {
        key: key.to_string(),
        attempts,
    })
}

/// Store selected at startup.
#[derive(Clone)]
pub enum Backend {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Redis(_) => "redis",
        }
    }
}

impl KvStore for Backend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            Backend::Memory(s) => s.get(key).await,
            Backend::Redis(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        match self {
            Backend::Memory(s) => s.set(key, value, ttl).await,
            Backend::Redis(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match self {
            Backend::Memory(s) => s.delete(key).await,
            Backend::Redis(s) => s.delete(key).await,
        }
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            Backend::Memory(s) => s.take(key).await,
            Backend::Redis(s) => s.take(key).await,
        }
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        match self {
            Backend::Memory(s) => s.set_if_absent(key, value, ttl).await,
            Backend::Redis(s) => s.set_if_absent(key, value, ttl).await,
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        match self {
            Backend::Memory(s) => s.compare_and_swap(key, expected, new, ttl).await,
            Backend::Redis(s) => s.compare_and_swap(key, expected, new, ttl).await,
        }
    }
}
