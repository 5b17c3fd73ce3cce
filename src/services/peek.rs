use crate::services::store::{keys, KvStore, StoreResult};
use crate::types::{Expiring, Grid};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A pre-computed grid the next spin will return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeekRecord {
    pub grid: Grid,
    pub expires_at: i64,
}

impl Expiring for PeekRecord {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

/// Preview cache. A preview is cleared only by the settled spin that used it.
pub struct PeekCache<S> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S> Clone for PeekCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ttl: self.ttl,
        }
    }
}

impl<S: KvStore> PeekCache<S> {
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn store_preview(&self, player: &str, grid: Grid, now_ms: i64) -> StoreResult<PeekRecord> {
        let record = PeekRecord {
            grid,
            expires_at: now_ms + self.ttl.as_millis() as i64,
        };
        let raw = serde_json::to_string(&record)?;
        self.store.set(&keys::peek(player), &raw, Some(self.ttl)).await?;
        Ok(record)
    }

    /// The stored preview, if still valid. Reading does not consume it.
    pub async fn pending(&self, player: &str, now_ms: i64) -> Option<PeekRecord> {
        let raw = match self.store.get(&keys::peek(player)).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Ignoring peek cache for {}: {}", player, e);
                return None;
            }
        };
        serde_json::from_str::<PeekRecord>(&raw)
            .ok()
            .filter(|r| r.is_active(now_ms))
    }

    /// Remove a preview once a spin has used it. A newer preview bought in
    /// the meantime is left in place.
    pub async fn discard(&self, player: &str, record: &PeekRecord) -> StoreResult<bool> {
        let raw = serde_json::to_string(record)?;
        self.store
            .compare_and_swap(&keys::peek(player), Some(&raw), None, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;
    use crate::types::Symbol;

    #[tokio::test]
    async fn test_preview_survives_until_discarded() {
        let cache = PeekCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let grid = Grid::new(Symbol::Bell, Symbol::Bell, Symbol::Lemon);
        let stored = cache.store_preview("p", grid, 1_000).await.unwrap();

        let pending = cache.pending("p", 2_000).await.unwrap();
        assert_eq!(pending, stored);
        assert_eq!(cache.pending("p", 2_000).await.map(|r| r.grid), Some(grid));

        assert!(cache.discard("p", &pending).await.unwrap());
        assert_eq!(cache.pending("p", 2_000).await, None);
    }

    #[tokio::test]
    async fn test_discard_keeps_newer_preview() {
        let cache = PeekCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let old = cache
            .store_preview("p", Grid::new(Symbol::Bell, Symbol::Bell, Symbol::Lemon), 1_000)
            .await
            .unwrap();
        let newer = Grid::new(Symbol::Star, Symbol::Cherry, Symbol::Lemon);
        cache.store_preview("p", newer, 3_000).await.unwrap();

        assert!(!cache.discard("p", &old).await.unwrap());
        assert_eq!(cache.pending("p", 4_000).await.map(|r| r.grid), Some(newer));
    }

    #[tokio::test]
    async fn test_stale_preview_ignored() {
        let cache = PeekCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let grid = Grid::new(Symbol::Star, Symbol::Star, Symbol::Star);
        cache.store_preview("p", grid, 1_000).await.unwrap();
        assert_eq!(cache.pending("p", 61_000).await, None);
    }
}
