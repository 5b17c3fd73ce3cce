use crate::services::store::{KvStore, StoreResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// In-process store with TTL support. Used in tests and when Redis is absent.
///
/// Every operation on a key runs under the key's shard lock, so
/// `set_if_absent` and `compare_and_swap` are atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<DashMap<String, StoreEntry>>,
}

struct StoreEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |e| e > Instant::now())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all expired entries.
    pub fn cleanup(&self) {
        self.data.retain(|_, entry| entry.is_live());
    }

    /// Number of entries (including expired).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let entry = self.data.get(key)?;
        if entry.is_live() {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.data.remove_if(key, |_, e| !e.is_live());
            None
        }
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.data.insert(key.to_string(), StoreEntry::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .data
            .remove(key)
            .filter(|(_, e)| e.is_live())
            .map(|(_, e)| e.value))
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    Ok(false)
                } else {
                    occupied.insert(StoreEntry::new(value, ttl));
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoreEntry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied
                    .get()
                    .is_live()
                    .then(|| occupied.get().value.as_str());
                if current != expected {
                    return Ok(false);
                }
                match new {
                    Some(value) => {
                        occupied.insert(StoreEntry::new(value, ttl));
                    }
                    None => {
                        occupied.remove();
                    }
                }
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(false);
                }
                if let Some(value) = new {
                    vacant.insert(StoreEntry::new(value, ttl));
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_basic() {
        let store = MemoryStore::new();
        store.set("key1", "value1", None).await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), Some("value1".to_string()));
        assert_eq!(store.get("key2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_expiration() {
        let store = MemoryStore::new();
        store
            .set("key1", "value1", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_if_absent_once() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("k", "a", None).await.unwrap());
        assert!(!store.set_if_absent("k", "b", None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_set_if_absent_over_expired() {
        let store = MemoryStore::new();
        store
            .set("k", "old", Some(Duration::from_millis(5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(store.set_if_absent("k", "new", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryStore::new();
        assert!(store.compare_and_swap("k", None, Some("1"), None).await.unwrap());
        assert!(!store.compare_and_swap("k", None, Some("2"), None).await.unwrap());
        assert!(!store.compare_and_swap("k", Some("0"), Some("2"), None).await.unwrap());
        assert!(store.compare_and_swap("k", Some("1"), Some("2"), None).await.unwrap());
        assert!(store.compare_and_swap("k", Some("2"), None, None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_take_removes() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.take("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.take("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cleanup() {
        let store = MemoryStore::new();
        store
            .set("short", "v", Some(Duration::from_millis(5)))
            .await
            .unwrap();
        store.set("long", "v", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        store.cleanup();
        assert_eq!(store.len(), 1);
    }
}
