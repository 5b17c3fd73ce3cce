//! Per-player spin cooldown.
//!
//! The marker is the timestamp of the last accepted spin. A claim is won
//! with `SET NX` when no marker exists, or with compare-and-swap when the
//! old marker has aged past the window, so two concurrent requests can never
//! both see [`Claim::Claimed`]. A request that lands within the race margin
//! of the current marker is a duplicate and is dropped without a reply.

use crate::services::store::{keys, KvStore, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Outcome of [`CooldownGuard::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// This request owns the window starting at `at`.
    Claimed { at: i64 },
    /// Still cooling down.
    Cooling { remaining_ms: u64 },
    /// Near-simultaneous duplicate of an accepted request.
    Duplicate,
}

const CLAIM_ATTEMPTS: u32 = 3;

pub struct CooldownGuard<S> {
    store: Arc<S>,
    window_ms: u64,
    race_margin_ms: u64,
}

impl<S> Clone for CooldownGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            window_ms: self.window_ms,
            race_margin_ms: self.race_margin_ms,
        }
    }
}

impl<S: KvStore> CooldownGuard<S> {
    pub fn new(store: Arc<S>, window_ms: u64, race_margin_ms: u64) -> Self {
        Self {
            store,
            window_ms,
            race_margin_ms,
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_millis(self.window_ms.max(self.race_margin_ms).max(1) + self.race_margin_ms)
    }

    /// Try to open a new cooldown window for `player` at `now_ms`.
    pub async fn claim(&self, player: &str, now_ms: i64) -> StoreResult<Claim> {
        let key = keys::cooldown(player);
        let stamp = now_ms.to_string();

        for _ in 0..CLAIM_ATTEMPTS {
            if self.store.set_if_absent(&key, &stamp, Some(self.ttl())).await? {
                return Ok(Claim::Claimed { at: now_ms });
            }

            let Some(raw) = self.store.get(&key).await? else {
                // Marker expired between the two calls.
                continue;
            };
            let last: i64 = match raw.parse() {
                Ok(ts) => ts,
                Err(_) => {
                    // Unreadable marker: replace it outright.
                    if self
                        .store
                        .compare_and_swap(&key, Some(&raw), Some(&stamp), Some(self.ttl()))
                        .await?
                    {
                        return Ok(Claim::Claimed { at: now_ms });
                    }
                    continue;
                }
            };

            let elapsed = now_ms - last;
            if elapsed < self.race_margin_ms as i64 {
                debug!("Duplicate spin for {} ({}ms after last)", player, elapsed);
                return Ok(Claim::Duplicate);
            }
            if elapsed < self.window_ms as i64 {
                return Ok(Claim::Cooling {
                    remaining_ms: self.window_ms - elapsed as u64,
                });
            }

            if self
                .store
                .compare_and_swap(&key, Some(&raw), Some(&stamp), Some(self.ttl()))
                .await?
            {
                return Ok(Claim::Claimed { at: now_ms });
            }
            // Someone else replaced the stale marker; re-read it.
        }

        Ok(Claim::Duplicate)
    }

    /// Give back a window that did not lead to a spin. Only removes the
    /// marker this request wrote.
    pub async fn release(&self, player: &str, at: i64) -> StoreResult<bool> {
        let stamp = at.to_string();
        self.store
            .compare_and_swap(&keys::cooldown(player), Some(&stamp), None, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;

    fn guard() -> CooldownGuard<MemoryStore> {
        CooldownGuard::new(Arc::new(MemoryStore::new()), 5_000, 2_000)
    }

    #[tokio::test]
    async fn test_first_claim_wins() {
        let g = guard();
        assert_eq!(g.claim("p", 10_000).await.unwrap(), Claim::Claimed { at: 10_000 });
    }

    #[tokio::test]
    async fn test_duplicate_inside_margin() {
        let g = guard();
        g.claim("p", 10_000).await.unwrap();
        assert_eq!(g.claim("p", 10_500).await.unwrap(), Claim::Duplicate);
        // Clock skew behind the marker is a duplicate too.
        assert_eq!(g.claim("p", 9_000).await.unwrap(), Claim::Duplicate);
    }

    #[tokio::test]
    async fn test_cooling_reports_remaining() {
        let g = guard();
        g.claim("p", 10_000).await.unwrap();
        assert_eq!(
            g.claim("p", 13_000).await.unwrap(),
            Claim::Cooling { remaining_ms: 2_000 }
        );
    }

    #[tokio::test]
    async fn test_claim_after_window() {
        let g = guard();
        g.claim("p", 10_000).await.unwrap();
        assert_eq!(g.claim("p", 15_000).await.unwrap(), Claim::Claimed { at: 15_000 });
        assert_eq!(g.claim("p", 15_100).await.unwrap(), Claim::Duplicate);
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        let g = guard();
        let mut handles = Vec::new();
        for i in 0..8 {
            let g = g.clone();
            handles.push(tokio::spawn(async move { g.claim("p", 20_000 + i).await.unwrap() }));
        }
        let mut claimed = 0;
        for h in handles {
            match h.await.unwrap() {
                Claim::Claimed { .. } => claimed += 1,
                Claim::Duplicate => {}
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_release_only_own_marker() {
        let g = guard();
        g.claim("p", 10_000).await.unwrap();
        assert!(!g.release("p", 9_999).await.unwrap());
        assert!(g.release("p", 10_000).await.unwrap());
        assert_eq!(g.claim("p", 10_100).await.unwrap(), Claim::Claimed { at: 10_100 });
    }
}
