/**
 * Buff, Token and Free-Spin State
 *
 * Reads are issued concurrently and degrade to "inactive" on any store
 * failure. Read-modify-write goes through `atomic_update` and always keeps
 * the record's own expiry, so a late write cannot revive a dead buff.
 */

use crate::services::store::{
    atomic_update, get_json, keys, set_json, KvStore, Mutation, RetryPolicy, StoreResult,
};
use crate::types::{
    ActiveBuff, BuffKind, BuffRecord, Expiring, FreeSpinEntry, FreeSpinQueue, HeldTokens, Symbol,
    TokenKind, MOMENTUM_MAX_PERCENT, MOMENTUM_STEP_PERCENT,
};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How long unused free spins are kept.
pub const FREE_SPIN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn ttl_until(expires_at: i64, now_ms: i64) -> Option<Duration> {
    let remaining = (expires_at - now_ms).max(1) as u64;
    Some(Duration::from_millis(remaining))
}

pub struct BuffStore<S> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S> Clone for BuffStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S: KvStore> BuffStore<S> {
    pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    async fn read_buff(&self, player: &str, kind: BuffKind, now_ms: i64) -> Option<ActiveBuff> {
        let key = keys::buff(player, &kind.key_name());
        match get_json::<_, BuffRecord>(self.store.as_ref(), &key).await {
            Ok(Some(record)) if record.is_usable(now_ms) => Some(ActiveBuff { kind, record }),
            Ok(_) => None,
            Err(e) => {
                warn!("Treating {} as inactive for {}: {}", kind, player, e);
                None
            }
        }
    }

    /// Every spin-affecting buff currently usable.
    pub async fn active_buffs(&self, player: &str, now_ms: i64) -> Vec<ActiveBuff> {
        let reads = BuffKind::SPIN_KINDS
            .iter()
            .map(|kind| self.read_buff(player, *kind, now_ms));
        join_all(reads).await.into_iter().flatten().collect()
    }

    /// Symbols among `symbols` that carry an active boost.
    pub async fn active_boosts(&self, player: &str, symbols: &[Symbol], now_ms: i64) -> Vec<Symbol> {
        let reads = symbols
            .iter()
            .map(|sym| self.read_buff(player, BuffKind::SymbolBoost(*sym), now_ms));
        join_all(reads)
            .await
            .into_iter()
            .flatten()
            .filter_map(|buff| match buff.kind {
                BuffKind::SymbolBoost(sym) => Some(sym),
                _ => None,
            })
            .collect()
    }

    pub async fn grant_buff(&self, player: &str, kind: BuffKind, record: &BuffRecord, now_ms: i64) -> StoreResult<()> {
        let key = keys::buff(player, &kind.key_name());
        set_json(self.store.as_ref(), &key, record, ttl_until(record.expires_at, now_ms)).await
    }

    pub async fn consume_boost(&self, player: &str, symbol: Symbol) -> StoreResult<()> {
        self.store
            .delete(&keys::buff(player, &BuffKind::SymbolBoost(symbol).key_name()))
            .await
    }

    /// Use up one clover charge. Returns the uses left; the record is
    /// deleted (and `None` returned) when it runs out.
    pub async fn use_clover(&self, player: &str, now_ms: i64) -> StoreResult<Option<u32>> {
        let key = keys::buff(player, &BuffKind::Clover.key_name());
        let updated = self
            .update_buff(&key, now_ms, |record| {
                let uses = record.uses.unwrap_or(0);
                if uses <= 1 {
                    return Mutation::Delete;
                }
                let mut next = record.clone();
                next.uses = Some(uses - 1);
                Mutation::Set(next)
            })
            .await?;
        Ok(updated.map(|r| r.uses.unwrap_or(0)))
    }

    /// Grow the momentum stack after a loss, up to the cap.
    pub async fn bump_momentum(&self, player: &str, now_ms: i64) -> StoreResult<Option<u32>> {
        let key = keys::buff(player, &BuffKind::Momentum.key_name());
        let updated = self
            .update_buff(&key, now_ms, |record| {
                let mut next = record.clone();
                next.stack = Some(
                    (record.stack_percent() + MOMENTUM_STEP_PERCENT).min(MOMENTUM_MAX_PERCENT),
                );
                Mutation::Set(next)
            })
            .await?;
        Ok(updated.map(|r| r.stack_percent()))
    }

    /// Spend the momentum stack after a win.
    pub async fn reset_momentum(&self, player: &str, now_ms: i64) -> StoreResult<()> {
        let key = keys::buff(player, &BuffKind::Momentum.key_name());
        self.update_buff(&key, now_ms, |record| {
            let mut next = record.clone();
            next.stack = Some(0);
            Mutation::Set(next)
        })
        .await?;
        Ok(())
    }

    /// Mutate a live buff record, keeping its expiry. Missing or expired
    /// records are left alone.
    async fn update_buff<F>(&self, key: &str, now_ms: i64, mut apply: F) -> StoreResult<Option<BuffRecord>>
    where
        F: FnMut(&BuffRecord) -> Mutation<BuffRecord>,
    {
        let existing: Option<BuffRecord> = get_json(self.store.as_ref(), key).await?;
        let Some(existing) = existing.filter(|r| r.is_active(now_ms)) else {
            return Ok(None);
        };
        let updated = atomic_update(
            self.store.as_ref(),
            key,
            ttl_until(existing.expires_at, now_ms),
            &self.retry,
            |current: Option<&BuffRecord>| match current {
                Some(record) if record.is_active(now_ms) => apply(record),
                _ => Mutation::Abort,
            },
        )
        .await?;
        Ok(updated.current.filter(|_| updated.applied))
    }

    /// Token state for one spin.
    pub async fn held_tokens(&self, player: &str) -> HeldTokens {
        let (pair, wild, double, insurance) = tokio::join!(
            self.read_flag(player, TokenKind::GuaranteedPair),
            self.read_flag(player, TokenKind::WildCard),
            self.read_flag(player, TokenKind::WinMultiplier),
            self.insurance_count(player),
        );
        HeldTokens {
            guaranteed_pair: pair,
            wild_card: wild,
            win_multiplier: double,
            insurance,
        }
    }

    async fn read_flag(&self, player: &str, token: TokenKind) -> bool {
        match get_json::<_, bool>(self.store.as_ref(), &keys::token(player, token.key_name())).await {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                warn!("Treating {} token as absent for {}: {}", token.key_name(), player, e);
                false
            }
        }
    }

    async fn insurance_count(&self, player: &str) -> u32 {
        let key = keys::token(player, TokenKind::Insurance.key_name());
        match get_json::<_, u32>(self.store.as_ref(), &key).await {
            Ok(count) => count.unwrap_or(0),
            Err(e) => {
                warn!("Treating insurance as empty for {}: {}", player, e);
                0
            }
        }
    }

    /// Give a player one token. Flags are idempotent; insurance stacks.
    pub async fn grant_token(&self, player: &str, token: TokenKind) -> StoreResult<()> {
        let key = keys::token(player, token.key_name());
        if !token.is_counter() {
            return set_json(self.store.as_ref(), &key, &true, None).await;
        }
        atomic_update(self.store.as_ref(), &key, None, &self.retry, |current: Option<&u32>| {
            Mutation::Set(current.copied().unwrap_or(0).saturating_add(1))
        })
        .await?;
        Ok(())
    }

    /// Use a token. Returns whether one was held.
    pub async fn consume_token(&self, player: &str, token: TokenKind) -> StoreResult<bool> {
        let key = keys::token(player, token.key_name());
        if !token.is_counter() {
            let raw = self.store.take(&key).await?;
            return Ok(raw.as_deref() == Some("true"));
        }
        let updated = atomic_update(self.store.as_ref(), &key, None, &self.retry, |current: Option<&u32>| {
            match current.copied().unwrap_or(0) {
                0 => Mutation::Abort,
                1 => Mutation::Delete,
                n => Mutation::Set(n - 1),
            }
        })
        .await?;
        Ok(updated.applied)
    }

    /// Current free-spin queue. Expired or unreadable queues read as empty.
    pub async fn free_spins(&self, player: &str, now_ms: i64) -> FreeSpinQueue {
        let empty = FreeSpinQueue::new(now_ms + FREE_SPIN_LIFETIME.as_millis() as i64);
        match get_json::<_, FreeSpinQueue>(self.store.as_ref(), &keys::free_spins(player)).await {
            Ok(Some(queue)) if queue.is_active(now_ms) => queue,
            Ok(_) => empty,
            Err(e) => {
                warn!("Treating free spins as empty for {}: {}", player, e);
                empty
            }
        }
    }

    /// Consume one free spin, lowest multiplier first.
    pub async fn pop_free_spin(&self, player: &str, now_ms: i64) -> StoreResult<Option<u64>> {
        let mut popped = None;
        let updated = atomic_update(
            self.store.as_ref(),
            &keys::free_spins(player),
            Some(FREE_SPIN_LIFETIME),
            &self.retry,
            |current: Option<&FreeSpinQueue>| {
                popped = None;
                let Some(queue) = current.filter(|q| q.is_active(now_ms)) else {
                    return Mutation::Abort;
                };
                let mut next = queue.clone();
                popped = next.pop_lowest();
                match popped {
                    None => Mutation::Abort,
                    Some(_) if next.is_empty() => Mutation::Delete,
                    Some(_) => Mutation::Set(next),
                }
            },
        )
        .await?;
        Ok(popped.filter(|_| updated.applied))
    }

    /// Add free spins, refreshing the queue lifetime.
    pub async fn add_free_spins(&self, player: &str, entry: FreeSpinEntry, now_ms: i64) -> StoreResult<FreeSpinQueue> {
        let expires_at = now_ms + FREE_SPIN_LIFETIME.as_millis() as i64;
        let updated = atomic_update(
            self.store.as_ref(),
            &keys::free_spins(player),
            Some(FREE_SPIN_LIFETIME),
            &self.retry,
            |current: Option<&FreeSpinQueue>| {
                let mut next = current
                    .filter(|q| q.is_active(now_ms))
                    .cloned()
                    .unwrap_or_else(|| FreeSpinQueue::new(expires_at));
                next.expires_at = expires_at;
                next.add(entry.multiplier, entry.count);
                Mutation::Set(next)
            },
        )
        .await?;
        debug!("Added {}x{} free spins for {}", entry.count, entry.multiplier, player);
        Ok(updated.current.unwrap_or_else(|| FreeSpinQueue::new(expires_at)))
    }
}
