//! Player balances.
//!
//! The only writer of balance keys. Every mutation is a compare-and-swap
//! through [`atomic_update`] and clamps the result to `[0, max_balance]`.

use crate::services::store::{atomic_update, get_json, keys, KvStore, Mutation, RetryPolicy, StoreResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a debit or settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitOutcome {
    pub success: bool,
    pub new_balance: u64,
}

pub struct Ledger<S> {
    store: Arc<S>,
    max_balance: u64,
    starting_balance: u64,
    retry: RetryPolicy,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            max_balance: self.max_balance,
            starting_balance: self.starting_balance,
            retry: self.retry.clone(),
        }
    }
}

impl<S: KvStore> Ledger<S> {
    pub fn new(store: Arc<S>, max_balance: u64, starting_balance: u64, retry: RetryPolicy) -> Self {
        Self {
            store,
            max_balance,
            starting_balance: starting_balance.min(max_balance),
            retry,
        }
    }

    pub fn max_balance(&self) -> u64 {
        self.max_balance
    }

    fn clamp(&self, value: u64) -> u64 {
        value.min(self.max_balance)
    }

    /// Balance of a player, with new players starting at the default.
    pub async fn try_balance(&self, player: &str) -> StoreResult<u64> {
        let stored: Option<u64> = get_json(self.store.as_ref(), &keys::balance(player)).await?;
        Ok(self.clamp(stored.unwrap_or(self.starting_balance)))
    }

    /// Balance for display. An unreadable balance shows the fresh-player default.
    pub async fn balance(&self, player: &str) -> u64 {
        match self.try_balance(player).await {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to read balance for {}: {}", player, e);
                self.starting_balance
            }
        }
    }

    /// Add coins, saturating at the cap. Returns the new balance.
    pub async fn credit(&self, player: &str, amount: u64) -> StoreResult<u64> {
        let outcome = self.settle(player, 0, amount).await?;
        Ok(outcome.new_balance)
    }

    /// Remove coins. Fails without writing when the balance is short.
    pub async fn debit(&self, player: &str, amount: u64) -> StoreResult<DebitOutcome> {
        self.settle(player, amount, 0).await
    }

    /// Charge `cost` and pay `credit` in one write.
    ///
    /// Fails without writing when the current balance cannot cover `cost`.
    pub async fn settle(&self, player: &str, cost: u64, credit: u64) -> StoreResult<DebitOutcome> {
        let starting = self.starting_balance;
        let max = self.max_balance;
        let updated = atomic_update(
            self.store.as_ref(),
            &keys::balance(player),
            None,
            &self.retry,
            |current: Option<&u64>| {
                let balance = current.copied().unwrap_or(starting).min(max);
                if balance < cost {
                    return Mutation::Abort;
                }
                Mutation::Set((balance - cost).saturating_add(credit).min(max))
            },
        )
        .await?;

        let new_balance = self.clamp(updated.current.unwrap_or(starting));
        if updated.applied {
            debug!(
                "Ledger {}: -{} +{} -> {}",
                player, cost, credit, new_balance
            );
        }
        Ok(DebitOutcome {
            success: updated.applied,
            new_balance,
        })
    }

    /// Move coins between players. A failed credit refunds the sender.
    pub async fn transfer(&self, from: &str, to: &str, amount: u64) -> StoreResult<DebitOutcome> {
        let debit = self.debit(from, amount).await?;
        if !debit.success {
            return Ok(debit);
        }
        if let Err(e) = self.credit(to, amount).await {
            warn!("Transfer {} -> {} failed, refunding: {}", from, to, e);
            self.credit(from, amount).await?;
            return Err(e);
        }
        Ok(debit)
    }
}
