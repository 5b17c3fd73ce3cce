/**
 * Item Activation
 *
 * Charges the item price, then grants the item under a timeout. A grant
 * that fails or times out is compensated with a refund. When the refund
 * fails too, an escalation record is written for an operator.
 */

use crate::error::GameError;
use crate::services::buffs::BuffStore;
use crate::services::grid::{GridGenerator, GridModifiers};
use crate::services::ledger::Ledger;
use crate::services::peek::PeekCache;
use crate::services::store::{keys, set_json, KvStore, StoreError, StoreResult};
use crate::types::{Grid, TokenKind};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Items that can be activated directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopItem {
    Token(TokenKind),
    Peek,
}

impl ShopItem {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "peek" | "preview" => Some(ShopItem::Peek),
            other => TokenKind::parse(other).map(ShopItem::Token),
        }
    }

    pub fn price(&self) -> u64 {
        match self {
            ShopItem::Token(TokenKind::GuaranteedPair) => 150,
            ShopItem::Token(TokenKind::WildCard) => 250,
            ShopItem::Token(TokenKind::WinMultiplier) => 200,
            ShopItem::Token(TokenKind::Insurance) => 100,
            ShopItem::Peek => 75,
        }
    }
}

impl fmt::Display for ShopItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShopItem::Token(token) => f.write_str(token.key_name()),
            ShopItem::Peek => f.write_str("peek"),
        }
    }
}

/// What an activation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granted {
    Token(TokenKind),
    Preview(Grid),
}

/// Successful activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub granted: Granted,
    pub price: u64,
    pub new_balance: u64,
}

/// Persisted when a refund could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRecord {
    pub id: String,
    pub player: String,
    pub item: String,
    pub amount: u64,
    pub reason: String,
    pub created_at: i64,
}

pub struct Activator<S> {
    store: Arc<S>,
    ledger: Ledger<S>,
    buffs: BuffStore<S>,
    peek: PeekCache<S>,
    generator: Arc<GridGenerator>,
    grant_timeout: Duration,
}

impl<S> Clone for Activator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            buffs: self.buffs.clone(),
            peek: self.peek.clone(),
            generator: self.generator.clone(),
            grant_timeout: self.grant_timeout,
        }
    }
}

impl<S: KvStore> Activator<S> {
    pub fn new(
        store: Arc<S>,
        ledger: Ledger<S>,
        buffs: BuffStore<S>,
        peek: PeekCache<S>,
        generator: Arc<GridGenerator>,
        grant_timeout: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            buffs,
            peek,
            generator,
            grant_timeout,
        }
    }

    async fn grant(&self, player: &str, item: ShopItem, now_ms: i64) -> StoreResult<Granted> {
        match item {
            ShopItem::Token(token) => {
                self.buffs.grant_token(player, token).await?;
                Ok(Granted::Token(token))
            }
            ShopItem::Peek => {
                let buffs = self.buffs.active_buffs(player, now_ms).await;
                let mods = GridModifiers::from_buffs(&buffs);
                let grid = self.generator.generate(&mods, &mut OsRng);
                self.peek.store_preview(player, grid, now_ms).await?;
                Ok(Granted::Preview(grid))
            }
        }
    }

    /// Charge, grant, and compensate on failure.
    pub async fn activate(&self, player: &str, item: ShopItem, now_ms: i64) -> Result<Activation, GameError> {
        let price = item.price();
        let charged = self.ledger.debit(player, price).await?;
        if !charged.success {
            return Err(GameError::InsufficientFunds {
                needed: price,
                available: charged.new_balance,
            });
        }

        let reason = match tokio::time::timeout(self.grant_timeout, self.grant(player, item, now_ms)).await {
            Ok(Ok(granted)) => {
                info!("{} activated {} for {}", player, item, price);
                return Ok(Activation {
                    granted,
                    price,
                    new_balance: charged.new_balance,
                });
            }
            Ok(Err(e)) => e,
            Err(_) => StoreError::Timeout(format!("granting {}", item)),
        };

        warn!("Granting {} to {} failed, refunding {}: {}", item, player, price, reason);
        match self.ledger.credit(player, price).await {
            Ok(_) => Err(GameError::ActivationRefunded(item.to_string())),
            Err(refund_err) => {
                let reference = self
                    .escalate(player, item, price, &format!("{}; refund: {}", reason, refund_err), now_ms)
                    .await;
                Err(GameError::ActivationEscalated {
                    item: item.to_string(),
                    reference,
                })
            }
        }
    }

    async fn escalate(&self, player: &str, item: ShopItem, amount: u64, reason: &str, now_ms: i64) -> String {
        let record = EscalationRecord {
            id: Uuid::new_v4().to_string(),
            player: player.to_string(),
            item: item.to_string(),
            amount,
            reason: reason.to_string(),
            created_at: now_ms,
        };
        error!(
            escalation = %record.id,
            "Refund of {} to {} for {} failed: {}",
            amount, player, item, reason
        );
        if let Err(e) = set_json(self.store.as_ref(), &keys::escalation(&record.id), &record, None).await {
            error!(escalation = %record.id, "Escalation record could not be stored: {}", e);
        }
        record.id
    }
}
