//! Game service.
//!
//! Wires the spin engine to the store-backed components and runs one
//! command per call. Nothing is kept in memory between calls except the
//! deferred-task queue, so any number of instances can share a store.
//!
//! A spin goes: cooldown claim, concurrent state reads, stake, grid,
//! special items, resolution, payout pipeline, streak, then a single ledger
//! settlement. Token and buff consumption is written after settlement;
//! streak persistence and the stats sink run as deferred tasks.

use crate::config::GameConfig;
use crate::error::GameError;
use crate::services::activation::{Activation, Activator, ShopItem};
use crate::services::buffs::BuffStore;
use crate::services::cooldown::{Claim, CooldownGuard};
use crate::services::deferred::DeferredTasks;
use crate::services::grid::{GridGenerator, GridModifiers};
use crate::services::jackpot::HourlyJackpot;
use crate::services::ledger::{DebitOutcome, Ledger};
use crate::services::peek::PeekCache;
use crate::services::pipeline::{self, PipelineInput};
use crate::services::stake::{free_stake, StakeRequest};
use crate::services::stats::StatsSink;
use crate::services::store::{keys, KvStore, RetryPolicy};
use crate::services::streak::{self, StreakTracker};
use crate::services::{resolver, special_items};
use crate::types::{
    ActiveBuff, BuffKind, FreeSpinEntry, FreeSpinQueue, SpinReport, SpinSummary, Stake, StreakRecord, TokenKind,
};
use chrono::Utc;
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Share of the stake refunded by insurance, in percent.
pub const INSURANCE_REFUND_PERCENT: u64 = 50;

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn has_buff(buffs: &[ActiveBuff], kind: BuffKind) -> bool {
    buffs.iter().any(|b| b.kind == kind)
}

pub struct GameService<S> {
    config: GameConfig,
    store: Arc<S>,
    ledger: Ledger<S>,
    cooldown: CooldownGuard<S>,
    buffs: BuffStore<S>,
    streaks: StreakTracker<S>,
    peek: PeekCache<S>,
    jackpot: HourlyJackpot<S>,
    activator: Activator<S>,
    generator: Arc<GridGenerator>,
    stats: Arc<dyn StatsSink>,
    deferred: DeferredTasks,
}

impl<S: KvStore + 'static> GameService<S> {
    pub fn new(store: Arc<S>, config: GameConfig, stats: Arc<dyn StatsSink>) -> Self {
        let retry = RetryPolicy {
            max_attempts: config.store_retry_attempts.max(1),
            ..RetryPolicy::default()
        };
        let ledger = Ledger::new(
            store.clone(),
            config.max_balance,
            config.starting_balance,
            retry.clone(),
        );
        let buffs = BuffStore::new(store.clone(), retry);
        let peek = PeekCache::new(store.clone(), config.peek_ttl());
        let generator = Arc::new(GridGenerator::new(config.rare_probability));
        let activator = Activator::new(
            store.clone(),
            ledger.clone(),
            buffs.clone(),
            peek.clone(),
            generator.clone(),
            config.deferred_timeout(),
        );

        Self {
            cooldown: CooldownGuard::new(store.clone(), config.spin_cooldown_ms, config.race_margin_ms),
            streaks: StreakTracker::new(store.clone()),
            jackpot: HourlyJackpot::new(store.clone(), config.hourly_jackpot_bonus),
            store,
            deferred: DeferredTasks::new(config.deferred_timeout()),
            ledger,
            buffs,
            peek,
            activator,
            generator,
            stats,
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn buffs(&self) -> &BuffStore<S> {
        &self.buffs
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn peek_cache(&self) -> &PeekCache<S> {
        &self.peek
    }

    pub fn deferred(&self) -> &DeferredTasks {
        &self.deferred
    }

    pub async fn spin(&self, player: &str, amount: &str) -> Result<SpinSummary, GameError> {
        self.spin_at(player, amount, now_ms()).await
    }

    /// Run one spin at `now_ms`.
    pub async fn spin_at(&self, player: &str, amount: &str, now_ms: i64) -> Result<SpinSummary, GameError> {
        let player = keys::normalize_player(player);
        let request = StakeRequest::parse(amount)?;

        let at = match self.cooldown.claim(&player, now_ms).await? {
            Claim::Claimed { at } => at,
            Claim::Cooling { remaining_ms } => return Err(GameError::CooldownActive { remaining_ms }),
            Claim::Duplicate => return Err(GameError::Duplicate),
        };

        match self.play(&player, request, now_ms).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                // The spin was not settled; let the player retry right away.
                if let Err(release_err) = self.cooldown.release(&player, at).await {
                    warn!("Failed to release cooldown for {}: {}", player, release_err);
                }
                Err(e)
            }
        }
    }

    async fn play(&self, player: &str, request: StakeRequest, now_ms: i64) -> Result<SpinSummary, GameError> {
        let (balance, buffs, tokens, streak, preview) = tokio::join!(
            self.ledger.balance(player),
            self.buffs.active_buffs(player, now_ms),
            self.buffs.held_tokens(player),
            self.streaks.load(player, now_ms),
            self.peek.pending(player, now_ms),
        );

        let stake = match request {
            StakeRequest::Free => match self.buffs.pop_free_spin(player, now_ms).await? {
                Some(multiplier) => free_stake(multiplier),
                None => return Err(GameError::NoFreeSpins),
            },
            paid => paid.resolve_paid(balance)?,
        };

        let mut rng = OsRng;
        let mods = GridModifiers::from_buffs(&buffs);
        let original = self.generator.spin(preview.as_ref().map(|p| p.grid), &mods, &mut rng);

        let mut grid = original;
        let mut used_pair = false;
        let mut used_wild = false;
        if tokens.guaranteed_pair {
            let applied = special_items::apply_guaranteed_pair(grid, &mut rng);
            grid = applied.grid;
            used_pair = applied.consumed;
        }
        if tokens.wild_card {
            let applied = special_items::apply_wild_card(grid);
            grid = applied.grid;
            used_wild = applied.consumed;
        }

        let win = resolver::resolve(&original, &grid, &mut rng);
        let symbol_boosts = if win.points > 0 {
            self.buffs.active_boosts(player, &win.winning_symbols, now_ms).await
        } else {
            Vec::new()
        };
        let momentum = buffs.iter().find(|b| b.kind == BuffKind::Momentum);
        let won = win.is_win();
        let streak_outcome = streak::advance(&streak, won);

        let payout = pipeline::run(
            &win,
            &PipelineInput {
                stake_multiplier: stake.multiplier,
                win_multiplier_token: tokens.win_multiplier,
                symbol_boosts,
                golden_hour: has_buff(&buffs, BuffKind::GoldenHour),
                momentum_stack: momentum.map_or(0, |b| b.record.stack_percent()),
                high_roller: has_buff(&buffs, BuffKind::HighRoller),
                streak_multiplier: streak_outcome.applied_multiplier,
            },
        );

        let mut bonuses = streak_outcome.bonuses();
        let jackpot_claimed = match self.jackpot.try_claim(player, now_ms).await {
            Ok(Some(bonus)) => {
                bonuses.push(("Hourly jackpot".to_string(), bonus));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Hourly jackpot check failed for {}: {}", player, e);
                false
            }
        };

        let insured = !won && !stake.free_spin && tokens.insurance > 0;
        let insurance_refund = if insured {
            stake.spin_cost * INSURANCE_REFUND_PERCENT / 100
        } else {
            0
        };

        let credit = payout.points
            + bonuses.iter().map(|(_, v)| *v).sum::<u64>()
            + insurance_refund;
        let settled = self.ledger.settle(player, stake.spin_cost, credit).await;
        let DebitOutcome { success, new_balance } = match settled {
            Ok(outcome) => outcome,
            Err(e) => {
                self.restore_free_spin(player, &stake, now_ms).await;
                self.release_jackpot(player, jackpot_claimed, now_ms).await;
                return Err(e.into());
            }
        };
        if !success {
            self.release_jackpot(player, jackpot_claimed, now_ms).await;
            return Err(GameError::InsufficientFunds {
                needed: stake.spin_cost,
                available: new_balance,
            });
        }

        // The spin is final from here on; consumption failures are logged only.
        let consume_pair = async {
            if used_pair {
                self.consume(player, TokenKind::GuaranteedPair).await;
            }
        };
        let consume_wild = async {
            if used_wild {
                self.consume(player, TokenKind::WildCard).await;
            }
        };
        let consume_double = async {
            if payout.used_win_multiplier {
                self.consume(player, TokenKind::WinMultiplier).await;
            }
        };
        let consume_insurance = async {
            if insured {
                self.consume(player, TokenKind::Insurance).await;
            }
        };
        let consume_boost = async {
            if let Some(symbol) = payout.used_symbol_boost {
                if let Err(e) = self.buffs.consume_boost(player, symbol).await {
                    warn!("Failed to consume {} boost for {}: {}", symbol.name(), player, e);
                }
            }
        };
        let update_clover = async {
            if has_buff(&buffs, BuffKind::Clover) {
                if let Err(e) = self.buffs.use_clover(player, now_ms).await {
                    warn!("Failed to use clover for {}: {}", player, e);
                }
            }
        };
        let update_momentum = async {
            if momentum.is_some() {
                let result = if won {
                    self.buffs.reset_momentum(player, now_ms).await
                } else {
                    self.buffs.bump_momentum(player, now_ms).await.map(|_| ())
                };
                if let Err(e) = result {
                    warn!("Failed to update momentum for {}: {}", player, e);
                }
            }
        };
        let clear_preview = async {
            if let Some(record) = &preview {
                if let Err(e) = self.peek.discard(player, record).await {
                    warn!("Failed to clear peek preview for {}: {}", player, e);
                }
            }
        };
        let award_free_spins = async {
            match payout.free_spin_award {
                Some(entry) => match self.buffs.add_free_spins(player, entry, now_ms).await {
                    Ok(_) => entry.count,
                    Err(e) => {
                        warn!("Failed to award free spins to {}: {}", player, e);
                        0
                    }
                },
                None => 0,
            }
        };
        let (_, _, _, _, _, _, _, _, free_spins_awarded) = tokio::join!(
            consume_pair,
            consume_wild,
            consume_double,
            consume_insurance,
            consume_boost,
            update_clover,
            update_momentum,
            clear_preview,
            award_free_spins,
        );

        let mut messages = Vec::new();
        if let Some(warning) = streak_outcome.warning {
            messages.push(warning.to_string());
        }

        let summary = SpinSummary {
            original_grid: original,
            final_grid: grid,
            win,
            stake,
            payout: payout.points,
            bonuses,
            insurance_refund,
            free_spins_awarded,
            new_balance,
            messages,
        };
        debug!(
            "{} spun {} -> {} ({:?}), net {}",
            player,
            summary.original_grid,
            summary.final_grid,
            summary.win.kind,
            summary.net_delta()
        );

        self.defer_bookkeeping(player, streak_outcome.record, &summary, now_ms);
        Ok(summary)
    }

    async fn consume(&self, player: &str, token: TokenKind) {
        if let Err(e) = self.buffs.consume_token(player, token).await {
            warn!("Failed to consume {} for {}: {}", token.key_name(), player, e);
        }
    }

    async fn restore_free_spin(&self, player: &str, stake: &Stake, now_ms: i64) {
        if !stake.free_spin {
            return;
        }
        let entry = FreeSpinEntry {
            multiplier: stake.multiplier,
            count: 1,
        };
        if let Err(e) = self.buffs.add_free_spins(player, entry, now_ms).await {
            warn!("Failed to restore free spin for {}: {}", player, e);
        }
    }

    async fn release_jackpot(&self, player: &str, claimed: bool, now_ms: i64) {
        if !claimed {
            return;
        }
        if let Err(e) = self.jackpot.release(player, now_ms).await {
            warn!("Failed to release hourly jackpot for {}: {}", player, e);
        }
    }

    fn defer_bookkeeping(&self, player: &str, record: StreakRecord, summary: &SpinSummary, now_ms: i64) {
        let streaks = self.streaks.clone();
        let owner = player.to_string();
        self.deferred.spawn("streak", async move {
            streaks.save(&owner, record, now_ms).await
        });

        let report = SpinReport {
            player: player.to_string(),
            original_grid: summary.original_grid,
            final_grid: summary.final_grid,
            kind: summary.win.kind,
            payout: summary.total_credit(),
            spin_cost: summary.stake.spin_cost,
            multiplier: summary.stake.multiplier,
            free_spin_used: summary.stake.free_spin,
            insurance_used: summary.insurance_refund > 0,
            free_spins_awarded: summary.free_spins_awarded,
            new_balance: summary.new_balance,
            timestamp: now_ms,
        };
        let stats = self.stats.clone();
        self.deferred.spawn("stats", async move {
            stats.record(&report);
            Ok::<(), std::convert::Infallible>(())
        });
    }

    pub async fn balance(&self, player: &str) -> u64 {
        self.ledger.balance(&keys::normalize_player(player)).await
    }

    pub async fn free_spins(&self, player: &str) -> FreeSpinQueue {
        self.free_spins_at(player, now_ms()).await
    }

    pub async fn free_spins_at(&self, player: &str, now_ms: i64) -> FreeSpinQueue {
        self.buffs
            .free_spins(&keys::normalize_player(player), now_ms)
            .await
    }

    pub async fn streak(&self, player: &str) -> StreakRecord {
        self.streak_at(player, now_ms()).await
    }

    pub async fn streak_at(&self, player: &str, now_ms: i64) -> StreakRecord {
        self.streaks
            .load(&keys::normalize_player(player), now_ms)
            .await
    }

    pub async fn activate(&self, player: &str, item: &str) -> Result<Activation, GameError> {
        self.activate_at(player, item, now_ms()).await
    }

    pub async fn activate_at(&self, player: &str, item: &str, now_ms: i64) -> Result<Activation, GameError> {
        let item = ShopItem::parse(item).ok_or_else(|| GameError::UnknownItem(item.trim().to_string()))?;
        self.activator
            .activate(&keys::normalize_player(player), item, now_ms)
            .await
    }

    /// Transfer coins between players.
    pub async fn give(&self, from: &str, to: &str, amount: &str) -> Result<DebitOutcome, GameError> {
        let from = keys::normalize_player(from);
        let to = keys::normalize_player(to);
        if to.is_empty() || to == from {
            return Err(GameError::InvalidTarget(to));
        }
        let amount: u64 = amount
            .trim()
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| GameError::InvalidStake(amount.trim().to_string()))?;

        let outcome = self.ledger.transfer(&from, &to, amount).await?;
        if !outcome.success {
            return Err(GameError::InsufficientFunds {
                needed: amount,
                available: outcome.new_balance,
            });
        }
        info!("{} gave {} coins to {}", from, amount, to);
        Ok(outcome)
    }
}
