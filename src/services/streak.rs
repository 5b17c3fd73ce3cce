//! Win/loss streaks, combo bonuses and the streak multiplier.
//!
//! [`advance`] is a pure transition over a [`StreakRecord`]; [`StreakTracker`]
//! only loads and stores the record.

use crate::services::store::{get_json, keys, set_json, KvStore, StoreResult};
use crate::types::{
    StreakRecord, STREAK_MULTIPLIER_MAX, STREAK_MULTIPLIER_MIN, STREAK_MULTIPLIER_STEP,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Consecutive wins that pay the hot-streak bonus.
pub const HOT_STREAK_THRESHOLD: u32 = 5;
pub const HOT_STREAK_BONUS: u64 = 250;
/// Losses that must precede a win for the comeback bonus.
pub const COMEBACK_THRESHOLD: u32 = 5;
pub const COMEBACK_BONUS: u64 = 150;
/// Per-spin combo bonus keyed by consecutive wins.
pub const COMBO_BONUSES: [(u32, u64); 3] = [(2, 5), (3, 10), (4, 20)];

/// Loss counts with a fixed warning.
pub const LOSS_WARNINGS: [(u32, &str); 3] = [
    (10, "10 losses in a row. Maybe take a breather?"),
    (15, "15 losses straight. The badger is laughing at you."),
    (20, "20 losses! The machine feels sorry for you."),
];

/// Cycled once the loss count passes the last fixed warning.
pub const ROTATING_WARNINGS: [&str; 4] = [
    "Still spinning? Respect.",
    "The reels have to turn eventually...",
    "Your persistence is legendary.",
    "Statistically, this has to end soon.",
];

/// How long an idle streak survives.
pub const STREAK_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of one streak transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StreakOutcome {
    pub record: StreakRecord,
    /// Multiplier in effect for the spin that caused the transition.
    pub applied_multiplier: f64,
    pub hot_streak_bonus: Option<u64>,
    pub comeback_bonus: Option<u64>,
    pub combo_bonus: Option<u64>,
    pub warning: Option<&'static str>,
}

impl StreakOutcome {
    /// Bonuses as (label, amount) pairs in payout order.
    pub fn bonuses(&self) -> Vec<(String, u64)> {
        [
            ("Hot streak", self.hot_streak_bonus),
            ("Comeback", self.comeback_bonus),
            ("Combo", self.combo_bonus),
        ]
        .into_iter()
        .filter_map(|(label, amount)| amount.map(|a| (label.to_string(), a)))
        .collect()
    }
}

fn combo_bonus(wins: u32) -> Option<u64> {
    COMBO_BONUSES
        .iter()
        .find(|(w, _)| *w == wins)
        .map(|(_, bonus)| *bonus)
}

/// Warning surfaced for a loss count, if any.
pub fn loss_warning(losses: u32) -> Option<&'static str> {
    let (last_fixed, _) = LOSS_WARNINGS[LOSS_WARNINGS.len() - 1];
    if losses > last_fixed {
        let idx = (losses - last_fixed - 1) as usize % ROTATING_WARNINGS.len();
        return Some(ROTATING_WARNINGS[idx]);
    }
    LOSS_WARNINGS
        .iter()
        .rev()
        .find(|(threshold, _)| losses >= *threshold)
        .map(|(_, msg)| *msg)
}

fn step_multiplier(current: f64) -> f64 {
    let next = current + STREAK_MULTIPLIER_STEP;
    // Keep one decimal so repeated steps do not drift.
    ((next * 10.0).round() / 10.0).clamp(STREAK_MULTIPLIER_MIN, STREAK_MULTIPLIER_MAX)
}

/// Apply one spin outcome to the streak.
pub fn advance(current: &StreakRecord, won: bool) -> StreakOutcome {
    let mut outcome = StreakOutcome {
        record: current.clone(),
        applied_multiplier: current
            .multiplier
            .clamp(STREAK_MULTIPLIER_MIN, STREAK_MULTIPLIER_MAX),
        hot_streak_bonus: None,
        comeback_bonus: None,
        combo_bonus: None,
        warning: None,
    };
    let record = &mut outcome.record;

    if won {
        record.multiplier = step_multiplier(outcome.applied_multiplier);
        if current.losses >= COMEBACK_THRESHOLD {
            outcome.comeback_bonus = Some(COMEBACK_BONUS);
            record.wins = 0;
            record.losses = 0;
            return outcome;
        }
        record.wins = current.wins + 1;
        record.losses = 0;
        if record.wins >= HOT_STREAK_THRESHOLD {
            outcome.hot_streak_bonus = Some(HOT_STREAK_BONUS);
            record.wins = 0;
        } else {
            outcome.combo_bonus = combo_bonus(record.wins);
        }
    } else {
        record.multiplier = STREAK_MULTIPLIER_MIN;
        record.wins = 0;
        record.losses = current.losses.saturating_add(1);
        outcome.warning = loss_warning(record.losses);
    }
    outcome
}

/// Loads and stores streak records.
pub struct StreakTracker<S> {
    store: Arc<S>,
}

impl<S> Clone for StreakTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: KvStore> StreakTracker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Current streak; missing, expired or unreadable records read as fresh.
    pub async fn load(&self, player: &str, now_ms: i64) -> StreakRecord {
        let expires_at = now_ms + STREAK_LIFETIME.as_millis() as i64;
        let record = match get_json(self.store.as_ref(), &keys::streak(player)).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to read streak for {}: {}", player, e);
                None
            }
        };
        StreakRecord::or_fresh(record, now_ms, expires_at)
    }

    /// Persist a record, refreshing its lifetime.
    pub async fn save(&self, player: &str, mut record: StreakRecord, now_ms: i64) -> StoreResult<()> {
        record.expires_at = now_ms + STREAK_LIFETIME.as_millis() as i64;
        set_json(
            self.store.as_ref(),
            &keys::streak(player),
            &record,
            Some(STREAK_LIFETIME),
        )
        .await
    }
}
