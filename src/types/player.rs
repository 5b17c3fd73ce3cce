use crate::types::Expiring;
use serde::{Deserialize, Serialize};

/// Lowest value of the streak multiplier.
pub const STREAK_MULTIPLIER_MIN: f64 = 1.0;
/// Highest value of the streak multiplier.
pub const STREAK_MULTIPLIER_MAX: f64 = 3.0;
/// Added to the streak multiplier on every win.
pub const STREAK_MULTIPLIER_STEP: f64 = 0.1;

/// Persisted win/loss streak plus the separate payout multiplier.
///
/// At most one of `wins` and `losses` is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub wins: u32,
    pub losses: u32,
    pub multiplier: f64,
    pub expires_at: i64,
}

impl StreakRecord {
    pub fn fresh(expires_at: i64) -> Self {
        Self {
            wins: 0,
            losses: 0,
            multiplier: STREAK_MULTIPLIER_MIN,
            expires_at,
        }
    }

    /// Expired records read back as fresh ones.
    pub fn or_fresh(record: Option<Self>, now_ms: i64, expires_at: i64) -> Self {
        match record {
            Some(r) if r.is_active(now_ms) => r,
            _ => Self::fresh(expires_at),
        }
    }
}

impl Expiring for StreakRecord {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

/// Stored credit for future zero-cost spins at a fixed stake multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSpinEntry {
    pub multiplier: u64,
    pub count: u32,
}

/// All free-spin entries a player holds, kept sorted by multiplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeSpinQueue {
    pub entries: Vec<FreeSpinEntry>,
    pub expires_at: i64,
}

impl FreeSpinQueue {
    pub fn new(expires_at: i64) -> Self {
        Self {
            entries: Vec::new(),
            expires_at,
        }
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Add spins, merging with an entry at the same multiplier.
    pub fn add(&mut self, multiplier: u64, count: u32) {
        if count == 0 {
            return;
        }
        match self.entries.iter_mut().find(|e| e.multiplier == multiplier) {
            Some(entry) => entry.count = entry.count.saturating_add(count),
            None => {
                self.entries.push(FreeSpinEntry { multiplier, count });
                self.entries.sort_by_key(|e| e.multiplier);
            }
        }
    }

    /// Consume one spin from the lowest-multiplier entry.
    pub fn pop_lowest(&mut self) -> Option<u64> {
        self.entries.retain(|e| e.count > 0);
        self.entries.sort_by_key(|e| e.multiplier);
        let entry = self.entries.first_mut()?;
        entry.count -= 1;
        let multiplier = entry.multiplier;
        self.entries.retain(|e| e.count > 0);
        Some(multiplier)
    }

    pub fn describe(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}x{}", e.count, e.multiplier))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Expiring for FreeSpinQueue {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}
