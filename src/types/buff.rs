/**
 * Buff Types
 *
 * Time-limited or use-limited modifiers to odds and payouts. Every record
 * carries its own expiry so a late write can never revive a dead buff.
 */

use crate::types::Symbol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anything persisted with an absolute expiry (unix ms).
pub trait Expiring {
    fn expires_at(&self) -> i64;

    /// Active strictly before the expiry instant.
    fn is_active(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at()
    }

    /// Milliseconds left, zero once expired.
    fn remaining_ms(&self, now_ms: i64) -> u64 {
        (self.expires_at() - now_ms).max(0) as u64
    }
}

/// Re-roll bias applied per cell after the rare draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerollBias {
    /// Chance that an ordinary cell re-rolls at all.
    pub reroll_chance: f64,
    /// Chance that a re-rolling cell lands on the target.
    pub land_chance: f64,
    pub target: Symbol,
}

/// Buff kinds the spin engine consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuffKind {
    /// Rare probability x2.
    LuckyCharm,
    /// Rare probability x3, limited uses.
    Clover,
    StarMagnet,
    BadgerBait,
    /// Flat +30% on winning payouts.
    GoldenHour,
    /// x2 on payouts above the threshold.
    HighRoller,
    /// Accumulates a percentage on losses, paid out and reset on a win.
    Momentum,
    /// x2 when the symbol takes part in the win; consumed on use.
    SymbolBoost(Symbol),
}

/// Percentage added by `GoldenHour`.
pub const GOLDEN_HOUR_PERCENT: u64 = 30;
/// Payout a spin must exceed for `HighRoller` to double it.
pub const HIGH_ROLLER_THRESHOLD: u64 = 200;
/// Stack gained per loss while `Momentum` is active.
pub const MOMENTUM_STEP_PERCENT: u32 = 5;
pub const MOMENTUM_MAX_PERCENT: u32 = 50;

impl BuffKind {
    /// Kinds read on every spin (symbol boosts are looked up per winning symbol).
    pub const SPIN_KINDS: [BuffKind; 7] = [
        BuffKind::LuckyCharm,
        BuffKind::Clover,
        BuffKind::StarMagnet,
        BuffKind::BadgerBait,
        BuffKind::GoldenHour,
        BuffKind::HighRoller,
        BuffKind::Momentum,
    ];

    pub fn key_name(&self) -> String {
        match self {
            BuffKind::LuckyCharm => "lucky_charm".to_string(),
            BuffKind::Clover => "clover".to_string(),
            BuffKind::StarMagnet => "star_magnet".to_string(),
            BuffKind::BadgerBait => "badger_bait".to_string(),
            BuffKind::GoldenHour => "golden_hour".to_string(),
            BuffKind::HighRoller => "high_roller".to_string(),
            BuffKind::Momentum => "momentum".to_string(),
            BuffKind::SymbolBoost(sym) => format!("boost:{}", sym.name()),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if let Some(sym) = s.strip_prefix("boost:") {
            return Symbol::parse(sym)
                .filter(|sym| sym.pair_payout() > 0 || sym.is_rare())
                .map(BuffKind::SymbolBoost);
        }
        Self::SPIN_KINDS.into_iter().find(|k| k.key_name() == s)
    }

    /// Factor applied to the rare-symbol probability.
    pub fn rare_multiplier(&self) -> Option<f64> {
        match self {
            BuffKind::LuckyCharm => Some(2.0),
            BuffKind::Clover => Some(3.0),
            _ => None,
        }
    }

    pub fn reroll_bias(&self) -> Option<RerollBias> {
        match self {
            BuffKind::StarMagnet => Some(RerollBias {
                reroll_chance: 0.20,
                land_chance: 0.50,
                target: Symbol::Star,
            }),
            BuffKind::BadgerBait => Some(RerollBias {
                reroll_chance: 0.10,
                land_chance: 0.25,
                target: Symbol::Badger,
            }),
            _ => None,
        }
    }

    /// Whether the record tracks remaining uses.
    pub fn is_use_limited(&self) -> bool {
        matches!(self, BuffKind::Clover)
    }
}

impl fmt::Display for BuffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_name())
    }
}

/// Persisted buff state for one (player, kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffRecord {
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<u32>,
}

impl BuffRecord {
    pub fn timed(expires_at: i64) -> Self {
        Self {
            expires_at,
            uses: None,
            stack: None,
        }
    }

    pub fn with_uses(expires_at: i64, uses: u32) -> Self {
        Self {
            expires_at,
            uses: Some(uses),
            stack: None,
        }
    }

    pub fn with_stack(expires_at: i64, stack: u32) -> Self {
        Self {
            expires_at,
            uses: None,
            stack: Some(stack),
        }
    }

    /// Active and, for use-limited records, not exhausted.
    pub fn is_usable(&self, now_ms: i64) -> bool {
        self.is_active(now_ms) && self.uses.map_or(true, |u| u > 0)
    }

    pub fn stack_percent(&self) -> u32 {
        self.stack.unwrap_or(0)
    }
}

impl Expiring for BuffRecord {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

/// A buff that was active when the spin started.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveBuff {
    pub kind: BuffKind,
    pub record: BuffRecord,
}

/// One-shot tokens consumed by exactly one future spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    GuaranteedPair,
    WildCard,
    WinMultiplier,
    Insurance,
}

impl TokenKind {
    pub fn key_name(&self) -> &'static str {
        match self {
            TokenKind::GuaranteedPair => "guaranteed_pair",
            TokenKind::WildCard => "wild_card",
            TokenKind::WinMultiplier => "win_multiplier",
            TokenKind::Insurance => "insurance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "guaranteed_pair" | "pair" => Some(TokenKind::GuaranteedPair),
            "wild_card" | "wild" => Some(TokenKind::WildCard),
            "win_multiplier" | "double" => Some(TokenKind::WinMultiplier),
            "insurance" => Some(TokenKind::Insurance),
            _ => None,
        }
    }

    /// Insurance is a counter; the rest are flags.
    pub fn is_counter(&self) -> bool {
        matches!(self, TokenKind::Insurance)
    }
}

/// Token state read at the start of a spin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldTokens {
    pub guaranteed_pair: bool,
    pub wild_card: bool,
    pub win_multiplier: bool,
    pub insurance: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buff_kind_roundtrip_names() {
        for kind in BuffKind::SPIN_KINDS {
            assert_eq!(BuffKind::parse(&kind.key_name()), Some(kind));
        }
        assert_eq!(
            BuffKind::parse("boost:cherry"),
            Some(BuffKind::SymbolBoost(Symbol::Cherry))
        );
        assert_eq!(BuffKind::parse("boost:wild"), None);
    }

    #[test]
    fn test_record_expiry_boundaries() {
        let record = BuffRecord::timed(1_000);
        assert!(record.is_active(999));
        assert!(!record.is_active(1_000));
        assert!(!record.is_active(1_001));
        assert_eq!(record.remaining_ms(400), 600);
        assert_eq!(record.remaining_ms(5_000), 0);
    }

    #[test]
    fn test_exhausted_uses_not_usable() {
        let record = BuffRecord::with_uses(10_000, 0);
        assert!(record.is_active(1));
        assert!(!record.is_usable(1));
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_string(&BuffRecord::with_stack(42, 15)).unwrap();
        assert_eq!(json, r#"{"expiresAt":42,"stack":15}"#);
    }
}
