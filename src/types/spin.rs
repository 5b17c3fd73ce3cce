use crate::types::{Grid, Symbol};
use serde::{Deserialize, Serialize};

/// Which combination rule decided a spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "symbol")]
pub enum WinKind {
    RareTriple,
    RarePair,
    RareSingle,
    FreeSpins,
    Triple(Symbol),
    Pair(Symbol),
    NoMatch,
}

/// Raw outcome of the win resolver, before any multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct WinResult {
    pub kind: WinKind,
    pub points: u64,
    pub free_spins: u32,
    /// Symbols that formed the win, for symbol boosts.
    pub winning_symbols: Vec<Symbol>,
    /// Display-only text for a miss.
    pub flavor: Option<&'static str>,
}

impl WinResult {
    pub fn is_win(&self) -> bool {
        self.points > 0 || self.free_spins > 0
    }
}

/// Resolved stake for one spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stake {
    pub spin_cost: u64,
    pub multiplier: u64,
    pub free_spin: bool,
}

/// Everything observers get once a spin is final. Purely informational.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinReport {
    pub player: String,
    pub original_grid: Grid,
    pub final_grid: Grid,
    pub kind: WinKind,
    pub payout: u64,
    pub spin_cost: u64,
    pub multiplier: u64,
    pub free_spin_used: bool,
    pub insurance_used: bool,
    pub free_spins_awarded: u32,
    pub new_balance: u64,
    pub timestamp: i64,
}

/// The economic result of an accepted spin, as returned to the caller.
#[derive(Debug, Clone)]
pub struct SpinSummary {
    pub original_grid: Grid,
    pub final_grid: Grid,
    pub win: WinResult,
    pub stake: Stake,
    /// Payout after the multiplier pipeline, before streak bonuses.
    pub payout: u64,
    pub bonuses: Vec<(String, u64)>,
    pub insurance_refund: u64,
    pub free_spins_awarded: u32,
    pub new_balance: u64,
    pub messages: Vec<String>,
}

impl SpinSummary {
    /// Everything credited by this spin.
    pub fn total_credit(&self) -> u64 {
        self.payout
            + self.bonuses.iter().map(|(_, v)| *v).sum::<u64>()
            + self.insurance_refund
    }

    /// Signed balance change this spin caused.
    pub fn net_delta(&self) -> i64 {
        self.total_credit() as i64 - self.stake.spin_cost as i64
    }
}
