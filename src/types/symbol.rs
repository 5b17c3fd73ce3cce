use serde::{Deserialize, Serialize};
use std::fmt;

/// A reel symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Cherry,
    Lemon,
    Orange,
    Grape,
    Bell,
    Star,
    /// Free-spin symbol.
    Diamond,
    /// Jackpot-tier symbol, drawn separately from the weighted table.
    Badger,
    /// Only ever inserted by a wild-card token.
    Wild,
}

/// Ordinary symbols and their draw weights (total 100).
pub const ORDINARY_WEIGHTS: [(Symbol, u32); 7] = [
    (Symbol::Cherry, 30),
    (Symbol::Lemon, 25),
    (Symbol::Orange, 20),
    (Symbol::Grape, 12),
    (Symbol::Bell, 7),
    (Symbol::Star, 4),
    (Symbol::Diamond, 2),
];

/// Payout for a badger triple.
pub const RARE_TRIPLE_PAYOUT: u64 = 10_000;
/// Payout for two badgers.
pub const RARE_PAIR_PAYOUT: u64 = 1_000;
/// Payout for a single badger.
pub const RARE_SINGLE_PAYOUT: u64 = 100;

/// Free spins for three adjacent diamonds.
pub const DIAMOND_TRIPLE_FREE_SPINS: u32 = 5;
/// Free spins for two adjacent diamonds.
pub const DIAMOND_PAIR_FREE_SPINS: u32 = 1;

/// The stake every payout table is quoted against.
pub const BASE_STAKE: u64 = 10;

impl Symbol {
    /// Every symbol that generation can produce.
    pub const DRAWABLE: [Symbol; 8] = [
        Symbol::Cherry,
        Symbol::Lemon,
        Symbol::Orange,
        Symbol::Grape,
        Symbol::Bell,
        Symbol::Star,
        Symbol::Diamond,
        Symbol::Badger,
    ];

    pub fn emoji(&self) -> &'static str {
        match self {
            Symbol::Cherry => "🍒",
            Symbol::Lemon => "🍋",
            Symbol::Orange => "🍊",
            Symbol::Grape => "🍇",
            Symbol::Bell => "🔔",
            Symbol::Star => "⭐",
            Symbol::Diamond => "💎",
            Symbol::Badger => "🦡",
            Symbol::Wild => "🃏",
        }
    }

    /// Parse from emoji or lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        [
            Symbol::Cherry,
            Symbol::Lemon,
            Symbol::Orange,
            Symbol::Grape,
            Symbol::Bell,
            Symbol::Star,
            Symbol::Diamond,
            Symbol::Badger,
            Symbol::Wild,
        ]
        .into_iter()
        .find(|sym| sym.emoji() == s || sym.name() == s.to_lowercase())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Symbol::Cherry => "cherry",
            Symbol::Lemon => "lemon",
            Symbol::Orange => "orange",
            Symbol::Grape => "grape",
            Symbol::Bell => "bell",
            Symbol::Star => "star",
            Symbol::Diamond => "diamond",
            Symbol::Badger => "badger",
            Symbol::Wild => "wild",
        }
    }

    pub fn is_rare(&self) -> bool {
        matches!(self, Symbol::Badger)
    }

    pub fn is_wild(&self) -> bool {
        matches!(self, Symbol::Wild)
    }

    pub fn is_free_spin(&self) -> bool {
        matches!(self, Symbol::Diamond)
    }

    /// Three-of-a-kind payout at the base stake. Zero for symbols that pay
    /// through another rule.
    pub fn triple_payout(&self) -> u64 {
        match self {
            Symbol::Cherry => 30,
            Symbol::Lemon => 40,
            Symbol::Orange => 60,
            Symbol::Grape => 100,
            Symbol::Bell => 200,
            Symbol::Star => 500,
            Symbol::Diamond | Symbol::Badger | Symbol::Wild => 0,
        }
    }

    /// Adjacent-pair payout at the base stake.
    pub fn pair_payout(&self) -> u64 {
        match self {
            Symbol::Cherry => 15,
            Symbol::Lemon => 20,
            Symbol::Orange => 30,
            Symbol::Grape => 50,
            Symbol::Bell => 100,
            Symbol::Star => 250,
            Symbol::Diamond | Symbol::Badger | Symbol::Wild => 0,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}
