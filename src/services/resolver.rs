//! Maps a grid to a raw payout and free-spin award.
//!
//! Matches are read from the processed grid (wilds substituted). Rare and
//! diamond counting also consults the original grid so that tokens can
//! neither build the rare triple nor manufacture free spins.

use crate::types::{
    Grid, Symbol, WinKind, WinResult, DIAMOND_PAIR_FREE_SPINS, DIAMOND_TRIPLE_FREE_SPINS,
    RARE_PAIR_PAYOUT, RARE_SINGLE_PAYOUT, RARE_TRIPLE_PAYOUT,
};
use rand::seq::SliceRandom;
use rand::Rng;

/// Shown on a miss. Display only.
pub const MISS_FLAVOR: [&str; 8] = [
    "So close!",
    "The reels are warming up...",
    "Not this time.",
    "The badger is watching.",
    "Maybe next spin!",
    "Nothing but air.",
    "The machine hums quietly.",
    "Almost had it!",
];

/// Number of rare symbols the grid pays for.
///
/// Wilds count toward the rare symbol only when one is already showing, and
/// never lift the count to three unless the original grid was a rare triple.
pub fn rare_count(original: &Grid, processed: &Grid) -> usize {
    let showing = processed.rare_count();
    if showing == 0 {
        return 0;
    }
    let cap = if original.rare_count() >= 3 { 3 } else { 2 };
    (showing + processed.wild_count()).min(cap)
}

/// Free spins earned by adjacent diamonds on the original grid.
pub fn diamond_free_spins(original: &Grid) -> u32 {
    match original.adjacent_run(Symbol::Diamond) {
        3 => DIAMOND_TRIPLE_FREE_SPINS,
        2 => DIAMOND_PAIR_FREE_SPINS,
        _ => 0,
    }
}

/// Symbol a single wild pairs with when the two real symbols differ: the one
/// with the higher pair payout, the first one on a tie.
pub fn best_pair_partner(a: Symbol, b: Symbol) -> Symbol {
    if b.pair_payout() > a.pair_payout() {
        b
    } else {
        a
    }
}

/// Resolve the match on a processed grid, wild substitution included.
pub fn resolve_match(processed: &Grid) -> Option<WinKind> {
    let reals: Vec<Symbol> = processed
        .cells()
        .iter()
        .copied()
        .filter(|s| !s.is_wild())
        .collect();

    let kind = match reals.as_slice() {
        [] => WinKind::Triple(Symbol::Star),
        [only] => WinKind::Triple(*only),
        [a, b] if a == b => WinKind::Triple(*a),
        [a, b] => WinKind::Pair(best_pair_partner(*a, *b)),
        _ => {
            if processed.is_triple() {
                WinKind::Triple(processed.cells()[0])
            } else {
                WinKind::Pair(processed.adjacent_pair()?)
            }
        }
    };

    let pays = match kind {
        WinKind::Triple(s) => s.triple_payout() > 0,
        WinKind::Pair(s) => s.pair_payout() > 0,
        _ => false,
    };
    pays.then_some(kind)
}

/// Resolve a spin. `original` is the generated grid, `processed` the grid
/// after special items.
pub fn resolve<R: Rng + ?Sized>(original: &Grid, processed: &Grid, rng: &mut R) -> WinResult {
    let free_spins = diamond_free_spins(original);

    let rare = rare_count(original, processed);
    if rare > 0 {
        let (kind, points) = match rare {
            3 => (WinKind::RareTriple, RARE_TRIPLE_PAYOUT),
            2 => (WinKind::RarePair, RARE_PAIR_PAYOUT),
            _ => (WinKind::RareSingle, RARE_SINGLE_PAYOUT),
        };
        let mut winning_symbols = vec![Symbol::Badger];
        if free_spins > 0 {
            winning_symbols.push(Symbol::Diamond);
        }
        return WinResult {
            kind,
            points,
            free_spins,
            winning_symbols,
            flavor: None,
        };
    }

    if free_spins > 0 {
        return WinResult {
            kind: WinKind::FreeSpins,
            points: 0,
            free_spins,
            winning_symbols: vec![Symbol::Diamond],
            flavor: None,
        };
    }

    match resolve_match(processed) {
        Some(WinKind::Triple(s)) => WinResult {
            kind: WinKind::Triple(s),
            points: s.triple_payout(),
            free_spins: 0,
            winning_symbols: vec![s],
            flavor: None,
        },
        Some(WinKind::Pair(s)) => WinResult {
            kind: WinKind::Pair(s),
            points: s.pair_payout(),
            free_spins: 0,
            winning_symbols: vec![s],
            flavor: None,
        },
        _ => WinResult {
            kind: WinKind::NoMatch,
            points: 0,
            free_spins: 0,
            winning_symbols: Vec::new(),
            flavor: MISS_FLAVOR.choose(rng).copied(),
        },
    }
}
