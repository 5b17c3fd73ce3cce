//! Chat reply text.

use crate::types::{FreeSpinQueue, SpinSummary, StreakRecord, WinKind};
use rand::seq::SliceRandom;
use rand::Rng;

/// Appended to every reply so the chat platform does not suppress repeats.
pub const DECORATIONS: [&str; 12] = [
    "✨", "🎰", "🍀", "💫", "🎲", "🌟", "🔥", "🎉", "🪙", "🌈", "⚡", "🎯",
];

pub fn decorate<R: Rng + ?Sized>(line: &str, rng: &mut R) -> String {
    let emoji = DECORATIONS.choose(rng).copied().unwrap_or("🎰");
    format!("{} {}", line, emoji)
}

fn outcome_text(summary: &SpinSummary) -> String {
    let payout = summary.payout;
    match summary.win.kind {
        WinKind::RareTriple => format!("🦡🦡🦡 BADGER JACKPOT! +{}", payout),
        WinKind::RarePair => format!("Double badger! +{}", payout),
        WinKind::RareSingle => format!("A badger appears! +{}", payout),
        WinKind::FreeSpins => format!("Diamonds! +{} free spins", summary.free_spins_awarded),
        WinKind::Triple(s) => format!("Triple {}! +{}", s.emoji(), payout),
        WinKind::Pair(s) => format!("Pair of {}! +{}", s.emoji(), payout),
        WinKind::NoMatch => summary.win.flavor.unwrap_or("No match.").to_string(),
    }
}

/// One-line result of a spin.
pub fn spin_line(player: &str, summary: &SpinSummary) -> String {
    let mut parts = Vec::new();

    let grid = if summary.original_grid != summary.final_grid {
        format!("{} → {}", summary.original_grid, summary.final_grid)
    } else {
        summary.final_grid.to_string()
    };
    let stake = if summary.stake.free_spin {
        format!("free spin x{}", summary.stake.multiplier)
    } else {
        format!("bet {}", summary.stake.spin_cost)
    };
    parts.push(format!("@{} {} ({})", player, grid, stake));
    parts.push(outcome_text(summary));

    if summary.free_spins_awarded > 0 && summary.win.kind != WinKind::FreeSpins {
        parts.push(format!("+{} free spins", summary.free_spins_awarded));
    }
    for (label, amount) in &summary.bonuses {
        parts.push(format!("{} +{}", label, amount));
    }
    if summary.insurance_refund > 0 {
        parts.push(format!("Insurance refunded {}", summary.insurance_refund));
    }
    parts.extend(summary.messages.iter().cloned());
    parts.push(format!("Balance: {}", summary.new_balance));

    parts.join(" • ")
}

pub fn balance_line(player: &str, balance: u64) -> String {
    format!("@{} has {} coins", player, balance)
}

pub fn free_spins_line(player: &str, queue: &FreeSpinQueue) -> String {
    if queue.is_empty() {
        format!("@{} has no free spins", player)
    } else {
        format!(
            "@{} has {} free spins ({})",
            player,
            queue.total(),
            queue.describe()
        )
    }
}

pub fn streak_line(player: &str, streak: &StreakRecord) -> String {
    let run = if streak.wins > 0 {
        format!("{} wins in a row", streak.wins)
    } else if streak.losses > 0 {
        format!("{} losses in a row", streak.losses)
    } else {
        "no streak".to_string()
    };
    format!("@{}: {} • multiplier x{:.1}", player, run, streak.multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Grid, Stake, Symbol, WinResult};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn summary(kind: WinKind, payout: u64) -> SpinSummary {
        let grid = Grid::new(Symbol::Cherry, Symbol::Cherry, Symbol::Lemon);
        SpinSummary {
            original_grid: grid,
            final_grid: grid,
            win: WinResult {
                kind,
                points: payout,
                free_spins: 0,
                winning_symbols: vec![],
                flavor: None,
            },
            stake: Stake {
                spin_cost: 10,
                multiplier: 1,
                free_spin: false,
            },
            payout,
            bonuses: vec![("Combo".into(), 5)],
            insurance_refund: 0,
            free_spins_awarded: 0,
            new_balance: 110,
            messages: vec![],
        }
    }

    #[test]
    fn test_decorate_appends_emoji() {
        let mut rng = StdRng::seed_from_u64(1);
        let line = decorate("hello", &mut rng);
        assert!(line.starts_with("hello "));
        assert!(DECORATIONS.iter().any(|d| line.ends_with(d)));
    }

    #[test]
    fn test_spin_line_contents() {
        let line = spin_line("ann", &summary(WinKind::Pair(Symbol::Cherry), 15));
        assert!(line.starts_with("@ann "));
        assert!(line.contains("Pair of 🍒! +15"));
        assert!(line.contains("Combo +5"));
        assert!(line.ends_with("Balance: 110"));
    }

    #[test]
    fn test_changed_grid_shows_both() {
        let mut s = summary(WinKind::Triple(Symbol::Cherry), 30);
        s.final_grid = Grid::new(Symbol::Cherry, Symbol::Cherry, Symbol::Wild);
        let line = spin_line("ann", &s);
        assert!(line.contains("→"));
    }

    #[test]
    fn test_free_spins_line() {
        let mut queue = FreeSpinQueue::new(i64::MAX);
        assert!(free_spins_line("p", &queue).contains("no free spins"));
        queue.add(2, 3);
        assert_eq!(free_spins_line("p", &queue), "@p has 3 free spins (3x2)");
    }
}
