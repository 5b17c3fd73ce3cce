//! Payout multiplier pipeline.
//!
//! The raw resolver payout passes through [`PIPELINE_ORDER`] one step at a
//! time. Every step is skipped while the running payout is zero and every
//! fractional result is floored, so exact payouts are reproducible.

use crate::types::{
    FreeSpinEntry, Symbol, WinResult, GOLDEN_HOUR_PERCENT, HIGH_ROLLER_THRESHOLD,
};
use serde::Serialize;

/// One transformation of the running payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStep {
    /// x stake multiplier.
    StakeMultiplier,
    /// x2, consumes the win-multiplier token.
    WinMultiplierToken,
    /// x2 for the first held boost matching a winning symbol; consumes it.
    SymbolBoost,
    /// +30% while golden hour is active, floored.
    PercentageBuff,
    /// +stack% from momentum, floored; the stack is spent.
    MomentumStack,
    /// x2 when the payout exceeds the high-roller threshold.
    HighRoller,
    /// x streak multiplier, floored.
    StreakMultiplier,
}

pub const PIPELINE_ORDER: [PayoutStep; 7] = [
    PayoutStep::StakeMultiplier,
    PayoutStep::WinMultiplierToken,
    PayoutStep::SymbolBoost,
    PayoutStep::PercentageBuff,
    PayoutStep::MomentumStack,
    PayoutStep::HighRoller,
    PayoutStep::StreakMultiplier,
];

/// Everything the pipeline reads. Built from state fetched before the spin.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInput {
    pub stake_multiplier: u64,
    pub win_multiplier_token: bool,
    /// Symbols with an active boost.
    pub symbol_boosts: Vec<Symbol>,
    pub golden_hour: bool,
    pub momentum_stack: u32,
    pub high_roller: bool,
    pub streak_multiplier: f64,
}

impl Default for PipelineInput {
    fn default() -> Self {
        Self {
            stake_multiplier: 1,
            win_multiplier_token: false,
            symbol_boosts: Vec::new(),
            golden_hour: false,
            momentum_stack: 0,
            high_roller: false,
            streak_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepTrace {
    pub step: PayoutStep,
    pub before: u64,
    pub after: u64,
}

/// Final payout plus what the pipeline used up.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub points: u64,
    pub free_spin_award: Option<FreeSpinEntry>,
    pub used_win_multiplier: bool,
    pub used_symbol_boost: Option<Symbol>,
    pub used_momentum: bool,
    pub trace: Vec<StepTrace>,
}

fn add_percent(value: u64, percent: u64) -> u64 {
    value.saturating_mul(100 + percent) / 100
}

/// Multiply by a decimal factor using hundredths, floored.
fn scale(value: u64, factor: f64) -> u64 {
    let hundredths = (factor * 100.0).round().max(0.0) as u64;
    value.saturating_mul(hundredths) / 100
}

impl PayoutStep {
    fn apply(&self, value: u64, win: &WinResult, input: &PipelineInput, out: &mut PipelineOutput) -> u64 {
        match self {
            PayoutStep::StakeMultiplier => value.saturating_mul(input.stake_multiplier.max(1)),
            PayoutStep::WinMultiplierToken => {
                if input.win_multiplier_token {
                    out.used_win_multiplier = true;
                    value.saturating_mul(2)
                } else {
                    value
                }
            }
            PayoutStep::SymbolBoost => {
                let hit = win
                    .winning_symbols
                    .iter()
                    .find(|s| input.symbol_boosts.contains(s));
                match hit {
                    Some(sym) => {
                        out.used_symbol_boost = Some(*sym);
                        value.saturating_mul(2)
                    }
                    None => value,
                }
            }
            PayoutStep::PercentageBuff => {
                if input.golden_hour {
                    add_percent(value, GOLDEN_HOUR_PERCENT)
                } else {
                    value
                }
            }
            PayoutStep::MomentumStack => {
                if input.momentum_stack > 0 {
                    out.used_momentum = true;
                    add_percent(value, input.momentum_stack as u64)
                } else {
                    value
                }
            }
            PayoutStep::HighRoller => {
                if input.high_roller && value > HIGH_ROLLER_THRESHOLD {
                    value.saturating_mul(2)
                } else {
                    value
                }
            }
            PayoutStep::StreakMultiplier => scale(value, input.streak_multiplier),
        }
    }
}

/// Run the pipeline over a resolver result.
pub fn run(win: &WinResult, input: &PipelineInput) -> PipelineOutput {
    let mut out = PipelineOutput {
        points: 0,
        free_spin_award: None,
        used_win_multiplier: false,
        used_symbol_boost: None,
        used_momentum: false,
        trace: Vec::with_capacity(PIPELINE_ORDER.len()),
    };

    // Free spins keep the raw count and carry the stake multiplier.
    if win.free_spins > 0 {
        out.free_spin_award = Some(FreeSpinEntry {
            multiplier: input.stake_multiplier.max(1),
            count: win.free_spins,
        });
    }

    let mut value = win.points;
    for step in PIPELINE_ORDER {
        if value == 0 {
            break;
        }
        let after = step.apply(value, win, input, &mut out);
        out.trace.push(StepTrace {
            step,
            before: value,
            after,
        });
        value = after;
    }
    out.points = value;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WinKind;

    fn win(points: u64, symbols: &[Symbol]) -> WinResult {
        WinResult {
            kind: WinKind::Pair(Symbol::Cherry),
            points,
            free_spins: 0,
            winning_symbols: symbols.to_vec(),
            flavor: None,
        }
    }

    #[test]
    fn test_plain_payout_passes_through() {
        let out = run(&win(30, &[Symbol::Orange]), &PipelineInput::default());
        assert_eq!(out.points, 30);
        assert!(!out.used_win_multiplier);
        assert_eq!(out.trace.len(), PIPELINE_ORDER.len());
    }

    #[test]
    fn test_full_chain_exact_value() {
        let input = PipelineInput {
            stake_multiplier: 2,
            win_multiplier_token: true,
            symbol_boosts: vec![Symbol::Bell],
            golden_hour: true,
            momentum_stack: 15,
            high_roller: true,
            streak_multiplier: 1.3,
        };
        let out = run(&win(15, &[Symbol::Bell]), &input);
        // 15 x2=30 x2=60 x2=120 +30%=156 +15%=179 (>200? no) x1.3=232
        let steps: Vec<u64> = out.trace.iter().map(|t| t.after).collect();
        assert_eq!(steps, vec![30, 60, 120, 156, 179, 179, 232]);
        assert_eq!(out.points, 232);
        assert!(out.used_win_multiplier);
        assert_eq!(out.used_symbol_boost, Some(Symbol::Bell));
        assert!(out.used_momentum);
    }

    #[test]
    fn test_high_roller_gate() {
        let input = PipelineInput {
            high_roller: true,
            ..Default::default()
        };
        assert_eq!(run(&win(200, &[]), &input).points, 200);
        assert_eq!(run(&win(201, &[]), &input).points, 402);
    }

    #[test]
    fn test_zero_payout_consumes_nothing() {
        let input = PipelineInput {
            win_multiplier_token: true,
            symbol_boosts: vec![Symbol::Cherry],
            momentum_stack: 20,
            ..Default::default()
        };
        let out = run(&win(0, &[Symbol::Cherry]), &input);
        assert_eq!(out.points, 0);
        assert!(!out.used_win_multiplier);
        assert_eq!(out.used_symbol_boost, None);
        assert!(!out.used_momentum);
        assert!(out.trace.is_empty());
    }

    #[test]
    fn test_boost_needs_matching_symbol() {
        let input = PipelineInput {
            symbol_boosts: vec![Symbol::Star],
            ..Default::default()
        };
        let out = run(&win(40, &[Symbol::Lemon]), &input);
        assert_eq!(out.points, 40);
        assert_eq!(out.used_symbol_boost, None);
    }

    #[test]
    fn test_free_spins_tagged_with_stake_multiplier() {
        let mut result = win(0, &[Symbol::Diamond]);
        result.free_spins = 5;
        let input = PipelineInput {
            stake_multiplier: 10,
            ..Default::default()
        };
        let out = run(&result, &input);
        assert_eq!(
            out.free_spin_award,
            Some(FreeSpinEntry {
                multiplier: 10,
                count: 5
            })
        );
    }

    #[test]
    fn test_percent_steps_floor() {
        assert_eq!(add_percent(7, 30), 9);
        assert_eq!(scale(7, 1.1), 7);
        assert_eq!(scale(100, 1.1), 110);
        assert_eq!(scale(u64::MAX, 3.0), u64::MAX / 100);
    }
}
