use crate::error::GameError;
use crate::types::{Stake, BASE_STAKE};

/// Accepted fixed stakes.
pub const STAKE_OPTIONS: [u64; 4] = [10, 20, 50, 100];
/// Most an `all` spin can stake.
pub const ALL_IN_CAP: u64 = 1_000;

/// What the player asked to stake, before the balance is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeRequest {
    Fixed(u64),
    AllIn,
    Free,
}

impl StakeRequest {
    /// Parse the amount text. Empty means the base stake.
    pub fn parse(text: &str) -> Result<Self, GameError> {
        let text = text.trim().to_lowercase();
        match text.as_str() {
            "" => Ok(StakeRequest::Fixed(BASE_STAKE)),
            "all" | "max" => Ok(StakeRequest::AllIn),
            "free" => Ok(StakeRequest::Free),
            other => other
                .parse::<u64>()
                .ok()
                .filter(|n| STAKE_OPTIONS.contains(n))
                .map(StakeRequest::Fixed)
                .ok_or_else(|| {
                    GameError::InvalidStake(format!(
                        "'{}' (use 10, 20, 50, 100, all or free)",
                        other
                    ))
                }),
        }
    }

    /// Resolve a paid stake against the current balance.
    pub fn resolve_paid(&self, balance: u64) -> Result<Stake, GameError> {
        let cost = match self {
            StakeRequest::Fixed(cost) => *cost,
            StakeRequest::AllIn => {
                let cost = balance.min(ALL_IN_CAP) / BASE_STAKE * BASE_STAKE;
                if cost == 0 {
                    return Err(GameError::InsufficientFunds {
                        needed: BASE_STAKE,
                        available: balance,
                    });
                }
                cost
            }
            StakeRequest::Free => {
                return Err(GameError::InvalidStake("free spins are not paid".into()))
            }
        };
        if balance < cost {
            return Err(GameError::InsufficientFunds {
                needed: cost,
                available: balance,
            });
        }
        Ok(Stake {
            spin_cost: cost,
            multiplier: cost / BASE_STAKE,
            free_spin: false,
        })
    }
}

/// Stake for a consumed free spin.
pub fn free_stake(multiplier: u64) -> Stake {
    Stake {
        spin_cost: 0,
        multiplier: multiplier.max(1),
        free_spin: true,
    }
}
