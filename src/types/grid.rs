use crate::types::Symbol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One payline of three cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid(pub [Symbol; 3]);

impl Grid {
    pub fn new(a: Symbol, b: Symbol, c: Symbol) -> Self {
        Self([a, b, c])
    }

    pub fn cells(&self) -> &[Symbol; 3] {
        &self.0
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        self.0.iter().filter(|s| **s == symbol).count()
    }

    pub fn rare_count(&self) -> usize {
        self.0.iter().filter(|s| s.is_rare()).count()
    }

    pub fn wild_count(&self) -> usize {
        self.0.iter().filter(|s| s.is_wild()).count()
    }

    pub fn is_triple(&self) -> bool {
        self.0[0] == self.0[1] && self.0[1] == self.0[2]
    }

    /// Symbol of the first adjacent pair, at (0,1) then (1,2). (0,2) alone
    /// does not count.
    pub fn adjacent_pair(&self) -> Option<Symbol> {
        if self.0[0] == self.0[1] {
            Some(self.0[0])
        } else if self.0[1] == self.0[2] {
            Some(self.0[1])
        } else {
            None
        }
    }

    pub fn has_adjacent_pair(&self) -> bool {
        self.adjacent_pair().is_some()
    }

    /// Length of the longest run of adjacent `symbol` cells.
    pub fn adjacent_run(&self, symbol: Symbol) -> usize {
        let mut best = 0;
        let mut run = 0;
        for cell in self.0 {
            if cell == symbol {
                run += 1;
                best = best.max(run);
            } else {
                run = 0;
            }
        }
        best
    }

    pub fn display(&self) -> String {
        format!("[ {} | {} | {} ]", self.0[0], self.0[1], self.0[2])
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}
