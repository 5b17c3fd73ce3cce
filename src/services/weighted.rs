use crate::types::{Symbol, ORDINARY_WEIGHTS};
use rand::Rng;

/// Draws symbols with probability weight / total.
///
/// Cumulative weights are computed once; a draw is a single uniform value in
/// `[0, total)` located by binary search.
#[derive(Debug, Clone)]
pub struct WeightedTable {
    symbols: Vec<Symbol>,
    cumulative: Vec<u32>,
    total: u32,
}

impl WeightedTable {
    /// Build from (symbol, weight) pairs. Zero weights are skipped.
    ///
    /// Returns `None` when nothing has weight.
    pub fn new(entries: &[(Symbol, u32)]) -> Option<Self> {
        let mut symbols = Vec::with_capacity(entries.len());
        let mut cumulative = Vec::with_capacity(entries.len());
        let mut total = 0u32;
        for &(symbol, weight) in entries {
            if weight == 0 {
                continue;
            }
            total = total.checked_add(weight)?;
            symbols.push(symbol);
            cumulative.push(total);
        }
        if total == 0 {
            return None;
        }
        Some(Self {
            symbols,
            cumulative,
            total,
        })
    }

    /// The standard ordinary-symbol table.
    pub fn ordinary() -> Self {
        Self {
            symbols: ORDINARY_WEIGHTS.iter().map(|(s, _)| *s).collect(),
            cumulative: ORDINARY_WEIGHTS
                .iter()
                .scan(0u32, |acc, (_, w)| {
                    *acc += w;
                    Some(*acc)
                })
                .collect(),
            total: ORDINARY_WEIGHTS.iter().map(|(_, w)| w).sum(),
        }
    }

    /// Ordinary symbols that can form a paying pair (no diamond).
    pub fn pair_fillers() -> Self {
        let entries: Vec<(Symbol, u32)> = ORDINARY_WEIGHTS
            .iter()
            .copied()
            .filter(|(s, _)| s.pair_payout() > 0)
            .collect();
        Self::new(&entries).unwrap_or_else(Self::ordinary)
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Symbol owning the cumulative slot `roll` in `[0, total)`.
    pub fn locate(&self, roll: u32) -> Symbol {
        let idx = self.cumulative.partition_point(|&c| c <= roll);
        self.symbols[idx.min(self.symbols.len() - 1)]
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Symbol {
        self.locate(rng.gen_range(0..self.total))
    }
}

impl Default for WeightedTable {
    fn default() -> Self {
        Self::ordinary()
    }
}
