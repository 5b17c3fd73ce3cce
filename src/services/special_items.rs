use crate::services::WeightedTable;
use crate::types::{Grid, Symbol};
use rand::Rng;

/// Grid after one token, and whether the token was used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub grid: Grid,
    pub consumed: bool,
}

impl Applied {
    fn untouched(grid: Grid) -> Self {
        Self {
            grid,
            consumed: false,
        }
    }
}

/// Force a pair on cells 0 and 1 when the grid has none.
///
/// A grid that already shows an adjacent pair (or triple) is returned as is
/// and the token stays with the player.
pub fn apply_guaranteed_pair<R: Rng + ?Sized>(grid: Grid, rng: &mut R) -> Applied {
    if grid.has_adjacent_pair() {
        return Applied::untouched(grid);
    }
    let filler = WeightedTable::pair_fillers().draw(rng);
    let mut cells = *grid.cells();
    cells[0] = filler;
    cells[1] = filler;
    Applied {
        grid: Grid(cells),
        consumed: true,
    }
}

fn pays_as_pair(symbol: Symbol) -> bool {
    !symbol.is_rare() && !symbol.is_wild() && symbol.pair_payout() > 0
}

/// Insert one wild where it does the most good.
///
/// - two or more rare symbols, any triple, or a free-spin award: untouched
/// - exactly one rare symbol: the weakest other cell becomes wild, which
///   pays as a rare pair
/// - a non-rare pair (adjacent or split): the third cell becomes wild
/// - otherwise: the best paying symbol gets a wild next to it, replacing the
///   weaker neighbour
///
/// The rare symbol is never replaced. The token is consumed only if a cell
/// changed.
pub fn apply_wild_card(grid: Grid) -> Applied {
    let cells = *grid.cells();
    if grid.rare_count() >= 2 || grid.is_triple() || grid.wild_count() > 0 {
        return Applied::untouched(grid);
    }
    if grid.rare_count() == 1 {
        // Any wild alongside a showing rare outpays an ordinary match.
        let weakest = (0..3)
            .filter(|&i| !cells[i].is_rare())
            .min_by_key(|&i| (cells[i].pair_payout(), i));
        return match weakest {
            Some(pos) => with_wild(cells, pos),
            None => Applied::untouched(grid),
        };
    }
    // Free spins outrank matches, so a wild could not improve this grid.
    if grid.adjacent_run(Symbol::Diamond) >= 2 {
        return Applied::untouched(grid);
    }

    const PAIRS: [(usize, usize, usize); 3] = [(0, 1, 2), (1, 2, 0), (0, 2, 1)];
    for (i, j, k) in PAIRS {
        if cells[i] == cells[j] && pays_as_pair(cells[i]) {
            return with_wild(cells, k);
        }
    }

    // Best symbol first; ties keep grid order.
    let mut ranked: Vec<usize> = (0..3).filter(|&i| pays_as_pair(cells[i])).collect();
    ranked.sort_by(|&a, &b| cells[b].pair_payout().cmp(&cells[a].pair_payout()));

    for pos in ranked {
        let neighbour = [pos.checked_sub(1), (pos + 1 < 3).then_some(pos + 1)]
            .into_iter()
            .flatten()
            .min_by_key(|&n| (cells[n].pair_payout(), n));
        if let Some(n) = neighbour {
            return with_wild(cells, n);
        }
    }

    Applied::untouched(grid)
}

fn with_wild(mut cells: [Symbol; 3], pos: usize) -> Applied {
    cells[pos] = Symbol::Wild;
    Applied {
        grid: Grid(cells),
        consumed: true,
    }
}
