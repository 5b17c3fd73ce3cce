use crate::services::WeightedTable;
use crate::types::{ActiveBuff, Grid, RerollBias, Symbol};
use rand::Rng;

/// Probability modifiers derived from active buffs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridModifiers {
    /// Factors applied one after another to the rare probability.
    pub rare_multipliers: Vec<f64>,
    /// Per-cell re-roll filters, tried in order.
    pub rerolls: Vec<RerollBias>,
}

impl GridModifiers {
    pub fn from_buffs(buffs: &[ActiveBuff]) -> Self {
        let mut mods = Self::default();
        for buff in buffs {
            if let Some(m) = buff.kind.rare_multiplier() {
                mods.rare_multipliers.push(m);
            }
            if let Some(bias) = buff.kind.reroll_bias() {
                mods.rerolls.push(bias);
            }
        }
        mods
    }

    /// Rare probability after every multiplier, clamped to [0, 1].
    pub fn rare_probability(&self, base: f64) -> f64 {
        probability(self.rare_multipliers.iter().fold(base, |p, m| p * m))
    }
}

/// Clamp to [0, 1]. NaN reads as 0 so `gen_bool` never sees it.
fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Produces three-cell spin outcomes.
#[derive(Debug, Clone)]
pub struct GridGenerator {
    base_rare_probability: f64,
    table: WeightedTable,
}

impl GridGenerator {
    pub fn new(base_rare_probability: f64) -> Self {
        Self {
            base_rare_probability: probability(base_rare_probability),
            table: WeightedTable::ordinary(),
        }
    }

    pub fn base_rare_probability(&self) -> f64 {
        self.base_rare_probability
    }

    /// Return a stored preview verbatim, otherwise generate a fresh grid.
    pub fn spin<R: Rng + ?Sized>(
        &self,
        preview: Option<Grid>,
        mods: &GridModifiers,
        rng: &mut R,
    ) -> Grid {
        match preview {
            Some(grid) => grid,
            None => self.generate(mods, rng),
        }
    }

    pub fn generate<R: Rng + ?Sized>(&self, mods: &GridModifiers, rng: &mut R) -> Grid {
        let rare_p = mods.rare_probability(self.base_rare_probability);
        Grid([
            self.draw_cell(rare_p, &mods.rerolls, rng),
            self.draw_cell(rare_p, &mods.rerolls, rng),
            self.draw_cell(rare_p, &mods.rerolls, rng),
        ])
    }

    fn draw_cell<R: Rng + ?Sized>(&self, rare_p: f64, rerolls: &[RerollBias], rng: &mut R) -> Symbol {
        if rng.gen_bool(rare_p) {
            // A rare hit is final; re-rolls only touch ordinary cells.
            return Symbol::Badger;
        }
        let drawn = self.table.draw(rng);
        for bias in rerolls {
            if rng.gen_bool(probability(bias.reroll_chance))
                && rng.gen_bool(probability(bias.land_chance))
            {
                return bias.target;
            }
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuffKind, BuffRecord};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn buff(kind: BuffKind) -> ActiveBuff {
        ActiveBuff {
            kind,
            record: BuffRecord::timed(i64::MAX),
        }
    }

    #[test]
    fn test_grid_always_three_drawable_cells() {
        let generator = GridGenerator::new(1.0 / 150.0);
        let combos = [
            vec![],
            vec![buff(BuffKind::LuckyCharm)],
            vec![buff(BuffKind::LuckyCharm), buff(BuffKind::Clover)],
            vec![buff(BuffKind::StarMagnet), buff(BuffKind::BadgerBait)],
            BuffKind::SPIN_KINDS.iter().map(|k| buff(*k)).collect(),
        ];
        let mut rng = StdRng::seed_from_u64(42);
        for buffs in &combos {
            let mods = GridModifiers::from_buffs(buffs);
            for _ in 0..2_000 {
                let grid = generator.generate(&mods, &mut rng);
                assert_eq!(grid.cells().len(), 3);
                assert!(grid.cells().iter().all(|s| Symbol::DRAWABLE.contains(s)));
            }
        }
    }

    #[test]
    fn test_rare_multipliers_compose() {
        let mods = GridModifiers::from_buffs(&[buff(BuffKind::LuckyCharm), buff(BuffKind::Clover)]);
        let p = mods.rare_probability(1.0 / 150.0);
        assert!((p - 6.0 / 150.0).abs() < 1e-12);

        let huge = GridModifiers {
            rare_multipliers: vec![1_000.0],
            rerolls: vec![],
        };
        assert_eq!(huge.rare_probability(0.5), 1.0);
    }

    #[test]
    fn test_nan_probabilities_never_draw() {
        let generator = GridGenerator::new(f64::NAN);
        assert_eq!(generator.base_rare_probability(), 0.0);

        let mods = GridModifiers {
            rare_multipliers: vec![f64::INFINITY, 0.0],
            rerolls: vec![RerollBias {
                reroll_chance: f64::NAN,
                land_chance: 1.0,
                target: Symbol::Star,
            }],
        };
        assert_eq!(mods.rare_probability(0.5), 0.0);
        assert_eq!(GridModifiers::default().rare_probability(f64::INFINITY), 1.0);

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let grid = generator.generate(&mods, &mut rng);
            assert_eq!(grid.count(Symbol::Badger), 0);
        }
    }

    #[test]
    fn test_certain_rare_is_never_rerolled() {
        let generator = GridGenerator::new(1.0);
        let mods = GridModifiers {
            rare_multipliers: vec![],
            rerolls: vec![RerollBias {
                reroll_chance: 1.0,
                land_chance: 1.0,
                target: Symbol::Star,
            }],
        };
        let mut rng = StdRng::seed_from_u64(1);
        let grid = generator.generate(&mods, &mut rng);
        assert_eq!(grid, Grid::new(Symbol::Badger, Symbol::Badger, Symbol::Badger));
    }

    #[test]
    fn test_certain_reroll_lands_on_target() {
        let generator = GridGenerator::new(0.0);
        let mods = GridModifiers {
            rare_multipliers: vec![],
            rerolls: vec![RerollBias {
                reroll_chance: 1.0,
                land_chance: 1.0,
                target: Symbol::Star,
            }],
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            generator.generate(&mods, &mut rng),
            Grid::new(Symbol::Star, Symbol::Star, Symbol::Star)
        );
    }

    #[test]
    fn test_preview_returned_verbatim() {
        let generator = GridGenerator::new(1.0);
        let preview = Grid::new(Symbol::Cherry, Symbol::Lemon, Symbol::Diamond);
        let mut rng = StdRng::seed_from_u64(9);
        let grid = generator.spin(Some(preview), &GridModifiers::default(), &mut rng);
        assert_eq!(grid, preview);
    }

    #[test]
    fn test_star_magnet_raises_star_frequency() {
        let generator = GridGenerator::new(0.0);
        let mut rng = StdRng::seed_from_u64(11);
        let plain = GridModifiers::default();
        let magnet = GridModifiers::from_buffs(&[buff(BuffKind::StarMagnet)]);

        let count_stars = |mods: &GridModifiers, rng: &mut StdRng| {
            (0..5_000)
                .map(|_| generator.generate(mods, rng).count(Symbol::Star))
                .sum::<usize>()
        };
        let base = count_stars(&plain, &mut rng);
        let boosted = count_stars(&magnet, &mut rng);
        // Base ~4% per cell; with the magnet ~13%.
        assert!(boosted > base * 2, "base {} boosted {}", base, boosted);
    }
}
