//! Weighted rarity draw.
//!
//! One draw is two uniform rolls: the first picks a tier through the
//! cumulative weights of a [`RarityTable`], the second picks a member of
//! that tier uniformly from the [`Catalog`]. The draw is pure; persisting
//! the result is the caller's job.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    catalog::{Catalog, CatalogEntry},
    rarity::{Rarity, RarityTable},
};

/// Static configuration problems detected while drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DrawError {
    /// The selected tier has weight but no catalog members.
    #[error("rarity `{rarity}` was drawn but has no catalog entries")]
    EmptyBucket {
        /// Tier that came up empty.
        rarity: Rarity,
    },
}

/// Borrowed view over a table and catalog that performs draws.
#[derive(Debug, Clone, Copy)]
pub struct Roulette<'a> {
    table: &'a RarityTable,
    catalog: &'a Catalog,
}

impl<'a> Roulette<'a> {
    /// Pair a table with the catalog it draws from.
    pub fn new(table: &'a RarityTable, catalog: &'a Catalog) -> Self {
        Self { table, catalog }
    }

    /// Table the roulette draws tiers from.
    pub fn table(&self) -> &'a RarityTable {
        self.table
    }

    /// Catalog the roulette draws entries from.
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Perform one draw using two rolls from `rng`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&'a CatalogEntry, DrawError> {
        let rarity_roll: f64 = rng.random();
        let rarity = self.table.select(rarity_roll);
        let pick_roll: f64 = rng.random();
        self.pick(rarity, pick_roll)
    }

    /// Perform one draw with both rolls supplied. Rolls are expected in
    /// `[0, 1)`.
    pub fn draw_with(
        &self,
        rarity_roll: f64,
        pick_roll: f64,
    ) -> Result<&'a CatalogEntry, DrawError> {
        let rarity = self.table.select(rarity_roll);
        self.pick(rarity, pick_roll)
    }

    fn pick(&self, rarity: Rarity, roll: f64) -> Result<&'a CatalogEntry, DrawError> {
        let bucket = self.catalog.of_rarity(rarity);
        if bucket.is_empty() {
            return Err(DrawError::EmptyBucket { rarity });
        }
        let index = ((roll * bucket.len() as f64) as usize).min(bucket.len() - 1);
        Ok(bucket[index])
    }

    /// Run `draws` draws and count the tiers that came up.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        draws: usize,
        rng: &mut R,
    ) -> Result<DrawHistogram, DrawError> {
        let mut histogram = DrawHistogram::default();
        for _ in 0..draws {
            let entry = self.draw(rng)?;
            histogram.record(entry.rarity);
        }
        Ok(histogram)
    }
}

/// Per-tier counts collected over repeated draws.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawHistogram {
    counts: [u64; 7],
}

impl DrawHistogram {
    /// Count one draw of `rarity`.
    pub fn record(&mut self, rarity: Rarity) {
        self.counts[rarity.index()] += 1;
    }

    /// Draws recorded for `rarity`.
    pub fn count(&self, rarity: Rarity) -> u64 {
        self.counts[rarity.index()]
    }

    /// Total draws recorded.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Observed share of draws that landed on `rarity`.
    pub fn frequency(&self, rarity: Rarity) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.count(rarity) as f64 / total as f64,
        }
    }

    /// Pearson chi-squared statistic against `table`.
    ///
    /// Tiers whose expected count is below five are pooled together so the
    /// statistic stays meaningful for the very rare tiers. Returns the
    /// statistic and its degrees of freedom.
    pub fn chi_squared(&self, table: &RarityTable) -> (f64, usize) {
        let total = self.total() as f64;
        let mut statistic = 0.0;
        let mut buckets = 0usize;
        let mut pooled_expected = 0.0;
        let mut pooled_observed = 0.0;

        for rarity in Rarity::ORDER {
            let expected = table.effective_probability(rarity) * total;
            let observed = self.count(rarity) as f64;
            if expected < 5.0 {
                pooled_expected += expected;
                pooled_observed += observed;
                continue;
            }
            statistic += (observed - expected).powi(2) / expected;
            buckets += 1;
        }

        if pooled_expected > 0.0 {
            statistic += (pooled_observed - pooled_expected).powi(2) / pooled_expected;
            buckets += 1;
        }

        (statistic, buckets.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use once_cell::sync::Lazy;

    static TABLE: Lazy<RarityTable> = Lazy::new(RarityTable::default);

    fn roulette() -> Roulette<'static> {
        Roulette::new(&TABLE, Catalog::builtin())
    }

    #[test]
    fn forced_rolls_pick_expected_tiers() {
        let roulette = roulette();
        assert_eq!(roulette.draw_with(0.00005, 0.0).unwrap().rarity, Rarity::Secret);
        assert_eq!(roulette.draw_with(0.5, 0.0).unwrap().rarity, Rarity::Common);
        assert_eq!(roulette.draw_with(0.0, 0.0).unwrap().rarity, Rarity::Secret);
    }

    #[test]
    fn pick_roll_indexes_into_the_bucket() {
        let roulette = roulette();
        assert_eq!(roulette.draw_with(0.0, 0.0).unwrap().id, 151);
        assert_eq!(roulette.draw_with(0.0, 0.5).unwrap().id, 251);
        assert_eq!(roulette.draw_with(0.0, 0.999_999).unwrap().id, 493);
    }

    #[test]
    fn empty_weighted_bucket_is_a_configuration_error() {
        let catalog = Catalog::new(vec![CatalogEntry {
            id: 16,
            name: "pidgey".to_string(),
            rarity: Rarity::Common,
        }]);
        let table = RarityTable::from_weights([(Rarity::Rare, 0.1), (Rarity::Common, 0.9)]);
        let roulette = Roulette::new(&table, &catalog);

        let err = roulette.draw_with(0.05, 0.3).unwrap_err();
        assert_eq!(err, DrawError::EmptyBucket { rarity: Rarity::Rare });
        assert_eq!(roulette.draw_with(0.5, 0.3).unwrap().id, 16);
    }

    #[test]
    fn validated_catalog_draws_at_zero_roll() {
        let catalog = Catalog::new(vec![
            CatalogEntry {
                id: 25,
                name: "pikachu".to_string(),
                rarity: Rarity::Rare,
            },
            CatalogEntry {
                id: 16,
                name: "pidgey".to_string(),
                rarity: Rarity::Common,
            },
        ]);
        let table = RarityTable::from_weights([(Rarity::Rare, 0.5), (Rarity::Common, 0.5)]);
        catalog.validate(&table).unwrap();

        let roulette = Roulette::new(&table, &catalog);
        assert_eq!(roulette.draw_with(0.0, 0.0).unwrap().id, 25);
    }

    #[test]
    fn seeded_draws_fit_the_configured_weights() {
        let roulette = roulette();
        let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
        let histogram = roulette.simulate(200_000, &mut rng).unwrap();
        assert_eq!(histogram.total(), 200_000);

        let (statistic, dof) = histogram.chi_squared(roulette.table());
        // 0.999 quantiles of the chi-squared distribution.
        let critical = match dof {
            3 => 16.27,
            4 => 18.47,
            5 => 20.52,
            _ => 22.46,
        };
        assert!(
            statistic < critical,
            "chi-squared {statistic:.2} with {dof} dof exceeds {critical}"
        );
        assert!((histogram.frequency(Rarity::Common) - 0.634).abs() < 0.01);
        assert!((histogram.frequency(Rarity::Uncommon) - 0.25).abs() < 0.01);
    }

    #[test]
    fn drawing_leaves_tables_untouched() {
        let table = RarityTable::default();
        let catalog = Catalog::builtin().clone();
        let before = (table, catalog.clone());
        let roulette = Roulette::new(&table, &catalog);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        roulette.simulate(5_000, &mut rng).unwrap();
        assert_eq!(before.0, table);
        assert_eq!(before.1, catalog);
    }

    #[test]
    fn chi_squared_pools_sparse_tiers() {
        let mut histogram = DrawHistogram::default();
        let observed = [
            (Rarity::Common, 6_339),
            (Rarity::Uncommon, 2_500),
            (Rarity::Rare, 1_000),
            (Rarity::Pseudo, 100),
            (Rarity::Starter, 50),
            (Rarity::Legendary, 10),
            (Rarity::Secret, 1),
        ];
        for (rarity, count) in observed {
            for _ in 0..count {
                histogram.record(rarity);
            }
        }
        let (statistic, dof) = histogram.chi_squared(&RarityTable::default());
        // secret expects a single draw and is pooled on its own
        assert_eq!(dof, 6);
        assert!(statistic < 0.01, "statistic {statistic}");
    }

    proptest! {
        #[test]
        fn every_draw_has_a_weighted_rarity(rarity_roll in 0.0f64..1.0, pick_roll in 0.0f64..1.0) {
            let roulette = roulette();
            let entry = roulette.draw_with(rarity_roll, pick_roll).unwrap();
            prop_assert!(roulette.table().weight(entry.rarity) > 0.0);
            prop_assert_eq!(entry.rarity, roulette.table().select(rarity_roll));
        }

        #[test]
        fn seeded_rng_draws_never_fail(seed in any::<u64>()) {
            let roulette = roulette();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..64 {
                prop_assert!(roulette.draw(&mut rng).is_ok());
            }
        }
    }
}
