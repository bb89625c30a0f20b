//! Rarity tiers and the weighted table used to pick one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Named tier that drives both draw probability and catalog filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    /// Hidden entries outside the main catalog range.
    Secret,
    /// Legendary birds and friends.
    Legendary,
    /// Starter lines.
    Starter,
    /// Pseudo-legendaries.
    Pseudo,
    /// Rare.
    Rare,
    /// Uncommon.
    Uncommon,
    /// Common.
    Common,
}

impl Rarity {
    /// Iteration order used for cumulative thresholds. Changing it moves
    /// boundary values between tiers.
    pub const ORDER: [Rarity; 7] = [
        Rarity::Secret,
        Rarity::Legendary,
        Rarity::Starter,
        Rarity::Pseudo,
        Rarity::Rare,
        Rarity::Uncommon,
        Rarity::Common,
    ];

    /// Lowercase label used in storage and on the wire.
    pub fn label(self) -> &'static str {
        match self {
            Rarity::Secret => "secret",
            Rarity::Legendary => "legendary",
            Rarity::Starter => "starter",
            Rarity::Pseudo => "pseudo",
            Rarity::Rare => "rare",
            Rarity::Uncommon => "uncommon",
            Rarity::Common => "common",
        }
    }

    /// Position of the tier within [`Rarity::ORDER`].
    pub fn index(self) -> usize {
        match self {
            Rarity::Secret => 0,
            Rarity::Legendary => 1,
            Rarity::Starter => 2,
            Rarity::Pseudo => 3,
            Rarity::Rare => 4,
            Rarity::Uncommon => 5,
            Rarity::Common => 6,
        }
    }

    /// Captures of these tiers count towards the `catch_rare` mission.
    pub fn counts_as_rare_catch(self) -> bool {
        matches!(
            self,
            Rarity::Rare | Rarity::Pseudo | Rarity::Legendary | Rarity::Secret
        )
    }

    /// Coins paid per creature by the offline backend when selling.
    pub fn sell_value(self) -> u64 {
        match self {
            Rarity::Common => 10,
            Rarity::Uncommon => 25,
            Rarity::Rare => 100,
            Rarity::Starter => 250,
            Rarity::Pseudo => 500,
            Rarity::Legendary => 2_500,
            Rarity::Secret => 10_000,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered rarity → probability weight mapping.
///
/// Weights are expected to sum to roughly 1.0 but this is not enforced; any
/// mass left over at the top of `[0, 1)` goes to the last tier in
/// [`Rarity::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RarityTable {
    weights: [f64; 7],
}

/// Weights shipped with the game.
pub const DEFAULT_WEIGHTS: [(Rarity, f64); 7] = [
    (Rarity::Secret, 0.0001),
    (Rarity::Legendary, 0.001),
    (Rarity::Starter, 0.005),
    (Rarity::Pseudo, 0.01),
    (Rarity::Rare, 0.1),
    (Rarity::Uncommon, 0.25),
    (Rarity::Common, 0.6339),
];

impl Default for RarityTable {
    fn default() -> Self {
        Self::from_weights(DEFAULT_WEIGHTS)
    }
}

impl RarityTable {
    /// Build a table from `(rarity, weight)` pairs. Tiers not listed get a
    /// weight of zero; a tier listed twice keeps the last weight.
    pub fn from_weights(pairs: impl IntoIterator<Item = (Rarity, f64)>) -> Self {
        let mut weights = [0.0; 7];
        for (rarity, weight) in pairs {
            weights[rarity.index()] = weight;
        }
        Self { weights }
    }

    /// Weight configured for `rarity`.
    pub fn weight(&self, rarity: Rarity) -> f64 {
        self.weights[rarity.index()]
    }

    /// Entries in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (Rarity, f64)> + '_ {
        Rarity::ORDER
            .iter()
            .map(move |rarity| (*rarity, self.weights[rarity.index()]))
    }

    /// Cumulative sum of every weight, accumulated in iteration order.
    pub fn total(&self) -> f64 {
        self.iter().fold(0.0, |acc, (_, weight)| acc + weight)
    }

    /// Probability that a draw lands on `rarity`, counting the uncovered
    /// gap towards the fallback tier.
    pub fn effective_probability(&self, rarity: Rarity) -> f64 {
        let weight = self.weight(rarity);
        if rarity == Self::fallback() {
            weight + (1.0 - self.total()).max(0.0)
        } else {
            weight
        }
    }

    /// Tier chosen when the roll lands past the cumulative sum.
    pub fn fallback() -> Rarity {
        Rarity::ORDER[Rarity::ORDER.len() - 1]
    }

    /// Map a uniform roll in `[0, 1)` onto a tier.
    ///
    /// Walks the tiers in order keeping a running sum and returns the first
    /// tier whose cumulative weight is `>= roll`. Tiers without weight are
    /// never selected, even for a roll of exactly zero.
    pub fn select(&self, roll: f64) -> Rarity {
        let mut cumulative = 0.0;
        for (rarity, weight) in self.iter() {
            if weight <= 0.0 {
                continue;
            }
            cumulative += weight;
            if roll <= cumulative {
                return rarity;
            }
        }
        Self::fallback()
    }
}
