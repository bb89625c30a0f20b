//! Static creature catalog embedded at build time.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{
    draw::DrawError,
    rarity::{Rarity, RarityTable},
};

const CATALOG_JSON: &str = include_str!("../data/catalog.json");

const SPRITE_BASE_URL: &str =
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon";

/// Creatures offered when a new player picks a starter, in display order.
pub const STARTER_CHOICES: [u32; 3] = [4, 7, 1];

/// A collectible definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// National dex number.
    pub id: u32,
    /// Lowercase display name.
    pub name: String,
    /// Tier the entry is drawn from.
    pub rarity: Rarity,
}

impl CatalogEntry {
    /// Sprite image location for the entry.
    pub fn sprite_url(&self) -> String {
        sprite_url(self.id)
    }

    /// Name with the first letter capitalised.
    pub fn display_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Sprite image location for a dex number.
pub fn sprite_url(id: u32) -> String {
    format!("{SPRITE_BASE_URL}/{id}.png")
}

/// Immutable list of everything the roulette can return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

static GEN1: Lazy<Catalog> = Lazy::new(|| {
    let entries: Vec<CatalogEntry> =
        serde_json::from_str(CATALOG_JSON).expect("embedded catalog is valid JSON");
    Catalog::new(entries)
});

impl Catalog {
    /// Wrap an explicit entry list. Entries keep the order given.
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// The catalog shipped with the game.
    pub fn builtin() -> &'static Catalog {
        &GEN1
    }

    /// All entries in catalog order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by dex number.
    pub fn get(&self, id: u32) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Entries belonging to `rarity`, in catalog order.
    pub fn of_rarity(&self, rarity: Rarity) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.rarity == rarity)
            .collect()
    }

    /// Starter choices resolved against this catalog.
    pub fn starters(&self) -> Vec<&CatalogEntry> {
        STARTER_CHOICES
            .iter()
            .filter_map(|id| self.get(*id))
            .collect()
    }

    /// Ensure every tier with a nonzero weight has at least one member.
    pub fn validate(&self, table: &RarityTable) -> Result<(), DrawError> {
        for (rarity, weight) in table.iter() {
            if weight > 0.0 && !self.entries.iter().any(|entry| entry.rarity == rarity) {
                return Err(DrawError::EmptyBucket { rarity });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_covers_every_tier() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 153);
        for rarity in Rarity::ORDER {
            assert!(
                !catalog.of_rarity(rarity).is_empty(),
                "no entries for {rarity}"
            );
        }
        catalog.validate(&RarityTable::default()).unwrap();
    }

    #[test]
    fn secret_tier_holds_the_hidden_entries() {
        let secret: Vec<u32> = Catalog::builtin()
            .of_rarity(Rarity::Secret)
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        assert_eq!(secret, vec![151, 251, 493]);
    }

    #[test]
    fn starters_resolve_in_display_order() {
        let names: Vec<_> = Catalog::builtin()
            .starters()
            .into_iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec!["charmander", "squirtle", "bulbasaur"]);
    }

    #[test]
    fn sprite_and_display_name() {
        let entry = Catalog::builtin().get(25).unwrap();
        assert_eq!(entry.display_name(), "Pikachu");
        assert!(entry.sprite_url().ends_with("/25.png"));
    }

    #[test]
    fn validate_reports_first_empty_weighted_bucket() {
        let catalog = Catalog::new(vec![CatalogEntry {
            id: 19,
            name: "rattata".to_string(),
            rarity: Rarity::Common,
        }]);
        let table = RarityTable::from_weights([(Rarity::Rare, 0.1), (Rarity::Common, 0.9)]);
        match catalog.validate(&table) {
            Err(DrawError::EmptyBucket { rarity }) => assert_eq!(rarity, Rarity::Rare),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
