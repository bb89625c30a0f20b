//! Player profiles and their on-disk persistence.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    catalog::CatalogEntry,
    progress::{level_for_xp, AchievementProgress, MissionKind, MissionProgress, Rewards},
    rarity::Rarity,
    schedule,
    shop::SPIN_UPGRADE_ITEM_ID,
};

/// Stack of one creature species held by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Dex number of the creature.
    pub creature_id: u32,
    /// Creature name at capture time.
    pub name: String,
    /// Tier the creature was drawn from.
    pub rarity: Rarity,
    /// Number held.
    pub quantity: u32,
}

/// Remaining free spins and the allowance they refill to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinState {
    /// Spins left until the next reset.
    pub free_spins: u32,
    /// Allowance restored by each reset.
    pub base_free_spins: u32,
    /// Time of the last spin or reset.
    #[serde(default)]
    pub last_spin_reset: Option<DateTime<Utc>>,
}

impl SpinState {
    /// Fresh allowance of `base` spins.
    pub fn new(base: u32) -> Self {
        Self {
            free_spins: base,
            base_free_spins: base,
            last_spin_reset: None,
        }
    }
}

/// When each mission cadence is next due to reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionResets {
    /// Next daily reset.
    pub daily: Option<DateTime<Utc>>,
    /// Next weekly reset.
    pub weekly: Option<DateTime<Utc>>,
}

impl MissionResets {
    fn slot(&mut self, kind: MissionKind) -> &mut Option<DateTime<Utc>> {
        match kind {
            MissionKind::Daily => &mut self.daily,
            MissionKind::Weekly => &mut self.weekly,
        }
    }

    /// Cadences whose reset time has passed. Unscheduled cadences are
    /// scheduled from `now` and not reported.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<MissionKind> {
        let mut due = Vec::new();
        for kind in [MissionKind::Daily, MissionKind::Weekly] {
            let slot = self.slot(kind);
            match *slot {
                Some(at) if at <= now => {
                    due.push(kind);
                    *slot = Some(schedule::next_mission_reset(kind, now));
                }
                Some(_) => {}
                None => *slot = Some(schedule::next_mission_reset(kind, now)),
            }
        }
        due
    }
}

/// Pokedex placement progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Entries placed.
    pub placed: usize,
    /// Entries in the catalog.
    pub total: usize,
    /// Rounded percentage.
    pub percentage: u32,
}

/// Everything the game tracks about one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Stable player identifier.
    pub user_id: String,
    /// Display name.
    pub nickname: String,
    /// Total experience earned.
    #[serde(default)]
    pub experience_points: u64,
    /// Level derived from experience.
    #[serde(default = "first_level")]
    pub level: u32,
    /// Soft currency.
    #[serde(default)]
    pub coins: u64,
    /// Premium currency.
    #[serde(default)]
    pub shards: u64,
    /// Name of the chosen starter, once picked.
    #[serde(default)]
    pub starter: Option<String>,
    /// Free-spin counters.
    pub spins: SpinState,
    /// Held creatures keyed by dex number.
    #[serde(default)]
    pub inventory: BTreeMap<u32, InventoryItem>,
    /// Dex numbers placed in the pokedex with the time of placement.
    #[serde(default)]
    pub pokedex: BTreeMap<u32, DateTime<Utc>>,
    /// Mission progress keyed by mission id.
    #[serde(default)]
    pub missions: BTreeMap<String, MissionProgress>,
    /// Achievement progress keyed by achievement id.
    #[serde(default)]
    pub achievements: BTreeMap<String, AchievementProgress>,
    /// Mission reset schedule.
    #[serde(default)]
    pub mission_resets: MissionResets,
    /// Shop items held, keyed by item id.
    #[serde(default)]
    pub items: BTreeMap<u32, u32>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

fn first_level() -> u32 {
    1
}

impl PlayerProfile {
    /// New level-one profile with `base_spins` free spins.
    pub fn new(user_id: impl Into<String>, nickname: impl Into<String>, base_spins: u32) -> Self {
        Self {
            user_id: user_id.into(),
            nickname: nickname.into(),
            experience_points: 0,
            level: 1,
            coins: 0,
            shards: 0,
            starter: None,
            spins: SpinState::new(base_spins),
            inventory: BTreeMap::new(),
            pokedex: BTreeMap::new(),
            missions: BTreeMap::new(),
            achievements: BTreeMap::new(),
            mission_resets: MissionResets::default(),
            items: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Number of `creature_id` held.
    pub fn quantity(&self, creature_id: u32) -> u32 {
        self.inventory
            .get(&creature_id)
            .map(|item| item.quantity)
            .unwrap_or(0)
    }

    /// Add one creature and return the new stack size.
    pub fn add_creature(&mut self, entry: &CatalogEntry) -> u32 {
        let item = self
            .inventory
            .entry(entry.id)
            .or_insert_with(|| InventoryItem {
                creature_id: entry.id,
                name: entry.name.clone(),
                rarity: entry.rarity,
                quantity: 0,
            });
        item.quantity += 1;
        item.quantity
    }

    /// Remove `quantity` of a creature. Empty stacks are dropped.
    pub fn remove_creature(&mut self, creature_id: u32, quantity: u32) -> Result<InventoryItem> {
        let held = self.quantity(creature_id);
        if quantity == 0 || held < quantity {
            return Err(anyhow!(
                "cannot remove {quantity} of creature {creature_id}; {held} held"
            ));
        }
        let item = self
            .inventory
            .get_mut(&creature_id)
            .ok_or_else(|| anyhow!("creature {creature_id} not in inventory"))?;
        item.quantity -= quantity;
        let removed = InventoryItem {
            quantity,
            ..item.clone()
        };
        if item.quantity == 0 {
            self.inventory.remove(&creature_id);
        }
        Ok(removed)
    }

    /// Total creatures held across all species.
    pub fn total_creatures(&self) -> u64 {
        self.inventory
            .values()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Inventory sorted rarest first, then by dex number.
    pub fn inventory_by_rarity(&self) -> Vec<&InventoryItem> {
        let mut items: Vec<_> = self.inventory.values().collect();
        items.sort_by_key(|item| (item.rarity.index(), item.creature_id));
        items
    }

    /// Whether the creature already sits in the pokedex.
    pub fn is_placed(&self, creature_id: u32) -> bool {
        self.pokedex.contains_key(&creature_id)
    }

    /// Pokedex completion against a catalog of `total` entries.
    pub fn pokedex_completion(&self, total: usize) -> Completion {
        let placed = self.pokedex.len();
        let percentage = if total == 0 {
            0
        } else {
            ((placed as f64 / total as f64) * 100.0).round() as u32
        };
        Completion {
            placed,
            total,
            percentage,
        }
    }

    /// Add experience and recompute the level. Returns `true` on level-up.
    pub fn gain_experience(&mut self, amount: u64) -> bool {
        let before = self.level;
        self.experience_points += amount;
        self.level = level_for_xp(self.experience_points);
        self.level > before
    }

    /// Units of a shop item held.
    pub fn item_quantity(&self, item_id: u32) -> u32 {
        self.items.get(&item_id).copied().unwrap_or(0)
    }

    /// Base-spin upgrades bought so far.
    pub fn spin_upgrades(&self) -> u32 {
        self.item_quantity(SPIN_UPGRADE_ITEM_ID)
    }

    /// Credit currency and spin rewards. Experience is not applied here.
    pub fn credit(&mut self, rewards: &Rewards) {
        self.coins += rewards.coins;
        self.shards += rewards.shards;
        if rewards.spins > 0 {
            self.spins.base_free_spins += rewards.spins;
            self.spins.free_spins += rewards.spins;
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Reads and writes profiles as JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    /// Store rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the store writes to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds `user_id`'s profile.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.json", sanitize_component(user_id)))
    }

    /// Load a profile, returning `None` when it was never saved.
    pub fn load(&self, user_id: &str) -> Result<Option<PlayerProfile>> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Ok(None);
        }
        self.read_profile(&path).map(Some)
    }

    /// Persist a profile, refreshing its modification time.
    pub fn save(&self, profile: &mut PlayerProfile) -> Result<PathBuf> {
        profile.touch();
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.path_for(&profile.user_id);
        let serialised = serde_json::to_vec_pretty(profile)?;
        fs::write(&path, serialised)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Every readable profile, most recently updated first.
    pub fn all(&self) -> Result<Vec<PlayerProfile>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut profiles = Vec::new();
        for entry in fs::read_dir(&self.root).context("failed to read profile directory")? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.read_profile(&entry.path()) {
                Ok(profile) => profiles.push(profile),
                Err(err) => warn!("Failed to read profile {:?}: {err}", entry.path()),
            }
        }

        profiles.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(profiles)
    }

    fn read_profile(&self, path: &Path) -> Result<PlayerProfile> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let profile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(profile)
    }
}

fn sanitize_component(input: &str) -> String {
    let result: String = input
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
        .collect();
    if result.is_empty() {
        "player".to_string()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use tempfile::tempdir;

    #[test]
    fn profile_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = ProfileStore::new(dir.path().join("profiles"));
        assert!(store.load("ash")?.is_none());

        let mut profile = PlayerProfile::new("ash", "Ash", 5);
        let pikachu = Catalog::builtin().get(25).expect("pikachu");
        profile.add_creature(pikachu);
        profile.add_creature(pikachu);
        profile.pokedex.insert(25, Utc::now());
        let path = store.save(&mut profile)?;
        assert!(path.exists());

        let loaded = store.load("ash")?.expect("saved profile");
        assert_eq!(loaded, profile);
        assert_eq!(loaded.quantity(25), 2);
        assert!(loaded.is_placed(25));

        let all = store.all()?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].user_id, "ash");
        Ok(())
    }

    #[test]
    fn removing_creatures_drops_empty_stacks() -> Result<()> {
        let mut profile = PlayerProfile::new("misty", "Misty", 5);
        let staryu = Catalog::builtin().get(120).expect("staryu");
        profile.add_creature(staryu);
        profile.add_creature(staryu);

        assert!(profile.remove_creature(120, 3).is_err());
        let removed = profile.remove_creature(120, 1)?;
        assert_eq!(removed.quantity, 1);
        assert_eq!(profile.quantity(120), 1);
        profile.remove_creature(120, 1)?;
        assert!(!profile.inventory.contains_key(&120));
        assert_eq!(profile.total_creatures(), 0);
        Ok(())
    }

    #[test]
    fn experience_levels_and_rewards() {
        let mut profile = PlayerProfile::new("brock", "Brock", 5);
        assert!(!profile.gain_experience(75));
        assert!(profile.gain_experience(25));
        assert_eq!(profile.level, 2);

        profile.credit(&Rewards {
            coins: 10,
            shards: 1,
            spins: 2,
            ..Rewards::default()
        });
        assert_eq!(profile.coins, 10);
        assert_eq!(profile.spins.base_free_spins, 7);
        assert_eq!(profile.spins.free_spins, 7);

        assert!(profile.gain_experience(300));
        assert_eq!(profile.level, 3);
    }

    #[test]
    fn spin_upgrades_are_counted_as_items() {
        let mut profile = PlayerProfile::new("erika", "Erika", 5);
        assert_eq!(profile.spin_upgrades(), 0);
        profile.items.insert(SPIN_UPGRADE_ITEM_ID, 2);
        profile.items.insert(1, 4);
        assert_eq!(profile.spin_upgrades(), 2);
        assert_eq!(profile.item_quantity(1), 4);
        assert_eq!(profile.item_quantity(3), 0);
    }

    #[test]
    fn completion_rounds_percentage() {
        let mut profile = PlayerProfile::new("gary", "Gary", 5);
        for id in 1..=10 {
            profile.pokedex.insert(id, Utc::now());
        }
        let completion = profile.pokedex_completion(153);
        assert_eq!(completion.placed, 10);
        assert_eq!(completion.percentage, 7);
        assert_eq!(profile.pokedex_completion(0).percentage, 0);
    }

    #[test]
    fn mission_resets_fire_once_per_boundary() {
        use chrono::TimeZone;

        let mut resets = MissionResets::default();
        let wednesday = Utc.with_ymd_and_hms(2024, 5, 8, 9, 0, 0).unwrap();
        assert!(resets.due(wednesday).is_empty());
        assert_eq!(
            resets.daily,
            Some(Utc.with_ymd_and_hms(2024, 5, 9, 0, 0, 0).unwrap())
        );

        let thursday = Utc.with_ymd_and_hms(2024, 5, 9, 8, 0, 0).unwrap();
        assert_eq!(resets.due(thursday), vec![MissionKind::Daily]);
        assert!(resets.due(thursday).is_empty());

        let next_week = Utc.with_ymd_and_hms(2024, 5, 13, 1, 0, 0).unwrap();
        assert_eq!(
            resets.due(next_week),
            vec![MissionKind::Daily, MissionKind::Weekly]
        );
    }

    #[test]
    fn sanitize_creates_safe_filenames() {
        assert_eq!(sanitize_component("../ash ketchum!"), "ashketchum");
        assert_eq!(sanitize_component("***"), "player");
    }
}
