//! Spin orchestration: draw, persist, and advance progress.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    backend::{Backend, ExperienceGain, PlayerContext, RpcMessage, SaleReceipt},
    catalog::{Catalog, CatalogEntry, STARTER_CHOICES},
    config::AppConfig,
    draw::{DrawError, DrawHistogram, Roulette},
    profile::{PlayerProfile, SpinState},
    progress::{
        AchievementGoal, AchievementStatus, ClaimResult, MissionCategory, MissionKind,
        MissionStatus, ProgressReport,
    },
    rarity::{Rarity, RarityTable},
    shop::{OwnedItem, PurchaseReceipt, ShopItem},
};

/// Rule violations detected before touching the backend.
#[derive(Debug, Error)]
pub enum SpinError {
    /// The player has no free spins until the next reset.
    #[error("no free spins left")]
    NoSpinsLeft,
    /// The id is not one of the offered starters.
    #[error("creature {0} is not a starter choice")]
    InvalidStarter(u32),
    /// The id is not in the catalog.
    #[error("creature {0} is not in the catalog")]
    UnknownCreature(u32),
    /// The player holds no copy of the creature.
    #[error("creature {0} is not in the inventory")]
    NotOwned(u32),
    /// The creature is already in the pokedex.
    #[error("creature {0} is already in the pokedex")]
    AlreadyPlaced(u32),
    /// The rarity table and catalog disagree.
    #[error(transparent)]
    Draw(#[from] DrawError),
}

/// Everything a single spin produced.
#[derive(Debug, Clone)]
pub struct SpinOutcome {
    /// Creature drawn.
    pub entry: CatalogEntry,
    /// Copies held after the capture.
    pub quantity: u32,
    /// Free spins left.
    pub spins_left: u32,
    /// Experience awarded for the capture, when the award succeeded.
    pub experience: Option<ExperienceGain>,
    /// Missions completed by this spin.
    pub missions: ProgressReport,
    /// Achievements completed by this spin.
    pub achievements: ProgressReport,
}

/// Outcome of a sale together with progress it triggered.
#[derive(Debug, Clone)]
pub struct SaleOutcome {
    /// Backend receipt.
    pub receipt: SaleReceipt,
    /// Missions and achievements completed by the sale.
    pub progress: ProgressReport,
}

/// Owns the roulette configuration, the RNG and the backend for one player.
pub struct SpinService {
    backend: Arc<dyn Backend>,
    player: PlayerContext,
    table: RarityTable,
    catalog: Catalog,
    rng: Mutex<ChaCha8Rng>,
    capture_xp: u64,
}

impl SpinService {
    /// Service with the default table and the built-in catalog.
    pub fn new(backend: Arc<dyn Backend>, player: PlayerContext, rng: ChaCha8Rng) -> Self {
        Self {
            backend,
            player,
            table: RarityTable::default(),
            catalog: Catalog::builtin().clone(),
            rng: Mutex::new(rng),
            capture_xp: 25,
        }
    }

    /// Service configured from `config`: seeded RNG when a seed is set,
    /// player identity and capture experience.
    pub fn from_config(backend: Arc<dyn Backend>, config: &AppConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };
        let player = PlayerContext::new(config.player_id.clone(), config.nickname.clone());
        Self::new(backend, player, rng).with_capture_xp(config.capture_xp)
    }

    /// Replace the rarity table.
    pub fn with_table(mut self, table: RarityTable) -> Self {
        self.table = table;
        self
    }

    /// Replace the catalog.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Experience awarded per capture.
    pub fn with_capture_xp(mut self, capture_xp: u64) -> Self {
        self.capture_xp = capture_xp;
        self
    }

    /// Player the service acts for.
    pub fn player(&self) -> &PlayerContext {
        &self.player
    }

    /// Catalog draws come from.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Table draws use.
    pub fn table(&self) -> &RarityTable {
        &self.table
    }

    /// Label of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn roulette(&self) -> Roulette<'_> {
        Roulette::new(&self.table, &self.catalog)
    }

    /// Current profile snapshot.
    pub fn profile(&self) -> Result<PlayerProfile> {
        self.backend.load_profile(&self.player)
    }

    /// Restore free spins when a reset is due.
    pub fn refresh_spins(&self) -> Result<SpinState> {
        self.backend.check_spin_reset(&self.player)
    }

    /// Spin once.
    ///
    /// The draw happens before any write, so a table/catalog mismatch or an
    /// empty allowance leaves the profile untouched. Progress updates that
    /// fail after the capture are logged and skipped.
    pub fn spin(&self) -> Result<SpinOutcome> {
        let spins = self.backend.load_profile(&self.player)?.spins;
        if spins.free_spins == 0 {
            return Err(SpinError::NoSpinsLeft.into());
        }

        let entry = {
            let mut rng = self.rng.lock();
            self.roulette()
                .draw(&mut *rng)
                .map_err(SpinError::from)?
                .clone()
        };

        let spins_left = self.backend.consume_spin(&self.player)?;
        let quantity = self.backend.record_capture(&self.player, &entry)?;
        info!(
            id = entry.id,
            name = %entry.name,
            rarity = %entry.rarity,
            spins_left,
            "captured"
        );

        let mut missions = ProgressReport::default();
        let mut achievements = ProgressReport::default();

        let experience = match self.backend.add_experience(&self.player, self.capture_xp) {
            Ok(gain) => Some(gain),
            Err(err) => {
                warn!("failed to award capture experience: {err:#}");
                None
            }
        };
        if experience.is_some_and(|gain| gain.level_up) {
            self.advance_achievement(AchievementGoal::Level, 1, &mut achievements);
        }

        self.advance_mission(MissionCategory::Spin, 1, &mut missions);
        self.advance_achievement(AchievementGoal::Spins, 1, &mut achievements);

        if entry.rarity == Rarity::Legendary {
            self.advance_achievement(AchievementGoal::LegendaryCapture, 1, &mut achievements);
        }
        if entry.rarity.counts_as_rare_catch() {
            self.advance_mission(MissionCategory::CatchRare, 1, &mut missions);
        }

        Ok(SpinOutcome {
            entry,
            quantity,
            spins_left,
            experience,
            missions,
            achievements,
        })
    }

    fn advance_mission(&self, category: MissionCategory, increment: u32, into: &mut ProgressReport) {
        match self
            .backend
            .update_mission_progress(&self.player, category, increment)
        {
            Ok(report) => into.absorb(report),
            Err(err) => warn!(category = category.as_str(), "mission update failed: {err:#}"),
        }
    }

    fn advance_achievement(&self, goal: AchievementGoal, increment: u32, into: &mut ProgressReport) {
        match self
            .backend
            .update_achievement_progress(&self.player, goal, increment)
        {
            Ok(report) => into.absorb(report),
            Err(err) => warn!(goal = goal.as_str(), "achievement update failed: {err:#}"),
        }
    }

    /// Sell copies of a creature and count the sale towards progress.
    pub fn sell(&self, creature_id: u32, quantity: u32) -> Result<SaleOutcome> {
        if self.catalog.get(creature_id).is_none() {
            return Err(SpinError::UnknownCreature(creature_id).into());
        }
        let receipt = self
            .backend
            .sell_creature(&self.player, creature_id, quantity)?;
        let mut progress = ProgressReport::default();
        if receipt.success {
            info!(creature_id, quantity, coins = receipt.coins_earned, "sold");
            self.advance_mission(MissionCategory::Sell, quantity, &mut progress);
            self.advance_achievement(AchievementGoal::Sales, quantity, &mut progress);
        }
        Ok(SaleOutcome { receipt, progress })
    }

    /// Choose one of the starter creatures.
    pub fn select_starter(&self, creature_id: u32) -> Result<CatalogEntry> {
        if !STARTER_CHOICES.contains(&creature_id) {
            return Err(SpinError::InvalidStarter(creature_id).into());
        }
        let entry = self
            .catalog
            .get(creature_id)
            .ok_or(SpinError::UnknownCreature(creature_id))?
            .clone();
        self.backend.select_starter(&self.player, &entry)?;
        info!(name = %entry.name, "starter selected");
        Ok(entry)
    }

    /// Place a held creature in the pokedex.
    pub fn place_in_pokedex(&self, creature_id: u32) -> Result<RpcMessage> {
        let entry = self
            .catalog
            .get(creature_id)
            .ok_or(SpinError::UnknownCreature(creature_id))?;
        let profile = self.backend.load_profile(&self.player)?;
        if profile.is_placed(creature_id) {
            return Err(SpinError::AlreadyPlaced(creature_id).into());
        }
        if profile.quantity(creature_id) == 0 {
            return Err(SpinError::NotOwned(creature_id).into());
        }
        self.backend.place_in_pokedex(&self.player, entry)
    }

    /// Missions with the player's progress.
    pub fn missions(&self) -> Result<Vec<MissionStatus>> {
        self.backend.missions(&self.player)
    }

    /// Claim a completed mission.
    pub fn claim_mission(&self, mission_id: &str) -> Result<ClaimResult> {
        self.backend.claim_mission_rewards(&self.player, mission_id)
    }

    /// Pay the daily or weekly bonus once every mission of that kind is done.
    pub fn claim_completion_bonus(&self, kind: MissionKind) -> Result<ClaimResult> {
        let claim = self.backend.claim_completion_bonus(&self.player, kind)?;
        if claim.success {
            info!(kind = kind.as_str(), rewards = %claim.rewards, "completion bonus claimed");
        }
        Ok(claim)
    }

    /// Achievements with the player's progress.
    pub fn achievements(&self) -> Result<Vec<AchievementStatus>> {
        self.backend.achievements(&self.player)
    }

    /// Claim the rewards of a completed achievement.
    pub fn claim_achievement(&self, achievement_id: &str) -> Result<ClaimResult> {
        let claim = self
            .backend
            .claim_achievement_rewards(&self.player, achievement_id)?;
        if claim.success {
            info!(achievement_id, rewards = %claim.rewards, "achievement claimed");
        }
        Ok(claim)
    }

    /// Items on sale.
    pub fn shop_items(&self) -> Result<Vec<ShopItem>> {
        self.backend.shop_items()
    }

    /// Items the player holds.
    pub fn owned_items(&self) -> Result<Vec<OwnedItem>> {
        self.backend.owned_items(&self.player)
    }

    /// Buy `quantity` units of a shop item with coins.
    pub fn buy_item(&self, item_id: u32, quantity: u32) -> Result<PurchaseReceipt> {
        let receipt = self.backend.buy_item(&self.player, item_id, quantity)?;
        if receipt.success {
            info!(item_id, quantity, balance = receipt.balance, "item bought");
        }
        Ok(receipt)
    }

    /// Buy one permanent extra free spin with shards.
    pub fn buy_spin_upgrade(&self) -> Result<PurchaseReceipt> {
        self.backend.buy_spin_upgrade(&self.player)
    }

    /// Run `draws` draws without persisting anything.
    pub fn simulate(&self, draws: usize) -> Result<DrawHistogram, DrawError> {
        let mut rng = self.rng.lock();
        self.roulette().simulate(draws, &mut *rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::LocalBackend, profile::ProfileStore, shop::spin_upgrade_price};
    use tempfile::{tempdir, TempDir};

    fn service(base_spins: u32) -> Result<(TempDir, Arc<LocalBackend>, SpinService)> {
        let dir = tempdir()?;
        let backend = Arc::new(LocalBackend::new(
            ProfileStore::new(dir.path().join("profiles")),
            base_spins,
        ));
        let service = SpinService::new(
            backend.clone(),
            PlayerContext::new("ash", "Ash"),
            ChaCha8Rng::seed_from_u64(11),
        );
        Ok((dir, backend, service))
    }

    #[test]
    fn spin_captures_and_advances_progress() -> Result<()> {
        let (_dir, _backend, service) = service(5)?;
        let outcome = service.spin()?;
        assert_eq!(outcome.spins_left, 4);
        assert_eq!(outcome.quantity, 1);
        assert_eq!(outcome.experience.map(|gain| gain.new_xp), Some(25));

        let profile = service.profile()?;
        assert_eq!(profile.spins.free_spins, 4);
        assert_eq!(profile.quantity(outcome.entry.id), 1);
        assert_eq!(profile.experience_points, 25);
        assert_eq!(profile.missions["daily-spin"].progress, 1);
        assert_eq!(profile.achievements["spinner"].progress, 1);
        Ok(())
    }

    #[test]
    fn no_spins_leaves_the_profile_untouched() -> Result<()> {
        let (_dir, _backend, service) = service(0)?;
        let before = service.profile()?;
        let err = service.spin().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SpinError>(),
            Some(SpinError::NoSpinsLeft)
        ));
        let after = service.profile()?;
        assert_eq!(before.inventory, after.inventory);
        assert_eq!(after.experience_points, 0);
        assert!(after.missions.is_empty());
        Ok(())
    }

    #[test]
    fn configuration_error_aborts_before_writes() -> Result<()> {
        let (_dir, _backend, service) = service(5)?;
        let service = service
            .with_catalog(Catalog::new(vec![CatalogEntry {
                id: 16,
                name: "pidgey".to_string(),
                rarity: Rarity::Common,
            }]))
            .with_table(RarityTable::from_weights([(Rarity::Rare, 1.0)]));
        let err = service.spin().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SpinError>(),
            Some(SpinError::Draw(DrawError::EmptyBucket { rarity: Rarity::Rare }))
        ));
        assert_eq!(service.profile()?.spins.free_spins, 5);
        Ok(())
    }

    #[test]
    fn rare_catches_count_towards_missions() -> Result<()> {
        let (_dir, _backend, service) = service(3)?;
        let service = service.with_table(RarityTable::from_weights([(Rarity::Legendary, 1.0)]));
        let outcome = service.spin()?;
        assert_eq!(outcome.entry.rarity, Rarity::Legendary);
        assert!(outcome
            .missions
            .completed
            .iter()
            .any(|goal| goal.id == "daily-rare"));
        assert!(outcome
            .achievements
            .completed
            .iter()
            .any(|goal| goal.id == "legend-hunter"));
        Ok(())
    }

    #[test]
    fn achievement_rewards_are_paid_on_claim_only() -> Result<()> {
        let (_dir, _backend, service) = service(3)?;
        let service = service.with_table(RarityTable::from_weights([(Rarity::Legendary, 1.0)]));
        service.spin()?;
        let coins_after_spin = service.profile()?.coins;
        assert_eq!(coins_after_spin, 0);

        let legend = service
            .achievements()?
            .into_iter()
            .find(|status| status.achievement.id == "legend-hunter")
            .expect("legend-hunter listed");
        assert!(legend.is_claimable());

        let claim = service.claim_achievement("legend-hunter")?;
        assert!(claim.success);
        assert!(service.profile()?.coins > coins_after_spin);
        assert!(!service.claim_achievement("legend-hunter")?.success);
        Ok(())
    }

    #[test]
    fn completion_bonus_needs_every_mission_of_the_kind() -> Result<()> {
        let (_dir, _backend, service) = service(3)?;
        service.spin()?;
        let claim = service.claim_completion_bonus(MissionKind::Daily)?;
        assert!(!claim.success);
        assert_eq!(service.profile()?.coins, 0);
        Ok(())
    }

    #[test]
    fn shop_purchases_check_funds() -> Result<()> {
        let (_dir, backend, service) = service(3)?;
        let item = service.shop_items()?.into_iter().next().expect("stocked shop");
        let refused = service.buy_item(item.id, 1)?;
        assert!(!refused.success);
        assert!(service.owned_items()?.is_empty());

        let pikachu = Catalog::builtin().get(25).expect("pikachu");
        for _ in 0..30 {
            backend.record_capture(service.player(), pikachu)?;
        }
        service.sell(25, 30)?;
        let bought = service.buy_item(item.id, 1)?;
        assert!(bought.success);
        assert_eq!(bought.balance, 3_000 - item.price);
        assert_eq!(
            service.owned_items()?,
            vec![OwnedItem {
                item_id: item.id,
                quantity: 1
            }]
        );
        Ok(())
    }

    #[test]
    fn spin_upgrade_raises_the_allowance() -> Result<()> {
        let (_dir, backend, service) = service(3)?;
        let mut seeded = PlayerProfile::new("ash", "Ash", 3);
        seeded.shards = spin_upgrade_price(0) + spin_upgrade_price(1) - 1;
        backend.store().save(&mut seeded)?;

        let receipt = service.buy_spin_upgrade()?;
        assert!(receipt.success);
        assert_eq!(receipt.balance, spin_upgrade_price(1) - 1);
        let refused = service.buy_spin_upgrade()?;
        assert!(!refused.success);
        assert_eq!(refused.balance, receipt.balance);

        let profile = service.profile()?;
        assert_eq!(profile.spins.base_free_spins, 4);
        assert_eq!(profile.spins.free_spins, 4);
        assert_eq!(profile.spin_upgrades(), 1);
        Ok(())
    }

    #[test]
    fn level_ups_feed_the_level_achievement() -> Result<()> {
        let (_dir, backend, service) = service(5)?;
        let service = service.with_capture_xp(100);
        service.spin()?;
        let profile = backend.load_profile(service.player())?;
        assert_eq!(profile.achievements["veteran"].progress, 1);
        Ok(())
    }

    #[test]
    fn starters_are_restricted() -> Result<()> {
        let (_dir, _backend, service) = service(5)?;
        let err = service.select_starter(25).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SpinError>(),
            Some(SpinError::InvalidStarter(25))
        ));
        let entry = service.select_starter(7)?;
        assert_eq!(entry.name, "squirtle");
        assert_eq!(service.profile()?.quantity(7), 1);
        Ok(())
    }

    #[test]
    fn pokedex_placement_checks_ownership() -> Result<()> {
        let (_dir, _backend, service) = service(5)?;
        let err = service.place_in_pokedex(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SpinError>(),
            Some(SpinError::NotOwned(1))
        ));
        service.select_starter(1)?;
        assert!(service.place_in_pokedex(1)?.success);
        let err = service.place_in_pokedex(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SpinError>(),
            Some(SpinError::AlreadyPlaced(1))
        ));
        assert!(service.place_in_pokedex(9_999).is_err());
        Ok(())
    }

    #[test]
    fn selling_advances_sell_progress() -> Result<()> {
        let (_dir, backend, service) = service(5)?;
        let pikachu = Catalog::builtin().get(25).expect("pikachu");
        for _ in 0..5 {
            backend.record_capture(service.player(), pikachu)?;
        }
        let outcome = service.sell(25, 5)?;
        assert!(outcome.receipt.success);
        assert_eq!(outcome.receipt.coins_earned, 500);
        assert!(outcome
            .progress
            .completed
            .iter()
            .any(|goal| goal.id == "daily-sell"));

        let claim = service.claim_mission("daily-sell")?;
        assert!(claim.success);
        let daily_done = service
            .missions()?
            .iter()
            .filter(|status| status.mission.kind == MissionKind::Daily && status.progress.completed)
            .count();
        assert_eq!(daily_done, 1);

        let progress = backend.load_profile(service.player())?.achievements["merchant"].progress;
        assert_eq!(progress, 5);
        Ok(())
    }

    #[test]
    fn simulation_does_not_touch_the_backend() -> Result<()> {
        let (_dir, _backend, service) = service(5)?;
        let histogram = service.simulate(2_000)?;
        assert_eq!(histogram.total(), 2_000);
        assert!(histogram.count(Rarity::Common) > histogram.count(Rarity::Rare));
        assert_eq!(service.profile()?.spins.free_spins, 5);
        Ok(())
    }
}
