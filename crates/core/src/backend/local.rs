use std::collections::HashMap;

use anyhow::{bail, Result};
use chrono::{Local, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{Backend, ExperienceGain, PlayerContext, RpcMessage, SaleReceipt};
use crate::{
    catalog::CatalogEntry,
    profile::{PlayerProfile, ProfileStore, SpinState},
    progress::{
        self, default_achievements, default_missions, AchievementGoal, AchievementStatus,
        ClaimResult, MissionCategory, MissionKind, MissionStatus, ProgressReport, Rewards,
    },
    schedule,
    shop::{self, default_items, OwnedItem, PurchaseReceipt, ShopItem, SPIN_UPGRADE_ITEM_ID},
};

/// Offline backend keeping one JSON profile per player.
///
/// Every mutation works on a copy of the cached profile and only replaces
/// the cache once the copy has been written to disk.
pub struct LocalBackend {
    store: ProfileStore,
    base_free_spins: u32,
    missions: Vec<progress::Mission>,
    achievements: Vec<progress::Achievement>,
    items: Vec<ShopItem>,
    cache: RwLock<HashMap<String, PlayerProfile>>,
}

impl LocalBackend {
    /// Backend over `store` with the default missions, achievements and
    /// shop stock.
    pub fn new(store: ProfileStore, base_free_spins: u32) -> Self {
        Self {
            store,
            base_free_spins,
            missions: default_missions(),
            achievements: default_achievements(),
            items: default_items(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Profile store backing this backend.
    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    fn fresh_profile(&self, player: &PlayerContext) -> Result<PlayerProfile> {
        match self.store.load(&player.user_id)? {
            Some(profile) => Ok(profile),
            None => {
                info!(user = %player.user_id, "creating local profile");
                Ok(PlayerProfile::new(
                    player.user_id.clone(),
                    player.nickname.clone(),
                    self.base_free_spins,
                ))
            }
        }
    }

    fn mutate<T>(
        &self,
        player: &PlayerContext,
        apply: impl FnOnce(&mut PlayerProfile) -> Result<T>,
    ) -> Result<T> {
        let mut cache = self.cache.write();
        let mut profile = match cache.get(&player.user_id) {
            Some(profile) => profile.clone(),
            None => self.fresh_profile(player)?,
        };
        let value = apply(&mut profile)?;
        self.store.save(&mut profile)?;
        cache.insert(player.user_id.clone(), profile);
        Ok(value)
    }

    fn roll_mission_resets(&self, profile: &mut PlayerProfile) {
        for kind in profile.mission_resets.due(Utc::now()) {
            debug!(kind = kind.as_str(), "resetting local missions");
            progress::reset_missions(&mut profile.missions, &self.missions, kind);
        }
    }

    fn grant(profile: &mut PlayerProfile, rewards: &Rewards) {
        profile.credit(rewards);
        if rewards.xp > 0 {
            profile.gain_experience(rewards.xp);
        }
    }

    fn pay(profile: &mut PlayerProfile, claim: ClaimResult) -> ClaimResult {
        if claim.success {
            Self::grant(profile, &claim.rewards);
        }
        claim
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn load_profile(&self, player: &PlayerContext) -> Result<PlayerProfile> {
        if let Some(profile) = self.cache.read().get(&player.user_id) {
            return Ok(profile.clone());
        }
        self.mutate(player, |profile| Ok(profile.clone()))
    }

    fn check_spin_reset(&self, player: &PlayerContext) -> Result<SpinState> {
        self.mutate(player, |profile| {
            if let Some(last) = profile.spins.last_spin_reset {
                let last_local = last.with_timezone(&Local).naive_local();
                if schedule::spin_reset_due(last_local, Local::now().naive_local()) {
                    info!(
                        user = %profile.user_id,
                        spins = profile.spins.base_free_spins,
                        "free spins restored"
                    );
                    profile.spins.free_spins = profile.spins.base_free_spins;
                    profile.spins.last_spin_reset = Some(Utc::now());
                }
            }
            Ok(profile.spins.clone())
        })
    }

    fn consume_spin(&self, player: &PlayerContext) -> Result<u32> {
        self.mutate(player, |profile| {
            if profile.spins.free_spins == 0 {
                bail!("no free spins left");
            }
            profile.spins.free_spins -= 1;
            profile.spins.last_spin_reset = Some(Utc::now());
            Ok(profile.spins.free_spins)
        })
    }

    fn record_capture(&self, player: &PlayerContext, entry: &CatalogEntry) -> Result<u32> {
        self.mutate(player, |profile| Ok(profile.add_creature(entry)))
    }

    fn add_experience(&self, player: &PlayerContext, amount: u64) -> Result<ExperienceGain> {
        self.mutate(player, |profile| {
            let level_up = profile.gain_experience(amount);
            Ok(ExperienceGain {
                level_up,
                new_level: profile.level,
                new_xp: profile.experience_points,
            })
        })
    }

    fn update_mission_progress(
        &self,
        player: &PlayerContext,
        category: MissionCategory,
        increment: u32,
    ) -> Result<ProgressReport> {
        self.mutate(player, |profile| {
            self.roll_mission_resets(profile);
            Ok(progress::apply_mission_progress(
                &mut profile.missions,
                &self.missions,
                category,
                increment,
                Utc::now(),
            ))
        })
    }

    fn update_achievement_progress(
        &self,
        player: &PlayerContext,
        goal: AchievementGoal,
        increment: u32,
    ) -> Result<ProgressReport> {
        self.mutate(player, |profile| {
            Ok(progress::apply_achievement_progress(
                &mut profile.achievements,
                &self.achievements,
                goal,
                increment,
                Utc::now(),
            ))
        })
    }

    fn missions(&self, player: &PlayerContext) -> Result<Vec<MissionStatus>> {
        self.mutate(player, |profile| {
            self.roll_mission_resets(profile);
            Ok(self
                .missions
                .iter()
                .map(|mission| MissionStatus {
                    mission: mission.clone(),
                    progress: profile.missions.get(&mission.id).cloned().unwrap_or_default(),
                })
                .collect())
        })
    }

    fn claim_mission_rewards(
        &self,
        player: &PlayerContext,
        mission_id: &str,
    ) -> Result<ClaimResult> {
        self.mutate(player, |profile| {
            self.roll_mission_resets(profile);
            let claim = progress::claim_mission(&mut profile.missions, &self.missions, mission_id);
            Ok(Self::pay(profile, claim))
        })
    }

    fn claim_completion_bonus(
        &self,
        player: &PlayerContext,
        kind: MissionKind,
    ) -> Result<ClaimResult> {
        self.mutate(player, |profile| {
            self.roll_mission_resets(profile);
            let claim = progress::claim_completion_bonus(
                &mut profile.missions,
                &self.missions,
                kind,
                Utc::now(),
            );
            Ok(Self::pay(profile, claim))
        })
    }

    fn reset_missions(&self, player: &PlayerContext, kind: MissionKind) -> Result<()> {
        self.mutate(player, |profile| {
            progress::reset_missions(&mut profile.missions, &self.missions, kind);
            Ok(())
        })
    }

    fn achievements(&self, player: &PlayerContext) -> Result<Vec<AchievementStatus>> {
        let profile = self.load_profile(player)?;
        Ok(self
            .achievements
            .iter()
            .map(|achievement| AchievementStatus {
                achievement: achievement.clone(),
                progress: profile
                    .achievements
                    .get(&achievement.id)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect())
    }

    fn claim_achievement_rewards(
        &self,
        player: &PlayerContext,
        achievement_id: &str,
    ) -> Result<ClaimResult> {
        self.mutate(player, |profile| {
            let claim = progress::claim_achievement(
                &mut profile.achievements,
                &self.achievements,
                achievement_id,
            );
            Ok(Self::pay(profile, claim))
        })
    }

    fn sell_creature(
        &self,
        player: &PlayerContext,
        creature_id: u32,
        quantity: u32,
    ) -> Result<SaleReceipt> {
        self.mutate(player, |profile| {
            let held = profile.quantity(creature_id);
            if quantity == 0 || held < quantity {
                return Ok(SaleReceipt {
                    success: false,
                    message: format!("only {held} held"),
                    coins_earned: 0,
                    new_coins: profile.coins,
                });
            }
            let removed = profile.remove_creature(creature_id, quantity)?;
            let earned = removed.rarity.sell_value() * u64::from(quantity);
            profile.coins += earned;
            Ok(SaleReceipt {
                success: true,
                message: format!("sold {quantity} {} for {earned} coins", removed.name),
                coins_earned: earned,
                new_coins: profile.coins,
            })
        })
    }

    fn select_starter(&self, player: &PlayerContext, entry: &CatalogEntry) -> Result<()> {
        self.mutate(player, |profile| {
            if let Some(existing) = &profile.starter {
                bail!("starter already chosen: {existing}");
            }
            profile.starter = Some(entry.name.clone());
            profile.add_creature(entry);
            Ok(())
        })
    }

    fn place_in_pokedex(
        &self,
        player: &PlayerContext,
        entry: &CatalogEntry,
    ) -> Result<RpcMessage> {
        self.mutate(player, |profile| {
            if profile.is_placed(entry.id) {
                return Ok(RpcMessage {
                    success: false,
                    message: format!("{} is already in the pokedex", entry.display_name()),
                });
            }
            if profile.quantity(entry.id) == 0 {
                return Ok(RpcMessage {
                    success: false,
                    message: format!("no {} to place", entry.display_name()),
                });
            }
            profile.remove_creature(entry.id, 1)?;
            profile.pokedex.insert(entry.id, Utc::now());
            Ok(RpcMessage {
                success: true,
                message: format!("{} placed in the pokedex", entry.display_name()),
            })
        })
    }

    fn shop_items(&self) -> Result<Vec<ShopItem>> {
        let mut items = self.items.clone();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn owned_items(&self, player: &PlayerContext) -> Result<Vec<OwnedItem>> {
        let profile = self.load_profile(player)?;
        Ok(profile
            .items
            .iter()
            .filter(|(_, quantity)| **quantity > 0)
            .map(|(item_id, quantity)| OwnedItem {
                item_id: *item_id,
                quantity: *quantity,
            })
            .collect())
    }

    fn buy_item(
        &self,
        player: &PlayerContext,
        item_id: u32,
        quantity: u32,
    ) -> Result<PurchaseReceipt> {
        self.mutate(player, |profile| {
            let Some(item) = shop::find_item(&self.items, item_id) else {
                return Ok(PurchaseReceipt::refused(
                    format!("unknown item {item_id}"),
                    profile.coins,
                ));
            };
            if quantity == 0 {
                return Ok(PurchaseReceipt::refused("nothing to buy", profile.coins));
            }
            let cost = item.price.saturating_mul(u64::from(quantity));
            if profile.coins < cost {
                return Ok(PurchaseReceipt::refused(
                    format!("{} costs {cost} coins, {} held", item.name, profile.coins),
                    profile.coins,
                ));
            }
            profile.coins -= cost;
            *profile.items.entry(item.id).or_insert(0) += quantity;
            info!(item = %item.name, quantity, cost, "item bought");
            Ok(PurchaseReceipt {
                success: true,
                message: format!("bought {quantity} {}", item.name),
                balance: profile.coins,
            })
        })
    }

    fn buy_spin_upgrade(&self, player: &PlayerContext) -> Result<PurchaseReceipt> {
        self.mutate(player, |profile| {
            let price = shop::spin_upgrade_price(profile.spin_upgrades());
            if profile.shards < price {
                return Ok(PurchaseReceipt::refused(
                    format!("the upgrade costs {price} shards, {} held", profile.shards),
                    profile.shards,
                ));
            }
            profile.shards -= price;
            *profile.items.entry(SPIN_UPGRADE_ITEM_ID).or_insert(0) += 1;
            profile.spins.base_free_spins += 1;
            profile.spins.free_spins += 1;
            info!(
                price,
                base_free_spins = profile.spins.base_free_spins,
                "base spins upgraded"
            );
            Ok(PurchaseReceipt {
                success: true,
                message: format!(
                    "base spins raised to {}",
                    profile.spins.base_free_spins
                ),
                balance: profile.shards,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use tempfile::tempdir;

    fn backend(dir: &std::path::Path) -> LocalBackend {
        LocalBackend::new(ProfileStore::new(dir.join("profiles")), 3)
    }

    fn player() -> PlayerContext {
        PlayerContext::new("ash", "Ash")
    }

    #[test]
    fn new_profile_is_created_and_persisted() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        let profile = backend.load_profile(&player())?;
        assert_eq!(profile.nickname, "Ash");
        assert_eq!(profile.spins.free_spins, 3);
        assert!(backend.store().load("ash")?.is_some());
        Ok(())
    }

    #[test]
    fn spins_run_out() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        assert_eq!(backend.consume_spin(&player())?, 2);
        assert_eq!(backend.consume_spin(&player())?, 1);
        assert_eq!(backend.consume_spin(&player())?, 0);
        assert!(backend.consume_spin(&player()).is_err());
        assert_eq!(backend.load_profile(&player())?.spins.free_spins, 0);
        Ok(())
    }

    #[test]
    fn state_survives_a_new_backend() -> Result<()> {
        let dir = tempdir()?;
        let pikachu = Catalog::builtin().get(25).expect("pikachu");
        {
            let backend = backend(dir.path());
            backend.record_capture(&player(), pikachu)?;
            backend.add_experience(&player(), 120)?;
        }
        let profile = backend(dir.path()).load_profile(&player())?;
        assert_eq!(profile.quantity(25), 1);
        assert_eq!(profile.level, 2);
        Ok(())
    }

    #[test]
    fn selling_pays_by_rarity() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        let pikachu = Catalog::builtin().get(25).expect("pikachu");
        backend.record_capture(&player(), pikachu)?;
        backend.record_capture(&player(), pikachu)?;

        let refused = backend.sell_creature(&player(), 25, 3)?;
        assert!(!refused.success);

        let receipt = backend.sell_creature(&player(), 25, 2)?;
        assert!(receipt.success);
        assert_eq!(receipt.coins_earned, 200);
        assert_eq!(receipt.new_coins, 200);
        assert_eq!(backend.load_profile(&player())?.quantity(25), 0);
        Ok(())
    }

    #[test]
    fn starter_can_only_be_chosen_once() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        let charmander = Catalog::builtin().get(4).expect("charmander");
        backend.select_starter(&player(), charmander)?;
        assert!(backend.select_starter(&player(), charmander).is_err());
        let profile = backend.load_profile(&player())?;
        assert_eq!(profile.starter.as_deref(), Some("charmander"));
        assert_eq!(profile.quantity(4), 1);
        Ok(())
    }

    #[test]
    fn placing_consumes_a_copy_once() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        let mew = Catalog::builtin().get(151).expect("mew");

        assert!(!backend.place_in_pokedex(&player(), mew)?.success);
        backend.record_capture(&player(), mew)?;
        backend.record_capture(&player(), mew)?;
        assert!(backend.place_in_pokedex(&player(), mew)?.success);
        assert!(!backend.place_in_pokedex(&player(), mew)?.success);

        let profile = backend.load_profile(&player())?;
        assert!(profile.is_placed(151));
        assert_eq!(profile.quantity(151), 1);
        Ok(())
    }

    #[test]
    fn claimed_missions_credit_the_profile() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        let report = backend.update_mission_progress(&player(), MissionCategory::Sell, 5)?;
        assert_eq!(report.completed.len(), 1);

        let statuses = backend.missions(&player())?;
        let claimable: Vec<_> = statuses
            .iter()
            .filter(|status| status.is_claimable())
            .map(|status| status.mission.id.as_str())
            .collect();
        assert_eq!(claimable, vec!["daily-sell"]);

        let claim = backend.claim_mission_rewards(&player(), "daily-sell")?;
        assert!(claim.success);
        let profile = backend.load_profile(&player())?;
        assert_eq!(profile.coins, 50);
        assert_eq!(profile.experience_points, 25);

        backend.reset_missions(&player(), MissionKind::Daily)?;
        let statuses = backend.missions(&player())?;
        assert!(statuses.iter().all(|status| !status.is_claimable()));
        Ok(())
    }

    #[test]
    fn achievement_rewards_wait_for_a_claim() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        let report =
            backend.update_achievement_progress(&player(), AchievementGoal::LegendaryCapture, 1)?;
        assert_eq!(report.completed.len(), 1);
        let profile = backend.load_profile(&player())?;
        assert_eq!(profile.coins, 0);
        assert_eq!(profile.spins.base_free_spins, 3);

        let claimable: Vec<_> = backend
            .achievements(&player())?
            .into_iter()
            .filter(|status| status.is_claimable())
            .map(|status| status.achievement.id)
            .collect();
        assert_eq!(claimable, vec!["legend-hunter".to_string()]);

        let claim = backend.claim_achievement_rewards(&player(), "legend-hunter")?;
        assert!(claim.success);
        let profile = backend.load_profile(&player())?;
        assert_eq!(profile.coins, 1_000);
        assert_eq!(profile.shards, 5);
        assert_eq!(profile.spins.base_free_spins, 5);
        assert_eq!(profile.experience_points, 500);
        assert_eq!(profile.level, 3);

        assert!(!backend.claim_achievement_rewards(&player(), "legend-hunter")?.success);
        assert_eq!(backend.load_profile(&player())?.coins, 1_000);
        Ok(())
    }

    #[test]
    fn daily_bonus_pays_once_after_every_daily_mission() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        backend.update_mission_progress(&player(), MissionCategory::Spin, 10)?;
        backend.update_mission_progress(&player(), MissionCategory::CatchRare, 1)?;
        assert!(!backend.claim_completion_bonus(&player(), MissionKind::Daily)?.success);

        backend.update_mission_progress(&player(), MissionCategory::Sell, 5)?;
        let claim = backend.claim_completion_bonus(&player(), MissionKind::Daily)?;
        assert!(claim.success);
        let profile = backend.load_profile(&player())?;
        assert_eq!(profile.coins, 15);
        assert_eq!(profile.shards, 15);
        assert_eq!(profile.experience_points, 100);

        assert!(!backend.claim_completion_bonus(&player(), MissionKind::Daily)?.success);
        assert!(!backend.claim_completion_bonus(&player(), MissionKind::Weekly)?.success);
        let statuses = backend.missions(&player())?;
        assert!(progress::bonus_claimed(&statuses, MissionKind::Daily, Utc::now()));
        Ok(())
    }

    #[test]
    fn buying_items_spends_coins() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        let items = backend.shop_items()?;
        assert_eq!(items[0].name, "Great Ball");

        let broke = backend.buy_item(&player(), 1, 1)?;
        assert!(!broke.success);
        assert_eq!(broke.balance, 0);

        let pikachu = Catalog::builtin().get(25).expect("pikachu");
        for _ in 0..3 {
            backend.record_capture(&player(), pikachu)?;
        }
        backend.sell_creature(&player(), 25, 3)?;

        assert!(!backend.buy_item(&player(), 1, 4)?.success);
        assert!(!backend.buy_item(&player(), 42, 1)?.success);
        let receipt = backend.buy_item(&player(), 1, 2)?;
        assert!(receipt.success);
        assert_eq!(receipt.balance, 100);
        assert_eq!(
            backend.owned_items(&player())?,
            vec![OwnedItem {
                item_id: 1,
                quantity: 2
            }]
        );
        Ok(())
    }

    #[test]
    fn spin_upgrades_cost_more_each_time() -> Result<()> {
        let dir = tempdir()?;
        let backend = backend(dir.path());
        let refused = backend.buy_spin_upgrade(&player())?;
        assert!(!refused.success);
        assert_eq!(backend.load_profile(&player())?.spins.base_free_spins, 3);

        backend.mutate(&player(), |profile| {
            profile.shards = 70;
            Ok(())
        })?;
        let first = backend.buy_spin_upgrade(&player())?;
        assert!(first.success);
        assert_eq!(first.balance, 45);
        let second = backend.buy_spin_upgrade(&player())?;
        assert!(second.success);
        assert_eq!(second.balance, 10);
        assert!(!backend.buy_spin_upgrade(&player())?.success);

        let profile = backend.load_profile(&player())?;
        assert_eq!(profile.spins.base_free_spins, 5);
        assert_eq!(profile.spin_upgrades(), 2);
        Ok(())
    }
}
