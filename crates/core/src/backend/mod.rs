//! Persistence seam between the game rules and wherever player state lives.
//!
//! Every mutation the client performs maps onto one remote procedure or
//! table write. [`RpcBackend`] issues those calls against a hosted REST
//! endpoint; [`LocalBackend`] applies the same rules to JSON profiles on
//! disk so the game works offline.

mod local;
mod rpc;

pub use local::LocalBackend;
pub use rpc::RpcBackend;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::CatalogEntry,
    profile::{PlayerProfile, SpinState},
    progress::{
        AchievementGoal, AchievementStatus, ClaimResult, MissionCategory, MissionKind,
        MissionStatus, ProgressReport,
    },
    shop::{OwnedItem, PurchaseReceipt, ShopItem},
};

/// Who a backend call acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerContext {
    /// Stable identifier.
    pub user_id: String,
    /// Display name used when a profile is created.
    pub nickname: String,
}

impl PlayerContext {
    /// Context for `user_id` shown as `nickname`.
    pub fn new(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            nickname: nickname.into(),
        }
    }
}

/// Result of awarding experience.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceGain {
    /// Whether the award crossed a level boundary.
    pub level_up: bool,
    /// Level after the award.
    pub new_level: u32,
    /// Experience after the award.
    pub new_xp: u64,
}

/// Result of selling creatures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    /// Whether the sale went through.
    pub success: bool,
    /// Human readable outcome.
    #[serde(default)]
    pub message: String,
    /// Coins paid for the sale.
    #[serde(default, alias = "pokecoins_earned")]
    pub coins_earned: u64,
    /// Balance after the sale.
    #[serde(default, alias = "new_pokecoins")]
    pub new_coins: u64,
}

/// Plain success flag with a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcMessage {
    /// Whether the call succeeded.
    pub success: bool,
    /// Human readable outcome.
    #[serde(default)]
    pub message: String,
}

/// Storage operations used by the spin service.
///
/// Implementations must be shareable across threads; the terminal client
/// calls them from blocking worker tasks.
pub trait Backend: Send + Sync {
    /// Short label for logs and the status bar.
    fn name(&self) -> &'static str;

    /// Full snapshot of the player's state, creating it on first use.
    fn load_profile(&self, player: &PlayerContext) -> Result<PlayerProfile>;

    /// Restore free spins if a reset boundary passed since the last one.
    fn check_spin_reset(&self, player: &PlayerContext) -> Result<SpinState>;

    /// Spend one free spin and stamp the spin time. Returns spins left.
    fn consume_spin(&self, player: &PlayerContext) -> Result<u32>;

    /// Add one drawn creature to the inventory. Returns the new stack size.
    fn record_capture(&self, player: &PlayerContext, entry: &CatalogEntry) -> Result<u32>;

    /// Award experience.
    fn add_experience(&self, player: &PlayerContext, amount: u64) -> Result<ExperienceGain>;

    /// Advance missions counting `category`.
    fn update_mission_progress(
        &self,
        player: &PlayerContext,
        category: MissionCategory,
        increment: u32,
    ) -> Result<ProgressReport>;

    /// Advance achievements tracking `goal`.
    fn update_achievement_progress(
        &self,
        player: &PlayerContext,
        goal: AchievementGoal,
        increment: u32,
    ) -> Result<ProgressReport>;

    /// Missions joined with the player's progress.
    fn missions(&self, player: &PlayerContext) -> Result<Vec<MissionStatus>>;

    /// Claim the rewards of a completed mission.
    fn claim_mission_rewards(&self, player: &PlayerContext, mission_id: &str)
        -> Result<ClaimResult>;

    /// Pay the once-per-period bonus for completing every mission of `kind`.
    fn claim_completion_bonus(&self, player: &PlayerContext, kind: MissionKind)
        -> Result<ClaimResult>;

    /// Clear mission progress of one cadence.
    fn reset_missions(&self, player: &PlayerContext, kind: MissionKind) -> Result<()>;

    /// Achievements joined with the player's progress.
    fn achievements(&self, player: &PlayerContext) -> Result<Vec<AchievementStatus>>;

    /// Claim the earned rewards of an achievement.
    fn claim_achievement_rewards(
        &self,
        player: &PlayerContext,
        achievement_id: &str,
    ) -> Result<ClaimResult>;

    /// Sell `quantity` copies of a creature.
    fn sell_creature(
        &self,
        player: &PlayerContext,
        creature_id: u32,
        quantity: u32,
    ) -> Result<SaleReceipt>;

    /// Record the starter choice and grant the creature.
    fn select_starter(&self, player: &PlayerContext, entry: &CatalogEntry) -> Result<()>;

    /// Place a held creature in the pokedex.
    fn place_in_pokedex(&self, player: &PlayerContext, entry: &CatalogEntry)
        -> Result<RpcMessage>;

    /// Items on sale, ordered by name.
    fn shop_items(&self) -> Result<Vec<ShopItem>>;

    /// Shop items the player holds.
    fn owned_items(&self, player: &PlayerContext) -> Result<Vec<OwnedItem>>;

    /// Buy `quantity` units of an item with coins.
    fn buy_item(&self, player: &PlayerContext, item_id: u32, quantity: u32)
        -> Result<PurchaseReceipt>;

    /// Spend shards on one permanent extra free spin per reset. The price
    /// grows with every upgrade bought.
    fn buy_spin_upgrade(&self, player: &PlayerContext) -> Result<PurchaseReceipt>;
}
