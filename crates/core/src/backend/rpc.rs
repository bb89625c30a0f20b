use std::{collections::BTreeMap, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Backend, ExperienceGain, PlayerContext, RpcMessage, SaleReceipt};
use crate::{
    catalog::CatalogEntry,
    config::RemoteConfig,
    profile::{InventoryItem, PlayerProfile, SpinState},
    progress::{
        Achievement, AchievementCategory, AchievementGoal, AchievementProgress,
        AchievementReward, AchievementStatus, ClaimResult, CompletedGoal, Mission,
        MissionCategory, MissionKind, MissionProgress, MissionStatus, ProgressReport, Rewards,
    },
    rarity::Rarity,
    shop::{self, OwnedItem, PurchaseReceipt, ShopItem, SPIN_UPGRADE_ITEM_ID},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Backend talking to a hosted PostgREST-style API.
///
/// Stored procedures are invoked at `/rest/v1/rpc/{name}` and return a
/// one-row array; tables are read and written at `/rest/v1/{table}` with
/// `column=eq.value` filters.
pub struct RpcBackend {
    base_url: String,
    api_key: String,
    bearer: String,
    http: Client,
}

impl RpcBackend {
    /// Build a client from the `[remote]` configuration section.
    pub fn new(remote: &RemoteConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: remote.url.trim_end_matches('/').to_string(),
            api_key: remote.api_key.clone(),
            bearer: remote
                .access_token
                .clone()
                .unwrap_or_else(|| remote.api_key.clone()),
            http,
        })
    }

    fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{procedure}", self.base_url)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
    }

    fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .unwrap_or_else(|_| "<unavailable body>".to_string());
        Err(anyhow!("backend responded with {status} when calling {what}: {body}"))
    }

    /// Invoke a stored procedure and decode its rows.
    fn call<T: DeserializeOwned>(&self, procedure: &str, args: Value) -> Result<Vec<T>> {
        debug!(procedure, "rpc call");
        let response = self
            .authorize(self.http.post(self.rpc_url(procedure)))
            .json(&args)
            .send()
            .with_context(|| format!("request to {procedure} failed"))?;
        let response = Self::check(response, procedure)?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let text = response
            .text()
            .with_context(|| format!("failed to read {procedure} response"))?;
        decode_rows(&text).with_context(|| format!("invalid {procedure} payload"))
    }

    fn call_one<T: DeserializeOwned>(&self, procedure: &str, args: Value) -> Result<T> {
        self.call(procedure, args)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("{procedure} returned no rows"))
    }

    fn select<T: DeserializeOwned>(&self, table: &str, filters: &[(&str, String)]) -> Result<Vec<T>> {
        let response = self
            .authorize(self.http.get(self.table_url(table)))
            .query(&[("select", "*")])
            .query(filters)
            .send()
            .with_context(|| format!("request to {table} failed"))?;
        let response = Self::check(response, table)?;
        response
            .json()
            .with_context(|| format!("invalid {table} rows"))
    }

    fn patch(&self, table: &str, filters: &[(&str, String)], body: Value) -> Result<()> {
        let response = self
            .authorize(self.http.patch(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .query(filters)
            .json(&body)
            .send()
            .with_context(|| format!("update of {table} failed"))?;
        Self::check(response, table).map(|_| ())
    }

    fn insert(&self, table: &str, body: Value) -> Result<()> {
        let response = self
            .authorize(self.http.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .with_context(|| format!("insert into {table} failed"))?;
        Self::check(response, table).map(|_| ())
    }

    fn claim(&self, procedure: &str, args: Value) -> Result<ClaimResult> {
        let row: ClaimRow = self.call_one(procedure, args)?;
        Ok(ClaimResult {
            success: row.success,
            message: row.message,
            rewards: row.rewards.unwrap_or_default(),
        })
    }

    fn profile_row(&self, player: &PlayerContext) -> Result<ProfileRow> {
        self.select::<ProfileRow>("profiles", &[user_filter(player)])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no profile for {}", player.user_id))
    }

    fn spin_row(&self, player: &PlayerContext) -> Result<SpinRow> {
        self.select::<SpinRow>("user_spins", &[user_filter(player)])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no spin record for {}", player.user_id))
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn user_filter(player: &PlayerContext) -> (&'static str, String) {
    ("user_id", eq(&player.user_id))
}

/// Procedures return either a row array or a bare object.
fn decode_rows<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    user_id: String,
    nickname: String,
    #[serde(default)]
    experience_points: u64,
    #[serde(default)]
    level: u32,
    #[serde(default)]
    pokecoins: u64,
    #[serde(default)]
    pokeshards: u64,
    #[serde(default)]
    starter_pokemon: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SpinRow {
    free_spins: u32,
    base_free_spins: u32,
    last_spin_reset: Option<DateTime<Utc>>,
}

impl From<SpinRow> for SpinState {
    fn from(row: SpinRow) -> Self {
        SpinState {
            free_spins: row.free_spins,
            base_free_spins: row.base_free_spins,
            last_spin_reset: row.last_spin_reset,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct InventoryRow {
    pokemon_id: u32,
    pokemon_name: String,
    rarity: Rarity,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct PokedexRow {
    pokemon_id: u32,
    placed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct UserMissionRow {
    mission_id: String,
    #[serde(flatten)]
    progress: MissionProgress,
}

#[derive(Debug, Deserialize)]
struct MissionUpdateRow {
    #[serde(default)]
    missions_completed: Option<Vec<CompletedGoal>>,
    #[serde(default)]
    rewards_earned: Option<Rewards>,
}

#[derive(Debug, Deserialize)]
struct AchievementUpdateRow {
    #[serde(default)]
    achievements_completed: Option<Vec<CompletedGoal>>,
    #[serde(default)]
    rewards_earned: Option<Rewards>,
}

#[derive(Debug, Deserialize)]
struct AchievementRow {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    category: AchievementCategory,
    goal_type: String,
    goal_value: u32,
    #[serde(default)]
    increment_step: Option<u32>,
    #[serde(default)]
    base_reward_coins: u64,
    #[serde(default)]
    base_reward_xp: u64,
    #[serde(default)]
    base_reward_shards: u64,
    #[serde(default)]
    base_reward_spins: u32,
    #[serde(default)]
    reward_increment: Option<u64>,
}

impl AchievementRow {
    fn into_achievement(self) -> Option<Achievement> {
        let Some(goal_type) = AchievementGoal::from_label(&self.goal_type) else {
            debug!(id = %self.id, goal_type = %self.goal_type, "skipping untracked achievement");
            return None;
        };
        Some(Achievement {
            id: self.id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            category: self.category,
            goal_type,
            goal_value: self.goal_value,
            increment_step: self.increment_step.unwrap_or(0),
            reward: AchievementReward {
                base_reward_coins: self.base_reward_coins,
                base_reward_xp: self.base_reward_xp,
                base_reward_shards: self.base_reward_shards,
                base_reward_spins: self.base_reward_spins,
                reward_increment: self.reward_increment.unwrap_or(0),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserAchievementRow {
    achievement_id: String,
    #[serde(default)]
    progress: u32,
    #[serde(default)]
    next_goal_value: u32,
    #[serde(default)]
    completed_count: u32,
    #[serde(default)]
    is_completed: bool,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    rewards_claimed: bool,
}

impl From<UserAchievementRow> for AchievementProgress {
    fn from(row: UserAchievementRow) -> Self {
        AchievementProgress {
            progress: row.progress,
            next_goal_value: row.next_goal_value,
            completed_count: row.completed_count,
            is_completed: row.is_completed,
            completed_at: row.completed_at,
            rewards_claimed: row.rewards_claimed,
            unclaimed: Rewards::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaimRow {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    rewards: Option<Rewards>,
}

fn assemble_profile(
    row: ProfileRow,
    spins: SpinRow,
    inventory: Vec<InventoryRow>,
    pokedex: Vec<PokedexRow>,
) -> PlayerProfile {
    let mut profile = PlayerProfile::new(row.user_id, row.nickname, spins.base_free_spins);
    profile.experience_points = row.experience_points;
    profile.level = row.level.max(1);
    profile.coins = row.pokecoins;
    profile.shards = row.pokeshards;
    profile.starter = row.starter_pokemon;
    profile.spins = spins.into();
    profile.inventory = inventory
        .into_iter()
        .filter(|item| item.quantity > 0)
        .map(|item| {
            (
                item.pokemon_id,
                InventoryItem {
                    creature_id: item.pokemon_id,
                    name: item.pokemon_name,
                    rarity: item.rarity,
                    quantity: item.quantity,
                },
            )
        })
        .collect();
    profile.pokedex = pokedex
        .into_iter()
        .map(|card| (card.pokemon_id, card.placed_at))
        .collect();
    if let Some(updated_at) = row.updated_at {
        profile.updated_at = updated_at;
    }
    profile
}

fn join_missions(missions: Vec<Mission>, rows: Vec<UserMissionRow>) -> Vec<MissionStatus> {
    let mut progress: BTreeMap<String, MissionProgress> = rows
        .into_iter()
        .map(|row| (row.mission_id, row.progress))
        .collect();
    missions
        .into_iter()
        .map(|mission| MissionStatus {
            progress: progress.remove(&mission.id).unwrap_or_default(),
            mission,
        })
        .collect()
}

fn join_achievements(
    rows: Vec<AchievementRow>,
    user_rows: Vec<UserAchievementRow>,
) -> Vec<AchievementStatus> {
    let mut progress: BTreeMap<String, AchievementProgress> = user_rows
        .into_iter()
        .map(|row| (row.achievement_id.clone(), row.into()))
        .collect();
    rows.into_iter()
        .filter_map(AchievementRow::into_achievement)
        .map(|achievement| AchievementStatus {
            progress: progress.remove(&achievement.id).unwrap_or_default(),
            achievement,
        })
        .collect()
}

impl Backend for RpcBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn load_profile(&self, player: &PlayerContext) -> Result<PlayerProfile> {
        let filter = [user_filter(player)];
        let row = self.profile_row(player)?;
        let spins = self.spin_row(player)?;
        let inventory = self.select("pokemon_inventory", &filter)?;
        let pokedex = self.select("pokedex_cards", &filter)?;
        Ok(assemble_profile(row, spins, inventory, pokedex))
    }

    fn check_spin_reset(&self, player: &PlayerContext) -> Result<SpinState> {
        let _: Vec<Value> = self.call(
            "check_and_reset_free_spins",
            json!({ "p_user_id": player.user_id }),
        )?;
        Ok(self.spin_row(player)?.into())
    }

    fn consume_spin(&self, player: &PlayerContext) -> Result<u32> {
        let spins = self.spin_row(player)?;
        if spins.free_spins == 0 {
            bail!("no free spins left");
        }
        let left = spins.free_spins - 1;
        self.patch(
            "user_spins",
            &[user_filter(player)],
            json!({ "free_spins": left, "last_spin_reset": Utc::now() }),
        )?;
        Ok(left)
    }

    fn record_capture(&self, player: &PlayerContext, entry: &CatalogEntry) -> Result<u32> {
        let filters = [user_filter(player), ("pokemon_id", eq(entry.id))];
        let existing: Vec<InventoryRow> = self.select("pokemon_inventory", &filters)?;
        match existing.into_iter().next() {
            Some(row) => {
                let quantity = row.quantity + 1;
                self.patch("pokemon_inventory", &filters, json!({ "quantity": quantity }))?;
                Ok(quantity)
            }
            None => {
                self.insert("pokemon_inventory", inventory_insert(player, entry))?;
                Ok(1)
            }
        }
    }

    fn add_experience(&self, player: &PlayerContext, amount: u64) -> Result<ExperienceGain> {
        self.call_one(
            "add_experience",
            json!({ "p_user_id": player.user_id, "p_xp_amount": amount }),
        )
    }

    fn update_mission_progress(
        &self,
        player: &PlayerContext,
        category: MissionCategory,
        increment: u32,
    ) -> Result<ProgressReport> {
        let rows: Vec<MissionUpdateRow> = self.call(
            "update_mission_progress",
            json!({
                "p_user_id": player.user_id,
                "p_category": category.as_str(),
                "p_increment": increment,
            }),
        )?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| ProgressReport {
                completed: row.missions_completed.unwrap_or_default(),
                rewards: row.rewards_earned.unwrap_or_default(),
            })
            .unwrap_or_default())
    }

    fn update_achievement_progress(
        &self,
        player: &PlayerContext,
        goal: AchievementGoal,
        increment: u32,
    ) -> Result<ProgressReport> {
        let rows: Vec<AchievementUpdateRow> = self.call(
            "update_achievement_progress",
            json!({
                "p_user_id": player.user_id,
                "p_goal_type": goal.as_str(),
                "p_increment": increment,
            }),
        )?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| ProgressReport {
                completed: row.achievements_completed.unwrap_or_default(),
                rewards: row.rewards_earned.unwrap_or_default(),
            })
            .unwrap_or_default())
    }

    fn missions(&self, player: &PlayerContext) -> Result<Vec<MissionStatus>> {
        let missions: Vec<Mission> = self.select("missions", &[])?;
        let rows: Vec<UserMissionRow> = self.select("user_missions", &[user_filter(player)])?;
        Ok(join_missions(missions, rows))
    }

    fn claim_mission_rewards(
        &self,
        player: &PlayerContext,
        mission_id: &str,
    ) -> Result<ClaimResult> {
        self.claim(
            "claim_mission_rewards",
            json!({ "p_user_id": player.user_id, "p_mission_id": mission_id }),
        )
    }

    fn claim_completion_bonus(
        &self,
        player: &PlayerContext,
        kind: MissionKind,
    ) -> Result<ClaimResult> {
        let procedure = match kind {
            MissionKind::Daily => "claim_daily_completion_bonus",
            MissionKind::Weekly => "claim_weekly_completion_bonus",
        };
        self.claim(procedure, json!({ "p_user_id": player.user_id }))
    }

    fn reset_missions(&self, _player: &PlayerContext, kind: MissionKind) -> Result<()> {
        let procedure = match kind {
            MissionKind::Daily => "reset_daily_missions",
            MissionKind::Weekly => "reset_weekly_missions",
        };
        let _: Vec<Value> = self.call(procedure, json!({}))?;
        Ok(())
    }

    fn achievements(&self, player: &PlayerContext) -> Result<Vec<AchievementStatus>> {
        let rows: Vec<AchievementRow> =
            self.select("achievements", &[("order", "category.asc".to_string())])?;
        let user_rows: Vec<UserAchievementRow> =
            self.select("user_achievements", &[user_filter(player)])?;
        Ok(join_achievements(rows, user_rows))
    }

    fn claim_achievement_rewards(
        &self,
        player: &PlayerContext,
        achievement_id: &str,
    ) -> Result<ClaimResult> {
        self.claim(
            "claim_achievement_rewards",
            json!({ "p_user_id": player.user_id, "p_achievement_id": achievement_id }),
        )
    }

    fn sell_creature(
        &self,
        player: &PlayerContext,
        creature_id: u32,
        quantity: u32,
    ) -> Result<SaleReceipt> {
        self.call_one(
            "sell_pokemon",
            json!({
                "p_user_id": player.user_id,
                "p_pokemon_id": creature_id,
                "p_quantity": quantity,
            }),
        )
    }

    fn select_starter(&self, player: &PlayerContext, entry: &CatalogEntry) -> Result<()> {
        self.patch(
            "profiles",
            &[user_filter(player)],
            json!({ "starter_pokemon": entry.name }),
        )?;
        if let Err(err) = self.insert("pokemon_inventory", inventory_insert(player, entry)) {
            warn!("starter recorded but inventory insert failed: {err:#}");
            return Err(err);
        }
        Ok(())
    }

    fn place_in_pokedex(
        &self,
        player: &PlayerContext,
        entry: &CatalogEntry,
    ) -> Result<RpcMessage> {
        self.call_one(
            "place_pokemon_in_pokedex",
            json!({
                "p_user_id": player.user_id,
                "p_pokemon_id": entry.id,
                "p_pokemon_name": entry.name,
            }),
        )
    }

    fn shop_items(&self) -> Result<Vec<ShopItem>> {
        self.select("items", &[("order", "name".to_string())])
    }

    fn owned_items(&self, player: &PlayerContext) -> Result<Vec<OwnedItem>> {
        self.select(
            "user_items",
            &[user_filter(player), ("quantity", "gt.0".to_string())],
        )
    }

    fn buy_item(
        &self,
        player: &PlayerContext,
        item_id: u32,
        quantity: u32,
    ) -> Result<PurchaseReceipt> {
        self.call_one(
            "buy_item",
            json!({
                "p_user_id": player.user_id,
                "p_item_id": item_id,
                "p_quantity": quantity,
            }),
        )
    }

    fn buy_spin_upgrade(&self, player: &PlayerContext) -> Result<PurchaseReceipt> {
        let shards = self.profile_row(player)?.pokeshards;
        let item_filters = [user_filter(player), ("item_id", eq(SPIN_UPGRADE_ITEM_ID))];
        let existing = self
            .select::<OwnedItem>("user_items", &item_filters)?
            .into_iter()
            .next();
        let purchases = existing.map(|row| row.quantity).unwrap_or(0);
        let price = shop::spin_upgrade_price(purchases);
        if shards < price {
            return Ok(PurchaseReceipt::refused(
                format!("the upgrade costs {price} shards, {shards} held"),
                shards,
            ));
        }

        if existing.is_some() {
            self.patch(
                "user_items",
                &item_filters,
                json!({ "quantity": purchases + 1 }),
            )?;
        } else {
            self.insert(
                "user_items",
                json!({
                    "user_id": player.user_id,
                    "item_id": SPIN_UPGRADE_ITEM_ID,
                    "quantity": 1,
                }),
            )?;
        }

        let raised = self.call_one::<bool>(
            "increase_base_spins",
            json!({ "p_user_id": player.user_id, "p_amount": 1 }),
        );
        if !matches!(raised, Ok(true)) {
            warn!("base spin increase failed; restoring the purchase count");
            self.patch("user_items", &item_filters, json!({ "quantity": purchases }))?;
            raised?;
            return Ok(PurchaseReceipt::refused("base spins could not be raised", shards));
        }

        let balance = shards - price;
        self.patch(
            "profiles",
            &[user_filter(player)],
            json!({ "pokeshards": balance }),
        )?;
        Ok(PurchaseReceipt {
            success: true,
            message: format!("bought a base spin upgrade for {price} shards"),
            balance,
        })
    }
}

fn inventory_insert(player: &PlayerContext, entry: &CatalogEntry) -> Value {
    json!({
        "user_id": player.user_id,
        "pokemon_id": entry.id,
        "pokemon_name": entry.name,
        "rarity": entry.rarity,
        "quantity": 1,
    })
}
