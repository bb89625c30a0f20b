//! Missions, achievements, rewards and experience levels.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule;

/// Experience scale of the level curve.
pub const XP_PER_LEVEL: u64 = 100;

/// Level reached with `xp` total experience: `floor(sqrt(xp / 100)) + 1`.
pub fn level_for_xp(xp: u64) -> u32 {
    let hundreds = xp / XP_PER_LEVEL;
    let mut root = (hundreds as f64).sqrt() as u64;
    while root * root > hundreds {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= hundreds {
        root += 1;
    }
    u32::try_from(root).unwrap_or(u32::MAX - 1) + 1
}

/// Experience at which `level` starts.
pub fn xp_for_level(level: u32) -> u64 {
    let steps = u64::from(level.saturating_sub(1));
    steps.saturating_mul(steps).saturating_mul(XP_PER_LEVEL)
}

/// Progress through the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    /// Level reached.
    pub level: u32,
    /// Experience earned since the level started.
    pub current: u64,
    /// Experience the level spans.
    pub needed: u64,
    /// `current / needed`, clamped to 0..=100.
    pub percentage: u32,
}

/// Where `xp` sits between its level and the next one.
pub fn level_progress(xp: u64) -> LevelProgress {
    let level = level_for_xp(xp);
    let start = xp_for_level(level);
    let needed = xp_for_level(level.saturating_add(1)).saturating_sub(start).max(1);
    let current = xp.saturating_sub(start);
    let percentage = ((current as f64 / needed as f64) * 100.0).clamp(0.0, 100.0) as u32;
    LevelProgress {
        level,
        current,
        needed,
        percentage,
    }
}

/// Reset cadence of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionKind {
    /// Resets at UTC midnight.
    Daily,
    /// Resets on Sunday, UTC.
    Weekly,
}

impl MissionKind {
    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            MissionKind::Daily => "daily",
            MissionKind::Weekly => "weekly",
        }
    }

    /// Bonus paid once per period for completing every mission of this kind.
    pub fn completion_bonus(self) -> Rewards {
        match self {
            MissionKind::Daily => Rewards {
                coins: 15,
                xp: 100,
                shards: 15,
                spins: 0,
            },
            MissionKind::Weekly => Rewards {
                coins: 75,
                xp: 250,
                shards: 50,
                spins: 0,
            },
        }
    }
}

/// Action a mission counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionCategory {
    /// Any roulette spin.
    Spin,
    /// Capturing a rare-or-better creature.
    CatchRare,
    /// Selling creatures, counted per creature.
    Sell,
}

impl MissionCategory {
    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            MissionCategory::Spin => "spin",
            MissionCategory::CatchRare => "catch_rare",
            MissionCategory::Sell => "sell",
        }
    }
}

/// Counter an achievement tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementGoal {
    /// Total spins.
    Spins,
    /// Total creatures sold.
    Sales,
    /// Level-ups.
    Level,
    /// Legendary captures.
    LegendaryCapture,
}

impl AchievementGoal {
    const ALL: [AchievementGoal; 4] = [
        AchievementGoal::Spins,
        AchievementGoal::Sales,
        AchievementGoal::Level,
        AchievementGoal::LegendaryCapture,
    ];

    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            AchievementGoal::Spins => "spins",
            AchievementGoal::Sales => "sales",
            AchievementGoal::Level => "level",
            AchievementGoal::LegendaryCapture => "legendary_capture",
        }
    }

    /// Goal for a wire label, if it is one this client tracks.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|goal| goal.as_str() == label)
    }
}

/// Currency and boosts granted by missions and achievements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rewards {
    /// Soft currency.
    pub coins: u64,
    /// Experience.
    pub xp: u64,
    /// Premium currency.
    pub shards: u64,
    /// Permanent increase of the free-spin allowance.
    pub spins: u32,
}

impl Rewards {
    /// True when nothing would be granted.
    pub fn is_empty(&self) -> bool {
        self.coins == 0 && self.xp == 0 && self.shards == 0 && self.spins == 0
    }

    /// Sum two reward bundles.
    pub fn merge(self, other: Rewards) -> Rewards {
        Rewards {
            coins: self.coins.saturating_add(other.coins),
            xp: self.xp.saturating_add(other.xp),
            shards: self.shards.saturating_add(other.shards),
            spins: self.spins.saturating_add(other.spins),
        }
    }
}

impl fmt::Display for Rewards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.coins > 0 {
            parts.push(format!("+{} coins", self.coins));
        }
        if self.xp > 0 {
            parts.push(format!("+{} XP", self.xp));
        }
        if self.shards > 0 {
            parts.push(format!("+{} shards", self.shards));
        }
        if self.spins > 0 {
            parts.push(format!("+{} base spins", self.spins));
        }
        if parts.is_empty() {
            f.write_str("nothing")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Mission or achievement that crossed its goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedGoal {
    /// Mission or achievement id.
    #[serde(default)]
    pub id: String,
    /// Title shown to the player.
    #[serde(default)]
    pub title: String,
}

/// Outcome of a progress update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Goals that completed during the update.
    pub completed: Vec<CompletedGoal>,
    /// Rewards the completions earned. They are paid when claimed.
    pub rewards: Rewards,
}

impl ProgressReport {
    /// Fold another report into this one.
    pub fn absorb(&mut self, other: ProgressReport) {
        self.completed.extend(other.completed);
        self.rewards = self.rewards.merge(other.rewards);
    }
}

/// Result of a reward claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResult {
    /// Whether anything was paid.
    pub success: bool,
    /// Human readable outcome.
    #[serde(default)]
    pub message: String,
    /// Rewards paid.
    #[serde(default)]
    pub rewards: Rewards,
}

impl ClaimResult {
    fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            rewards: Rewards::default(),
        }
    }
}

/// Mission definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    /// Stable id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Reset cadence.
    #[serde(rename = "type")]
    pub kind: MissionKind,
    /// Action counted.
    pub category: MissionCategory,
    /// Count needed to complete.
    pub goal: u32,
    /// Reward paid on claim.
    #[serde(flatten)]
    pub reward: MissionReward,
}

/// Reward columns as stored on a mission row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionReward {
    /// Coins paid.
    pub reward_coins: u64,
    /// Experience paid.
    pub reward_xp: u64,
    /// Shards paid.
    pub reward_shards: u64,
}

impl From<MissionReward> for Rewards {
    fn from(value: MissionReward) -> Self {
        Rewards {
            coins: value.reward_coins,
            xp: value.reward_xp,
            shards: value.reward_shards,
            spins: 0,
        }
    }
}

/// Per-player mission state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionProgress {
    /// Count reached, capped at the goal.
    pub progress: u32,
    /// Whether the goal was reached.
    pub completed: bool,
    /// When the goal was reached.
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether the mission reward was paid.
    pub rewards_claimed: bool,
    /// When the daily completion bonus was last claimed.
    pub daily_bonus_claimed_at: Option<DateTime<Utc>>,
    /// When the weekly completion bonus was last claimed.
    pub weekly_bonus_claimed_at: Option<DateTime<Utc>>,
}

impl MissionProgress {
    /// Last completion-bonus claim for `kind`.
    pub fn bonus_claimed_at(&self, kind: MissionKind) -> Option<DateTime<Utc>> {
        match kind {
            MissionKind::Daily => self.daily_bonus_claimed_at,
            MissionKind::Weekly => self.weekly_bonus_claimed_at,
        }
    }

    fn stamp_bonus(&mut self, kind: MissionKind, at: DateTime<Utc>) {
        match kind {
            MissionKind::Daily => self.daily_bonus_claimed_at = Some(at),
            MissionKind::Weekly => self.weekly_bonus_claimed_at = Some(at),
        }
    }
}

/// Mission joined with the player's progress on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionStatus {
    /// Definition.
    pub mission: Mission,
    /// Player state.
    pub progress: MissionProgress,
}

impl MissionStatus {
    /// Completed but not yet claimed.
    pub fn is_claimable(&self) -> bool {
        self.progress.completed && !self.progress.rewards_claimed
    }
}

/// Count of completed missions of one kind.
pub fn completion_count(statuses: &[MissionStatus], kind: MissionKind) -> (usize, usize) {
    let of_kind: Vec<_> = statuses
        .iter()
        .filter(|status| status.mission.kind == kind)
        .collect();
    let completed = of_kind
        .iter()
        .filter(|status| status.progress.completed)
        .count();
    (completed, of_kind.len())
}

/// Whether the completion bonus of `kind` was already claimed in the
/// period containing `now`.
pub fn bonus_claimed(statuses: &[MissionStatus], kind: MissionKind, now: DateTime<Utc>) -> bool {
    let since = schedule::previous_mission_reset(kind, now);
    statuses.iter().any(|status| {
        status
            .progress
            .bonus_claimed_at(kind)
            .is_some_and(|at| at >= since)
    })
}

/// Whether every mission of `kind` is done and the bonus is still open.
pub fn bonus_available(statuses: &[MissionStatus], kind: MissionKind, now: DateTime<Utc>) -> bool {
    let (completed, total) = completion_count(statuses, kind);
    total > 0 && completed == total && !bonus_claimed(statuses, kind, now)
}

/// Whether an achievement completes once or keeps raising its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementCategory {
    /// Completes once.
    Unique,
    /// Raises its goal by the increment step after every completion.
    Progressive,
}

impl AchievementCategory {
    /// Wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            AchievementCategory::Unique => "unique",
            AchievementCategory::Progressive => "progressive",
        }
    }
}

/// Reward columns of an achievement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementReward {
    /// Coins per completion.
    pub base_reward_coins: u64,
    /// Experience per completion.
    pub base_reward_xp: u64,
    /// Shards for the first completion.
    pub base_reward_shards: u64,
    /// Base spins per completion.
    pub base_reward_spins: u32,
    /// Extra shards added for every earlier completion.
    pub reward_increment: u64,
}

impl AchievementReward {
    /// Rewards for the completion that follows `completed_count` earlier ones.
    pub fn for_completion(&self, completed_count: u32) -> Rewards {
        let bonus = self.reward_increment.saturating_mul(u64::from(completed_count));
        Rewards {
            coins: self.base_reward_coins,
            xp: self.base_reward_xp,
            shards: self.base_reward_shards.saturating_add(bonus),
            spins: self.base_reward_spins,
        }
    }
}

/// Achievement definition. `{goal}` in the title is replaced with the
/// current goal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    /// Stable id.
    pub id: String,
    /// Title template.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Unique or progressive.
    pub category: AchievementCategory,
    /// Counter tracked.
    pub goal_type: AchievementGoal,
    /// First goal.
    pub goal_value: u32,
    /// Goal growth after each completion of a progressive achievement.
    #[serde(default)]
    pub increment_step: u32,
    /// Reward paid on claim.
    #[serde(flatten)]
    pub reward: AchievementReward,
}

/// Per-player achievement state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementProgress {
    /// Counter value.
    pub progress: u32,
    /// Goal of the next completion.
    pub next_goal_value: u32,
    /// Completions so far.
    pub completed_count: u32,
    /// Set once a unique achievement completes.
    pub is_completed: bool,
    /// Time of the latest completion.
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether the rewards of every completion so far were paid.
    pub rewards_claimed: bool,
    /// Earned rewards awaiting a claim.
    pub unclaimed: Rewards,
}

/// Achievement joined with the player's progress on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementStatus {
    /// Definition.
    pub achievement: Achievement,
    /// Player state.
    pub progress: AchievementProgress,
}

impl AchievementStatus {
    /// Goal currently being worked towards.
    pub fn goal(&self) -> u32 {
        match self.progress.next_goal_value {
            0 => self.achievement.goal_value,
            next => next,
        }
    }

    /// Title with the current goal substituted.
    pub fn title(&self) -> String {
        achievement_title(&self.achievement, self.goal())
    }

    /// Completed at least once with rewards not yet claimed.
    pub fn is_claimable(&self) -> bool {
        self.progress.completed_count > 0 && !self.progress.rewards_claimed
    }
}

/// Missions offered by the offline backend.
pub fn default_missions() -> Vec<Mission> {
    #[allow(clippy::too_many_arguments)]
    fn mission(
        id: &str,
        title: &str,
        kind: MissionKind,
        category: MissionCategory,
        goal: u32,
        coins: u64,
        xp: u64,
        shards: u64,
    ) -> Mission {
        Mission {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            kind,
            category,
            goal,
            reward: MissionReward {
                reward_coins: coins,
                reward_xp: xp,
                reward_shards: shards,
            },
        }
    }

    use MissionCategory::*;
    use MissionKind::*;
    vec![
        mission("daily-spin", "Spin the roulette 10 times", Daily, Spin, 10, 50, 50, 0),
        mission("daily-rare", "Catch a rare creature", Daily, CatchRare, 1, 75, 50, 1),
        mission("daily-sell", "Sell 5 creatures", Daily, Sell, 5, 50, 25, 0),
        mission("weekly-spin", "Spin the roulette 50 times", Weekly, Spin, 50, 300, 200, 3),
        mission("weekly-rare", "Catch 5 rare creatures", Weekly, CatchRare, 5, 400, 250, 5),
        mission("weekly-sell", "Sell 25 creatures", Weekly, Sell, 25, 250, 150, 2),
    ]
}

/// Achievements tracked by the offline backend.
pub fn default_achievements() -> Vec<Achievement> {
    #[allow(clippy::too_many_arguments)]
    fn achievement(
        id: &str,
        title: &str,
        category: AchievementCategory,
        goal_type: AchievementGoal,
        goal_value: u32,
        increment_step: u32,
        reward: AchievementReward,
    ) -> Achievement {
        Achievement {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            category,
            goal_type,
            goal_value,
            increment_step,
            reward,
        }
    }

    use AchievementCategory::*;
    use AchievementGoal::*;
    vec![
        achievement(
            "spinner",
            "Spin {goal} times",
            Progressive,
            Spins,
            100,
            100,
            AchievementReward {
                base_reward_coins: 200,
                base_reward_xp: 100,
                base_reward_shards: 1,
                base_reward_spins: 1,
                reward_increment: 1,
            },
        ),
        achievement(
            "merchant",
            "Sell {goal} creatures",
            Progressive,
            Sales,
            50,
            50,
            AchievementReward {
                base_reward_coins: 250,
                base_reward_xp: 100,
                ..AchievementReward::default()
            },
        ),
        achievement(
            "veteran",
            "Level up {goal} times",
            Progressive,
            Level,
            5,
            5,
            AchievementReward {
                base_reward_shards: 2,
                base_reward_spins: 1,
                reward_increment: 2,
                ..AchievementReward::default()
            },
        ),
        achievement(
            "legend-hunter",
            "Capture a legendary",
            Unique,
            LegendaryCapture,
            1,
            0,
            AchievementReward {
                base_reward_coins: 1_000,
                base_reward_xp: 500,
                base_reward_shards: 5,
                base_reward_spins: 2,
                reward_increment: 0,
            },
        ),
    ]
}

/// Advance every mission of `category` by `increment`.
pub fn apply_mission_progress(
    state: &mut BTreeMap<String, MissionProgress>,
    missions: &[Mission],
    category: MissionCategory,
    increment: u32,
    now: DateTime<Utc>,
) -> ProgressReport {
    let mut report = ProgressReport::default();
    for mission in missions.iter().filter(|mission| mission.category == category) {
        let entry = state.entry(mission.id.clone()).or_default();
        if entry.completed {
            continue;
        }
        entry.progress = entry.progress.saturating_add(increment).min(mission.goal);
        if entry.progress >= mission.goal {
            entry.completed = true;
            entry.completed_at = Some(now);
            report.completed.push(CompletedGoal {
                id: mission.id.clone(),
                title: mission.title.clone(),
            });
            report.rewards = report.rewards.merge(mission.reward.into());
        }
    }
    report
}

/// Mark a completed mission as claimed and return its rewards.
pub fn claim_mission(
    state: &mut BTreeMap<String, MissionProgress>,
    missions: &[Mission],
    mission_id: &str,
) -> ClaimResult {
    let Some(mission) = missions.iter().find(|mission| mission.id == mission_id) else {
        return ClaimResult::refused(format!("unknown mission {mission_id}"));
    };
    let entry = state.entry(mission.id.clone()).or_default();
    if !entry.completed {
        return ClaimResult::refused("mission not completed yet");
    }
    if entry.rewards_claimed {
        return ClaimResult::refused("rewards already claimed");
    }
    entry.rewards_claimed = true;
    ClaimResult {
        success: true,
        message: format!("claimed {}", mission.title),
        rewards: mission.reward.into(),
    }
}

/// Pay the completion bonus of `kind` once per mission period.
///
/// Every mission of the kind must be completed. The claim is stamped on
/// each of them, so it disappears with the next reset.
pub fn claim_completion_bonus(
    state: &mut BTreeMap<String, MissionProgress>,
    missions: &[Mission],
    kind: MissionKind,
    now: DateTime<Utc>,
) -> ClaimResult {
    let of_kind: Vec<&Mission> = missions
        .iter()
        .filter(|mission| mission.kind == kind)
        .collect();
    let all_done = !of_kind.is_empty()
        && of_kind.iter().all(|mission| {
            state
                .get(&mission.id)
                .is_some_and(|progress| progress.completed)
        });
    if !all_done {
        return ClaimResult::refused(format!("complete every {} mission first", kind.as_str()));
    }
    let since = schedule::previous_mission_reset(kind, now);
    let claimed = state
        .values()
        .any(|progress| progress.bonus_claimed_at(kind).is_some_and(|at| at >= since));
    if claimed {
        return ClaimResult::refused(format!("{} bonus already claimed", kind.as_str()));
    }
    for mission in of_kind {
        if let Some(progress) = state.get_mut(&mission.id) {
            progress.stamp_bonus(kind, now);
        }
    }
    ClaimResult {
        success: true,
        message: format!("claimed the {} completion bonus", kind.as_str()),
        rewards: kind.completion_bonus(),
    }
}

/// Clear progress for every mission of `kind`.
pub fn reset_missions(
    state: &mut BTreeMap<String, MissionProgress>,
    missions: &[Mission],
    kind: MissionKind,
) {
    for mission in missions.iter().filter(|mission| mission.kind == kind) {
        state.remove(&mission.id);
    }
}

/// Advance every achievement tracking `goal`. Completions add their
/// rewards to the unclaimed pile; nothing is paid until
/// [`claim_achievement`].
pub fn apply_achievement_progress(
    state: &mut BTreeMap<String, AchievementProgress>,
    achievements: &[Achievement],
    goal: AchievementGoal,
    increment: u32,
    now: DateTime<Utc>,
) -> ProgressReport {
    let mut report = ProgressReport::default();
    for achievement in achievements
        .iter()
        .filter(|achievement| achievement.goal_type == goal)
    {
        let entry = state.entry(achievement.id.clone()).or_default();
        if entry.next_goal_value == 0 {
            entry.next_goal_value = achievement.goal_value;
        }
        match achievement.category {
            AchievementCategory::Unique => {
                if entry.is_completed {
                    continue;
                }
                entry.progress = entry.progress.saturating_add(increment);
                if entry.progress >= achievement.goal_value {
                    entry.is_completed = true;
                    let title = achievement_title(achievement, achievement.goal_value);
                    record_completion(entry, achievement, title, now, &mut report);
                }
            }
            AchievementCategory::Progressive => {
                entry.progress = entry.progress.saturating_add(increment);
                let step = achievement.increment_step.max(1);
                // a saturated goal can never be passed
                while entry.next_goal_value < u32::MAX
                    && entry.progress >= entry.next_goal_value
                {
                    let title = achievement_title(achievement, entry.next_goal_value);
                    record_completion(entry, achievement, title, now, &mut report);
                    entry.next_goal_value = entry.next_goal_value.saturating_add(step);
                }
            }
        }
    }
    report
}

fn record_completion(
    entry: &mut AchievementProgress,
    achievement: &Achievement,
    title: String,
    now: DateTime<Utc>,
    report: &mut ProgressReport,
) {
    let reward = achievement.reward.for_completion(entry.completed_count);
    entry.completed_count += 1;
    entry.completed_at = Some(now);
    entry.rewards_claimed = false;
    entry.unclaimed = entry.unclaimed.merge(reward);
    report.completed.push(CompletedGoal {
        id: achievement.id.clone(),
        title,
    });
    report.rewards = report.rewards.merge(reward);
}

/// Pay out the unclaimed rewards of an achievement.
pub fn claim_achievement(
    state: &mut BTreeMap<String, AchievementProgress>,
    achievements: &[Achievement],
    achievement_id: &str,
) -> ClaimResult {
    let Some(achievement) = achievements
        .iter()
        .find(|achievement| achievement.id == achievement_id)
    else {
        return ClaimResult::refused(format!("unknown achievement {achievement_id}"));
    };
    let Some(entry) = state
        .get_mut(&achievement.id)
        .filter(|entry| entry.completed_count > 0)
    else {
        return ClaimResult::refused("achievement not completed yet");
    };
    if entry.rewards_claimed {
        return ClaimResult::refused("rewards already claimed");
    }
    entry.rewards_claimed = true;
    let rewards = std::mem::take(&mut entry.unclaimed);
    ClaimResult {
        success: true,
        message: format!("claimed {}", achievement_title(achievement, achievement.goal_value)),
        rewards,
    }
}

/// Title with `{goal}` substituted.
pub fn achievement_title(achievement: &Achievement, goal: u32) -> String {
    achievement.title.replace("{goal}", &goal.to_string())
}
