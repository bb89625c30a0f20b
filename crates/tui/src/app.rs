use std::{io, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, Gauge, List, ListItem, ListState, Paragraph, Row, Table,
        Tabs, Wrap,
    },
    Frame, Terminal,
};
use roulette_core::{
    backend::RpcMessage,
    catalog::{CatalogEntry, STARTER_CHOICES},
    draw::DrawHistogram,
    profile::{InventoryItem, PlayerProfile, SpinState},
    progress::{
        self, bonus_available, bonus_claimed, completion_count, AchievementStatus, ClaimResult,
        MissionKind, MissionStatus, ProgressReport, Rewards,
    },
    schedule,
    shop::{spin_upgrade_price, OwnedItem, PurchaseReceipt, ShopItem},
    spin::{SaleOutcome, SpinOutcome, SpinService},
    Rarity,
};
use tokio::{spawn, sync::mpsc, task};
use tracing::{debug, error, info};

const TICK_RATE: Duration = Duration::from_millis(250);
const SIMULATION_DRAWS: usize = 10_000;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    selection_fg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            selection_fg: Color::White,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

impl Theme {
    fn rarity(&self, rarity: Rarity) -> Color {
        match rarity {
            Rarity::Common => Color::Gray,
            Rarity::Uncommon => Color::Green,
            Rarity::Rare => Color::Blue,
            Rarity::Pseudo => Color::Magenta,
            Rarity::Starter => Color::LightRed,
            Rarity::Legendary => Color::Yellow,
            Rarity::Secret => Color::LightMagenta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Roulette,
    Inventory,
    Missions,
    Achievements,
    Shop,
    Simulation,
}

impl Screen {
    const ALL: [Screen; 6] = [
        Screen::Roulette,
        Screen::Inventory,
        Screen::Missions,
        Screen::Achievements,
        Screen::Shop,
        Screen::Simulation,
    ];

    fn title(self) -> &'static str {
        match self {
            Screen::Roulette => "Roulette",
            Screen::Inventory => "Inventory",
            Screen::Missions => "Missions",
            Screen::Achievements => "Achievements",
            Screen::Shop => "Shop",
            Screen::Simulation => "Odds",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|screen| *screen == self).unwrap_or(0)
    }

    fn next(self) -> Screen {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

/// State fetched from the backend after every job.
struct Snapshot {
    profile: PlayerProfile,
    missions: Vec<MissionStatus>,
    achievements: Vec<AchievementStatus>,
    shop: Vec<ShopItem>,
    owned: Vec<OwnedItem>,
}

impl Snapshot {
    fn load(service: &SpinService) -> Result<Self> {
        Ok(Self {
            profile: service.profile()?,
            missions: service.missions()?,
            achievements: service.achievements()?,
            shop: service.shop_items()?,
            owned: service.owned_items()?,
        })
    }

    fn owned(&self, item_id: u32) -> u32 {
        self.owned
            .iter()
            .find(|owned| owned.item_id == item_id)
            .map(|owned| owned.quantity)
            .unwrap_or(0)
    }
}

enum Outcome {
    Refreshed,
    Spun(SpinOutcome),
    Sold(SaleOutcome),
    Placed(RpcMessage),
    Claimed(ClaimResult),
    Purchased(PurchaseReceipt),
    Starter(CatalogEntry),
    Simulated(DrawHistogram),
}

struct JobDone {
    outcome: Result<Outcome, String>,
    snapshot: Option<Snapshot>,
}

enum AppEvent {
    Input(Event),
    Tick,
    Job(JobDone),
}

/// Terminal front end driving a [`SpinService`].
pub struct RouletteApp {
    service: Arc<SpinService>,
    state: UiState,
    snapshot: Option<Snapshot>,
    last_spin: Option<SpinOutcome>,
    histogram: Option<DrawHistogram>,
    screen: Screen,
    busy: bool,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    theme: Theme,
}

impl RouletteApp {
    pub fn new(service: Arc<SpinService>) -> Self {
        Self {
            service,
            state: UiState::default(),
            snapshot: None,
            last_spin: None,
            histogram: None,
            screen: Screen::Roulette,
            busy: false,
            event_tx: None,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        self.state.set_status(format!(
            "Connecting to {} backend…",
            self.service.backend_name()
        ));
        self.dispatch("refresh", |service| {
            service.refresh_spins()?;
            Ok(Outcome::Refreshed)
        });

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }
            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn dispatch<F>(&mut self, label: &'static str, work: F)
    where
        F: FnOnce(&SpinService) -> Result<Outcome> + Send + 'static,
    {
        if self.busy {
            self.state.set_status("Still working…".to_string());
            return;
        }
        let Some(sender) = self.event_tx.clone() else {
            self.state
                .set_status("Internal error: event channel unavailable".to_string());
            error!("event_channel_missing");
            return;
        };
        self.busy = true;
        debug!(job = label, "dispatching");
        let service = Arc::clone(&self.service);
        spawn(async move {
            let joined = task::spawn_blocking(move || {
                let outcome = work(&service).map_err(|err| format!("{err:#}"));
                let snapshot = match Snapshot::load(&service) {
                    Ok(snapshot) => Some(snapshot),
                    Err(err) => {
                        error!(?err, "Failed to reload profile");
                        None
                    }
                };
                JobDone { outcome, snapshot }
            })
            .await;
            let done = joined.unwrap_or_else(|err| JobDone {
                outcome: Err(format!("{label} worker failed: {err}")),
                snapshot: None,
            });
            let _ = sender.send(AppEvent::Job(done)).await;
        });
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Err(err) = self.handle_input(event) {
                    self.state.set_status(format!("Error: {err}"));
                }
                true
            }
            Some(AppEvent::Tick) => {
                self.handle_tick();
                true
            }
            Some(AppEvent::Job(done)) => {
                self.busy = false;
                if let Some(snapshot) = done.snapshot {
                    self.snapshot = Some(snapshot);
                    self.clamp_cursors();
                }
                match done.outcome {
                    Ok(outcome) => self.apply_outcome(outcome),
                    Err(message) => {
                        error!(%message, "Job failed");
                        self.state.set_status(message);
                    }
                }
                true
            }
            None => false,
        }
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Refreshed => {
                if let Some(snapshot) = &self.snapshot {
                    let spins = &snapshot.profile.spins;
                    self.state.set_status(format!(
                        "{} free spins available",
                        spins.free_spins
                    ));
                }
            }
            Outcome::Spun(outcome) => {
                let mut status = format!(
                    "Caught {} ({})",
                    outcome.entry.display_name(),
                    outcome.entry.rarity
                );
                if let Some(gain) = outcome.experience.filter(|gain| gain.level_up) {
                    status.push_str(&format!(" • Level up! Now level {}", gain.new_level));
                }
                append_completions(&mut status, &outcome.missions, "mission");
                append_completions(&mut status, &outcome.achievements, "achievement");
                self.state.set_status(status);
                self.last_spin = Some(outcome);
            }
            Outcome::Sold(sale) => {
                let mut status = sale.receipt.message.clone();
                if sale.receipt.success {
                    status = format!("Sold for {} coins", sale.receipt.coins_earned);
                }
                append_completions(&mut status, &sale.progress, "goal");
                self.state.set_status(status);
            }
            Outcome::Placed(message) => {
                self.state.set_status(message.message);
            }
            Outcome::Claimed(claim) => {
                if claim.success {
                    self.state
                        .set_status(format!("{} • {}", claim.message, claim.rewards));
                } else {
                    self.state.set_status(claim.message);
                }
            }
            Outcome::Purchased(receipt) => {
                self.state.set_status(receipt.message);
            }
            Outcome::Starter(entry) => {
                info!(name = %entry.name, "Starter chosen");
                self.state
                    .set_status(format!("{} joins your team!", entry.display_name()));
            }
            Outcome::Simulated(histogram) => {
                let (statistic, dof) = histogram.chi_squared(self.service.table());
                self.state.set_status(format!(
                    "Simulated {} draws • χ² = {statistic:.2} ({dof} dof)",
                    histogram.total()
                ));
                self.histogram = Some(histogram);
            }
        }
    }

    fn handle_tick(&mut self) {
        if self.busy {
            return;
        }
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let Some(boundary) = spin_reset_to_attempt(
            &snapshot.profile.spins,
            self.state.reset_attempted,
            Local::now().naive_local(),
        ) else {
            return;
        };
        debug!(%boundary, "spin reset boundary passed");
        self.state.reset_attempted = Some(boundary);
        self.dispatch("refresh", |service| {
            service.refresh_spins()?;
            Ok(Outcome::Refreshed)
        });
    }

    fn needs_starter(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.profile.starter.is_none())
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }
        if matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q')) {
            self.state.should_quit = true;
            return Ok(());
        }
        if self.needs_starter() {
            self.handle_starter_key(key);
            return Ok(());
        }
        match key.code {
            KeyCode::Tab => {
                self.screen = self.screen.next();
                return Ok(());
            }
            KeyCode::Char('1') => self.screen = Screen::Roulette,
            KeyCode::Char('2') => self.screen = Screen::Inventory,
            KeyCode::Char('3') => self.screen = Screen::Missions,
            KeyCode::Char('4') => self.screen = Screen::Achievements,
            KeyCode::Char('5') => self.screen = Screen::Shop,
            KeyCode::Char('6') => self.screen = Screen::Simulation,
            KeyCode::Char('r') => self.dispatch("refresh", |service| {
                service.refresh_spins()?;
                Ok(Outcome::Refreshed)
            }),
            _ => match self.screen {
                Screen::Roulette => self.handle_roulette_key(key),
                Screen::Inventory => self.handle_inventory_key(key),
                Screen::Missions => self.handle_missions_key(key),
                Screen::Achievements => self.handle_achievements_key(key),
                Screen::Shop => self.handle_shop_key(key),
                Screen::Simulation => self.handle_simulation_key(key),
            },
        }
        Ok(())
    }

    fn handle_starter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                self.state.starter_cursor = self.state.starter_cursor.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.state.starter_cursor =
                    (self.state.starter_cursor + 1).min(STARTER_CHOICES.len() - 1);
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let id = STARTER_CHOICES[self.state.starter_cursor];
                self.dispatch("starter", move |service| {
                    service.select_starter(id).map(Outcome::Starter)
                });
            }
            _ => {}
        }
    }

    fn handle_roulette_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Char(' ') | KeyCode::Enter) {
            self.state.set_status("Spinning…".to_string());
            self.dispatch("spin", |service| service.spin().map(Outcome::Spun));
        }
    }

    fn handle_inventory_key(&mut self, key: KeyEvent) {
        let len = self.inventory_len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.state.move_inventory(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_inventory(-1, len),
            KeyCode::Char('x') | KeyCode::Char('X') => {
                let Some(item) = self.selected_item().cloned() else {
                    self.state.set_status("Nothing selected".to_string());
                    return;
                };
                let quantity = if key.code == KeyCode::Char('X') {
                    item.quantity
                } else {
                    1
                };
                self.state.set_status(format!(
                    "Selling {quantity} {}…",
                    item.name
                ));
                self.dispatch("sell", move |service| {
                    service.sell(item.creature_id, quantity).map(Outcome::Sold)
                });
            }
            KeyCode::Char('p') => {
                let Some(item) = self.selected_item().cloned() else {
                    self.state.set_status("Nothing selected".to_string());
                    return;
                };
                self.dispatch("place", move |service| {
                    service.place_in_pokedex(item.creature_id).map(Outcome::Placed)
                });
            }
            _ => {}
        }
    }

    fn handle_missions_key(&mut self, key: KeyEvent) {
        let len = self.missions_len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.state.move_mission(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_mission(-1, len),
            KeyCode::Char('c') | KeyCode::Enter => {
                let Some((id, title, claimable)) = self.selected_mission().map(|status| {
                    (
                        status.mission.id.clone(),
                        status.mission.title.clone(),
                        status.is_claimable(),
                    )
                }) else {
                    self.state.set_status("Nothing selected".to_string());
                    return;
                };
                if !claimable {
                    self.state
                        .set_status(format!("{title} is not ready to claim"));
                    return;
                }
                self.dispatch("claim", move |service| {
                    service.claim_mission(&id).map(Outcome::Claimed)
                });
            }
            KeyCode::Char('d') => self.claim_bonus(MissionKind::Daily),
            KeyCode::Char('w') => self.claim_bonus(MissionKind::Weekly),
            _ => {}
        }
    }

    fn claim_bonus(&mut self, kind: MissionKind) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        if !bonus_available(&snapshot.missions, kind, Utc::now()) {
            let reason = if bonus_claimed(&snapshot.missions, kind, Utc::now()) {
                "already claimed"
            } else {
                "needs every mission completed"
            };
            self.state
                .set_status(format!("The {} bonus {reason}", kind.as_str()));
            return;
        }
        self.dispatch("bonus", move |service| {
            service.claim_completion_bonus(kind).map(Outcome::Claimed)
        });
    }

    fn handle_achievements_key(&mut self, key: KeyEvent) {
        let len = self.achievements_len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.state.move_achievement(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_achievement(-1, len),
            KeyCode::Char('c') | KeyCode::Enter => {
                let Some((id, title, claimable)) = self.selected_achievement().map(|status| {
                    (
                        status.achievement.id.clone(),
                        status.title(),
                        status.is_claimable(),
                    )
                }) else {
                    self.state.set_status("Nothing selected".to_string());
                    return;
                };
                if !claimable {
                    self.state
                        .set_status(format!("{title} has nothing to claim"));
                    return;
                }
                self.dispatch("claim achievement", move |service| {
                    service.claim_achievement(&id).map(Outcome::Claimed)
                });
            }
            _ => {}
        }
    }

    fn handle_shop_key(&mut self, key: KeyEvent) {
        let len = self.shop_len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.state.move_shop(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_shop(-1, len),
            KeyCode::Char('b') | KeyCode::Enter => {
                let Some(item) = self.selected_shop_item().cloned() else {
                    self.state.set_status("Nothing selected".to_string());
                    return;
                };
                self.state.set_status(format!("Buying {}…", item.name));
                self.dispatch("buy", move |service| {
                    service.buy_item(item.id, 1).map(Outcome::Purchased)
                });
            }
            KeyCode::Char('u') => {
                self.state
                    .set_status("Buying a base spin upgrade…".to_string());
                self.dispatch("upgrade", |service| {
                    service.buy_spin_upgrade().map(Outcome::Purchased)
                });
            }
            _ => {}
        }
    }

    fn handle_simulation_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Char('s') | KeyCode::Enter) {
            self.state
                .set_status(format!("Simulating {SIMULATION_DRAWS} draws…"));
            self.dispatch("simulate", |service| {
                let histogram = service.simulate(SIMULATION_DRAWS)?;
                Ok(Outcome::Simulated(histogram))
            });
        }
    }

    fn inventory(&self) -> Vec<&InventoryItem> {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.profile.inventory_by_rarity())
            .unwrap_or_default()
    }

    fn inventory_len(&self) -> usize {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.profile.inventory.len())
            .unwrap_or(0)
    }

    fn selected_item(&self) -> Option<&InventoryItem> {
        self.inventory().get(self.state.inventory_cursor).copied()
    }

    fn missions_len(&self) -> usize {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.missions.len())
            .unwrap_or(0)
    }

    fn selected_mission(&self) -> Option<&MissionStatus> {
        self.snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.missions.get(self.state.mission_cursor))
    }

    fn achievements_len(&self) -> usize {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.achievements.len())
            .unwrap_or(0)
    }

    fn selected_achievement(&self) -> Option<&AchievementStatus> {
        self.snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.achievements.get(self.state.achievement_cursor))
    }

    fn shop_len(&self) -> usize {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.shop.len())
            .unwrap_or(0)
    }

    fn selected_shop_item(&self) -> Option<&ShopItem> {
        self.snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.shop.get(self.state.shop_cursor))
    }

    fn clamp_cursors(&mut self) {
        let lens = [
            self.inventory_len(),
            self.missions_len(),
            self.achievements_len(),
            self.shop_len(),
        ];
        self.state.clamp(lens);
    }

    fn draw(&mut self, frame: &mut Frame) {
        let size = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(4),
                Constraint::Min(6),
                Constraint::Length(3),
            ])
            .split(size);

        self.render_tabs(frame, chunks[0]);
        self.render_header(frame, chunks[1]);
        match self.screen {
            Screen::Roulette => self.render_roulette(frame, chunks[2]),
            Screen::Inventory => self.render_inventory(frame, chunks[2]),
            Screen::Missions => self.render_missions(frame, chunks[2]),
            Screen::Achievements => self.render_achievements(frame, chunks[2]),
            Screen::Shop => self.render_shop(frame, chunks[2]),
            Screen::Simulation => self.render_simulation(frame, chunks[2]),
        }
        self.render_status(frame, chunks[3]);

        if self.needs_starter() {
            self.render_starter_prompt(frame);
        }
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Screen::ALL
            .iter()
            .enumerate()
            .map(|(idx, screen)| Line::from(format!("{} {}", idx + 1, screen.title())))
            .collect();
        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title("Creature Roulette"))
            .select(self.screen.index())
            .style(Style::default().fg(self.theme.muted))
            .highlight_style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let lines = match &self.snapshot {
            Some(snapshot) => {
                let profile = &snapshot.profile;
                let spins = &profile.spins;
                let next = schedule::next_spin_reset_local(Local::now());
                let countdown = schedule::format_clock(next - Local::now());
                let level = progress::level_progress(profile.experience_points);
                let spin_color = if spins.free_spins == 0 {
                    self.theme.danger
                } else {
                    self.theme.success
                };
                vec![
                    Line::from(vec![
                        Span::styled(
                            profile.nickname.clone(),
                            Style::default()
                                .fg(self.theme.accent)
                                .add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(format!(
                            "  Lv {} ({}/{} XP, {}%)  •  {} coins  •  {} shards",
                            level.level,
                            level.current,
                            level.needed,
                            level.percentage,
                            profile.coins,
                            profile.shards
                        )),
                    ]),
                    Line::from(vec![
                        Span::styled(
                            format!(
                                "Spins {}/{}",
                                spins.free_spins, spins.base_free_spins
                            ),
                            Style::default().fg(spin_color),
                        ),
                        Span::styled(
                            format!("  •  next reset in {countdown}"),
                            Style::default().fg(self.theme.muted),
                        ),
                    ]),
                ]
            }
            None => vec![Line::from(Span::styled(
                "Loading profile…",
                Style::default().fg(self.theme.muted),
            ))],
        };
        let header = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Trainer • {}", self.service.backend_name())),
        );
        frame.render_widget(header, area);
    }

    fn render_roulette(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let mut lines = Vec::new();
        match &self.last_spin {
            Some(outcome) => {
                let color = self.theme.rarity(outcome.entry.rarity);
                lines.push(Line::from(Span::styled(
                    format!("#{:03} {}", outcome.entry.id, outcome.entry.display_name()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(Span::styled(
                    outcome.entry.rarity.label().to_uppercase(),
                    Style::default().fg(color),
                )));
                lines.push(Line::from(format!("Now holding {}", outcome.quantity)));
                if let Some(gain) = outcome.experience {
                    let level = if gain.level_up {
                        format!("Level up! Lv {}", gain.new_level)
                    } else {
                        format!("Lv {}", gain.new_level)
                    };
                    lines.push(Line::from(format!("{level} • {} XP", gain.new_xp)));
                }
                for goal in outcome
                    .missions
                    .completed
                    .iter()
                    .chain(outcome.achievements.completed.iter())
                {
                    lines.push(Line::from(Span::styled(
                        format!("✔ {}", goal.title),
                        Style::default().fg(self.theme.success),
                    )));
                }
                lines.push(Line::from(Span::styled(
                    outcome.entry.sprite_url(),
                    Style::default().fg(self.theme.muted),
                )));
            }
            None => lines.push(Line::from(Span::styled(
                "Press space to spin",
                Style::default().fg(self.theme.muted),
            ))),
        }
        let result = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Last capture"))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(result, columns[0]);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(columns[1]);

        let completion = self
            .snapshot
            .as_ref()
            .map(|snapshot| {
                snapshot
                    .profile
                    .pokedex_completion(self.service.catalog().len())
            });
        let (percent, label) = match completion {
            Some(completion) => (
                completion.percentage.min(100) as u16,
                format!(
                    "{}/{} ({}%)",
                    completion.placed, completion.total, completion.percentage
                ),
            ),
            None => (0, "—".to_string()),
        };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Pokedex"))
            .gauge_style(Style::default().fg(self.theme.accent))
            .percent(percent)
            .label(label);
        frame.render_widget(gauge, side[0]);

        let odds: Vec<ListItem> = self
            .service
            .table()
            .iter()
            .map(|(rarity, _)| {
                let probability = self.service.table().effective_probability(rarity);
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<10}", rarity.label()),
                        Style::default().fg(self.theme.rarity(rarity)),
                    ),
                    Span::raw(format!("{:>8.2}%", probability * 100.0)),
                ]))
            })
            .collect();
        let odds = List::new(odds).block(Block::default().borders(Borders::ALL).title("Odds"));
        frame.render_widget(odds, side[1]);
    }

    fn render_inventory(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .inventory()
            .into_iter()
            .map(|item| {
                let placed = self
                    .snapshot
                    .as_ref()
                    .is_some_and(|snapshot| snapshot.profile.is_placed(item.creature_id));
                let marker = if placed { "★" } else { " " };
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{marker} #{:03} ", item.creature_id)),
                    Span::styled(
                        format!("{:<12}", item.name),
                        Style::default().fg(self.theme.rarity(item.rarity)),
                    ),
                    Span::raw(format!(
                        " x{:<3} {:>6} coins each",
                        item.quantity,
                        item.rarity.sell_value()
                    )),
                ]))
            })
            .collect();
        let total = self
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.profile.total_creatures())
            .unwrap_or(0);
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Inventory ({total}) • x sell one • X sell all • p place")),
            )
            .highlight_style(
                Style::default()
                    .bg(self.theme.selection_bg)
                    .fg(self.theme.selection_fg),
            )
            .highlight_symbol("▶ ");
        let mut list_state = ListState::default();
        if self.inventory_len() > 0 {
            list_state.select(Some(self.state.inventory_cursor));
        }
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_missions(&self, frame: &mut Frame, area: Rect) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let now = Utc::now();
        let (daily_done, daily_total) = completion_count(&snapshot.missions, MissionKind::Daily);
        let (weekly_done, weekly_total) =
            completion_count(&snapshot.missions, MissionKind::Weekly);
        let bonus_tag = |kind: MissionKind| {
            if bonus_claimed(&snapshot.missions, kind, now) {
                "bonus claimed"
            } else if bonus_available(&snapshot.missions, kind, now) {
                "bonus ready"
            } else {
                "bonus locked"
            }
        };
        let title = format!(
            "Daily {daily_done}/{daily_total} {} (resets in {}) • Weekly {weekly_done}/{weekly_total} {} (resets in {})",
            bonus_tag(MissionKind::Daily),
            schedule::format_remaining(schedule::next_mission_reset(MissionKind::Daily, now) - now),
            bonus_tag(MissionKind::Weekly),
            schedule::format_remaining(schedule::next_mission_reset(MissionKind::Weekly, now) - now),
        );

        let items: Vec<ListItem> = snapshot
            .missions
            .iter()
            .map(|status| {
                let (tag, color) = if status.progress.rewards_claimed {
                    ("claimed", self.theme.muted)
                } else if status.progress.completed {
                    ("ready", self.theme.success)
                } else {
                    ("", self.theme.primary_fg)
                };
                let reward: Rewards = status.mission.reward.into();
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<7}", status.mission.kind.as_str()),
                        Style::default().fg(self.theme.muted),
                    ),
                    Span::styled(
                        format!("{:<32}", status.mission.title),
                        Style::default().fg(color),
                    ),
                    Span::raw(format!(
                        "{:>4}/{:<4} {reward}",
                        status.progress.progress, status.mission.goal
                    )),
                    Span::styled(format!(" {tag}"), Style::default().fg(self.theme.warning)),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(
                Style::default()
                    .bg(self.theme.selection_bg)
                    .fg(self.theme.selection_fg),
            )
            .highlight_symbol("▶ ");
        let mut list_state = ListState::default();
        if !snapshot.missions.is_empty() {
            list_state.select(Some(self.state.mission_cursor));
        }
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_achievements(&self, frame: &mut Frame, area: Rect) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let items: Vec<ListItem> = snapshot
            .achievements
            .iter()
            .map(|status| {
                let (tag, color) = if status.is_claimable() {
                    ("ready", self.theme.success)
                } else if status.progress.is_completed {
                    ("done", self.theme.muted)
                } else {
                    ("", self.theme.primary_fg)
                };
                let reward = status
                    .achievement
                    .reward
                    .for_completion(status.progress.completed_count);
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<12}", status.achievement.category.as_str()),
                        Style::default().fg(self.theme.muted),
                    ),
                    Span::styled(format!("{:<32}", status.title()), Style::default().fg(color)),
                    Span::raw(format!(
                        "{:>5}/{:<5} x{} {reward}",
                        status.progress.progress,
                        status.goal(),
                        status.progress.completed_count
                    )),
                    Span::styled(format!(" {tag}"), Style::default().fg(self.theme.warning)),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Achievements • c claim"),
            )
            .highlight_style(
                Style::default()
                    .bg(self.theme.selection_bg)
                    .fg(self.theme.selection_fg),
            )
            .highlight_symbol("▶ ");
        let mut list_state = ListState::default();
        if !snapshot.achievements.is_empty() {
            list_state.select(Some(self.state.achievement_cursor));
        }
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_shop(&self, frame: &mut Frame, area: Rect) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(4), Constraint::Length(4)])
            .split(area);

        let items: Vec<ListItem> = snapshot
            .shop
            .iter()
            .map(|item| {
                let affordable = snapshot.profile.coins >= item.price;
                let price_color = if affordable {
                    self.theme.primary_fg
                } else {
                    self.theme.danger
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<14}", item.name),
                        Style::default().fg(self.theme.accent),
                    ),
                    Span::styled(
                        format!("{:>6} coins", item.price),
                        Style::default().fg(price_color),
                    ),
                    Span::raw(format!("  held {:<3} ", snapshot.owned(item.id))),
                    Span::styled(
                        item.description.clone().unwrap_or_default(),
                        Style::default().fg(self.theme.muted),
                    ),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Shop • {} coins • b buy one", snapshot.profile.coins)),
            )
            .highlight_style(
                Style::default()
                    .bg(self.theme.selection_bg)
                    .fg(self.theme.selection_fg),
            )
            .highlight_symbol("▶ ");
        let mut list_state = ListState::default();
        if !snapshot.shop.is_empty() {
            list_state.select(Some(self.state.shop_cursor));
        }
        frame.render_stateful_widget(list, rows[0], &mut list_state);

        let purchases = snapshot.profile.spin_upgrades();
        let price = spin_upgrade_price(purchases);
        let color = if snapshot.profile.shards >= price {
            self.theme.success
        } else {
            self.theme.danger
        };
        let upgrade = Paragraph::new(vec![
            Line::from(format!(
                "Base spins {} • {purchases} upgrades bought",
                snapshot.profile.spins.base_free_spins
            )),
            Line::from(Span::styled(
                format!("Next +1 base spin costs {price} shards"),
                Style::default().fg(color),
            )),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Eternal spin • u upgrade"),
        );
        frame.render_widget(upgrade, rows[1]);
    }

    fn render_simulation(&self, frame: &mut Frame, area: Rect) {
        let table = self.service.table();
        let rows: Vec<Row> = table
            .iter()
            .map(|(rarity, _)| {
                let expected = table.effective_probability(rarity) * 100.0;
                let (count, observed) = match &self.histogram {
                    Some(histogram) => (
                        histogram.count(rarity).to_string(),
                        format!("{:.3}%", histogram.frequency(rarity) * 100.0),
                    ),
                    None => ("—".to_string(), "—".to_string()),
                };
                Row::new(vec![
                    Cell::from(rarity.label())
                        .style(Style::default().fg(self.theme.rarity(rarity))),
                    Cell::from(format!("{expected:.3}%")),
                    Cell::from(count),
                    Cell::from(observed),
                ])
            })
            .collect();
        let widths = [
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(12),
        ];
        let table_widget = Table::new(rows, widths)
            .header(
                Row::new(vec!["Rarity", "Expected", "Draws", "Observed"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Odds check • s simulate {SIMULATION_DRAWS} draws")),
            );
        frame.render_widget(table_widget, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let hint = match self.screen {
            Screen::Roulette => "space spin",
            Screen::Inventory => "j/k move • x/X sell • p place",
            Screen::Missions => "j/k move • c claim • d/w bonus",
            Screen::Achievements => "j/k move • c claim",
            Screen::Shop => "j/k move • b buy • u upgrade",
            Screen::Simulation => "s simulate",
        };
        let busy = if self.busy { " ⟳" } else { "" };
        let status = Paragraph::new(Line::from(vec![
            Span::raw(format!("{}{busy}", self.state.status)),
            Span::styled(
                format!("  │ {hint} • tab/1-6 switch • r refresh • q quit"),
                Style::default().fg(self.theme.muted),
            ),
        ]))
        .block(Block::default().borders(Borders::ALL).title("Status"));
        frame.render_widget(status, area);
    }

    fn render_starter_prompt(&self, frame: &mut Frame) {
        let area = centered_rect(54, 9, frame.size());
        frame.render_widget(Clear, area);

        let catalog = self.service.catalog();
        let choices: Vec<Span> = STARTER_CHOICES
            .iter()
            .enumerate()
            .flat_map(|(idx, id)| {
                let name = catalog
                    .get(*id)
                    .map(CatalogEntry::display_name)
                    .unwrap_or_else(|| format!("#{id}"));
                let style = if idx == self.state.starter_cursor {
                    Style::default()
                        .fg(self.theme.selection_fg)
                        .bg(self.theme.accent)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(self.theme.primary_fg)
                };
                [Span::styled(format!(" {name} "), style), Span::raw("  ")]
            })
            .collect();

        let lines = vec![
            Line::from("Choose your first partner"),
            Line::from(""),
            Line::from(choices),
            Line::from(""),
            Line::from(Span::styled(
                "←/→ move • enter confirm",
                Style::default().fg(self.theme.muted),
            )),
        ];
        let prompt = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Starter"));
        frame.render_widget(prompt, area);
    }
}

fn append_completions(status: &mut String, report: &ProgressReport, kind: &str) {
    for goal in &report.completed {
        status.push_str(&format!(" • {kind} complete: {}", goal.title));
    }
}

/// Spin reset boundary worth asking the backend about, if any.
///
/// Each boundary is attempted once; when the backend declines to reset,
/// the next attempt waits for the following boundary.
fn spin_reset_to_attempt(
    spins: &SpinState,
    attempted: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    if spins.free_spins >= spins.base_free_spins {
        return None;
    }
    let last = spins.last_spin_reset?.with_timezone(&Local).naive_local();
    if !schedule::spin_reset_due(last, now) {
        return None;
    }
    let boundary = schedule::previous_spin_reset(now);
    (attempted != Some(boundary)).then_some(boundary)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    status: String,
    should_quit: bool,
    inventory_cursor: usize,
    mission_cursor: usize,
    achievement_cursor: usize,
    shop_cursor: usize,
    starter_cursor: usize,
    reset_attempted: Option<NaiveDateTime>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            status: "Ready".to_string(),
            should_quit: false,
            inventory_cursor: 0,
            mission_cursor: 0,
            achievement_cursor: 0,
            shop_cursor: 0,
            starter_cursor: 0,
            reset_attempted: None,
        }
    }
}

impl UiState {
    fn set_status(&mut self, message: String) {
        self.status = message;
    }

    fn move_inventory(&mut self, delta: isize, len: usize) {
        self.inventory_cursor = step_cursor(self.inventory_cursor, delta, len);
    }

    fn move_mission(&mut self, delta: isize, len: usize) {
        self.mission_cursor = step_cursor(self.mission_cursor, delta, len);
    }

    fn move_achievement(&mut self, delta: isize, len: usize) {
        self.achievement_cursor = step_cursor(self.achievement_cursor, delta, len);
    }

    fn move_shop(&mut self, delta: isize, len: usize) {
        self.shop_cursor = step_cursor(self.shop_cursor, delta, len);
    }

    /// Lengths are inventory, missions, achievements, shop.
    fn clamp(&mut self, [inventory, missions, achievements, shop]: [usize; 4]) {
        self.inventory_cursor = self.inventory_cursor.min(inventory.saturating_sub(1));
        self.mission_cursor = self.mission_cursor.min(missions.saturating_sub(1));
        self.achievement_cursor = self.achievement_cursor.min(achievements.saturating_sub(1));
        self.shop_cursor = self.shop_cursor.min(shop.saturating_sub(1));
    }
}

fn step_cursor(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let idx = (cursor as isize + delta).clamp(0, len as isize - 1);
    idx as usize
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn cursor_steps_stay_in_bounds() {
        assert_eq!(step_cursor(0, -1, 5), 0);
        assert_eq!(step_cursor(3, 1, 5), 4);
        assert_eq!(step_cursor(4, 1, 5), 4);
        assert_eq!(step_cursor(2, 1, 0), 0);
    }

    #[test]
    fn tabs_cycle_through_every_screen() {
        let mut screen = Screen::Roulette;
        for expected in [
            Screen::Inventory,
            Screen::Missions,
            Screen::Achievements,
            Screen::Shop,
            Screen::Simulation,
            Screen::Roulette,
        ] {
            screen = screen.next();
            assert_eq!(screen, expected);
        }
    }

    fn spins(free: u32, last_reset: NaiveDateTime) -> SpinState {
        SpinState {
            free_spins: free,
            base_free_spins: 5,
            last_spin_reset: Local
                .from_local_datetime(&last_reset)
                .single()
                .map(|local| local.with_timezone(&Utc)),
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 8)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid time")
    }

    #[test]
    fn reset_is_attempted_once_per_boundary() {
        let state = spins(0, at(10, 20));
        assert_eq!(spin_reset_to_attempt(&state, None, at(10, 50)), None);

        let boundary = spin_reset_to_attempt(&state, None, at(11, 0));
        assert_eq!(boundary, Some(at(11, 0)));
        // the backend declined; later ticks before 13:00 stay quiet
        assert_eq!(spin_reset_to_attempt(&state, boundary, at(11, 1)), None);
        assert_eq!(spin_reset_to_attempt(&state, boundary, at(12, 59)), None);
        assert_eq!(spin_reset_to_attempt(&state, boundary, at(13, 0)), Some(at(13, 0)));
    }

    #[test]
    fn full_allowance_never_triggers_a_reset() {
        let state = spins(5, at(10, 20));
        assert_eq!(spin_reset_to_attempt(&state, None, at(15, 0)), None);
        let unstamped = SpinState {
            last_spin_reset: None,
            ..spins(0, at(10, 20))
        };
        assert_eq!(spin_reset_to_attempt(&unstamped, None, at(15, 0)), None);
    }

    #[test]
    fn clamp_keeps_every_cursor_in_range() {
        let mut state = UiState {
            inventory_cursor: 9,
            mission_cursor: 9,
            achievement_cursor: 9,
            shop_cursor: 9,
            ..UiState::default()
        };
        state.clamp([3, 0, 4, 5]);
        assert_eq!(
            (
                state.inventory_cursor,
                state.mission_cursor,
                state.achievement_cursor,
                state.shop_cursor
            ),
            (2, 0, 3, 4)
        );
    }

    #[test]
    fn centered_rect_fits_inside_area() {
        let area = Rect::new(0, 0, 40, 10);
        let rect = centered_rect(54, 9, area);
        assert_eq!(rect.width, 40);
        assert_eq!(rect.x, 0);
        assert_eq!(rect.y, 0);
    }

    #[test]
    fn completions_are_appended_to_status() {
        let mut status = "Caught Mew (secret)".to_string();
        let report = ProgressReport {
            completed: vec![roulette_core::progress::CompletedGoal {
                id: "daily-rare".to_string(),
                title: "Catch a rare creature".to_string(),
            }],
            rewards: Default::default(),
        };
        append_completions(&mut status, &report, "mission");
        assert_eq!(
            status,
            "Caught Mew (secret) • mission complete: Catch a rare creature"
        );
    }
}
