use anyhow::{anyhow, Context};
use chrono::Utc;
use eframe::egui;
use egui::{Color32, CornerRadius, RichText, ScrollArea, Stroke, Ui, ViewportBuilder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod admin;
mod animator;
mod api_client;
mod cache;
mod config;
mod dispatch;
mod engine;
mod feedback;
mod models;
mod optimistic;
mod poller;
mod refine;
#[cfg(test)]
mod testing;

use crate::admin::{AdminFeed, AdminState};
use crate::animator::AnimationKind;
use crate::api_client::{LeaderboardClient, RemoteExecutor};
use crate::config::Config;
use crate::dispatch::{RuntimeSpawner, Spawner};
use crate::engine::{LoadState, SyncEngine};
use crate::feedback::{FeedbackDraft, FeedbackStatus, MAX_FEEDBACK_CHARS};
use crate::models::{
    Item, ItemId, Period, QueryKey, SortMode, VoteDirection, LANGUAGES, REGIONS,
};
use crate::refine::Refinement;

fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load()?;
    info!("Using leaderboard API at {}", config.api_url);

    // Remote calls block, so they run on the runtime's blocking pool
    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let executor: Arc<dyn RemoteExecutor> =
        Arc::new(LeaderboardClient::new(&config.api_url, config.request_timeout)?);
    let spawner: Arc<dyn Spawner> = Arc::new(RuntimeSpawner::new(runtime.handle().clone()));

    let options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([1000.0, 800.0])
            .with_min_inner_size([700.0, 500.0])
            .with_title("Leaderboard Reader"),
        ..Default::default()
    };

    eframe::run_native(
        "Leaderboard Reader",
        options,
        Box::new(move |cc| {
            let mut app = LeaderboardApp::new(&config, executor, spawner);

            if let Some(storage) = cc.storage {
                if let Some(theme_str) = storage.get_string("is_dark_mode") {
                    if let Ok(is_dark_mode) = theme_str.parse::<bool>() {
                        app.is_dark_mode = is_dark_mode;
                        app.theme = AppTheme::for_mode(is_dark_mode);
                    }
                }
            }

            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow!("Failed to run window: {e}"))
}

struct AppTheme {
    dark: bool,
    background: Color32,
    card_background: Color32,
    text: Color32,
    secondary_text: Color32,
    highlight: Color32,
    separator: Color32,
    score_high: Color32,
    score_medium: Color32,
    score_low: Color32,
    upvote: Color32,
    downvote: Color32,
    rejected: Color32,
    button_background: Color32,
    button_foreground: Color32,
    button_hover_background: Color32,
}

impl AppTheme {
    fn dark() -> Self {
        Self {
            dark: true,
            background: Color32::from_rgb(18, 18, 18),
            card_background: Color32::from_rgb(30, 30, 30),
            text: Color32::from_rgb(240, 240, 240),
            secondary_text: Color32::from_rgb(180, 180, 180),
            highlight: Color32::from_rgb(124, 92, 255),
            separator: Color32::from_rgb(60, 60, 60),
            score_high: Color32::from_rgb(76, 175, 80),
            score_medium: Color32::from_rgb(255, 193, 7),
            score_low: Color32::from_rgb(158, 158, 158),
            upvote: Color32::from_rgb(102, 187, 106),
            downvote: Color32::from_rgb(239, 83, 80),
            rejected: Color32::from_rgb(255, 152, 0),
            button_background: Color32::from_rgb(66, 66, 66),
            button_foreground: Color32::from_rgb(240, 240, 240),
            button_hover_background: Color32::from_rgb(80, 80, 80),
        }
    }

    fn light() -> Self {
        Self {
            dark: false,
            background: Color32::from_rgb(245, 245, 245),
            card_background: Color32::from_rgb(255, 255, 255),
            text: Color32::from_rgb(20, 20, 20),
            secondary_text: Color32::from_rgb(90, 90, 90),
            highlight: Color32::from_rgb(98, 64, 230),
            separator: Color32::from_rgb(200, 200, 200),
            score_high: Color32::from_rgb(30, 110, 40),
            score_medium: Color32::from_rgb(190, 130, 0),
            score_low: Color32::from_rgb(80, 80, 80),
            upvote: Color32::from_rgb(46, 125, 50),
            downvote: Color32::from_rgb(198, 40, 40),
            rejected: Color32::from_rgb(230, 81, 0),
            button_background: Color32::from_rgb(235, 235, 235),
            button_foreground: Color32::from_rgb(20, 20, 20),
            button_hover_background: Color32::from_rgb(210, 210, 210),
        }
    }

    fn for_mode(is_dark_mode: bool) -> Self {
        if is_dark_mode {
            Self::dark()
        } else {
            Self::light()
        }
    }

    fn apply_to_ctx(&self, ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();
        style.visuals = if self.dark {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };

        style.visuals.panel_fill = self.background;
        style.visuals.window_fill = self.card_background;
        style.visuals.window_stroke = Stroke::new(1.0, self.separator);
        style.visuals.widgets.noninteractive.bg_fill = self.card_background;
        style.visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, self.text);

        style.visuals.widgets.inactive.bg_fill = self.button_background;
        style.visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.hovered.bg_fill = self.button_hover_background;
        style.visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.active.bg_fill = self.highlight;

        style.visuals.selection.bg_fill = self.highlight;
        style.visuals.selection.stroke = Stroke::new(1.0, self.highlight);

        style.visuals.window_corner_radius = CornerRadius::same(8);
        style.visuals.widgets.inactive.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.hovered.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.active.corner_radius = CornerRadius::same(4);

        ctx.set_style(style);
    }

    fn score_color(&self, score: i64) -> Color32 {
        if score >= 50 {
            self.score_high
        } else if score >= 10 {
            self.score_medium
        } else if score < 0 {
            self.downvote
        } else {
            self.score_low
        }
    }

    fn animation_color(&self, kind: AnimationKind) -> Color32 {
        match kind {
            AnimationKind::Up => self.upvote,
            AnimationKind::Down => self.downvote,
            AnimationKind::Rejected => self.rejected,
            AnimationKind::Failed => self.secondary_text,
        }
    }

    fn card_stroke(&self, animation: Option<AnimationKind>) -> Stroke {
        match animation {
            Some(AnimationKind::Rejected) => Stroke::new(2.0, self.rejected),
            Some(kind) => Stroke::new(1.5, self.animation_color(kind)),
            None => Stroke::new(1.0, self.separator),
        }
    }
}

/// Everything the user can ask for during one frame. Collected while
/// rendering and applied afterwards, so rendering only needs `&self`.
enum UiAction {
    SetSort(SortMode),
    SetPeriod(Period),
    SetRegion(Option<String>),
    SetLanguage(Option<String>),
    SetRefinement(Refinement),
    GotoPage(u32),
    Refresh,
    Vote(ItemId, VoteDirection),
    OpenFeedback(ItemId),
    Copy(String),
    ToggleTheme,
    ToggleAdmin,
}

enum AdminAction {
    Login,
    Logout,
    GotoPage(u32),
}

struct LeaderboardApp {
    engine: SyncEngine,
    admin: AdminFeed,
    theme: AppTheme,
    is_dark_mode: bool,
    sort: SortMode,
    period: Period,
    region: Option<String>,
    language: Option<String>,
    page: u32,
    // Feedback dialog
    feedback_target: Option<(ItemId, String)>,
    feedback_draft: FeedbackDraft,
    feedback_error: Option<String>,
    // Admin panel
    show_admin: bool,
    admin_password: String,
}

impl LeaderboardApp {
    fn new(config: &Config, executor: Arc<dyn RemoteExecutor>, spawner: Arc<dyn Spawner>) -> Self {
        let now = Instant::now();
        let mut engine = SyncEngine::new(config, Arc::clone(&executor), Arc::clone(&spawner), now);
        engine.refresh(now);

        Self {
            engine,
            admin: AdminFeed::new(executor, spawner),
            theme: AppTheme::dark(),
            is_dark_mode: true,
            sort: SortMode::Hot,
            period: Period::Week,
            region: None,
            language: None,
            page: 1,
            feedback_target: None,
            feedback_draft: FeedbackDraft::default(),
            feedback_error: None,
            show_admin: false,
            admin_password: String::new(),
        }
    }

    fn query_key(&self) -> QueryKey {
        QueryKey::new(
            self.sort,
            self.period,
            self.region.as_deref(),
            self.language.as_deref(),
            self.page,
        )
    }

    fn apply_actions(&mut self, actions: Vec<UiAction>, now: Instant) {
        let mut query_changed = false;
        for action in actions {
            match action {
                UiAction::SetSort(sort) => {
                    self.sort = sort;
                    self.page = 1;
                    query_changed = true;
                }
                UiAction::SetPeriod(period) => {
                    self.period = period;
                    self.page = 1;
                    query_changed = true;
                }
                UiAction::SetRegion(region) => {
                    self.region = region;
                    self.page = 1;
                    query_changed = true;
                }
                UiAction::SetLanguage(language) => {
                    self.language = language;
                    self.page = 1;
                    query_changed = true;
                }
                UiAction::GotoPage(page) => {
                    self.page = self.engine.active_key().with_page(page).page();
                    query_changed = true;
                }
                UiAction::SetRefinement(refinement) => self.engine.set_refinement(refinement),
                UiAction::Refresh => self.engine.refresh(now),
                UiAction::Vote(id, direction) => {
                    self.engine.vote(id, direction, now);
                }
                UiAction::OpenFeedback(id) => {
                    let label = self
                        .engine
                        .page()
                        .and_then(|page| page.item(id).map(|item| entry_line(item)))
                        .unwrap_or_default();
                    if self.feedback_target.as_ref().map(|(target, _)| *target) != Some(id) {
                        self.feedback_draft.reset();
                        self.feedback_error = None;
                        self.engine.clear_feedback_status(id);
                    }
                    self.feedback_target = Some((id, label));
                }
                UiAction::Copy(text) => {
                    let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
                    if let Err(e) = copied {
                        warn!("Failed to copy to clipboard: {}", e);
                    }
                }
                UiAction::ToggleTheme => {
                    self.is_dark_mode = !self.is_dark_mode;
                    self.theme = AppTheme::for_mode(self.is_dark_mode);
                }
                UiAction::ToggleAdmin => self.show_admin = !self.show_admin,
            }
        }

        if query_changed {
            let key = self.query_key();
            if &key != self.engine.active_key() {
                self.engine.set_query(key, now);
            }
        }
    }

    fn render_controls(&self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        ui.horizontal(|ui| {
            ui.heading(RichText::new("Leaderboard").color(self.theme.highlight).strong());
            ui.add_space(16.0);

            for sort in SortMode::ALL {
                if ui.selectable_label(self.sort == sort, sort.label()).clicked() && self.sort != sort {
                    actions.push(UiAction::SetSort(sort));
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let theme_label = if self.is_dark_mode { "Light mode" } else { "Dark mode" };
                if ui.button(theme_label).clicked() {
                    actions.push(UiAction::ToggleTheme);
                }
                let admin_label = if self.admin.is_logged_in() { "Admin (signed in)" } else { "Admin" };
                if ui.button(admin_label).clicked() {
                    actions.push(UiAction::ToggleAdmin);
                }
                if ui.button("Refresh").clicked() {
                    actions.push(UiAction::Refresh);
                }
            });
        });

        if self.engine.active_key().sort() == SortMode::Top {
            ui.horizontal(|ui| {
                for period in Period::ALL {
                    if ui.selectable_label(self.period == period, period.label()).clicked()
                        && self.period != period
                    {
                        actions.push(UiAction::SetPeriod(period));
                    }
                }
            });
        }

        ui.horizontal(|ui| {
            let mut region = self.region.clone();
            egui::ComboBox::from_label("Region")
                .selected_text(region.as_deref().unwrap_or("All regions"))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut region, None, "All regions");
                    for r in REGIONS {
                        ui.selectable_value(&mut region, Some(r.to_string()), *r);
                    }
                });
            if region != self.region {
                actions.push(UiAction::SetRegion(region));
            }

            let mut language = self.language.clone();
            egui::ComboBox::from_label("Language")
                .selected_text(language.as_deref().map(capitalize).unwrap_or_else(|| "All languages".to_string()))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut language, None, "All languages");
                    for l in LANGUAGES {
                        ui.selectable_value(&mut language, Some(l.to_string()), capitalize(l));
                    }
                });
            if language != self.language {
                actions.push(UiAction::SetLanguage(language));
            }
        });

        self.render_refinement(ui, actions);
    }

    fn render_refinement(&self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        let choices = self.engine.choices();
        let current = self.engine.refinement().clone();
        let mut refinement = current.clone();

        ui.horizontal(|ui| {
            ui.label(RichText::new("On this page:").color(self.theme.secondary_text));

            egui::ComboBox::from_label("Rank")
                .selected_text(refinement.rank_tier.clone().unwrap_or_else(|| "Any rank".to_string()))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut refinement.rank_tier, None, "Any rank");
                    for tier in &choices.rank_tiers {
                        ui.selectable_value(&mut refinement.rank_tier, Some(tier.clone()), tier.as_str());
                    }
                });

            egui::ComboBox::from_label("Champion")
                .selected_text(refinement.tag.clone().unwrap_or_else(|| "Any champion".to_string()))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut refinement.tag, None, "Any champion");
                    for tag in &choices.tags {
                        ui.selectable_value(&mut refinement.tag, Some(tag.clone()), tag.as_str());
                    }
                });

            if current.is_active() && ui.button("Clear").clicked() {
                refinement.clear();
            }
        });

        if refinement != current {
            actions.push(UiAction::SetRefinement(refinement));
        }
    }

    fn render_list(&self, ui: &mut Ui, actions: &mut Vec<UiAction>, now: Instant) {
        let page = self.engine.page();

        match (self.engine.load_state(), &page) {
            (LoadState::Loading, None) | (LoadState::Idle, None) => {
                ui.vertical_centered(|ui| {
                    ui.add_space(40.0);
                    ui.spinner();
                    ui.label("Loading...");
                });
                return;
            }
            (LoadState::Failed(message), None) => {
                ui.vertical_centered(|ui| {
                    ui.add_space(40.0);
                    ui.colored_label(self.theme.downvote, format!("Failed to load: {message}"));
                    if ui.button("Try again").clicked() {
                        actions.push(UiAction::Refresh);
                    }
                });
                return;
            }
            (LoadState::Failed(message), Some(_)) => {
                ui.horizontal(|ui| {
                    ui.colored_label(self.theme.downvote, format!("Refresh failed: {message}"));
                    if ui.small_button("Retry").clicked() {
                        actions.push(UiAction::Refresh);
                    }
                });
            }
            (LoadState::Loading, Some(_)) => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(RichText::new("Updating...").color(self.theme.secondary_text));
                });
            }
            _ => {
                if let Some(age) = self.engine.page_age(now) {
                    ui.label(
                        RichText::new(format!("Updated {}s ago", age.as_secs()))
                            .color(self.theme.secondary_text)
                            .small(),
                    );
                }
            }
        }

        let Some(page) = page else {
            return;
        };

        if page.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.label(RichText::new("No translations yet!").color(self.theme.secondary_text));
            });
        } else {
            let items = self.engine.visible_items();
            if self.engine.refinement().is_active() {
                ui.label(
                    RichText::new(format!("Showing {} of {} on this page", items.len(), page.items.len()))
                        .color(self.theme.secondary_text),
                );
            }

            let wall_clock = Utc::now();
            ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
                for item in &items {
                    self.render_item(ui, item, actions, now, wall_clock);
                    ui.add_space(6.0);
                }
            });
        }
    }

    fn render_item(
        &self,
        ui: &mut Ui,
        item: &Item,
        actions: &mut Vec<UiAction>,
        now: Instant,
        wall_clock: chrono::DateTime<Utc>,
    ) {
        let animation = self.engine.animation(item.id, now);
        let score_color = animation
            .map(|kind| self.theme.animation_color(kind))
            .unwrap_or_else(|| self.theme.score_color(item.score()));

        egui::Frame::group(ui.style())
            .fill(self.theme.card_background)
            .stroke(self.theme.card_stroke(animation))
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.horizontal(|ui| {
                    ui.vertical(|ui| {
                        ui.set_width(48.0);
                        if ui.button("⬆").on_hover_text("Upvote").clicked() {
                            actions.push(UiAction::Vote(item.id, VoteDirection::Up));
                        }
                        ui.label(RichText::new(item.score().to_string()).color(score_color).strong().size(16.0));
                        if ui.button("⬇").on_hover_text("Downvote").clicked() {
                            actions.push(UiAction::Vote(item.id, VoteDirection::Down));
                        }
                    });

                    ui.vertical(|ui| {
                        ui.horizontal_wrapped(|ui| {
                            ui.label(RichText::new(&item.username).color(self.theme.highlight).size(17.0));
                            if let Some(transliteration) = &item.transliteration {
                                ui.label(RichText::new(format!("({transliteration})")).color(self.theme.secondary_text));
                            }
                            ui.label(RichText::new("→").color(self.theme.secondary_text));
                            ui.label(RichText::new(&item.translation).color(self.theme.text).strong().size(17.0));
                        });

                        if let Some(explanation) = &item.explanation {
                            ui.label(RichText::new(explanation).color(self.theme.secondary_text));
                        }

                        ui.horizontal_wrapped(|ui| {
                            let meta = |text: String| RichText::new(text).color(self.theme.secondary_text).small();
                            ui.label(meta(item.region.clone()));
                            ui.label(meta(capitalize(&item.language)));
                            if let Some(rank) = &item.rank {
                                ui.label(meta(rank.clone()));
                            }
                            if !item.top_champions.is_empty() {
                                ui.label(meta(item.top_champions.join(", ")));
                            }
                            if item.verified {
                                ui.label(RichText::new("✔ Verified").color(self.theme.upvote).small());
                            }
                            ui.label(meta(format!(
                                "{} · {} up / {} down",
                                item.age_label(wall_clock),
                                item.upvotes,
                                item.downvotes
                            )));
                        });

                        ui.horizontal(|ui| {
                            if ui.small_button("Feedback").clicked() {
                                actions.push(UiAction::OpenFeedback(item.id));
                            }
                            if ui.small_button("Copy").clicked() {
                                actions.push(UiAction::Copy(entry_line(item)));
                            }
                            if self.engine.is_vote_pending(item.id) {
                                ui.spinner();
                            }
                        });
                    });
                });
            });
    }

    fn render_pagination(&self, ui: &mut Ui, actions: &mut Vec<UiAction>) {
        let Some(pagination) = self.engine.pagination() else {
            return;
        };
        if !pagination.needs_controls() {
            return;
        }

        ui.horizontal(|ui| {
            if ui.add_enabled(pagination.has_prev(), egui::Button::new("← Prev")).clicked() {
                actions.push(UiAction::GotoPage(self.page.saturating_sub(1)));
            }
            ui.label(format!("Page {} of {}", pagination.page, pagination.total_pages()));
            if ui.add_enabled(pagination.has_next(), egui::Button::new("Next →")).clicked() {
                actions.push(UiAction::GotoPage(self.page + 1));
            }
        });
    }

    fn render_feedback_window(&mut self, ctx: &egui::Context) {
        let Some((id, label)) = self.feedback_target.clone() else {
            return;
        };

        // A delivered submission clears the draft; a failed one keeps it
        self.feedback_draft.observe(self.engine.feedback_status(id));

        let mut open = true;
        let mut send = false;
        let status = self.engine.feedback_status(id).cloned();
        egui::Window::new("Feedback")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(RichText::new(&label).strong());
                ui.add(
                    egui::TextEdit::multiline(&mut self.feedback_draft.text)
                        .desired_rows(4)
                        .hint_text("What is off about this translation?"),
                );
                let len = self.feedback_draft.text.trim().chars().count();
                let counter_color = if len > MAX_FEEDBACK_CHARS {
                    self.theme.downvote
                } else {
                    self.theme.secondary_text
                };
                ui.colored_label(counter_color, format!("{len}/{MAX_FEEDBACK_CHARS}"));

                ui.horizontal(|ui| {
                    let sending = status == Some(FeedbackStatus::Sending);
                    if ui.add_enabled(!sending, egui::Button::new("Send")).clicked() {
                        send = true;
                    }
                    match &status {
                        Some(FeedbackStatus::Sending) => {
                            ui.spinner();
                        }
                        Some(FeedbackStatus::Sent) => {
                            ui.colored_label(self.theme.upvote, "Thanks, feedback sent.");
                        }
                        Some(FeedbackStatus::Failed(message)) => {
                            ui.colored_label(self.theme.downvote, message);
                        }
                        None => {}
                    }
                });

                if let Some(error) = &self.feedback_error {
                    ui.colored_label(self.theme.downvote, error);
                }
            });

        if send {
            self.feedback_error = self
                .engine
                .submit_feedback(id, &self.feedback_draft.text)
                .err()
                .map(|e| e.to_string());
        }
        if !open {
            self.feedback_target = None;
        }
    }

    fn render_admin_window(&mut self, ctx: &egui::Context) {
        if !self.show_admin {
            return;
        }

        let mut open = true;
        let mut action = None;
        let state = self.admin.state().clone();
        egui::Window::new("Feedback review")
            .open(&mut open)
            .default_width(520.0)
            .show(ctx, |ui| match &state {
                AdminState::LoggedOut | AdminState::Unauthorized => {
                    if state == AdminState::Unauthorized {
                        ui.colored_label(self.theme.downvote, "Invalid password");
                    }
                    ui.add(
                        egui::TextEdit::singleline(&mut self.admin_password)
                            .password(true)
                            .hint_text("Admin password"),
                    );
                    if ui.button("Login").clicked() {
                        action = Some(AdminAction::Login);
                    }
                }
                AdminState::Loading { page } => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(format!("Loading page {page}..."));
                    });
                }
                AdminState::Failed { page, message } => {
                    ui.colored_label(self.theme.downvote, format!("Failed to load feedback: {message}"));
                    ui.horizontal(|ui| {
                        if ui.button("Retry").clicked() {
                            action = Some(AdminAction::GotoPage(*page));
                        }
                        if ui.button("Logout").clicked() {
                            action = Some(AdminAction::Logout);
                        }
                    });
                }
                AdminState::Loaded(feedback) => {
                    ui.horizontal(|ui| {
                        ui.heading(format!("Feedback ({})", feedback.pagination.total));
                        if ui.button("Logout").clicked() {
                            action = Some(AdminAction::Logout);
                        }
                    });
                    ScrollArea::vertical().max_height(480.0).show(ui, |ui| {
                        if feedback.data.is_empty() {
                            ui.label(RichText::new("No feedback yet").color(self.theme.secondary_text));
                        }
                        for record in &feedback.data {
                            egui::Frame::group(ui.style()).show(ui, |ui| {
                                ui.set_width(ui.available_width());
                                ui.horizontal_wrapped(|ui| {
                                    ui.label(RichText::new(&record.username).color(self.theme.highlight));
                                    ui.label("→");
                                    ui.label(RichText::new(&record.translation).strong());
                                });
                                ui.label(&record.feedback_text);
                                ui.label(
                                    RichText::new(record.created_at.format("%Y-%m-%d %H:%M").to_string())
                                        .color(self.theme.secondary_text)
                                        .small(),
                                );
                            });
                        }
                    });

                    let pagination = feedback.pagination;
                    if pagination.needs_controls() {
                        ui.horizontal(|ui| {
                            if ui.add_enabled(pagination.has_prev(), egui::Button::new("← Prev")).clicked() {
                                action = Some(AdminAction::GotoPage(pagination.page - 1));
                            }
                            ui.label(format!("Page {} of {}", pagination.page, pagination.total_pages()));
                            if ui.add_enabled(pagination.has_next(), egui::Button::new("Next →")).clicked() {
                                action = Some(AdminAction::GotoPage(pagination.page + 1));
                            }
                        });
                    }
                }
            });

        match action {
            Some(AdminAction::Login) => {
                self.admin.login(&self.admin_password);
                self.admin_password.clear();
            }
            Some(AdminAction::Logout) => self.admin.logout(),
            Some(AdminAction::GotoPage(page)) => self.admin.goto_page(page),
            None => {}
        }
        if !open {
            self.show_admin = false;
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn entry_line(item: &Item) -> String {
    format!("{} → {}", item.username, item.translation)
}

impl eframe::App for LeaderboardApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        storage.set_string("is_dark_mode", self.is_dark_mode.to_string());
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.theme.apply_to_ctx(ctx);

        self.engine.pump(now);
        self.admin.pump();

        let mut actions = Vec::new();
        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            self.render_controls(ui, &mut actions);
            ui.add_space(4.0);
        });
        egui::TopBottomPanel::bottom("pagination").show(ctx, |ui| {
            self.render_pagination(ui, &mut actions);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_list(ui, &mut actions, now);
        });

        self.render_feedback_window(ctx);
        self.render_admin_window(ctx);
        self.apply_actions(actions, now);

        // Keep draining completions while calls are out; otherwise sleep
        // until the next timer
        let admin_busy = matches!(self.admin.state(), AdminState::Loading { .. });
        if self.engine.is_busy() || admin_busy {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else {
            ctx.request_repaint_after(self.engine.next_wakeup().saturating_duration_since(now));
        }
    }
}
