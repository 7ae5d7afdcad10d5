use std::{
    path::PathBuf,
    sync::Arc,
    thread::JoinHandle,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::Utc;
use egui::*;

use crate::{
    config::{self, Settings},
    directory::DirectoryClient,
    error,
    launch::{spawn_launch, CommandLauncher, LaunchState, LaunchWorkflow, ProcessLauncher},
    ledger::format_playtime,
    model::{Server, ServerId},
    shortcut,
    storage::Storage,
    ticker::{TickAction, Ticker},
    view::{self, Favorites, FavoritesFilter, SortMode, StartView},
};

const SITE_URL: &str = "https://osu-server-list.com/";
const DISCORD_URL: &str = "https://discord.gg/AyEFRYHjb4";

/// How often pending background work is polled
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run_ui(app: LauncherApp) {
    let options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title("OSL")
            .with_inner_size([1000.0, 700.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    if let Err(err) = eframe::run_native(
        env!("CARGO_PKG_NAME"),
        options,
        Box::new(|_cc| Box::new(app)),
    ) {
        log::error!("UI error: {err}");
    }
}

pub struct LauncherApp {
    storage: Storage,
    settings: Settings,
    directory: DirectoryClient,
    launcher: Arc<dyn ProcessLauncher>,
    workflow: LaunchWorkflow<Storage>,
    favorites: Favorites,

    /// Server list fetch in flight
    fetch_thread: Option<JoinHandle<error::Result<Vec<Server>>>>,

    /// Last fetched server list
    servers: Vec<Server>,

    /// Fetch error shown in place of the list
    fetch_error: Option<String>,

    /// Running game, with the server its session belongs to
    launch_thread: Option<(ServerId, JoinHandle<error::Result<()>>)>,

    selected: Option<ServerId>,
    show_favorites: bool,
    search_state: String,

    /// Executable path being edited in settings/welcome
    path_input: String,

    settings_open: bool,
    stats_open: bool,
    welcome_open: bool,
    stats_ticker: Ticker,

    /// Blocking alert (if occurred)
    error: Option<String>,

    /// Informational alert
    notice: Option<String>,
}

impl LauncherApp {
    pub fn new(storage: Storage) -> Result<Self> {
        let mut settings = storage.load_settings();

        let welcome_open = !settings.has_launched || settings.osu_path.is_none();
        if !settings.has_launched {
            settings.has_launched = true;
            if let Err(err) = storage.save_settings(&settings) {
                log::warn!("{err}");
            }
        }

        let mut workflow =
            LaunchWorkflow::new(storage.clone()).context("Failed to load playtime data")?;
        workflow.set_auto_close(settings.auto_close);

        let wrapper = settings.wrapper().unwrap_or_else(|err| {
            log::warn!("ignoring launch wrapper: {err}");
            vec![]
        });

        let mut show_favorites = false;
        match settings.auto_start_sort {
            StartView::None => {}
            StartView::Votes => settings.sort_by = SortMode::Votes,
            StartView::Players => settings.sort_by = SortMode::Players,
            StartView::Favorites => show_favorites = true,
        }

        let directory = DirectoryClient::new(settings.catalog.url.clone())?;
        let favorites = storage.load_favorites();
        let path_input = settings
            .osu_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        Ok(Self {
            fetch_thread: Some(directory.spawn_fetch()),
            storage,
            settings,
            directory,
            launcher: Arc::new(CommandLauncher::new(wrapper)),
            workflow,
            favorites,
            servers: vec![],
            fetch_error: None,
            launch_thread: None,
            selected: None,
            show_favorites,
            search_state: String::with_capacity(16),
            path_input,
            settings_open: false,
            stats_open: false,
            welcome_open,
            stats_ticker: Ticker::default(),
            error: None,
            notice: None,
        })
    }

    fn refresh(&mut self) {
        if self.fetch_thread.is_none() {
            self.fetch_error = None;
            self.fetch_thread = Some(self.directory.spawn_fetch());
        }
    }

    fn poll_fetch(&mut self) {
        if !self.fetch_thread.as_ref().is_some_and(|t| t.is_finished()) {
            return;
        }

        let Some(fetch_thread) = self.fetch_thread.take() else {
            return;
        };

        let result = fetch_thread
            .join()
            .unwrap_or_else(|_| Err(error::Error::network("fetch thread panicked")));

        match result {
            Ok(servers) => {
                self.servers = servers;
                self.fetch_error = None;
            }
            Err(err) => {
                log::warn!("failed to fetch servers: {err}");
                self.fetch_error = Some(err.to_string());
            }
        }
    }

    fn poll_launch(&mut self, ctx: &egui::Context) {
        if !self
            .launch_thread
            .as_ref()
            .is_some_and(|(_, t)| t.is_finished())
        {
            return;
        }

        let Some((server_id, launch_thread)) = self.launch_thread.take() else {
            return;
        };

        let result = launch_thread
            .join()
            .unwrap_or_else(|_| Err(error::Error::launch("launcher thread panicked")));

        let outcome = self.workflow.settle(server_id, result, Utc::now());

        if let Err(err) = outcome.result {
            self.on_error(
                anyhow::Error::new(err)
                    .context("Failed to launch osu! Please check the path and try again."),
            );
        } else if outcome.exit_requested {
            close(ctx);
        }
    }

    fn poll_stats(&mut self, ctx: &egui::Context) {
        let active = self.stats_open && self.workflow.is_session_active();

        match self.stats_ticker.poll(Instant::now(), active) {
            TickAction::Inactive => {}
            TickAction::Tick => {
                self.workflow.tick(Utc::now());
            }
            TickAction::Wait(left) => ctx.request_repaint_after(left),
        }
    }

    fn current_view(&self) -> Vec<Server> {
        let filter = FavoritesFilter {
            show_favorites: self.show_favorites,
            sort_favorites: self.settings.favorites_sort,
        };
        let sorted = view::sorted_view(&self.servers, &self.favorites, self.settings.sort_by, filter);

        view::search(sorted, &self.search_state)
    }

    fn selected_server(&self) -> Option<Server> {
        let id = self.selected?;

        self.servers
            .iter()
            .chain(self.favorites.servers())
            .find(|s| s.id == id)
            .cloned()
    }

    fn launch_selected(&mut self) -> Result<()> {
        let executable = self
            .settings
            .osu_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let selected = self.selected_server();

        let request = self
            .workflow
            .begin(selected.as_ref(), &self.servers, &executable, Utc::now())
            .context("Failed to launch osu!")?;

        let launch_thread = spawn_launch(self.launcher.clone(), &request);
        self.launch_thread = Some((request.server.id, launch_thread));

        Ok(())
    }

    fn toggle_favorite(&mut self, server: &Server) {
        self.favorites.toggle(server);

        if let Err(err) = self.storage.save_favorites(&self.favorites) {
            log::warn!("failed to save favorites: {err}");
        }
    }

    fn save_settings(&mut self) {
        self.workflow.set_auto_close(self.settings.auto_close);

        if let Err(err) = self.storage.save_settings(&self.settings) {
            log::warn!("failed to save settings: {err}");
        }
    }

    /// Stores the typed executable path if it passes the extension check
    fn apply_path(&mut self) -> Result<()> {
        let path = PathBuf::from(self.path_input.trim());

        anyhow::ensure!(
            self.settings.accepts_executable(&path),
            "Please select an .exe file!"
        );

        log::info!("osu! path set to {}", path.display());

        self.settings.osu_path = Some(path);
        self.save_settings();

        Ok(())
    }

    fn on_error(&mut self, err: anyhow::Error) {
        self.error = Some(format!("{err:?}"));
    }

    fn reset_error(&mut self) {
        self.error = None;
    }

    fn check_input(&mut self, ctx: &egui::Context, view: &[Server]) -> Result<()> {
        let (escape, down, up, enter) = ctx.input(|input| {
            (
                input.key_pressed(Key::Escape),
                input.key_pressed(Key::ArrowDown),
                input.key_pressed(Key::ArrowUp),
                input.key_pressed(Key::Enter),
            )
        });

        if escape {
            if self.error.is_some() {
                self.reset_error();
            } else {
                self.notice = None;
            }
            return Ok(());
        }

        if self.error.is_some() || view.is_empty() || ctx.wants_keyboard_input() {
            return Ok(());
        }

        let position = self
            .selected
            .and_then(|id| view.iter().position(|s| s.id == id));

        if down {
            let next = position.map_or(0, |p| (p + 1).min(view.len() - 1));
            self.selected = Some(view[next].id);
        } else if up {
            let prev = position.map_or(0, |p| p.saturating_sub(1));
            self.selected = Some(view[prev].id);
        } else if enter && position.is_some() && self.launch_thread.is_none() {
            self.launch_selected()?;
        }

        Ok(())
    }

    fn top_bar(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            let mut sort_by = self.settings.sort_by;
            for (mode, label) in [(SortMode::Votes, "Votes"), (SortMode::Players, "Players")] {
                if ui.selectable_label(sort_by == mode, label).clicked() {
                    sort_by = if sort_by == mode { SortMode::None } else { mode };
                }
            }
            if sort_by != self.settings.sort_by {
                self.settings.sort_by = sort_by;
                self.save_settings();
            }

            let favorites = RichText::new(format!("★ Favorites ({})", self.favorites.len()));
            if ui.selectable_label(self.show_favorites, favorites).clicked() {
                self.show_favorites = !self.show_favorites;
            }

            let refresh = ui.add_enabled(self.fetch_thread.is_none(), Button::new("⟳ Refresh"));
            if refresh.clicked() {
                self.refresh();
            }

            ui.separator();

            TextEdit::singleline(&mut self.search_state)
                .hint_text("🔎 Search")
                .desired_width(200.0)
                .show(ui);

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if ui.button("Settings").clicked() {
                    self.settings_open = true;
                }
                if ui.button("Playtime Stats").clicked() {
                    self.stats_open = true;
                }
                if ui.link("Discord").clicked() {
                    ui.ctx().open_url(OpenUrl::new_tab(DISCORD_URL));
                }
                if ui.link("osu-server-list.com").clicked() {
                    ui.ctx().open_url(OpenUrl::new_tab(SITE_URL));
                }
            });
        });
    }

    fn server_list(&mut self, ui: &mut Ui, view: &[Server]) {
        if self.fetch_thread.is_some() && self.servers.is_empty() {
            ui.centered_and_justified(|ui| ui.spinner());
            return;
        }

        if let Some(err) = &self.fetch_error {
            ui.centered_and_justified(|ui| {
                ui.colored_label(config::OFFLINE_COLOR, format!("Error: {err}"));
            });
            return;
        }

        if view.is_empty() {
            let message = if self.show_favorites {
                "No favorite servers yet"
            } else if self.servers.is_empty() {
                "No servers available"
            } else {
                "No servers match your search"
            };
            ui.centered_and_justified(|ui| ui.label(message));
            return;
        }

        let mut toggled = None;
        let mut clicked = None;
        let mut launch = false;

        ScrollArea::vertical().show(ui, |ui| {
            // justify rows for better mouse interaction
            let list_layout = Layout::top_down(Align::Min).with_cross_justify(true);

            ui.with_layout(list_layout, |ui| {
                for server in view {
                    let selected = self.selected == Some(server.id);

                    ui.horizontal(|ui| {
                        let favorite = self.favorites.contains(server.id);
                        let star = if favorite {
                            RichText::new("★").color(config::FAVORITE_COLOR)
                        } else {
                            RichText::new("☆")
                        };
                        if ui.button(star).clicked() {
                            toggled = Some(server.clone());
                        }

                        let status = if server.players > 0 {
                            config::ONLINE_COLOR
                        } else {
                            config::OFFLINE_COLOR
                        };
                        ui.colored_label(status, "●");

                        let mut name = RichText::new(&server.name).text_style(TextStyle::Heading);
                        if selected {
                            name = name.background_color(config::SELECTION_COLOR);
                        }

                        let response = ui.selectable_label(selected, name);
                        if response.clicked() {
                            clicked = Some(server.id);
                        }
                        if response.double_clicked() {
                            launch = true;
                        }
                        if selected {
                            response.scroll_to_me(None);
                        }

                        ui.label(format!("{} players", server.players));
                        ui.label(format!("{} votes", server.votes));
                        if !server.url.is_empty() {
                            ui.hyperlink_to("website", &server.url);
                        }
                    });
                }
            });
        });

        if let Some(server) = toggled {
            self.toggle_favorite(&server);
        }

        if let Some(id) = clicked {
            self.selected = Some(id);
        }

        if launch && self.launch_thread.is_none() {
            if let Err(err) = self.launch_selected() {
                self.on_error(err);
            }
        }
    }

    fn launch_bar(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            let selected = self.selected_server();

            match (&selected, self.workflow.state()) {
                (_, LaunchState::SessionActive { server_id }) => {
                    let name = self
                        .workflow
                        .ledger()
                        .get(server_id)
                        .map(|r| r.server_name.clone())
                        .unwrap_or_default();
                    ui.spinner();
                    ui.label(format!("Playing on {name}"));
                }
                (Some(server), LaunchState::Idle) => {
                    ui.label(RichText::new(&server.name).strong());
                    ui.label(format!("-devserver {}", server.devserver));
                }
                (None, LaunchState::Idle) => {
                    ui.label("Select a server to play");
                }
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                let enabled = selected.is_some() && self.launch_thread.is_none();
                let launch = ui.add_enabled(
                    enabled,
                    Button::new(RichText::new("Launch").text_style(TextStyle::Heading)),
                );

                if launch.clicked() {
                    if let Err(err) = self.launch_selected() {
                        self.on_error(err);
                    }
                }
            });
        });
    }

    fn path_editor(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            TextEdit::singleline(&mut self.path_input)
                .hint_text("Path to osu!.exe")
                .desired_width(320.0)
                .show(ui);

            if ui.button("Save path").clicked() {
                match self.apply_path() {
                    Ok(()) => self.welcome_open = false,
                    Err(err) => self.on_error(err),
                }
            }
        });
    }

    fn settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.settings_open;

        egui::Window::new("Settings")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(RichText::new("osu! executable").strong());
                self.path_editor(ui);

                ui.separator();

                if ui
                    .checkbox(&mut self.settings.auto_close, "Close launcher when osu! exits")
                    .changed()
                {
                    self.save_settings();
                }

                if ui
                    .checkbox(&mut self.settings.favorites_sort, "Sort favorites by players")
                    .changed()
                {
                    self.save_settings();
                }

                let before = self.settings.auto_start_sort;
                ComboBox::from_label("Start with")
                    .selected_text(start_view_label(before))
                    .show_ui(ui, |ui| {
                        for view in [
                            StartView::None,
                            StartView::Votes,
                            StartView::Players,
                            StartView::Favorites,
                        ] {
                            ui.selectable_value(
                                &mut self.settings.auto_start_sort,
                                view,
                                start_view_label(view),
                            );
                        }
                    });
                if before != self.settings.auto_start_sort {
                    self.save_settings();
                }

                ui.separator();

                if ui.button("Create desktop shortcut").clicked() {
                    if shortcut::create_shortcut() {
                        self.notice = Some("Desktop shortcut created successfully!".to_owned());
                    } else {
                        self.on_error(anyhow::anyhow!("Failed to create desktop shortcut."));
                    }
                }
            });

        self.settings_open = open;
    }

    fn stats_window(&mut self, ctx: &egui::Context) {
        let mut open = self.stats_open;

        egui::Window::new("Playtime Stats")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                let ledger = self.workflow.ledger();

                if ledger.is_empty() {
                    ui.label("No playtime data yet. Start playing to see statistics!");
                    return;
                }

                Grid::new("playtime_summary").show(ui, |ui| {
                    ui.label("Total");
                    ui.label(format_playtime(ledger.total_minutes()));
                    ui.end_row();

                    ui.label("Favorites");
                    ui.label(format_playtime(ledger.favorites_minutes(&self.favorites)));
                    ui.end_row();

                    if let Some(last) = ledger.last_server() {
                        ui.label("Last played");
                        ui.label(last);
                        ui.end_row();
                    }
                });

                ui.separator();

                for record in ledger.by_total() {
                    ui.horizontal(|ui| {
                        ui.label(RichText::new(&record.server_name).strong());
                        if record.last_session.is_open() {
                            ui.colored_label(config::ONLINE_COLOR, "playing");
                        }
                        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                            ui.label(format_playtime(record.total_minutes));
                        });
                    });
                    ui.label(
                        RichText::new(format!(
                            "Last session: {}",
                            record
                                .last_session
                                .start
                                .with_timezone(&chrono::Local)
                                .format("%Y-%m-%d %H:%M")
                        ))
                        .small(),
                    );
                }
            });

        self.stats_open = open;
    }

    fn welcome_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("Welcome to OSL")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("Pick your osu!.exe to start playing on private servers.");
                self.path_editor(ui);

                if ui.button("Later").clicked() {
                    self.welcome_open = false;
                }
            });
    }

    fn alert(ctx: &egui::Context, message: &str) {
        egui::Window::new("")
            .open(&mut true)
            .title_bar(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, vec2(0.0, 0.0))
            .show(ctx, |ui| {
                let message = format!("{message}\n\nPress <ESC> and try again");
                let message = RichText::new(message).text_style(TextStyle::Heading);
                Label::new(message).ui(ui);
            });
    }
}

impl eframe::App for LauncherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_fetch();
        self.poll_launch(ctx);
        self.poll_stats(ctx);

        if self.fetch_thread.is_some() || self.launch_thread.is_some() {
            ctx.request_repaint_after(POLL_INTERVAL);
        }

        let view = self.current_view();

        if let Err(err) = self.check_input(ctx, &view) {
            self.on_error(err);
        }

        if let Some(err) = self.error.as_ref() {
            Self::alert(ctx, err);
        } else if let Some(notice) = self.notice.as_ref() {
            Self::alert(ctx, notice);
        }

        let interactive = self.error.is_none() && self.notice.is_none();

        TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.set_enabled(interactive);
            self.top_bar(ui);
        });

        TopBottomPanel::bottom("launch_bar").show(ctx, |ui| {
            ui.set_enabled(interactive);
            self.launch_bar(ui);
        });

        CentralPanel::default().show(ctx, |ui| {
            ui.set_enabled(interactive);
            self.server_list(ui, &view);
        });

        if interactive {
            if self.welcome_open {
                self.welcome_window(ctx);
            }
            self.settings_window(ctx);
            self.stats_window(ctx);
        }
    }
}

fn start_view_label(view: StartView) -> &'static str {
    match view {
        StartView::None => "Default order",
        StartView::Votes => "Most votes",
        StartView::Players => "Most players",
        StartView::Favorites => "Favorites",
    }
}

fn close(ctx: &egui::Context) {
    ctx.send_viewport_cmd(ViewportCommand::Close);
}
