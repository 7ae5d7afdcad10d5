#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

mod config;
mod directory;
mod error;
mod flock;
mod launch;
mod ledger;
mod model;
mod shortcut;
mod storage;
mod ticker;
mod ui;
mod view;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::{
    directory::DirectoryClient,
    flock::InstanceLock,
    launch::{CommandLauncher, LaunchWorkflow},
    ledger::format_playtime,
    model::ServerId,
    storage::Storage,
};

#[derive(Parser, Debug)]
#[command(version, about = "osu! server list launcher")]
struct Args {
    /// Launch the server with this id without opening the window
    #[arg(long, value_name = "ID")]
    server: Option<ServerId>,

    /// Directory holding settings and playtime data
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let Some(_lock) = InstanceLock::obtain() else {
        log::error!("another launcher is already running");
        return Ok(());
    };

    let dir = args.data_dir.unwrap_or_else(Storage::default_dir);
    let storage = Storage::open(&dir)
        .with_context(|| format!("failed to open data dir {}", dir.display()))?;

    if let Some(server_id) = args.server {
        return launch_headless(storage, server_id);
    }

    let app = ui::LauncherApp::new(storage)?;
    ui::run_ui(app);

    Ok(())
}

fn launch_headless(storage: Storage, server_id: ServerId) -> Result<()> {
    let settings = storage.load_settings();
    let servers = DirectoryClient::new(settings.catalog.url.clone())?.fetch_servers()?;
    let selected = servers.iter().find(|s| s.id == server_id);

    let executable = settings
        .osu_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let mut workflow = LaunchWorkflow::new(storage)?;
    let launcher = CommandLauncher::new(settings.wrapper()?);

    let outcome = workflow.launch(selected, &servers, &executable, &launcher)?;

    log::info!(
        "played {} on server {}, total {}",
        format_playtime(outcome.credited),
        outcome.server_id,
        workflow
            .ledger()
            .get(outcome.server_id)
            .map(|r| format_playtime(r.total_minutes))
            .unwrap_or_default()
    );

    outcome.result.context("Failed to launch osu!")
}
