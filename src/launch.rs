use std::{
    path::{Component, Path, PathBuf},
    process::Command,
    sync::Arc,
    thread::{self, JoinHandle},
};

use chrono::{DateTime, Utc};

use crate::{
    error::{Error, Result},
    ledger::{format_playtime, Ledger},
    model::{Server, ServerId},
    storage::LedgerRepository,
};

/// Host capability that runs the game client and settles when it exits
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, executable: &Path, devserver: &str) -> Result<()>;
}

/// Runs the executable directly, or through a wrapper such as `wine`
#[derive(Debug, Clone, Default)]
pub struct CommandLauncher {
    wrapper: Vec<String>,
}

impl CommandLauncher {
    pub fn new(wrapper: Vec<String>) -> Self {
        Self { wrapper }
    }

    fn command(&self, executable: &Path, devserver: &str) -> Command {
        let mut cmd = match self.wrapper.split_first() {
            Some((program, args)) => {
                let mut cmd = Command::new(program);
                cmd.args(args).arg(executable);
                cmd
            }
            None => Command::new(executable),
        };

        cmd.arg("-devserver").arg(devserver);

        if let Some(dir) = executable.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }

        cmd
    }
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, executable: &Path, devserver: &str) -> Result<()> {
        let mut cmd = self.command(executable, devserver);

        log::info!("launching: {cmd:?}");

        let status = cmd.status().map_err(|err| {
            Error::launch(format!("failed to start {}: {err}", executable.display()))
        })?;

        if !status.success() {
            return Err(Error::launch(format!(
                "{} exited with {status}",
                executable.display()
            )));
        }

        log::info!("{} exited cleanly", executable.display());

        Ok(())
    }
}

/// Lexically cleans `path`: drops `.` and folds `..` into its parent
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    SessionActive { server_id: ServerId },
}

/// Validated launch, handed to the launcher thread
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub server: Server,
    pub executable: PathBuf,
}

#[derive(Debug)]
pub struct LaunchOutcome {
    pub server_id: ServerId,
    /// Minutes credited when the session closed
    pub credited: u64,
    pub result: Result<()>,
    /// Auto-close is on and the game exited cleanly
    pub exit_requested: bool,
}

/// Owns the playtime ledger and drives sessions around game launches
pub struct LaunchWorkflow<R> {
    repo: R,
    ledger: Ledger,
    state: LaunchState,
    auto_close: bool,
}

impl<R: LedgerRepository> LaunchWorkflow<R> {
    pub fn new(repo: R) -> Result<Self> {
        let ledger = repo.load()?;

        if let Some(open) = ledger.open_session() {
            log::info!(
                "{} has a session left open since {}",
                open.server_name,
                open.last_session.start
            );
        }

        Ok(Self {
            repo,
            ledger,
            state: LaunchState::Idle,
            auto_close: false,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    pub fn is_session_active(&self) -> bool {
        matches!(self.state, LaunchState::SessionActive { .. })
    }

    pub fn set_auto_close(&mut self, auto_close: bool) {
        self.auto_close = auto_close;
    }

    /// Validates the launch and opens the session.
    ///
    /// Nothing is recorded when validation fails.
    pub fn begin(
        &mut self,
        selected: Option<&Server>,
        servers: &[Server],
        executable: &str,
        now: DateTime<Utc>,
    ) -> Result<LaunchRequest> {
        if let LaunchState::SessionActive { server_id } = self.state {
            return Err(Error::configuration(format!(
                "a session is already active (server {server_id})"
            )));
        }

        let executable = executable.trim();
        if executable.is_empty() {
            return Err(Error::configuration("no game executable selected"));
        }

        let executable = normalize_path(Path::new(executable));
        if !executable.is_file() {
            return Err(Error::configuration(format!(
                "{} does not exist",
                executable.display()
            )));
        }

        let server = selected.ok_or_else(|| Error::configuration("no server selected"))?;
        let server = servers
            .iter()
            .find(|s| s.id == server.id)
            .ok_or_else(|| Error::configuration(format!("{} is no longer listed", server.name)))?;

        self.ledger.record_session_start(server, now);
        self.persist();

        self.state = LaunchState::SessionActive {
            server_id: server.id,
        };

        log::info!("session started on {}", server.name);

        Ok(LaunchRequest {
            server: server.clone(),
            executable,
        })
    }

    /// Closes the session once the launcher settled, whatever the result
    pub fn settle(
        &mut self,
        server_id: ServerId,
        result: Result<()>,
        now: DateTime<Utc>,
    ) -> LaunchOutcome {
        self.state = LaunchState::Idle;

        let credited = self
            .ledger
            .record_session_end(server_id, now)
            .unwrap_or_default();
        self.persist();

        match &result {
            Ok(()) => log::info!("session ended, credited {}", format_playtime(credited)),
            Err(err) => log::warn!(
                "launch failed ({err}), credited {}",
                format_playtime(credited)
            ),
        }

        LaunchOutcome {
            server_id,
            credited,
            exit_requested: self.auto_close && result.is_ok(),
            result,
        }
    }

    /// Launches and blocks until the game exits.
    ///
    /// Validation errors are returned directly; launch failures are reported
    /// in the outcome after the session was closed.
    pub fn launch(
        &mut self,
        selected: Option<&Server>,
        servers: &[Server],
        executable: &str,
        launcher: &dyn ProcessLauncher,
    ) -> Result<LaunchOutcome> {
        let request = self.begin(selected, servers, executable, Utc::now())?;
        let result = launcher.launch(&request.executable, &request.server.devserver);

        Ok(self.settle(request.server.id, result, Utc::now()))
    }

    /// Credits elapsed minutes of the running session
    pub fn tick(&mut self, now: DateTime<Utc>) -> u64 {
        let LaunchState::SessionActive { server_id } = self.state else {
            return 0;
        };

        let minutes = self.ledger.accrue_tick(server_id, now);
        if minutes > 0 {
            log::debug!("tick credited {minutes}m");
            self.persist();
        }

        minutes
    }

    fn persist(&self) {
        if let Err(err) = self.repo.save(&self.ledger) {
            log::warn!("failed to save playtime data: {err}");
        }
    }
}

/// Runs the launcher for `request` off the UI thread
pub fn spawn_launch(
    launcher: Arc<dyn ProcessLauncher>,
    request: &LaunchRequest,
) -> JoinHandle<Result<()>> {
    let executable = request.executable.clone();
    let devserver = request.server.devserver.clone();

    thread::spawn(move || launcher.launch(&executable, &devserver))
}
