// Application context - everything a command or key handler can touch
// Passed explicitly to handlers; the signal flags are the only global

pub mod commands;
pub mod input;
pub mod keys;

pub use input::{take_input_file, InputState};
pub use keys::Keymap;

use crate::command::{self, ArgvError, CommandTable, RouteError, Status};
use crate::library::{Library, Playlist};
use crate::player::{Player, PlayerError};
use crate::runtime::signals::SignalFlags;
use crate::ui::{Display, NowPlaying, RepaintTracker, Snapshot};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Argv(#[from] ArgvError),
    #[error(transparent)]
    Route(#[from] RouteError),
}

fn now_playing(player: &Player) -> NowPlaying<'_> {
    NowPlaying {
        state: player.state(),
        track: player.queue().and_then(|q| q.current()),
        mode: player.mode(),
        volume: player.volume(),
    }
}

pub struct App {
    pub player: Player,
    pub library: Library,
    /// Playlist shown on screen; `play N` indexes into it.
    pub viewing: Rc<Playlist>,
    pub display: Box<dyn Display>,
    pub flags: &'static SignalFlags,
    commands: Rc<CommandTable<App>>,
    repaint: RepaintTracker,
    last_message: Option<String>,
}

impl App {
    pub fn new(player: Player, library: Library, display: Box<dyn Display>, flags: &'static SignalFlags) -> Self {
        let viewing = library.library().clone();
        Self {
            player,
            library,
            viewing,
            display,
            flags,
            commands: Rc::new(commands::builtin()),
            repaint: RepaintTracker::new(),
            last_message: None,
        }
    }

    /// Show a status message and remember it as the latest failure reason.
    pub fn report(&mut self, text: impl Into<String>) {
        let text = text.into();
        debug!("Message: {}", text);
        self.display.message(&text);
        self.last_message = Some(text);
    }

    /// Report a player failure from a command or key handler; returns the
    /// failure status so handlers can `return app.player_failed(e)`.
    pub fn player_failed(&mut self, err: PlayerError) -> Status {
        warn!("Player command failed: {}", err);
        self.report(err.to_string());
        1
    }

    pub fn request_quit(&self) {
        info!("Quit requested");
        self.flags.request_quit();
    }

    pub fn now_playing(&self) -> NowPlaying<'_> {
        now_playing(&self.player)
    }

    pub fn paint_player(&mut self) {
        let now = now_playing(&self.player);
        self.display.player(&now);
    }

    pub fn paint_library(&mut self) {
        self.display.library(&self.library);
    }

    pub fn paint_playlist(&mut self) {
        let current = self
            .player
            .queue()
            .filter(|q| Rc::ptr_eq(q.playlist(), &self.viewing))
            .map(|q| q.index());
        self.display.playlist(&self.viewing, current);
    }

    pub fn paint_all(&mut self) {
        self.paint_player();
        self.paint_library();
        self.paint_playlist();
    }

    fn snapshot(&self) -> Snapshot {
        let queue = self.player.queue();
        Snapshot {
            queue: queue.map(|q| q.playlist().clone()),
            index: queue.map(|q| q.index()),
            playing: self.player.state().playing,
            volume: self.player.volume(),
        }
    }

    /// One monitor tick: poll the backend, recover from nonsense, repaint
    /// whatever changed. Only a crash loop is returned as an error.
    pub fn monitor_tick(&mut self) -> Result<(), PlayerError> {
        match self.player.monitor() {
            Ok(outcome) => debug!("Monitor: {:?}", outcome),
            Err(e) => self.player_trouble(e)?,
        }

        let snapshot = self.snapshot();
        let repaint = self.repaint.update(snapshot, &self.viewing);
        if repaint.player {
            self.paint_player();
        }
        if repaint.library {
            self.paint_library();
        }
        if repaint.playlist {
            self.paint_playlist();
        }
        if let Some(message) = repaint.message {
            self.report(message);
        }
        Ok(())
    }

    /// The backend may have died; reap and relaunch it.
    pub fn child_exited(&mut self) -> Result<(), PlayerError> {
        match self.player.handle_child_exit() {
            Ok(true) => {
                self.paint_player();
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => self.player_trouble(e),
        }
    }

    fn player_trouble(&mut self, err: PlayerError) -> Result<(), PlayerError> {
        if matches!(err, PlayerError::BackendMisbehaving { .. }) {
            error!("{}", err);
            return Err(err);
        }

        warn!("Backend trouble: {}", err);
        self.report(format!("media player: {}", err));
        if err.is_recoverable() {
            if let Err(e) = self.player.recover() {
                if matches!(e, PlayerError::BackendMisbehaving { .. }) {
                    return Err(e);
                }
                self.report(format!("media player restart failed: {}", e));
            }
        }
        Ok(())
    }

    /// Split and dispatch one command line.
    pub fn run_command_line(&mut self, line: &str) -> Result<Status, CommandError> {
        let argv = command::split(line)?;
        let commands = Rc::clone(&self.commands);
        let status = commands.dispatch(self, &argv)?;
        debug!("Command {:?} -> {}", argv, status);
        Ok(status)
    }

    /// Commands from the control socket: errors become messages.
    pub fn run_remote(&mut self, line: &str) -> Status {
        info!("Remote command: {}", line);
        match self.run_command_line(line) {
            Ok(status) => status,
            Err(e) => {
                self.report(e.to_string());
                1
            }
        }
    }

    /// Execute every command in `path`. A missing file is not an error; any
    /// failing line is, and names the file and line.
    pub fn replay_file(&mut self, path: &Path) -> Result<()> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No command file at {:?}", path);
                return Ok(());
            }
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };

        info!("Replaying commands from {:?}", path);
        for (number, raw) in content.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            self.last_message = None;
            let reason = match self.run_command_line(line) {
                Ok(0) => continue,
                Ok(status) => self
                    .last_message
                    .take()
                    .unwrap_or_else(|| format!("command failed with status {}", status)),
                Err(e) => e.to_string(),
            };
            return Err(anyhow!("{} line {}: {}", path.display(), number + 1, reason));
        }
        Ok(())
    }
}
