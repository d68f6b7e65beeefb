// Playback control - everything between "play this" and the backend process
// The backend does the decoding; we supervise it and talk its protocol

pub mod backend;   // trait the player drives, process or fake
pub mod control;   // Player: play/stop/pause/seek and lifecycle
pub mod monitor;   // periodic polling, end-of-track, relaunch
pub mod process;   // the real backend child process
pub mod protocol;  // command formatting and answer parsing
pub mod relaunch;  // crash-loop guard
pub mod state;     // PlaybackState, PlayMode, PlayQueue

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{Backend, ChildExit, ReadOutcome};
pub use control::{Player, PlayerOptions};
pub use monitor::MonitorOutcome;
pub use process::PlayerController;
pub use protocol::{Dialect, MplayerSlave, ProtocolError};
pub use relaunch::RelaunchBudget;
pub use state::{PlayMode, PlayQueue, PlaybackState};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("failed to start media player {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("media player is not running")]
    NotRunning,
    #[error("media player I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("no play queue set")]
    NoQueue,
    #[error("queue index {index} out of range (queue has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("the media player appears to be misbehaving ({failures} crashes in a row)")]
    BackendMisbehaving { failures: usize },
}

impl PlayerError {
    /// Errors the event loop can survive by restarting the backend.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlayerError::Protocol(_) | PlayerError::Io(_) | PlayerError::NotRunning)
    }
}
