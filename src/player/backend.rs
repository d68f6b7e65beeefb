// The seam between the player logic and the media player process
// PlayerController is the real thing; tests plug in a scripted fake

use super::PlayerError;
use std::fmt;

/// Result of draining the backend's output pipe once.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// Nothing to read right now.
    Silent,
    /// Everything that was readable, lossily decoded.
    Data(String),
    /// The backend closed its end of the pipe.
    Closed,
}

/// How the backend process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ChildExit {
    pub fn is_abnormal(&self) -> bool {
        self.code != Some(0)
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

pub trait Backend {
    /// Start the backend process. Any previous process must already be gone.
    fn launch(&mut self) -> Result<(), PlayerError>;

    /// Write a command verbatim to the backend.
    fn send_raw(&mut self, command: &str) -> Result<(), PlayerError>;

    /// Read whatever output is available without blocking.
    fn read_available(&mut self) -> Result<ReadOutcome, PlayerError>;

    /// Collect the exit status if the process has ended; `None` while it runs
    /// or when there is no process.
    fn try_reap(&mut self) -> Result<Option<ChildExit>, PlayerError>;

    /// Ask the backend to quit, close the pipes and wait for it.
    fn shutdown(&mut self, quit_command: &str) -> Result<(), PlayerError>;

    fn is_running(&self) -> bool;
}
