// Playback state shared between the player, the monitor and the painters

use crate::library::{Playlist, Track};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// What the backend is doing, as far as we know.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackState {
    pub playing: bool,
    pub paused: bool,
    pub position: f32, // seconds into the current track
}

/// Policy for picking the track that follows the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    #[default]
    Linear,
    Loop,
    Random,
}

impl PlayMode {
    /// Next mode in the `m` key rotation.
    pub fn cycle(self) -> Self {
        match self {
            PlayMode::Linear => PlayMode::Loop,
            PlayMode::Loop => PlayMode::Random,
            PlayMode::Random => PlayMode::Linear,
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayMode::Linear => "linear",
            PlayMode::Loop => "loop",
            PlayMode::Random => "random",
        };
        f.write_str(name)
    }
}

impl FromStr for PlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(PlayMode::Linear),
            "loop" => Ok(PlayMode::Loop),
            "random" => Ok(PlayMode::Random),
            other => Err(format!("unknown play mode '{}'", other)),
        }
    }
}

/// The playlist being played plus the index the player may move around.
///
/// The playlist itself belongs to the library; the queue only keeps a
/// shared handle to it.
#[derive(Debug, Clone)]
pub struct PlayQueue {
    playlist: Rc<Playlist>,
    index: usize,
}

impl PlayQueue {
    pub fn new(playlist: Rc<Playlist>, index: usize) -> Self {
        Self { playlist, index }
    }

    pub fn playlist(&self) -> &Rc<Playlist> {
        &self.playlist
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.playlist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }

    pub fn current(&self) -> Option<&Track> {
        self.playlist.get(self.index)
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}
