// Terminal output - repaint notifications and the status line painter
// The player core only ever talks to the Display trait

pub mod repaint;
#[cfg(feature = "tui")]
pub mod terminal;

pub use repaint::{Repaint, RepaintTracker, Snapshot};
#[cfg(feature = "tui")]
pub use terminal::{StatusLine, TerminalManager};

use crate::library::{Library, Playlist, Track};
use crate::player::{PlayMode, PlaybackState};

/// What the player area shows.
#[derive(Debug, Clone, Copy)]
pub struct NowPlaying<'a> {
    pub state: PlaybackState,
    pub track: Option<&'a Track>,
    pub mode: PlayMode,
    pub volume: Option<f32>,
}

impl NowPlaying<'_> {
    /// One-line summary, also used for the `status` command.
    pub fn summary(&self) -> String {
        let status = match (self.state.playing, self.state.paused) {
            (false, _) => "stopped",
            (true, true) => "paused",
            (true, false) => "playing",
        };
        let mut line = format!("[{}] {}", self.mode, status);
        if let Some(track) = self.track.filter(|_| self.state.playing) {
            let seconds = self.state.position.max(0.0) as u32;
            line.push_str(&format!(" {} {}:{:02}", track.display_title(), seconds / 60, seconds % 60));
        }
        if let Some(volume) = self.volume {
            line.push_str(&format!(" vol {:.0}%", volume));
        }
        line
    }
}

/// Repaint notifier. Implementations decide how (and whether) to draw.
pub trait Display {
    fn player(&mut self, now: &NowPlaying<'_>);
    fn library(&mut self, library: &Library);
    fn playlist(&mut self, playlist: &Playlist, current: Option<usize>);
    fn message(&mut self, text: &str);
    /// Terminal size changed; a full repaint follows.
    fn resize(&mut self);
}

/// Draws nothing. Used when stdout is not a terminal.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn player(&mut self, _now: &NowPlaying<'_>) {}
    fn library(&mut self, _library: &Library) {}
    fn playlist(&mut self, _playlist: &Playlist, _current: Option<usize>) {}
    fn message(&mut self, text: &str) {
        tracing::info!("{}", text);
    }
    fn resize(&mut self) {}
}
