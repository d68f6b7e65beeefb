// Raw-mode terminal and a minimal status line painter
// Key input is read straight from stdin by the event loop; crossterm only
// switches modes and positions the cursor.

use super::{Display, NowPlaying};
use crate::library::{Library, Playlist};
use anyhow::Result;
use crossterm::{
    cursor, execute, queue,
    style::Print,
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use std::io::{self, Write};
use tracing::debug;

/// Holds the terminal in raw mode for its lifetime.
pub struct TerminalManager {
    _cleanup_guard: CleanupGuard,
}

struct CleanupGuard;

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, cursor::Show, Print("\r\n"));
    }
}

impl TerminalManager {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, cursor::Hide, Clear(ClearType::All))?;
        debug!("Terminal in raw mode");
        Ok(Self {
            _cleanup_guard: CleanupGuard,
        })
    }
}

/// Three lines: a header with library and playlist info at the top, the
/// player and message lines at the bottom.
pub struct StatusLine {
    rows: u16,
    header: String,
    player: String,
    message: String,
}

impl StatusLine {
    pub fn new() -> Self {
        let mut line = Self {
            rows: 24,
            header: String::new(),
            player: String::new(),
            message: String::new(),
        };
        line.resize();
        line
    }

    fn paint(&self) -> io::Result<()> {
        let mut out = io::stdout();
        let rows = self.rows.max(3);
        for (row, text) in [(0, &self.header), (rows - 2, &self.player), (rows - 1, &self.message)] {
            queue!(out, cursor::MoveTo(0, row), Clear(ClearType::CurrentLine), Print(text))?;
        }
        out.flush()
    }

    fn repaint(&self) {
        if let Err(e) = self.paint() {
            debug!("Status line paint failed: {}", e);
        }
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for StatusLine {
    fn player(&mut self, now: &NowPlaying<'_>) {
        self.player = now.summary();
        self.repaint();
    }

    fn library(&mut self, library: &Library) {
        self.header = format!(
            "{} playlists, {} tracks",
            library.playlists().len(),
            library.track_count()
        );
        self.repaint();
    }

    fn playlist(&mut self, playlist: &Playlist, current: Option<usize>) {
        let position = current.map(|i| format!(" #{}", i + 1)).unwrap_or_default();
        self.header = format!("{} ({} tracks){}", playlist.name, playlist.len(), position);
        self.repaint();
    }

    fn message(&mut self, text: &str) {
        self.message = text.to_string();
        self.repaint();
    }

    fn resize(&mut self) {
        match terminal::size() {
            Ok((_, rows)) => self.rows = rows,
            Err(e) => debug!("Could not read terminal size: {}", e),
        }
        let mut out = io::stdout();
        let _ = execute!(out, Clear(ClearType::All));
    }
}
