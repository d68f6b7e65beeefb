// Media library - just enough of it to feed the play queue
// The real database/tag layer lives elsewhere; here a playlist is an ordered
// list of files

pub mod scanner;

pub use scanner::MusicScanner;

use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub file_path: PathBuf,
}

impl Track {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    /// File name without extension, falling back to the full path.
    pub fn display_title(&self) -> String {
        self.file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.file_path.display().to_string())
    }

    pub fn path_str(&self) -> String {
        self.file_path.to_string_lossy().into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            name: name.into(),
            tracks,
        }
    }

    pub fn from_paths<P: AsRef<Path>>(name: impl Into<String>, paths: &[P]) -> Self {
        let tracks = paths.iter().map(|p| Track::new(p.as_ref())).collect();
        Self::new(name, tracks)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }
}

/// All playlists known to this run. The first one is the whole library.
#[derive(Debug, Clone)]
pub struct Library {
    playlists: Vec<Rc<Playlist>>,
}

impl Library {
    pub fn new(library: Playlist) -> Self {
        Self {
            playlists: vec![Rc::new(library)],
        }
    }

    /// Walk `paths` and build the library playlist from every audio file found.
    pub fn scan(paths: &[PathBuf]) -> anyhow::Result<Self> {
        let tracks = MusicScanner::new().scan_paths(paths)?;
        Ok(Self::new(Playlist::new("library", tracks)))
    }

    pub fn library(&self) -> &Rc<Playlist> {
        &self.playlists[0]
    }

    pub fn playlists(&self) -> &[Rc<Playlist>] {
        &self.playlists
    }

    pub fn track_count(&self) -> usize {
        self.library().len()
    }
}
