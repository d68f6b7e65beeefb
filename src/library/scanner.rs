use super::Track;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Clone)]
pub struct MusicScanner {
    supported_extensions: Vec<String>,
}

impl MusicScanner {
    pub fn new() -> Self {
        Self {
            supported_extensions: ["mp3", "flac", "ogg", "oga", "mp4", "m4a", "aac", "wav", "opus", "wma"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Directories are walked, plain files are taken as they are.
    /// Result is sorted by path so the queue order is stable between runs.
    pub fn scan_paths(&self, paths: &[PathBuf]) -> Result<Vec<Track>> {
        let mut tracks = Vec::new();

        for path in paths {
            if path.is_dir() {
                tracks.extend(self.scan_directory(path));
            } else if path.is_file() {
                if self.is_supported_file(path) {
                    tracks.push(Track::new(path.clone()));
                }
            } else {
                warn!("Skipping missing library path {:?}", path);
            }
        }

        tracks.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        tracks.dedup();
        debug!("Library scan found {} tracks", tracks.len());
        Ok(tracks)
    }

    pub fn scan_directory<P: AsRef<Path>>(&self, path: P) -> Vec<Track> {
        let mut tracks = Vec::new();

        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(Result::ok) {
            let path = entry.path();

            if !entry.file_type().is_file() {
                continue;
            }

            // Skip hidden files (dotfiles)
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with('.'))
            {
                continue;
            }

            // Empty files can't be played
            if let Ok(metadata) = fs::metadata(path) {
                if metadata.len() == 0 {
                    continue;
                }
            }

            if self.is_supported_file(path) {
                tracks.push(Track::new(path.to_path_buf()));
            }
        }

        tracks
    }

    fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let normalized = ext.to_ascii_lowercase();
                self.supported_extensions.contains(&normalized)
            })
            .unwrap_or(false)
    }
}

impl Default for MusicScanner {
    fn default() -> Self {
        Self::new()
    }
}
