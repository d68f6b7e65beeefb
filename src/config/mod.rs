// Configuration management for tunectl
// Loads config.toml, falling back to defaults for anything the file leaves out

use crate::player::{PlayMode, PlayerOptions, RelaunchBudget};
use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub music_directories: Vec<PathBuf>,
    pub player: PlayerConfig,
    pub monitor: MonitorConfig,
    pub relaunch: RelaunchConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Backend executable, looked up on PATH when not absolute.
    pub program: PathBuf,
    pub args: Vec<String>,
    pub mode: PlayMode,
    /// How long `quit` gets before the backend is killed.
    pub kill_grace_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub tick_ms: u64,
    pub silence_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaunchConfig {
    pub max_failures: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub socket: PathBuf,
    pub input_file: PathBuf,
    pub command_file: PathBuf,
    pub log_dir: PathBuf,
}

fn app_dir() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunectl")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            music_directories: vec![dirs::audio_dir().unwrap_or_else(|| PathBuf::from("~/Music"))],
            player: PlayerConfig::default(),
            monitor: MonitorConfig::default(),
            relaunch: RelaunchConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("mplayer"),
            args: ["-slave", "-idle", "-quiet", "-novideo"]
                .iter()
                .map(|a| a.to_string())
                .collect(),
            mode: PlayMode::Linear,
            kill_grace_ms: 500,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 500,
            silence_ticks: 2,
        }
    }
}

impl Default for RelaunchConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            window_secs: 10,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let dir = app_dir();
        Self {
            socket: dir.join("socket"),
            input_file: dir.join("input"),
            command_file: dir.join("commands"),
            log_dir: dir.join("logs"),
        }
    }
}

impl Config {
    /// Load the default config file, writing one with defaults if none exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("tunectl");

        Ok(config_dir.join("config.toml"))
    }

    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions {
            mode: self.player.mode,
            silence_ticks: self.monitor.silence_ticks,
            budget: RelaunchBudget::new(
                self.relaunch.max_failures,
                Duration::from_secs(self.relaunch.window_secs),
            ),
        }
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.player.kill_grace_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.monitor.tick_ms.max(10))
    }
}
