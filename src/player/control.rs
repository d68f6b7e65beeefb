use super::backend::Backend;
use super::protocol::{Dialect, MplayerSlave};
use super::relaunch::RelaunchBudget;
use super::state::{PlayMode, PlayQueue, PlaybackState};
use super::PlayerError;
use crate::library::Playlist;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::rc::Rc;
use tracing::{debug, info};

/// Knobs the player takes from the config file.
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub mode: PlayMode,
    /// Consecutive silent polls before a track counts as finished.
    pub silence_ticks: u32,
    pub budget: RelaunchBudget,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            mode: PlayMode::Linear,
            silence_ticks: 2,
            budget: RelaunchBudget::default(),
        }
    }
}

/// Drives one backend: what is queued, what is playing, and the commands
/// that keep the two in sync.
pub struct Player {
    pub(super) backend: Box<dyn Backend>,
    pub(super) dialect: Box<dyn Dialect>,
    pub(super) state: PlaybackState,
    pub(super) queue: Option<PlayQueue>,
    pub(super) mode: PlayMode,
    pub(super) volume: Option<f32>,
    // Set by play(): the first silent poll afterwards is the backend still
    // loading, not the track ending
    pub(super) just_started: bool,
    pub(super) silent_polls: u32,
    pub(super) silence_ticks: u32,
    pub(super) budget: RelaunchBudget,
    pub(super) rng: StdRng,
}

impl Player {
    pub fn new(backend: Box<dyn Backend>, options: PlayerOptions) -> Self {
        Self::with_dialect(backend, Box::new(MplayerSlave), options)
    }

    pub fn with_dialect(backend: Box<dyn Backend>, dialect: Box<dyn Dialect>, options: PlayerOptions) -> Self {
        Self {
            backend,
            dialect,
            state: PlaybackState::default(),
            queue: None,
            mode: options.mode,
            volume: None,
            just_started: false,
            silent_polls: 0,
            silence_ticks: options.silence_ticks.max(1),
            budget: options.budget,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixed RNG for reproducible random mode.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Launch the backend process.
    pub fn start(&mut self) -> Result<(), PlayerError> {
        self.backend.launch()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn queue(&self) -> Option<&PlayQueue> {
        self.queue.as_ref()
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        info!("Play mode: {}", mode);
        self.mode = mode;
    }

    pub fn volume(&self) -> Option<f32> {
        self.volume
    }

    /// Point the player at a playlist. Nothing is sent to the backend.
    pub fn set_queue(&mut self, playlist: Rc<Playlist>, index: usize) {
        debug!("Queue set to '{}' at {}", playlist.name, index);
        self.queue = Some(PlayQueue::new(playlist, index));
    }

    /// Start the track at the current queue index.
    pub fn play(&mut self) -> Result<(), PlayerError> {
        let queue = self.queue.as_ref().ok_or(PlayerError::NoQueue)?;
        let track = queue.current().ok_or(PlayerError::IndexOutOfRange {
            index: queue.index(),
            len: queue.len(),
        })?;

        let command = format!(
            "{}{}",
            self.dialect.load(&track.path_str()),
            self.dialect.query_position()
        );
        info!("▶ Playing {:?} ({}/{})", track.file_path, queue.index() + 1, queue.len());

        // The queue already points at this track; a failed send must not
        // leave the previous track's offset behind for a relaunch to seek to
        self.state.position = 0.0;
        self.backend.send_raw(&command)?;

        self.state = PlaybackState {
            playing: true,
            paused: false,
            position: 0.0,
        };
        self.just_started = true;
        self.silent_polls = 0;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), PlayerError> {
        let command = self.dialect.stop();
        self.backend.send_raw(&command)?;
        self.state.playing = false;
        self.state.paused = false;
        debug!("⏹ Stopped");
        Ok(())
    }

    /// Toggle pause. Does nothing when nothing plays.
    pub fn pause(&mut self) -> Result<(), PlayerError> {
        if !self.state.playing {
            return Ok(());
        }
        let command = self.dialect.toggle_pause();
        self.backend.send_raw(&command)?;
        self.state.paused = !self.state.paused;
        Ok(())
    }

    /// Relative seek in seconds. Does nothing when nothing plays.
    pub fn seek(&mut self, seconds: i32) -> Result<(), PlayerError> {
        if !self.state.playing {
            return Ok(());
        }
        let command = format!("{}{}", self.dialect.seek(seconds), self.dialect.query_position());
        self.backend.send_raw(&command)
    }

    /// Nudge the volume; the new level arrives with the next monitor poll.
    pub fn adjust_volume(&mut self, delta: i32) -> Result<(), PlayerError> {
        let command = self.dialect.adjust_volume(delta);
        self.backend.send_raw(&command)
    }

    /// Quit the backend and forget everything about playback.
    pub fn kill(&mut self) -> Result<(), PlayerError> {
        let quit = self.dialect.quit();
        let result = self.backend.shutdown(&quit);

        self.state = PlaybackState::default();
        self.queue = None;
        self.volume = None;
        self.just_started = false;
        self.silent_polls = 0;
        self.budget.reset();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::fake::FakeBackend;

    fn player_with(tracks: &[&str]) -> (Player, std::rc::Rc<std::cell::RefCell<crate::player::fake::FakeLog>>) {
        let (backend, log) = FakeBackend::new();
        let mut player = Player::new(Box::new(backend), PlayerOptions::default());
        player.start().unwrap();
        if !tracks.is_empty() {
            player.set_queue(Rc::new(Playlist::from_paths("test", tracks)), 0);
        }
        (player, log)
    }

    #[test]
    fn test_play_sends_load_and_query() {
        let (mut player, log) = player_with(&["/m/a.mp3", "/m/b.mp3"]);
        player.play().unwrap();

        assert_eq!(
            log.borrow_mut().take_sent(),
            vec!["\nloadfile \"/m/a.mp3\" 0\n\nget_time_pos\n".to_string()]
        );
        assert_eq!(
            player.state(),
            PlaybackState {
                playing: true,
                paused: false,
                position: 0.0
            }
        );
        assert!(player.just_started);
    }

    #[test]
    fn test_play_without_queue_sends_nothing() {
        let (mut player, log) = player_with(&[]);
        assert!(matches!(player.play(), Err(PlayerError::NoQueue)));
        assert!(log.borrow().sent.is_empty());
        assert!(!player.state().playing);
    }

    #[test]
    fn test_play_empty_or_out_of_range_sends_nothing() {
        let (mut player, log) = player_with(&[]);
        player.set_queue(Rc::new(Playlist::new("empty", Vec::new())), 0);
        assert!(matches!(
            player.play(),
            Err(PlayerError::IndexOutOfRange { index: 0, len: 0 })
        ));

        player.set_queue(Rc::new(Playlist::from_paths("two", &["/a", "/b"])), 2);
        assert!(matches!(
            player.play(),
            Err(PlayerError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(log.borrow().sent.is_empty());
    }

    #[test]
    fn test_pause_and_seek_need_playback() {
        let (mut player, log) = player_with(&["/m/a.mp3"]);
        player.pause().unwrap();
        player.seek(10).unwrap();
        assert!(log.borrow().sent.is_empty());

        player.play().unwrap();
        log.borrow_mut().take_sent();

        player.seek(-5).unwrap();
        player.pause().unwrap();
        assert!(player.state().paused);
        player.pause().unwrap();
        assert!(!player.state().paused);

        assert_eq!(
            log.borrow_mut().take_sent(),
            vec![
                "\nseek -5 0\n\nget_time_pos\n".to_string(),
                "\npause\n".to_string(),
                "\npause\n".to_string(),
            ]
        );
    }

    #[test]
    fn test_stop_uses_sentinel_load() {
        let (mut player, log) = player_with(&["/m/a.mp3"]);
        player.play().unwrap();
        player.pause().unwrap();
        log.borrow_mut().take_sent();

        player.stop().unwrap();
        assert_eq!(log.borrow_mut().take_sent(), vec!["\nloadfile dummy.dummy.dummy\n".to_string()]);
        assert!(!player.state().playing);
        assert!(!player.state().paused);
    }

    #[test]
    fn test_kill_resets_to_fresh_state() {
        let (mut player, log) = player_with(&["/m/a.mp3", "/m/b.mp3"]);
        player.set_mode(PlayMode::Loop);
        player.play().unwrap();
        player.state.position = 42.0;
        player.volume = Some(50.0);

        player.kill().unwrap();

        let (fresh, _) = player_with(&[]);
        assert_eq!(player.state(), fresh.state());
        assert!(player.queue().is_none());
        assert_eq!(player.volume(), None);
        assert!(!player.just_started);
        assert_eq!(player.silent_polls, 0);
        assert!(!log.borrow().running);
        assert_eq!(player.mode(), PlayMode::Loop);
        assert_eq!(log.borrow().shutdowns, 1);
        assert_eq!(log.borrow().sent.last().map(String::as_str), Some("\nquit\n"));

        // killing twice is harmless
        player.kill().unwrap();
        assert_eq!(log.borrow().shutdowns, 1);
    }

    #[test]
    fn test_write_errors_surface() {
        let (mut player, log) = player_with(&["/m/a.mp3"]);
        player.state.position = 42.0;
        log.borrow_mut().running = false;
        assert!(matches!(player.play(), Err(PlayerError::NotRunning)));
        assert!(!player.state().playing);
        assert_eq!(player.state().position, 0.0);
    }
}
