// Periodic polling of the backend
// The backend never says "track finished" - it just goes quiet. Silence
// after a position query is therefore read as end-of-track, guarded by the
// just-started flag and a small silence counter.

use super::backend::ReadOutcome;
use super::control::Player;
use super::state::PlayMode;
use super::PlayerError;
use rand::Rng;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Nothing playing (or paused), backend left alone.
    Idle,
    /// Polled; position may have changed.
    Polled,
    /// The track ended and the queue moved on (or stopped).
    Advanced,
}

impl Player {
    /// One timer tick worth of monitoring.
    pub fn monitor(&mut self) -> Result<MonitorOutcome, PlayerError> {
        if !self.state.playing || self.state.paused {
            return Ok(MonitorOutcome::Idle);
        }

        let mut outcome = MonitorOutcome::Polled;

        match self.backend.read_available()? {
            ReadOutcome::Silent => {
                if self.just_started {
                    self.just_started = false;
                } else {
                    self.silent_polls += 1;
                    if self.silent_polls >= self.silence_ticks {
                        self.silent_polls = 0;
                        debug!("Backend quiet for {} polls, track finished", self.silence_ticks);
                        self.play_next()?;
                        outcome = MonitorOutcome::Advanced;
                    }
                }
            }
            ReadOutcome::Data(text) => {
                self.silent_polls = 0;
                self.just_started = false;
                let answers = self.dialect.parse(&text)?;
                if let Some(position) = answers.position {
                    self.state.position = position;
                }
                if let Some(volume) = answers.volume {
                    self.volume = Some(volume);
                }
            }
            ReadOutcome::Closed => {
                // Child-exit handling restarts it
                debug!("Backend output closed");
            }
        }

        // Poll/response protocol: ask now so the next tick has something to read
        if self.state.playing && !self.state.paused {
            let query = self.dialect.query_position();
            self.backend.send_raw(&query)?;
        }

        Ok(outcome)
    }

    /// Move to the track that follows the current one according to the play mode.
    pub fn play_next(&mut self) -> Result<(), PlayerError> {
        let Some(queue) = self.queue.as_mut() else {
            return self.stop();
        };
        let len = queue.len();
        if len == 0 {
            return self.stop();
        }

        match self.mode {
            PlayMode::Linear => {
                let next = queue.index() + 1;
                if next >= len {
                    queue.set_index(0);
                    info!("End of queue reached");
                    self.stop()
                } else {
                    queue.set_index(next);
                    self.play()
                }
            }
            PlayMode::Loop => {
                let next = (queue.index() + 1) % len;
                queue.set_index(next);
                self.play()
            }
            PlayMode::Random => {
                let next = self.rng.gen_range(0..len);
                queue.set_index(next);
                self.play()
            }
        }
    }

    /// React to a child-exit notification: reap, check the crash budget,
    /// relaunch and resume. Spurious notifications are ignored.
    pub fn handle_child_exit(&mut self) -> Result<bool, PlayerError> {
        let Some(exit) = self.backend.try_reap()? else {
            debug!("Child notification but backend still running");
            return Ok(false);
        };

        if exit.is_abnormal() {
            warn!("Backend exited unexpectedly ({})", exit);
            if !self.budget.record(Instant::now()) {
                return Err(PlayerError::BackendMisbehaving {
                    failures: self.budget.failures_in_window(),
                });
            }
        } else {
            info!("Backend exited cleanly, starting a new one");
        }

        self.relaunch()?;
        Ok(true)
    }

    /// Tear the backend down and start a fresh one, keeping playback going.
    /// Used when the backend stops making sense (protocol errors).
    pub fn recover(&mut self) -> Result<(), PlayerError> {
        warn!("Restarting backend");
        let quit = self.dialect.quit();
        self.backend.shutdown(&quit)?;

        if !self.budget.record(Instant::now()) {
            return Err(PlayerError::BackendMisbehaving {
                failures: self.budget.failures_in_window(),
            });
        }
        self.relaunch()
    }

    /// Launch again; if we were playing, pick up where the old backend left off.
    fn relaunch(&mut self) -> Result<(), PlayerError> {
        self.backend.launch()?;

        if self.state.playing && !self.state.paused {
            let previous = self.state.position as i32;
            info!("Resuming playback at {}s", previous);
            self.play()?;
            if previous > 0 {
                self.seek(previous)?;
            }
        } else {
            // Whatever was loaded died with the old process
            self.state.playing = false;
            self.state.paused = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Playlist;
    use crate::player::backend::ChildExit;
    use crate::player::control::PlayerOptions;
    use crate::player::fake::{FakeBackend, FakeLog};
    use crate::player::relaunch::RelaunchBudget;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn player(mode: PlayMode, n: usize) -> (Player, Rc<RefCell<FakeLog>>) {
        let (backend, log) = FakeBackend::new();
        let options = PlayerOptions {
            mode,
            ..PlayerOptions::default()
        };
        let mut player = Player::new(Box::new(backend), options).with_seed(7);
        player.start().unwrap();
        let paths: Vec<String> = (0..n).map(|i| format!("/m/{}.mp3", i)).collect();
        player.set_queue(Rc::new(Playlist::from_paths("q", &paths)), 0);
        (player, log)
    }

    fn at_last_track(player: &mut Player) {
        let last = player.queue().unwrap().len() - 1;
        player.queue.as_mut().unwrap().set_index(last);
        player.play().unwrap();
    }

    #[test]
    fn test_linear_wraps_and_stops() {
        let (mut p, log) = player(PlayMode::Linear, 3);
        at_last_track(&mut p);
        log.borrow_mut().take_sent();

        p.play_next().unwrap();
        assert_eq!(p.queue().unwrap().index(), 0);
        assert!(!p.state().playing);
        assert_eq!(log.borrow_mut().take_sent(), vec!["\nloadfile dummy.dummy.dummy\n".to_string()]);
    }

    #[test]
    fn test_linear_moves_forward() {
        let (mut p, _log) = player(PlayMode::Linear, 3);
        p.play().unwrap();
        p.play_next().unwrap();
        assert_eq!(p.queue().unwrap().index(), 1);
        assert!(p.state().playing);
    }

    #[test]
    fn test_loop_wraps_and_keeps_playing() {
        let (mut p, log) = player(PlayMode::Loop, 3);
        at_last_track(&mut p);
        log.borrow_mut().take_sent();

        p.play_next().unwrap();
        assert_eq!(p.queue().unwrap().index(), 0);
        assert!(p.state().playing);
        assert_eq!(
            log.borrow_mut().take_sent(),
            vec!["\nloadfile \"/m/0.mp3\" 0\n\nget_time_pos\n".to_string()]
        );
    }

    #[test]
    fn test_random_stays_in_range_and_covers_queue() {
        let (mut p, _log) = player(PlayMode::Random, 4);
        at_last_track(&mut p);

        let mut seen = [0usize; 4];
        for _ in 0..400 {
            p.play_next().unwrap();
            assert!(p.state().playing);
            let index = p.queue().unwrap().index();
            assert!(index < 4);
            seen[index] += 1;
        }
        // roughly uniform: every slot gets a fair share
        assert!(seen.iter().all(|&count| count > 50), "skewed: {:?}", seen);
    }

    #[test]
    fn test_play_next_without_queue_stops() {
        let (mut p, _log) = player(PlayMode::Loop, 0);
        p.play_next().unwrap();
        assert!(!p.state().playing);

        p.queue = None;
        p.play_next().unwrap();
        assert!(!p.state().playing);
    }

    #[test]
    fn test_monitor_idle_when_not_playing() {
        let (mut p, log) = player(PlayMode::Linear, 2);
        assert_eq!(p.monitor().unwrap(), MonitorOutcome::Idle);

        p.play().unwrap();
        p.pause().unwrap();
        log.borrow_mut().take_sent();
        assert_eq!(p.monitor().unwrap(), MonitorOutcome::Idle);
        assert!(log.borrow().sent.is_empty());
    }

    #[test]
    fn test_first_silence_after_play_is_expected() {
        let (mut p, log) = player(PlayMode::Linear, 2);
        p.play().unwrap();
        log.borrow_mut().take_sent();

        // first silent poll: still loading
        assert_eq!(p.monitor().unwrap(), MonitorOutcome::Polled);
        assert_eq!(p.queue().unwrap().index(), 0);
        assert_eq!(log.borrow_mut().take_sent(), vec!["\nget_time_pos\n".to_string()]);

        // one silent poll is not enough with the default threshold
        assert_eq!(p.monitor().unwrap(), MonitorOutcome::Polled);
        assert_eq!(p.queue().unwrap().index(), 0);

        // second consecutive one is
        assert_eq!(p.monitor().unwrap(), MonitorOutcome::Advanced);
        assert_eq!(p.queue().unwrap().index(), 1);
        assert!(p.just_started);
    }

    #[test]
    fn test_output_resets_silence_counter() {
        let (mut p, log) = player(PlayMode::Linear, 2);
        p.play().unwrap();
        {
            let mut log = log.borrow_mut();
            log.outputs.push_back(ReadOutcome::Silent);
            log.outputs.push_back(ReadOutcome::Silent);
            log.outputs.push_back(ReadOutcome::Data("ANS_TIME_POSITION=3.0\n".into()));
            log.outputs.push_back(ReadOutcome::Silent);
            log.outputs.push_back(ReadOutcome::Data("ANS_TIME_POSITION=4.0\nANS_TIME_POSITION=4.5\n".into()));
        }

        for _ in 0..5 {
            assert_eq!(p.monitor().unwrap(), MonitorOutcome::Polled);
        }
        assert_eq!(p.queue().unwrap().index(), 0);
        assert_eq!(p.state().position, 4.5);
    }

    #[test]
    fn test_monitor_tracks_volume() {
        let (mut p, log) = player(PlayMode::Linear, 1);
        p.play().unwrap();
        log.borrow_mut()
            .outputs
            .push_back(ReadOutcome::Data("ANS_volume=55.000000\n".into()));
        p.monitor().unwrap();
        assert_eq!(p.volume(), Some(55.0));
    }

    #[test]
    fn test_protocol_error_is_typed() {
        let (mut p, log) = player(PlayMode::Linear, 1);
        p.play().unwrap();
        log.borrow_mut()
            .outputs
            .push_back(ReadOutcome::Data("ANS_TIME_POSITION=garbage\n".into()));

        let err = p.monitor().unwrap_err();
        assert!(matches!(err, PlayerError::Protocol(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_relaunch_resumes_where_it_left_off() {
        let (mut p, log) = player(PlayMode::Linear, 3);
        p.queue.as_mut().unwrap().set_index(1);
        p.play().unwrap();
        p.state.position = 73.6;
        log.borrow_mut().take_sent();
        log.borrow_mut().pending_exit = Some(ChildExit {
            code: None,
            signal: Some(11),
        });

        assert!(p.handle_child_exit().unwrap());

        assert_eq!(log.borrow().launches, 2);
        assert_eq!(
            log.borrow_mut().take_sent(),
            vec![
                "\nloadfile \"/m/1.mp3\" 0\n\nget_time_pos\n".to_string(),
                "\nseek 73 0\n\nget_time_pos\n".to_string(),
            ]
        );
        assert!(p.state().playing);
        assert_eq!(p.queue().unwrap().index(), 1);
    }

    #[test]
    fn test_relaunch_while_paused_does_not_resume() {
        let (mut p, log) = player(PlayMode::Linear, 1);
        p.play().unwrap();
        p.pause().unwrap();
        log.borrow_mut().take_sent();
        log.borrow_mut().pending_exit = Some(ChildExit { code: Some(1), signal: None });

        assert!(p.handle_child_exit().unwrap());
        assert!(log.borrow().sent.is_empty());
        assert!(!p.state().playing);
    }

    #[test]
    fn test_spurious_child_notification_is_ignored() {
        let (mut p, log) = player(PlayMode::Linear, 1);
        assert!(!p.handle_child_exit().unwrap());
        assert_eq!(log.borrow().launches, 1);
    }

    #[test]
    fn test_crash_loop_is_fatal() {
        let (backend, log) = FakeBackend::new();
        let options = PlayerOptions {
            budget: RelaunchBudget::new(2, Duration::from_secs(60)),
            ..PlayerOptions::default()
        };
        let mut p = Player::new(Box::new(backend), options);
        p.start().unwrap();

        for _ in 0..2 {
            log.borrow_mut().pending_exit = Some(ChildExit { code: Some(1), signal: None });
            assert!(p.handle_child_exit().unwrap());
        }
        log.borrow_mut().pending_exit = Some(ChildExit { code: Some(1), signal: None });
        assert!(matches!(
            p.handle_child_exit(),
            Err(PlayerError::BackendMisbehaving { failures: 3 })
        ));
    }

    #[test]
    fn test_failed_track_change_resumes_new_track_from_start() {
        let (mut p, log) = player(PlayMode::Loop, 2);
        p.play().unwrap();
        p.state.position = 200.0;
        log.borrow_mut().take_sent();

        // backend died before its exit was noticed
        log.borrow_mut().running = false;
        assert!(matches!(p.play_next(), Err(PlayerError::NotRunning)));
        assert_eq!(p.queue().unwrap().index(), 1);

        log.borrow_mut().pending_exit = Some(ChildExit {
            code: None,
            signal: Some(11),
        });
        assert!(p.handle_child_exit().unwrap());

        assert_eq!(
            log.borrow_mut().take_sent(),
            vec!["\nloadfile \"/m/1.mp3\" 0\n\nget_time_pos\n".to_string()]
        );
        assert_eq!(p.state().position, 0.0);
        assert!(p.state().playing);
    }

    #[test]
    fn test_clean_exits_do_not_use_up_the_budget() {
        let (backend, log) = FakeBackend::new();
        let options = PlayerOptions {
            budget: RelaunchBudget::new(1, Duration::from_secs(60)),
            ..PlayerOptions::default()
        };
        let mut p = Player::new(Box::new(backend), options);
        p.start().unwrap();

        for _ in 0..3 {
            log.borrow_mut().pending_exit = Some(ChildExit { code: Some(0), signal: None });
            assert!(p.handle_child_exit().unwrap());
        }
        assert_eq!(log.borrow().launches, 4);

        log.borrow_mut().pending_exit = Some(ChildExit { code: Some(2), signal: None });
        assert!(p.handle_child_exit().unwrap());
        log.borrow_mut().pending_exit = Some(ChildExit { code: Some(2), signal: None });
        assert!(matches!(
            p.handle_child_exit(),
            Err(PlayerError::BackendMisbehaving { failures: 2 })
        ));
    }

    #[test]
    fn test_recover_restarts_and_resumes() {
        let (mut p, log) = player(PlayMode::Linear, 2);
        p.play().unwrap();
        p.state.position = 12.9;
        log.borrow_mut().take_sent();

        p.recover().unwrap();

        assert_eq!(log.borrow().shutdowns, 1);
        assert_eq!(log.borrow().launches, 2);
        let sent = log.borrow_mut().take_sent();
        assert_eq!(sent[0], "\nquit\n");
        assert_eq!(sent[2], "\nseek 12 0\n\nget_time_pos\n");
        assert!(p.state().playing);
    }
}
