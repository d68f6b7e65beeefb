// Scripted backend for player tests: records what was sent, replays canned output

use super::backend::{Backend, ChildExit, ReadOutcome};
use super::PlayerError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct FakeLog {
    pub sent: Vec<String>,
    pub launches: usize,
    pub shutdowns: usize,
    pub running: bool,
    pub outputs: VecDeque<ReadOutcome>,
    pub pending_exit: Option<ChildExit>,
    pub fail_launch: bool,
}

impl FakeLog {
    pub fn take_sent(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sent)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    pub log: Rc<RefCell<FakeLog>>,
}

impl FakeBackend {
    pub fn new() -> (Self, Rc<RefCell<FakeLog>>) {
        let backend = Self::default();
        let log = backend.log.clone();
        (backend, log)
    }
}

impl Backend for FakeBackend {
    fn launch(&mut self) -> Result<(), PlayerError> {
        let mut log = self.log.borrow_mut();
        if log.fail_launch {
            return Err(PlayerError::Spawn {
                program: "fake".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "fake"),
            });
        }
        log.launches += 1;
        log.running = true;
        Ok(())
    }

    fn send_raw(&mut self, command: &str) -> Result<(), PlayerError> {
        let mut log = self.log.borrow_mut();
        if !log.running {
            return Err(PlayerError::NotRunning);
        }
        log.sent.push(command.to_string());
        Ok(())
    }

    fn read_available(&mut self) -> Result<ReadOutcome, PlayerError> {
        Ok(self
            .log
            .borrow_mut()
            .outputs
            .pop_front()
            .unwrap_or(ReadOutcome::Silent))
    }

    fn try_reap(&mut self) -> Result<Option<ChildExit>, PlayerError> {
        let mut log = self.log.borrow_mut();
        let exit = log.pending_exit.take();
        if exit.is_some() {
            log.running = false;
        }
        Ok(exit)
    }

    fn shutdown(&mut self, quit_command: &str) -> Result<(), PlayerError> {
        let mut log = self.log.borrow_mut();
        if log.running {
            log.sent.push(quit_command.to_string());
            log.shutdowns += 1;
        }
        log.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.log.borrow().running
    }
}
