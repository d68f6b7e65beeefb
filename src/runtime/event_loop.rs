// The main loop: signals, the input file, keyboard and control socket
// Single-threaded; poll() is the only place we sleep.

use crate::app::{take_input_file, App, InputState, Keymap};
use crate::player::PlayerError;
use crate::remote::ControlSocket;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoopError {
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error("waiting for input failed: {0}")]
    Wait(#[source] io::Error),
}

#[derive(Debug, Default, Clone, Copy)]
struct Ready {
    input: bool,
    socket: bool,
}

pub struct EventLoop {
    pub app: App,
    keymap: Keymap,
    socket: Option<ControlSocket>,
    input_file: Option<PathBuf>,
    input: InputState,
    input_fd: RawFd,
    input_open: bool,
    wait_timeout: Duration,
}

impl EventLoop {
    pub fn new(app: App, keymap: Keymap) -> Self {
        Self {
            app,
            keymap,
            socket: None,
            input_file: None,
            input: InputState::new(),
            input_fd: libc::STDIN_FILENO,
            input_open: true,
            wait_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_socket(mut self, socket: ControlSocket) -> Self {
        self.socket = Some(socket);
        self
    }

    pub fn with_input_file(mut self, path: PathBuf) -> Self {
        self.input_file = Some(path);
        self
    }

    /// Read keys from `fd` instead of stdin.
    pub fn with_input_fd(mut self, fd: RawFd) -> Self {
        self.input_fd = fd;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Hand back the socket so the caller controls when its file goes away.
    pub fn take_socket(&mut self) -> Option<ControlSocket> {
        self.socket.take()
    }

    /// Run until quit is requested. Returns early only on a crash-looping
    /// backend or a failing wait.
    pub fn run(&mut self) -> Result<(), LoopError> {
        info!("🎵 Event loop running");
        self.app.paint_all();

        while !self.app.flags.quit_requested() {
            self.step()?;
        }

        info!("Event loop finished");
        Ok(())
    }

    /// One iteration.
    pub fn step(&mut self) -> Result<(), LoopError> {
        self.drain_signals()?;

        if !self.input.has_count() {
            self.check_input_file();
        }

        let ready = match self.wait() {
            Ok(ready) => ready,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(LoopError::Wait(e)),
        };

        if ready.input {
            self.read_key();
        }
        if ready.socket {
            self.serve_socket();
        }
        Ok(())
    }

    fn drain_signals(&mut self) -> Result<(), LoopError> {
        let flags = self.app.flags;

        if flags.take_resize() {
            debug!("Resize");
            self.app.display.resize();
            self.app.paint_all();
        }
        if flags.take_monitor_due() {
            self.app.monitor_tick()?;
        }
        if flags.take_child_exited() {
            self.app.child_exited()?;
        }
        Ok(())
    }

    fn check_input_file(&mut self) {
        let Some(path) = &self.input_file else {
            return;
        };
        match take_input_file(path) {
            Ok(Some(key)) => {
                self.keymap.execute(&mut self.app, key, 0);
            }
            Ok(None) => {}
            Err(e) => warn!("Input file {:?} unreadable: {}", path, e),
        }
    }

    fn wait(&self) -> io::Result<Ready> {
        let mut fds = Vec::with_capacity(2);
        if self.input_open {
            fds.push(libc::pollfd {
                fd: self.input_fd,
                events: libc::POLLIN,
                revents: 0,
            });
        }
        if let Some(socket) = &self.socket {
            fds.push(libc::pollfd {
                fd: socket.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
        }

        let timeout = i32::try_from(self.wait_timeout.as_millis()).unwrap_or(i32::MAX);
        // SAFETY: fds is a live, correctly sized array of pollfd
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let readable = |fd: RawFd| {
            fds.iter()
                .any(|p| p.fd == fd && p.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
        };
        Ok(Ready {
            input: self.input_open && readable(self.input_fd),
            socket: self.socket.as_ref().is_some_and(|s| readable(s.as_raw_fd())),
        })
    }

    fn read_key(&mut self) {
        let mut byte = 0u8;
        // SAFETY: reading one byte into a local
        let n = unsafe { libc::read(self.input_fd, (&mut byte as *mut u8).cast(), 1) };

        match n {
            1 => {
                if let Some((key, count)) = self.input.feed(byte) {
                    self.keymap.execute(&mut self.app, key, count);
                }
            }
            0 => {
                info!("Input closed");
                self.input_open = false;
                self.app.request_quit();
            }
            _ => {
                let e = io::Error::last_os_error();
                if !matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) {
                    warn!("Reading input failed: {}", e);
                }
            }
        }
    }

    fn serve_socket(&mut self) {
        let Some(socket) = &self.socket else {
            return;
        };
        match socket.accept_command() {
            Ok(Some(incoming)) => {
                let status = self.app.run_remote(&incoming.message);
                incoming.reply(status);
            }
            Ok(None) => {}
            Err(e) => warn!("Control socket: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::fixture;
    use crate::player::fake::FakeLog;
    use crate::player::{ChildExit, PlayMode, ReadOutcome};
    use crate::remote;
    use std::cell::RefCell;
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::rc::Rc;

    struct Harness {
        lp: EventLoop,
        log: Rc<RefCell<FakeLog>>,
        keys: UnixStream,
        _reader: UnixStream,
    }

    // Loop over a fake backend, reading keys from a socket pair instead of stdin
    fn harness(tracks: usize) -> Harness {
        let f = fixture(tracks);
        let (keys, reader) = UnixStream::pair().unwrap();
        let lp = EventLoop::new(f.app, Keymap::default())
            .with_input_fd(reader.as_raw_fd())
            .with_wait_timeout(Duration::from_millis(20));
        Harness {
            lp,
            log: f.log,
            keys,
            _reader: reader,
        }
    }

    #[test]
    fn test_keys_and_eof() {
        let mut h = harness(3);
        h.keys.write_all(b"2\nf").unwrap();
        drop(h.keys);
        h.lp.run().unwrap();

        // "2<Enter>" played track 2, "f" seeked, EOF quit
        assert_eq!(h.lp.app.player.queue().unwrap().index(), 1);
        assert!(h.lp.app.flags.quit_requested());
        let sent = h.log.borrow_mut().take_sent();
        assert_eq!(sent.last().map(String::as_str), Some("\nseek 10 0\n\nget_time_pos\n"));
    }

    #[test]
    fn test_signal_flags_drive_monitor_and_relaunch() {
        let mut h = harness(2);
        h.lp.app.run_command_line("play").unwrap();
        h.log
            .borrow_mut()
            .outputs
            .push_back(ReadOutcome::Data("ANS_TIME_POSITION=61.2\n".into()));

        h.lp.app.flags.raise_monitor_due();
        h.lp.step().unwrap();
        assert_eq!(h.lp.app.player.state().position, 61.2);

        h.log.borrow_mut().pending_exit = Some(ChildExit {
            code: None,
            signal: Some(9),
        });
        h.log.borrow_mut().take_sent();
        h.lp.app.flags.raise_child_exited();
        h.lp.step().unwrap();

        assert_eq!(h.log.borrow().launches, 2);
        assert_eq!(h.log.borrow_mut().take_sent()[1], "\nseek 61 0\n\nget_time_pos\n");
    }

    #[test]
    fn test_crash_loop_ends_the_loop() {
        let mut h = harness(1);

        let mut result = Ok(());
        for _ in 0..4 {
            h.log.borrow_mut().pending_exit = Some(ChildExit {
                code: Some(1),
                signal: None,
            });
            h.lp.app.flags.raise_child_exited();
            result = h.lp.step();
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(
            result,
            Err(LoopError::Player(PlayerError::BackendMisbehaving { .. }))
        ));
    }

    #[test]
    fn test_input_file_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input");
        std::fs::write(&path, "m\n").unwrap();

        let h = harness(1);
        let mut lp = h.lp.with_input_file(path.clone());
        lp.step().unwrap();

        assert_eq!(lp.app.player.mode(), PlayMode::Loop);
        assert!(!path.exists());
    }

    #[test]
    fn test_remote_command_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctl.sock");

        let h = harness(1);
        let mut lp = h.lp.with_socket(ControlSocket::listen(&path).unwrap());

        let client_path = path.clone();
        let client = std::thread::spawn(move || {
            let good = remote::send(&client_path, "mode random").unwrap();
            let bad = remote::send(&client_path, "bogus").unwrap();
            (good, bad)
        });

        for _ in 0..200 {
            lp.step().unwrap();
            if client.is_finished() {
                break;
            }
        }
        assert_eq!(client.join().unwrap(), (0, 1));
        assert_eq!(lp.app.player.mode(), PlayMode::Random);
    }
}
