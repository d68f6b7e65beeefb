// Backend process supervision: spawn, pipes, teardown
// One controller owns at most one child at a time

use super::backend::{Backend, ChildExit, ReadOutcome};
use super::PlayerError;
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

// Upper bound on what one monitor tick drains; the backend can be chatty
const MAX_DRAIN_BYTES: usize = 64 * 1024;

struct BackendProcess {
    child: Child,
    commands: ChildStdin,
    responses: ChildStdout,
}

pub struct PlayerController {
    program: PathBuf,
    args: Vec<String>,
    kill_grace: Duration,
    process: Option<BackendProcess>,
}

impl PlayerController {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, kill_grace: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            kill_grace,
            process: None,
        }
    }

    #[cfg(test)]
    fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.child.id())
    }

    fn process_mut(&mut self) -> Result<&mut BackendProcess, PlayerError> {
        self.process.as_mut().ok_or(PlayerError::NotRunning)
    }
}

impl Backend for PlayerController {
    fn launch(&mut self) -> Result<(), PlayerError> {
        if self.process.is_some() {
            warn!("launch requested while a backend is still attached; dropping the old handle");
            self.process = None;
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlayerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let (Some(commands), Some(responses)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PlayerError::Io(io::Error::new(
                io::ErrorKind::Other,
                "backend pipes were not created",
            )));
        };

        if let Err(e) = set_nonblocking(&responses) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PlayerError::Io(e));
        }

        info!("🎵 Backend started: {:?} (pid {})", self.program, child.id());
        self.process = Some(BackendProcess {
            child,
            commands,
            responses,
        });
        Ok(())
    }

    fn send_raw(&mut self, command: &str) -> Result<(), PlayerError> {
        let process = self.process_mut()?;
        debug!("-> backend: {:?}", command);
        process.commands.write_all(command.as_bytes())?;
        process.commands.flush()?;
        Ok(())
    }

    fn read_available(&mut self) -> Result<ReadOutcome, PlayerError> {
        let process = self.process_mut()?;
        let mut collected = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            match process.responses.read(&mut chunk) {
                Ok(0) => {
                    if collected.is_empty() {
                        return Ok(ReadOutcome::Closed);
                    }
                    break;
                }
                Ok(n) => {
                    collected.extend_from_slice(&chunk[..n]);
                    if collected.len() >= MAX_DRAIN_BYTES {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if collected.is_empty() {
            Ok(ReadOutcome::Silent)
        } else {
            Ok(ReadOutcome::Data(String::from_utf8_lossy(&collected).into_owned()))
        }
    }

    fn try_reap(&mut self) -> Result<Option<ChildExit>, PlayerError> {
        let Some(process) = self.process.as_mut() else {
            return Ok(None);
        };

        match process.child.try_wait()? {
            Some(status) => {
                self.process = None;
                Ok(Some(exit_of(status)))
            }
            None => Ok(None),
        }
    }

    fn shutdown(&mut self, quit_command: &str) -> Result<(), PlayerError> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };

        // A dead backend gives EPIPE here, which is fine
        if let Err(e) = process.commands.write_all(quit_command.as_bytes()) {
            debug!("quit command not delivered: {}", e);
        }

        // Grace period for the backend's own helper processes (stream caches etc.)
        std::thread::sleep(self.kill_grace);

        let BackendProcess {
            mut child,
            commands,
            responses,
        } = process;
        drop(commands);
        drop(responses);

        if child.try_wait()?.is_none() {
            warn!("backend ignored quit after {:?}, killing it", self.kill_grace);
            if let Err(e) = child.kill() {
                debug!("kill failed: {}", e);
            }
        }

        let status = child.wait()?;
        info!("Backend stopped ({})", exit_of(status));
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.process.is_some()
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            let _ = process.child.kill();
            let _ = process.child.wait();
        }
    }
}

fn exit_of(status: ExitStatus) -> ChildExit {
    ChildExit {
        code: status.code(),
        signal: status.signal(),
    }
}

fn set_nonblocking(pipe: &ChildStdout) -> io::Result<()> {
    let fd = pipe.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags == -1 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    // Answers get_time_pos like mplayer would and exits on quit
    const FAKE_BACKEND: &str = r#"
while read -r line; do
    case "$line" in
        get_time_pos) echo "ANS_TIME_POSITION=1.5" ;;
        quit) exit 0 ;;
    esac
done
"#;

    fn fake_controller() -> PlayerController {
        PlayerController::new(
            "/bin/sh",
            vec!["-c".to_string(), FAKE_BACKEND.to_string()],
            Duration::from_millis(20),
        )
    }

    fn wait_for_data(controller: &mut PlayerController) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let ReadOutcome::Data(text) = controller.read_available().unwrap() {
                return text;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("fake backend never answered");
    }

    #[test]
    fn test_launch_query_and_shutdown() {
        let mut controller = fake_controller();
        assert!(!controller.is_running());

        controller.launch().unwrap();
        assert!(controller.is_running());
        assert_eq!(controller.read_available().unwrap(), ReadOutcome::Silent);

        controller.send_raw("\nget_time_pos\n").unwrap();
        let text = wait_for_data(&mut controller);
        assert!(text.contains("ANS_TIME_POSITION=1.5"));

        controller.shutdown("\nquit\n").unwrap();
        assert!(!controller.is_running());
        assert!(controller.pid().is_none());

        // second shutdown is a no-op
        controller.shutdown("\nquit\n").unwrap();
    }

    #[test]
    fn test_send_without_process_fails() {
        let mut controller = fake_controller();
        assert!(matches!(
            controller.send_raw("\npause\n"),
            Err(PlayerError::NotRunning)
        ));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let mut controller = PlayerController::new(
            "/nonexistent/backend-binary",
            Vec::new(),
            Duration::from_millis(1),
        );
        assert!(matches!(controller.launch(), Err(PlayerError::Spawn { .. })));
        assert!(!controller.is_running());
    }

    #[test]
    fn test_reap_after_unexpected_exit() {
        let mut controller = PlayerController::new(
            "/bin/sh",
            vec!["-c".to_string(), "exit 3".to_string()],
            Duration::from_millis(1),
        );
        controller.launch().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let exit = loop {
            if let Some(exit) = controller.try_reap().unwrap() {
                break exit;
            }
            assert!(Instant::now() < deadline, "child never exited");
            std::thread::sleep(Duration::from_millis(10));
        };

        assert_eq!(exit.code, Some(3));
        assert!(exit.is_abnormal());
        assert!(!controller.is_running());
        assert_eq!(controller.try_reap().unwrap(), None);
    }

    #[test]
    fn test_shutdown_kills_stubborn_backend() {
        let mut controller = PlayerController::new(
            "/bin/sh",
            vec!["-c".to_string(), "trap '' TERM; while :; do sleep 1; done".to_string()],
            Duration::from_millis(20),
        );
        controller.launch().unwrap();
        controller.shutdown("\nquit\n").unwrap();
        assert!(!controller.is_running());
    }
}
