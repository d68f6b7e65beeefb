// Control socket - lets a second invocation find the running instance and
// hand it commands (`tunectl -c "pause"`)
//
// One connection carries one command string; the server answers with the
// command's status as a decimal line.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Message used only to check whether somebody is listening.
pub const PROBE_MESSAGE: &str = "RUNNING?";

const IO_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_MESSAGE_BYTES: u64 = 4096;

#[derive(Error, Debug)]
pub enum SocketError {
    #[error("another instance is already listening on {0:?}")]
    AlreadyRunning(PathBuf),
    #[error("failed to bind control socket {path:?}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to send message; is tunectl running? ({0})")]
    NotRunning(#[source] io::Error),
    #[error("control socket I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Is there an instance answering on `path`?
pub fn probe(path: &Path) -> bool {
    match send(path, PROBE_MESSAGE) {
        Ok(_) => true,
        Err(e) => {
            debug!("No running instance at {:?}: {}", path, e);
            false
        }
    }
}

/// Deliver `message` to the running instance and wait briefly for its status.
///
/// A server that closes the connection without answering counts as status 0.
pub fn send(path: &Path, message: &str) -> Result<i32, SocketError> {
    let mut stream = UnixStream::connect(path).map_err(SocketError::NotRunning)?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;

    stream.write_all(message.as_bytes())?;
    stream.shutdown(Shutdown::Write)?;

    let mut reply = String::new();
    match stream.read_to_string(&mut reply) {
        Ok(_) => {}
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            debug!("No status reply within {:?}", IO_TIMEOUT);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(reply.trim().parse::<i32>().unwrap_or(0))
}

/// What this invocation does after looking at the control socket.
pub enum Startup {
    /// `-c` commands were delivered; exit with this status.
    Forwarded(i32),
    /// Another instance owns the socket; leave it alone.
    AlreadyRunning,
    /// Nobody else is around: the socket is ours and the player can start.
    Start(ControlSocket),
}

/// Decide how to start. With `commands`, hand them to the running instance;
/// otherwise claim the socket unless a live instance answers the probe.
pub fn startup(path: &Path, commands: &[String]) -> Result<Startup, SocketError> {
    if !commands.is_empty() {
        return forward(path, commands).map(Startup::Forwarded);
    }

    if probe(path) {
        return Ok(Startup::AlreadyRunning);
    }

    match ControlSocket::listen(path) {
        Ok(socket) => Ok(Startup::Start(socket)),
        Err(SocketError::AlreadyRunning(_)) => Ok(Startup::AlreadyRunning),
        Err(e) => Err(e),
    }
}

/// Send every command in turn. The result is the last non-zero status,
/// 0 if all succeeded.
pub fn forward(path: &Path, commands: &[String]) -> Result<i32, SocketError> {
    let mut status = 0;
    for command in commands {
        let answer = send(path, command)?;
        debug!("'{}' -> {}", command, answer);
        if answer != 0 {
            status = answer;
        }
    }
    Ok(status)
}

/// Process exit status for a forwarded command status; anything outside
/// 0..=255 becomes 1.
pub fn exit_status(status: i32) -> u8 {
    u8::try_from(status).unwrap_or(1)
}

/// The listening side, owned by the running instance.
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
}

/// A command received over the socket, with the way back to its sender.
pub struct Incoming {
    pub message: String,
    stream: UnixStream,
}

impl Incoming {
    pub fn is_probe(&self) -> bool {
        self.message.trim() == PROBE_MESSAGE
    }

    /// Tell the sender how its command went. The sender may be gone already.
    pub fn reply(mut self, status: i32) {
        if let Err(e) = writeln!(self.stream, "{}", status) {
            debug!("Status reply not delivered: {}", e);
        }
    }
}

impl ControlSocket {
    /// Bind `path` for this run. A socket file left behind by a dead
    /// instance is replaced; a live one is an error.
    pub fn listen(path: &Path) -> Result<Self, SocketError> {
        if path.exists() {
            match UnixStream::connect(path) {
                Ok(_) => return Err(SocketError::AlreadyRunning(path.to_path_buf())),
                Err(_) => {
                    warn!("Removing stale control socket {:?}", path);
                    std::fs::remove_file(path)?;
                }
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(path).map_err(|source| SocketError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        listener.set_nonblocking(true)?;

        info!("Control socket listening on {:?}", path);
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Take one pending connection and read its command.
    /// `Ok(None)` when nobody is waiting or the caller only probed.
    pub fn accept_command(&self) -> Result<Option<Incoming>, SocketError> {
        let stream = match self.listener.accept() {
            Ok((stream, _)) => stream,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // The listener is non-blocking; the accepted stream must not be, but
        // a stalled client may only hold us up for IO_TIMEOUT
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        let mut raw = Vec::new();
        if let Err(e) = (&stream).take(MAX_MESSAGE_BYTES).read_to_end(&mut raw) {
            if !matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
                return Err(e.into());
            }
            debug!("Client did not finish its message, using what arrived");
        }

        let message = String::from_utf8_lossy(&raw).trim().to_string();
        let incoming = Incoming { message, stream };
        if incoming.is_probe() {
            debug!("Answered probe");
            incoming.reply(0);
            return Ok(None);
        }
        Ok(Some(incoming))
    }
}

impl AsRawFd for ControlSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Could not remove control socket {:?}: {}", self.path, e);
        }
    }
}
