// Signal flags - the only process-wide state
// Handlers just set an atomic; the event loop does the actual work.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// One flag per kind of asynchronous notification.
#[derive(Debug)]
pub struct SignalFlags {
    quit: AtomicBool,
    resize: AtomicBool,
    monitor_due: AtomicBool,
    child_exited: AtomicBool,
}

/// What the installed handlers write to.
pub static FLAGS: SignalFlags = SignalFlags::new();

const QUIT_SIGNALS: [libc::c_int; 4] = [libc::SIGHUP, libc::SIGINT, libc::SIGQUIT, libc::SIGTERM];

impl SignalFlags {
    pub const fn new() -> Self {
        Self {
            quit: AtomicBool::new(false),
            resize: AtomicBool::new(false),
            monitor_due: AtomicBool::new(false),
            child_exited: AtomicBool::new(false),
        }
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    /// Quit is sticky: once requested it stays requested.
    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    pub fn take_resize(&self) -> bool {
        self.resize.swap(false, Ordering::SeqCst)
    }

    pub fn take_monitor_due(&self) -> bool {
        self.monitor_due.swap(false, Ordering::SeqCst)
    }

    pub fn take_child_exited(&self) -> bool {
        self.child_exited.swap(false, Ordering::SeqCst)
    }

    pub fn raise_resize(&self) {
        self.resize.store(true, Ordering::SeqCst);
    }

    pub fn raise_monitor_due(&self) {
        self.monitor_due.store(true, Ordering::SeqCst);
    }

    pub fn raise_child_exited(&self) {
        self.child_exited.store(true, Ordering::SeqCst);
    }
}

impl Default for SignalFlags {
    fn default() -> Self {
        Self::new()
    }
}

extern "C" fn on_signal(signum: libc::c_int) {
    match signum {
        libc::SIGWINCH => FLAGS.raise_resize(),
        libc::SIGALRM => FLAGS.raise_monitor_due(),
        libc::SIGCHLD => FLAGS.raise_child_exited(),
        _ => FLAGS.request_quit(),
    }
}

fn set_disposition(signum: libc::c_int, handler: libc::sighandler_t) -> io::Result<()> {
    // SAFETY: the action is fully initialised before use and the handler only
    // touches atomics. No SA_RESTART, so a blocked poll() returns EINTR.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signum, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn catch(signals: &[libc::c_int]) -> io::Result<()> {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for &signum in signals {
        set_disposition(signum, handler)?;
    }
    Ok(())
}

/// Route quit, resize, timer and child signals into [`FLAGS`]; ignore SIGPIPE.
pub fn install() -> io::Result<()> {
    catch(&QUIT_SIGNALS)?;
    catch(&[libc::SIGWINCH, libc::SIGALRM, libc::SIGCHLD])?;
    set_disposition(libc::SIGPIPE, libc::SIG_IGN)?;
    debug!("Signal handlers installed");
    Ok(())
}

fn set_timer(interval: Duration) -> io::Result<()> {
    let tv = libc::timeval {
        tv_sec: interval.as_secs() as libc::time_t,
        tv_usec: interval.subsec_micros() as libc::suseconds_t,
    };
    let timer = libc::itimerval {
        it_interval: tv,
        it_value: tv,
    };
    // SAFETY: plain syscall with a valid itimerval
    let rc = unsafe { libc::setitimer(libc::ITIMER_REAL, &timer, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Deliver SIGALRM every `interval`.
pub fn start_timer(interval: Duration) -> io::Result<()> {
    debug!("Monitor timer every {:?}", interval);
    set_timer(interval)
}

pub fn stop_timer() -> io::Result<()> {
    set_timer(Duration::ZERO)
}
