// Process-level plumbing: signal flags, the monitor timer and the main loop

pub mod event_loop;
pub mod signals;

pub use event_loop::{EventLoop, LoopError};
pub use signals::{SignalFlags, FLAGS};
