// tunectl library - playback control for a terminal music-library manager
// The binary wires these together; everything is usable (and tested) on its own

pub mod app;      // context object, built-in commands, key bindings
pub mod command;  // prefix-matching command table and argv splitting
pub mod config;   // settings and preferences
pub mod library;  // tracks and playlists
pub mod player;   // backend process supervision and its protocol
pub mod remote;   // control socket for single-instance and -c
pub mod runtime;  // signals, timer, event loop
pub mod ui;       // repaint notifications and the status line

// Export the stuff the binary actually uses
pub use app::App;
pub use config::Config;
pub use library::{Library, Playlist, Track};
pub use player::{Player, PlayerController, PlayerError};
