// Key bindings for the interactive loop

use super::App;
use crate::player::PlayerError;
use std::rc::Rc;
use tracing::debug;

/// `count` is the typed repeat prefix, 0 when there was none.
pub type KeyAction = fn(&mut App, u32);

#[derive(Clone, Copy)]
struct KeyBinding {
    key: u8,
    action: KeyAction,
}

pub struct Keymap {
    bindings: Vec<KeyBinding>,
}

const SHORT_SEEK: i32 = 10;
const LONG_SEEK: i32 = 60;
const VOLUME_STEP: i32 = 5;

fn times(count: u32) -> i32 {
    i32::try_from(count.max(1)).unwrap_or(i32::MAX)
}

fn check(app: &mut App, result: Result<(), PlayerError>) {
    if let Err(e) = result {
        app.player_failed(e);
    }
}

fn seek_by(app: &mut App, step: i32, count: u32) {
    let result = app.player.seek(step.saturating_mul(times(count)));
    check(app, result);
}

fn quit(app: &mut App, _count: u32) {
    app.request_quit();
}

fn pause(app: &mut App, _count: u32) {
    let result = app.player.pause();
    check(app, result);
    app.paint_player();
}

fn stop(app: &mut App, _count: u32) {
    let result = app.player.stop();
    check(app, result);
    app.paint_player();
}

fn seek_forward(app: &mut App, count: u32) {
    seek_by(app, SHORT_SEEK, count);
}

fn seek_backward(app: &mut App, count: u32) {
    seek_by(app, -SHORT_SEEK, count);
}

fn seek_forward_long(app: &mut App, count: u32) {
    seek_by(app, LONG_SEEK, count);
}

fn seek_backward_long(app: &mut App, count: u32) {
    seek_by(app, -LONG_SEEK, count);
}

fn next(app: &mut App, _count: u32) {
    let result = app.player.play_next();
    check(app, result);
}

fn volume_up(app: &mut App, count: u32) {
    let result = app.player.adjust_volume(VOLUME_STEP.saturating_mul(times(count)));
    check(app, result);
}

fn volume_down(app: &mut App, count: u32) {
    let result = app.player.adjust_volume(-VOLUME_STEP.saturating_mul(times(count)));
    check(app, result);
}

fn cycle_mode(app: &mut App, _count: u32) {
    let mode = app.player.mode().cycle();
    app.player.set_mode(mode);
    app.report(format!("mode: {}", mode));
}

/// Enter: play track `count` of the viewed playlist, or the current one.
fn play(app: &mut App, count: u32) {
    if count > 0 {
        let viewing = Rc::clone(&app.viewing);
        app.player.set_queue(viewing, count as usize - 1);
    } else if app.player.queue().is_none() {
        let viewing = Rc::clone(&app.viewing);
        app.player.set_queue(viewing, 0);
    }
    let result = app.player.play();
    check(app, result);
}

fn redraw(app: &mut App, _count: u32) {
    app.display.resize();
    app.paint_all();
}

impl Keymap {
    fn new(bindings: Vec<KeyBinding>) -> Self {
        Self { bindings }
    }

    pub fn default_bindings() -> Self {
        let table: [(u8, KeyAction); 15] = [
            (b'q', quit),
            (b' ', pause),
            (b's', stop),
            (b'f', seek_forward),
            (b'b', seek_backward),
            (b'F', seek_forward_long),
            (b'B', seek_backward_long),
            (b'n', next),
            (b'+', volume_up),
            (b'=', volume_up),
            (b'-', volume_down),
            (b'm', cycle_mode),
            (b'\r', play),
            (b'\n', play),
            (b'r', redraw),
        ];
        Self::new(
            table
                .into_iter()
                .map(|(key, action)| KeyBinding { key, action })
                .collect(),
        )
    }

    fn lookup(&self, key: u8) -> Option<KeyAction> {
        self.bindings.iter().find(|b| b.key == key).map(|b| b.action)
    }

    /// Run the action bound to `key`. Returns false for unbound keys.
    pub fn execute(&self, app: &mut App, key: u8, count: u32) -> bool {
        match self.lookup(key) {
            Some(action) => {
                action(app, count);
                true
            }
            None => {
                debug!("Unbound key {:?}", key as char);
                false
            }
        }
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::default_bindings()
    }
}
