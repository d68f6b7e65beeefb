// Built-in commands for the rc file, the control socket and `-c`
// Each handler gets the full argv (its own name first) and returns 0 on success

use super::App;
use crate::command::{CommandTable, Status};
use crate::player::PlayMode;
use std::rc::Rc;

pub fn builtin() -> CommandTable<App> {
    CommandTable::<App>::new()
        .with("quit", quit)
        .with("mode", mode)
        .with("play", play)
        .with("pause", pause)
        .with("stop", stop)
        .with("seek", seek)
        .with("next", next)
        .with("volume", volume)
        .with("status", status)
}

/// The single argument of a command, or a usage message.
fn one_arg<'a>(app: &mut App, argv: &'a [String], usage: &str) -> Option<&'a str> {
    match argv {
        [_, arg] => Some(arg.as_str()),
        _ => {
            app.report(format!("usage: {}", usage));
            None
        }
    }
}

fn number_arg(app: &mut App, argv: &[String], usage: &str) -> Option<i32> {
    let arg = one_arg(app, argv, usage)?;
    match arg.parse::<i32>() {
        Ok(n) => Some(n),
        Err(_) => {
            app.report(format!("not a number: '{}' (usage: {})", arg, usage));
            None
        }
    }
}

fn quit(app: &mut App, _argv: &[String]) -> Status {
    app.request_quit();
    0
}

fn mode(app: &mut App, argv: &[String]) -> Status {
    let Some(arg) = one_arg(app, argv, "mode <linear|loop|random>") else {
        return 1;
    };
    match arg.parse::<PlayMode>() {
        Ok(mode) => {
            app.player.set_mode(mode);
            app.paint_player();
            0
        }
        Err(e) => {
            app.report(e);
            1
        }
    }
}

/// `play` resumes the queue (or starts the viewed playlist); `play N`
/// starts track N of the viewed playlist.
fn play(app: &mut App, argv: &[String]) -> Status {
    let index = match argv {
        [_] => None,
        [_, n] => match n.parse::<usize>() {
            Ok(n) if n >= 1 => Some(n - 1),
            _ => {
                app.report(format!("play: bad track number '{}'", n));
                return 1;
            }
        },
        _ => {
            app.report("usage: play [n]");
            return 1;
        }
    };

    match index {
        Some(index) => {
            let viewing = Rc::clone(&app.viewing);
            app.player.set_queue(viewing, index);
        }
        None if app.player.queue().is_none() => {
            let viewing = Rc::clone(&app.viewing);
            app.player.set_queue(viewing, 0);
        }
        None => {}
    }

    match app.player.play() {
        Ok(()) => 0,
        Err(e) => app.player_failed(e),
    }
}

fn pause(app: &mut App, _argv: &[String]) -> Status {
    match app.player.pause() {
        Ok(()) => 0,
        Err(e) => app.player_failed(e),
    }
}

fn stop(app: &mut App, _argv: &[String]) -> Status {
    match app.player.stop() {
        Ok(()) => 0,
        Err(e) => app.player_failed(e),
    }
}

fn seek(app: &mut App, argv: &[String]) -> Status {
    let Some(seconds) = number_arg(app, argv, "seek <+/-seconds>") else {
        return 1;
    };
    match app.player.seek(seconds) {
        Ok(()) => 0,
        Err(e) => app.player_failed(e),
    }
}

fn next(app: &mut App, _argv: &[String]) -> Status {
    match app.player.play_next() {
        Ok(()) => 0,
        Err(e) => app.player_failed(e),
    }
}

fn volume(app: &mut App, argv: &[String]) -> Status {
    let Some(delta) = number_arg(app, argv, "volume <+/-delta>") else {
        return 1;
    };
    match app.player.adjust_volume(delta) {
        Ok(()) => 0,
        Err(e) => app.player_failed(e),
    }
}

fn status(app: &mut App, _argv: &[String]) -> Status {
    let summary = app.now_playing().summary();
    app.report(summary);
    0
}
