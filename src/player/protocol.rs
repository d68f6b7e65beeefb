// Text protocol spoken with the backend
// Commands go out one per line; answers come back mixed into whatever else
// the player prints, so we only pick out the lines we care about

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("backend sent an unreadable time position: {0:?}")]
    BadTimePosition(String),
    #[error("backend sent an unreadable volume: {0:?}")]
    BadVolume(String),
}

/// Structured bits picked out of one burst of backend output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Answers {
    pub position: Option<f32>,
    pub volume: Option<f32>,
}

/// Command formatting and answer parsing for one family of backends.
pub trait Dialect {
    fn load(&self, path: &str) -> String;
    fn query_position(&self) -> String;
    fn seek(&self, offset: i32) -> String;
    fn toggle_pause(&self) -> String;
    fn stop(&self) -> String;
    fn quit(&self) -> String;
    fn adjust_volume(&self, delta: i32) -> String;
    fn parse(&self, output: &str) -> Result<Answers, ProtocolError>;
}

/// File name handed to `loadfile` to make mplayer drop the current track.
pub const STOP_SENTINEL: &str = "dummy.dummy.dummy";

pub const TIME_POSITION_MARKER: &str = "ANS_TIME_POSITION";
pub const VOLUME_MARKER: &str = "ANS_volume";

/// mplayer's `-slave` mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct MplayerSlave;

impl Dialect for MplayerSlave {
    fn load(&self, path: &str) -> String {
        format!("\nloadfile \"{}\" 0\n", escape_path(path))
    }

    fn query_position(&self) -> String {
        "\nget_time_pos\n".to_string()
    }

    fn seek(&self, offset: i32) -> String {
        format!("\nseek {} 0\n", offset)
    }

    fn toggle_pause(&self) -> String {
        "\npause\n".to_string()
    }

    fn stop(&self) -> String {
        // The documented `stop` command does not stop mplayer reliably,
        // loading a file that does not exist does
        format!("\nloadfile {}\n", STOP_SENTINEL)
    }

    fn quit(&self) -> String {
        "\nquit\n".to_string()
    }

    fn adjust_volume(&self, delta: i32) -> String {
        format!("\nvolume {} 0\nget_property volume\n", delta)
    }

    fn parse(&self, output: &str) -> Result<Answers, ProtocolError> {
        let position = last_answer(output, TIME_POSITION_MARKER)
            .map(|raw| parse_number(raw).ok_or_else(|| ProtocolError::BadTimePosition(raw.to_string())))
            .transpose()?;
        let volume = last_answer(output, VOLUME_MARKER)
            .map(|raw| parse_number(raw).ok_or_else(|| ProtocolError::BadVolume(raw.to_string())))
            .transpose()?;

        Ok(Answers { position, volume })
    }
}

/// Text following the last occurrence of `marker`, up to the end of its line.
///
/// The backend may answer several queries in one burst; only the newest
/// answer counts.
fn last_answer<'a>(output: &'a str, marker: &str) -> Option<&'a str> {
    let start = output.rfind(marker)? + marker.len();
    let rest = &output[start..];
    let end = rest.find(['\n', '\r']).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn parse_number(raw: &str) -> Option<f32> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMBER
        .get_or_init(|| Regex::new(r"^=\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)").ok())
        .as_ref()?;

    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
}

fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
