// Keyboard input handling: repeat-count prefixes and the input file channel

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

const ENTER: [u8; 2] = [b'\n', b'\r'];

/// Numeric prefix state machine. `12f` seeks forward twelve times,
/// `3<Enter>` repeats the previous key with a count of three.
#[derive(Debug, Default)]
pub struct InputState {
    count: u32,
    previous: Option<u8>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_count(&self) -> bool {
        self.count > 0
    }

    /// Feed one byte. Returns the key to execute and its count, or `None`
    /// while a count is still being typed.
    pub fn feed(&mut self, byte: u8) -> Option<(u8, u32)> {
        if byte.is_ascii_digit() && (byte != b'0' || self.count > 0) {
            let digit = u32::from(byte - b'0');
            self.count = self.count.saturating_mul(10).saturating_add(digit);
            return None;
        }

        let count = std::mem::take(&mut self.count);
        if ENTER.contains(&byte) && count > 0 {
            if let Some(previous) = self.previous {
                return Some((previous, count));
            }
        }

        self.previous = Some(byte);
        Some((byte, count))
    }
}

/// Take one key from the input file, if somebody left one there.
///
/// The first character of the first line is returned and the file removed.
/// A missing file or an empty first line (`\n` or `\r\n`) yields `None`
/// and leaves things be.
pub fn take_input_file(path: &Path) -> io::Result<Option<u8>> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let Some(&key) = content.first().filter(|b| !ENTER.contains(b)) else {
        return Ok(None);
    };

    fs::remove_file(path)?;
    debug!("Input file delivered key {:?}", key as char);
    Ok(Some(key))
}
