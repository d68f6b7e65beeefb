// Shell-ish word splitting for command lines

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgvError {
    #[error("unmatched {0} quote")]
    UnmatchedQuote(char),
    #[error("trailing backslash")]
    TrailingBackslash,
}

/// Split `line` into words.
///
/// Whitespace separates words; `'...'` keeps everything literal, `"..."`
/// groups but still honours backslash escapes, and a backslash outside
/// single quotes escapes the next character.
pub fn split(line: &str) -> Result<Vec<String>, ArgvError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\\' => {
                let escaped = chars.next().ok_or(ArgvError::TrailingBackslash)?;
                current.push(escaped);
                in_word = true;
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(ArgvError::UnmatchedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = chars.next().ok_or(ArgvError::UnmatchedQuote('"'))?;
                            current.push(escaped);
                        }
                        Some(c) => current.push(c),
                        None => return Err(ArgvError::UnmatchedQuote('"')),
                    }
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        words.push(current);
    }
    Ok(words)
}
