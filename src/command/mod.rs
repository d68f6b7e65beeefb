// Command routing - typed names resolve by unique prefix
// "w" runs "write" as long as nothing else starts with "w"

pub mod argv;

pub use argv::{split, ArgvError};

use thiserror::Error;

/// Handler status: 0 is success, anything else is a failure the caller
/// decides about.
pub type Status = i32;

pub type Handler<C> = fn(&mut C, &[String]) -> Status;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("ambiguous abbreviation '{input}' (could be {})", .candidates.join(", "))]
    Ambiguous {
        input: String,
        candidates: Vec<&'static str>,
    },
}

pub struct Command<C> {
    pub name: &'static str,
    pub handler: Handler<C>,
}

/// Fixed table of commands over some context type `C`.
pub struct CommandTable<C> {
    commands: Vec<Command<C>>,
}

impl<C> CommandTable<C> {
    pub fn new() -> Self {
        Self { commands: Vec::new() }
    }

    pub fn with(mut self, name: &'static str, handler: Handler<C>) -> Self {
        self.commands.push(Command { name, handler });
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.iter().map(|c| c.name)
    }

    /// Find the single command `input` abbreviates.
    pub fn resolve(&self, input: &str) -> Result<&Command<C>, RouteError> {
        if input.is_empty() {
            return Err(RouteError::Empty);
        }

        let mut matches = self.commands.iter().filter(|c| c.name.starts_with(input));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Ok(only),
            (None, _) => Err(RouteError::Unknown(input.to_string())),
            (Some(_), Some(_)) => Err(RouteError::Ambiguous {
                input: input.to_string(),
                candidates: self
                    .commands
                    .iter()
                    .filter(|c| c.name.starts_with(input))
                    .map(|c| c.name)
                    .collect(),
            }),
        }
    }

    /// Resolve `argv[0]` and run the handler with the whole argv.
    pub fn dispatch(&self, ctx: &mut C, argv: &[String]) -> Result<Status, RouteError> {
        let name = argv.first().ok_or(RouteError::Empty)?;
        let command = self.resolve(name)?;
        Ok((command.handler)(ctx, argv))
    }
}

impl<C> Default for CommandTable<C> {
    fn default() -> Self {
        Self::new()
    }
}
