// Client-visible command errors

use crate::protocol::RespValue;
use crate::storage::StorageError;
use thiserror::Error;

/// Every way a command can fail in front of a client.
///
/// The `Display` text is exactly what goes on the wire after the `-`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR empty command")]
    EmptyCommand,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgs(String),

    #[error("ERR {0}")]
    Syntax(String),

    #[error("ERR value is not an integer or out of range")]
    InvalidInt,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR index out of range")]
    OutOfRange,

    #[error("MOVED {0}")]
    Moved(String),

    #[error("ERR {0}")]
    NotReady(String),

    #[error("ERR {0}")]
    Other(String),
}

impl CommandError {
    /// Plain `ERR syntax error`
    pub fn syntax() -> Self {
        CommandError::Syntax("syntax error".to_string())
    }

    pub fn unknown_subcommand(command: &str, sub: &str) -> Self {
        CommandError::Syntax(format!("{} unknown subcommand for '{}'", command, sub))
    }
}

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        CommandError::Other(err.to_string())
    }
}

impl From<CommandError> for RespValue {
    fn from(err: CommandError) -> Self {
        RespValue::Error(err.to_string())
    }
}
