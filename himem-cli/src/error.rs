//! CLI error type.

use std::fmt;

use himem::config::ConfigError;
use himem::logging::LoggingError;
use himem::StoreError;

/// Exit code for runtime failures.
pub const EXIT_ERROR: i32 = 1;
/// Exit code for bad arguments.
pub const EXIT_USAGE: i32 = 2;
/// Exit code when the requested item does not exist.
pub const EXIT_NOT_FOUND: i32 = 3;

/// Errors surfaced to the command line.
#[derive(Debug)]
pub enum CliError {
    /// The store rejected or failed an operation.
    Store(StoreError),
    /// Configuration file problems.
    Config(String),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// Unreadable or malformed input file.
    Input(String),
    /// Bad argument combination or value.
    Usage(String),
    /// Output could not be written.
    Output(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Store(e) if e.is_not_found() => EXIT_NOT_FOUND,
            CliError::Usage(_) => EXIT_USAGE,
            _ => EXIT_ERROR,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Store(e) => write!(f, "error: {}", e),
            CliError::Config(msg) => write!(f, "error: configuration: {}", msg),
            CliError::Logging(e) => write!(f, "error: logging: {}", e),
            CliError::Input(msg) => write!(f, "error: input: {}", msg),
            CliError::Usage(msg) => write!(f, "error: {}\n  help: run 'himem --help' for usage", msg),
            CliError::Output(msg) => write!(f, "error: output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}
