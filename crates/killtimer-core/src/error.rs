//! Core error types for killtimer-core.
//!
//! Each failure family gets its own `thiserror` enum so callers can match on
//! exactly what went wrong; [`CoreError`] wraps them all for the binaries.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for killtimer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The supervised program could not be started
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// A termination request could not be delivered
    #[error(transparent)]
    Termination(#[from] TerminationFailure),

    /// A work log line could not be read
    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecordError),

    /// A human duration expression could not be read
    #[error(transparent)]
    Duration(#[from] DurationParseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to start the child process.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Nothing to run.
    #[error("cannot launch an empty command")]
    EmptyCommand,

    /// The OS refused to spawn the executable.
    #[error("failed to launch '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// The termination signal could not be delivered to the child.
#[derive(Error, Debug)]
#[error("failed to terminate process {pid}: {source}")]
pub struct TerminationFailure {
    pub pid: u32,
    #[source]
    pub source: std::io::Error,
}

/// A work log line that does not follow the six-field layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed record on line {line}: {reason}")]
pub struct MalformedRecordError {
    /// 1-based line number within the log (0 when parsed standalone).
    pub line: usize,
    pub reason: String,
}

impl MalformedRecordError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            line: 0,
            reason: reason.into(),
        }
    }

    /// Attach the line number the record was read from.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

/// A duration expression such as `"1h30m"` could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,

    #[error("negative durations are not allowed: '{0}'")]
    Negative(String),

    #[error("unknown duration unit '{unit}' in '{input}'")]
    UnknownUnit { input: String, unit: String },

    #[error("cannot parse duration '{0}'")]
    Invalid(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration from {path}: {message}")]
    ParseFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: DurationParseError,
    },

    /// The home directory could not be determined
    #[error("Cannot determine the configuration directory")]
    NoConfigDir,
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
