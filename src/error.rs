//! Crate-level error type

use std::io;

use crate::config::ConfigError;
use crate::writer::WriterError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort the relay or one of its public operations
///
/// Per-connection read errors and per-destination delivery errors never
/// surface here; they are logged where they happen.
#[derive(Debug)]
pub enum Error {
    /// Socket level failure (bind, local address lookup)
    Io(io::Error),
    /// Invalid or missing configuration
    Config(ConfigError),
    /// Writer set membership error
    Writer(WriterError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Writer(e) => write!(f, "Writer error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Writer(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<WriterError> for Error {
    fn from(e: WriterError) -> Self {
        Error::Writer(e)
    }
}
