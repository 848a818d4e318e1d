//! Configuration error types

use super::duration::DurationError;
use super::size::SizeError;

/// Error raised while building a [`RelayConfig`](super::RelayConfig)
///
/// Every variant is fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty
    Missing(&'static str),
    /// A variable does not parse as a duration
    InvalidDuration {
        var: &'static str,
        source: DurationError,
    },
    /// A variable does not parse as a capacity
    InvalidSize {
        var: &'static str,
        source: SizeError,
    },
    /// A variable does not parse as an integer
    InvalidNumber { var: &'static str, value: String },
    /// A variable must be strictly positive
    NotPositive(&'static str),
    /// An address does not resolve to a TCP socket address
    InvalidAddress {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "Missing required variable: {}", var),
            ConfigError::InvalidDuration { var, source } => {
                write!(f, "Incorrect format for {:?}: {}", var, source)
            }
            ConfigError::InvalidSize { var, source } => {
                write!(f, "Incorrect format for {:?}: {}", var, source)
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "Incorrect format for {:?}: {:?} is not an integer", var, value)
            }
            ConfigError::NotPositive(var) => {
                write!(f, "The value of {:?} must be positive/non-zero", var)
            }
            ConfigError::InvalidAddress { var, value, reason } => {
                write!(f, "Invalid address {:?} in {:?}: {}", value, var, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidDuration { source, .. } => Some(source),
            ConfigError::InvalidSize { source, .. } => Some(source),
            _ => None,
        }
    }
}
