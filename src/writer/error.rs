//! Writer set error types

use std::net::SocketAddr;

/// Error type for writer set membership operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterError {
    /// A destination with this address is already in the set
    AlreadyAttached(SocketAddr),
}

impl std::fmt::Display for WriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterError::AlreadyAttached(addr) => {
                write!(f, "Destination already attached: {}", addr)
            }
        }
    }
}

impl std::error::Error for WriterError {}
