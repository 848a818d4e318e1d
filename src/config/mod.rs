//! Startup configuration
//!
//! Everything here runs once, before any socket is opened. A value that
//! fails validation is fatal; nothing in this module is used on the data
//! path.

pub mod duration;
pub mod error;
pub mod relay;
pub mod size;

pub use duration::{parse_duration, DurationError};
pub use error::ConfigError;
pub use relay::RelayConfig;
pub use size::{parse_size, SizeError};
