//! Flush trigger decision

use std::time::Duration;

use tokio::time::Instant;

use crate::config::RelayConfig;

/// When accumulated data is ready to ship
///
/// A flush is due when the buffer is non-empty and either the deadline has
/// passed or the buffer reached the size threshold. An empty buffer is
/// never flushed, however long it has been.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Maximum time between flushes
    pub interval: Duration,
    /// Buffered bytes that trigger an early flush
    pub size_threshold: u64,
}

impl FlushPolicy {
    /// Create a policy
    pub fn new(interval: Duration, size_threshold: u64) -> Self {
        Self {
            interval,
            size_threshold,
        }
    }

    /// Policy from the relay configuration
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.flush_interval, config.buffer_limit)
    }

    /// Whether a buffer holding `size` bytes should be flushed at `now`
    pub fn should_flush(&self, now: Instant, deadline: Instant, size: usize) -> bool {
        size > 0 && (now >= deadline || size as u64 >= self.size_threshold)
    }

    /// Deadline for the flush following one made at `now`
    pub fn next_deadline(&self, now: Instant) -> Instant {
        now + self.interval
    }
}
