//! Relay configuration

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use super::duration::parse_duration;
use super::error::ConfigError;
use super::size::{parse_size, KIB, MIB};

pub const ENV_LISTEN_PORT: &str = "LISTEN_PORT";
pub const ENV_LISTEN_HOST: &str = "LISTEN_HOST";
pub const ENV_FLUSH_INTERVAL: &str = "FLUSH_INTERVAL";
pub const ENV_BUFFER_LIMIT_SIZE: &str = "BUFFER_LIMIT_SIZE";
pub const ENV_RETRY_COUNT: &str = "RETRY_COUNT";
pub const ENV_TCP_ADDRESSES: &str = "TCP_ADDRESSES";
pub const ENV_MAX_CONNECTIONS: &str = "MAX_CONNECTIONS";
pub const ENV_MAX_FRAME_SIZE: &str = "MAX_FRAME_SIZE";
pub const ENV_CONNECT_TIMEOUT: &str = "CONNECT_TIMEOUT";
pub const ENV_DRAIN_TIMEOUT: &str = "DRAIN_TIMEOUT";

pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_BUFFER_LIMIT: u64 = 64 * MIB;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * KIB as usize;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Fraction of the flush interval used as the scheduler poll period
const POLL_DIVISOR: u32 = 5;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Inbound address to bind to
    pub listen_addr: SocketAddr,

    /// Downstream destinations, in attach order
    pub destinations: Vec<SocketAddr>,

    /// Maximum time between two flushes of a non-empty buffer
    pub flush_interval: Duration,

    /// Buffered byte count that triggers a flush before the interval elapses
    pub buffer_limit: u64,

    /// Write attempts per destination per flush
    pub retry_count: u32,

    /// Maximum concurrent inbound connections (0 = unlimited)
    pub max_connections: usize,

    /// Largest undelimited run an inbound connection may hold pending
    pub max_frame_size: usize,

    /// Dial timeout for downstream destinations
    pub connect_timeout: Duration,

    /// Upper bound on the final flush performed at shutdown
    pub drain_timeout: Duration,
}

impl RelayConfig {
    /// Create a config with default tuning for the given endpoints
    pub fn new(listen_addr: SocketAddr, destinations: Vec<SocketAddr>) -> Self {
        Self {
            listen_addr,
            destinations,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            retry_count: DEFAULT_RETRY_COUNT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Build the config from process environment variables
    ///
    /// Host names are resolved with a blocking lookup; call from a blocking
    /// context.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup
    ///
    /// Unset and empty variables are treated alike: optional ones fall back
    /// to their default, required ones fail with [`ConfigError::Missing`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = get(ENV_LISTEN_PORT).ok_or(ConfigError::Missing(ENV_LISTEN_PORT))?;
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var: ENV_LISTEN_PORT,
            value: port.clone(),
        })?;
        let host = get(ENV_LISTEN_HOST).unwrap_or_else(|| DEFAULT_LISTEN_HOST.to_string());
        let listen_addr = resolve(ENV_LISTEN_HOST, (host.trim(), port), &host)?;

        let addresses = get(ENV_TCP_ADDRESSES).ok_or(ConfigError::Missing(ENV_TCP_ADDRESSES))?;
        let destinations = addresses
            .split(',')
            .map(str::trim)
            .map(|addr| resolve(ENV_TCP_ADDRESSES, addr, addr))
            .collect::<Result<Vec<_>, _>>()?;

        let mut config = Self::new(listen_addr, destinations);

        if let Some(value) = get(ENV_FLUSH_INTERVAL) {
            config.flush_interval = duration_var(ENV_FLUSH_INTERVAL, &value)?;
            if config.flush_interval.is_zero() {
                return Err(ConfigError::NotPositive(ENV_FLUSH_INTERVAL));
            }
        }
        if let Some(value) = get(ENV_BUFFER_LIMIT_SIZE) {
            config.buffer_limit = size_var(ENV_BUFFER_LIMIT_SIZE, &value)?;
        }
        if let Some(value) = get(ENV_RETRY_COUNT) {
            let n: i64 = number_var(ENV_RETRY_COUNT, &value)?;
            if n <= 0 {
                return Err(ConfigError::NotPositive(ENV_RETRY_COUNT));
            }
            config.retry_count = u32::try_from(n).map_err(|_| ConfigError::InvalidNumber {
                var: ENV_RETRY_COUNT,
                value,
            })?;
        }
        if let Some(value) = get(ENV_MAX_CONNECTIONS) {
            config.max_connections = number_var(ENV_MAX_CONNECTIONS, &value)?;
        }
        if let Some(value) = get(ENV_MAX_FRAME_SIZE) {
            let size = byte_count_var(ENV_MAX_FRAME_SIZE, &value)?;
            config.max_frame_size = usize::try_from(size).unwrap_or(usize::MAX);
        }
        if let Some(value) = get(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout = duration_var(ENV_CONNECT_TIMEOUT, &value)?;
        }
        if let Some(value) = get(ENV_DRAIN_TIMEOUT) {
            config.drain_timeout = duration_var(ENV_DRAIN_TIMEOUT, &value)?;
        }

        Ok(config)
    }

    /// Scheduler poll period: one fifth of the flush interval
    pub fn poll_interval(&self) -> Duration {
        (self.flush_interval / POLL_DIVISOR).max(MIN_POLL_INTERVAL)
    }

    /// Set the flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the size-triggered flush threshold
    pub fn buffer_limit(mut self, bytes: u64) -> Self {
        self.buffer_limit = bytes;
        self
    }

    /// Set the per-destination write attempt budget
    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count.max(1);
        self
    }

    /// Set maximum inbound connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum pending frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the destination dial timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the shutdown drain timeout
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

fn resolve<A: ToSocketAddrs>(
    var: &'static str,
    addr: A,
    shown: &str,
) -> Result<SocketAddr, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAddress {
        var,
        value: shown.to_string(),
        reason,
    };
    addr.to_socket_addrs()
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("no addresses resolved".to_string()))
}

fn duration_var(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value.trim()).map_err(|source| ConfigError::InvalidDuration { var, source })
}

fn size_var(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    parse_size(value.trim()).map_err(|source| ConfigError::InvalidSize { var, source })
}

/// Plain byte count (`65536`) or a size with a unit (`1MB`)
fn byte_count_var(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::NotPositive(var)),
        Ok(bytes) => Ok(bytes),
        Err(_) => size_var(var, value),
    }
}

fn number_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}
