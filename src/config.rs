//! Configuration for TideKV
//!
//! Centralized configuration with sensible defaults.

use crate::error::{Result, TideError};

/// Main configuration for a TideKV server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connections with no successful read/write for this long are closed
    pub idle_timeout_ms: u64,

    /// Upper bound on one multiplexer wait, so shutdown is noticed
    pub max_poll_wait_ms: u64,

    // -------------------------------------------------------------------------
    // Protocol Limits
    // -------------------------------------------------------------------------
    /// Max size of a request or response body (in bytes)
    pub max_message_size: usize,

    /// Max number of strings in one request
    pub max_args: usize,

    // -------------------------------------------------------------------------
    // Engine Configuration
    // -------------------------------------------------------------------------
    /// Number of background worker threads
    pub worker_threads: usize,

    /// Sorted sets with more members than this are freed on the pool
    pub large_container_threshold: usize,

    /// Max number of keys expired per event loop iteration
    pub max_expirations_per_tick: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:1234".to_string(),
            max_connections: 1024,
            idle_timeout_ms: 5_000,
            max_poll_wait_ms: 1_000,
            max_message_size: 32 << 20, // 32 MB
            max_args: 200_000,
            worker_threads: 4,
            large_container_threshold: 1_000,
            max_expirations_per_tick: 2_000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, bool); 6] = [
            ("max_connections", self.max_connections == 0),
            ("idle_timeout_ms", self.idle_timeout_ms == 0),
            ("max_poll_wait_ms", self.max_poll_wait_ms == 0),
            ("max_message_size", self.max_message_size < 4),
            ("max_args", self.max_args == 0),
            ("max_expirations_per_tick", self.max_expirations_per_tick == 0),
        ];
        if let Some((name, _)) = checks.iter().find(|(_, bad)| *bad) {
            return Err(TideError::Config(format!("{} is out of range", name)));
        }
        if self.max_message_size > u32::MAX as usize {
            return Err(TideError::Config(
                "max_message_size must fit in a u32 length prefix".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the idle connection timeout (in milliseconds)
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    /// Set the longest single wait inside the event loop (in milliseconds)
    pub fn max_poll_wait_ms(mut self, ms: u64) -> Self {
        self.config.max_poll_wait_ms = ms;
        self
    }

    /// Set the maximum message size (in bytes)
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the maximum argument count per request
    pub fn max_args(mut self, count: usize) -> Self {
        self.config.max_args = count;
        self
    }

    /// Set the number of background worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the member count above which sorted sets are freed asynchronously
    pub fn large_container_threshold(mut self, count: usize) -> Self {
        self.config.large_container_threshold = count;
        self
    }

    /// Set the per-iteration expiration cap
    pub fn max_expirations_per_tick(mut self, count: usize) -> Self {
        self.config.max_expirations_per_tick = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
