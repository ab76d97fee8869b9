//! Configuration for respline
//!
//! Centralized configuration with sensible defaults.

/// Main configuration for a respline server or client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Bounds applied while decoding RESP frames
    pub parser_limits: ParserLimits,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 disables)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 disables)
    pub write_timeout_ms: u64,
}

/// Decoder bounds
///
/// Anything above these is treated as malformed data, not as a
/// short read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    /// Largest accepted bulk string payload (bytes)
    pub max_bulk_len: usize,

    /// Largest accepted array element count
    pub max_array_len: usize,

    /// Deepest accepted array nesting
    pub max_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_bulk_len: 512 * 1024 * 1024, // 512 MB, same as redis-server
            max_array_len: 1024 * 1024,
            max_depth: 64,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parser_limits: ParserLimits::default(),
            listen_addr: "127.0.0.1:6379".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set all decoder limits at once
    pub fn parser_limits(mut self, limits: ParserLimits) -> Self {
        self.config.parser_limits = limits;
        self
    }

    /// Set the largest accepted bulk string (in bytes)
    pub fn max_bulk_len(mut self, len: usize) -> Self {
        self.config.parser_limits.max_bulk_len = len;
        self
    }

    /// Set the largest accepted array length
    pub fn max_array_len(mut self, len: usize) -> Self {
        self.config.parser_limits.max_array_len = len;
        self
    }

    /// Set the deepest accepted array nesting
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.parser_limits.max_depth = depth;
        self
    }

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

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
