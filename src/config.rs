//! Configuration for the bus.
//!
//! Provides [`BusConfig`], constructed manually or via [`BusConfig::from_env`].
//! No TOML, YAML, or other config-file parsing dependency is introduced —
//! every knob is either a sensible default or a plain environment variable.
//!
//! # Example
//!
//! ```
//! use agentbus::config::BusConfig;
//!
//! let config = BusConfig::default();
//! assert_eq!(config.heartbeat_interval_secs, 30);
//! ```

use std::path::PathBuf;

/// Global configuration for the bus.
///
/// Intentionally minimal: callers can build one by hand, via [`Default`],
/// or by overlaying the process environment with [`BusConfig::from_env`].
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Path to the Unix domain socket the transport binds/connects to.
    pub socket_path: PathBuf,
    /// Maximum size, in bytes, of a single framed message.
    pub max_frame_size: usize,
    /// Interval between bridge heartbeats, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Ceiling on establishing a client connection, in seconds.
    pub connection_timeout_secs: u64,
    /// Maximum number of conversation-state entries kept before LRU eviction.
    pub conversation_cache_capacity: usize,
    /// Time-to-live, in seconds, for a cached chat response.
    pub conversation_cache_ttl_secs: u64,
    /// Timeout for the `execute_code` tool, in seconds.
    pub code_exec_timeout_secs: u64,
    /// Default display width assumed by computer-use tasks.
    pub display_width: u32,
    /// Default display height assumed by computer-use tasks.
    pub display_height: u32,
}

impl Default for BusConfig {
    /// Create a config with the bus's built-in defaults: socket at
    /// `/tmp/cartrita_mcp.sock`, a 10 MiB frame cap, a 30s heartbeat, and a
    /// 1000-entry conversation cache with a one-hour TTL.
    ///
    /// # Example
    ///
    /// ```
    /// use agentbus::config::BusConfig;
    /// use std::path::PathBuf;
    ///
    /// let config = BusConfig::default();
    /// assert_eq!(config.socket_path, PathBuf::from("/tmp/cartrita_mcp.sock"));
    /// ```
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/cartrita_mcp.sock"),
            max_frame_size: 10 * 1024 * 1024,
            heartbeat_interval_secs: 30,
            connection_timeout_secs: 10,
            conversation_cache_capacity: 1000,
            conversation_cache_ttl_secs: 3600,
            code_exec_timeout_secs: 30,
            display_width: 1920,
            display_height: 1080,
        }
    }
}

impl BusConfig {
    /// Overlay the process environment onto [`BusConfig::default`].
    ///
    /// A malformed numeric value is logged at `warn` and the default for
    /// that field is kept — this never panics, matching the rest of the
    /// bus's "don't crash the host process" posture.
    ///
    /// Recognized variables: `CARTRITA_MCP_SOCKET_PATH`,
    /// `CARTRITA_MCP_HEARTBEAT_SECS`, `CARTRITA_MCP_CONVERSATION_CACHE_SIZE`,
    /// `CARTRITA_MCP_CODE_EXEC_TIMEOUT_SECS`, `CARTRITA_MCP_DISPLAY_WIDTH`,
    /// `CARTRITA_MCP_DISPLAY_HEIGHT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("CARTRITA_MCP_SOCKET_PATH") {
            config.socket_path = PathBuf::from(path);
        }
        overlay_u64(&mut config.heartbeat_interval_secs, "CARTRITA_MCP_HEARTBEAT_SECS");
        overlay_usize(
            &mut config.conversation_cache_capacity,
            "CARTRITA_MCP_CONVERSATION_CACHE_SIZE",
        );
        overlay_u64(
            &mut config.code_exec_timeout_secs,
            "CARTRITA_MCP_CODE_EXEC_TIMEOUT_SECS",
        );
        overlay_u32(&mut config.display_width, "CARTRITA_MCP_DISPLAY_WIDTH");
        overlay_u32(&mut config.display_height, "CARTRITA_MCP_DISPLAY_HEIGHT");

        config
    }
}

fn overlay_u64(field: &mut u64, var: &str) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse() {
            Ok(value) => *field = value,
            Err(_) => log::warn!("{var} is not a valid integer ({raw:?}), keeping default"),
        }
    }
}

fn overlay_u32(field: &mut u32, var: &str) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse() {
            Ok(value) => *field = value,
            Err(_) => log::warn!("{var} is not a valid integer ({raw:?}), keeping default"),
        }
    }
}

fn overlay_usize(field: &mut usize, var: &str) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse() {
            Ok(value) => *field = value,
            Err(_) => log::warn!("{var} is not a valid integer ({raw:?}), keeping default"),
        }
    }
}
