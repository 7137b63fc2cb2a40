//! # Query Configuration
//!
//! Configuration options for one server query.
//!
//! # Example
//!
//! ```rust
//! use squery_network::QueryConfig;
//! use std::time::Duration;
//!
//! let config = QueryConfig {
//!     host: "192.0.2.10".to_string(),
//!     port: 27016,
//!     socket_timeout: Duration::from_secs(1),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use squery_core::ByteOrder;
use std::time::Duration;

/// Default Source query port
pub const DEFAULT_PORT: u16 = 27015;

/// Query configuration options
///
/// # Default Values
///
/// - Port 27015 (standard Source query port)
/// - 2-second wait per request/response exchange
/// - 10-second budget for the whole query
/// - Little-endian challenge, no legacy handshake, Source info reply
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Host name or IP address of the server
    pub host: String,

    /// Query port
    ///
    /// # Default
    /// 27015
    pub port: u16,

    /// How long one exchange waits for its response
    ///
    /// # Notes
    /// - Covers every fragment of a split response
    /// - A timeout on the info request fails the query, on players and
    ///   rules it only leaves those empty
    pub socket_timeout: Duration,

    /// Upper bound for the whole query, all phases included
    pub attempt_timeout: Duration,

    /// Byte order of the challenge written into requests
    pub byte_order: ByteOrder,

    /// Request a challenge with the dedicated legacy command before players/rules
    pub legacy_challenge: bool,

    /// Expect the GoldSrc (0x6D) info reply layout
    pub goldsrc_info: bool,

    /// How long an incomplete split response is kept
    pub fragment_ttl: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            socket_timeout: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(10),
            byte_order: ByteOrder::Little,
            legacy_challenge: false,
            goldsrc_info: false,
            fragment_ttl: Duration::from_secs(10),
        }
    }
}

impl QueryConfig {
    /// Validate the configuration
    ///
    /// # Checks
    /// - `host` must not be empty
    /// - `port` must be > 0
    /// - timeouts must be non-zero
    /// - `attempt_timeout` must be >= `socket_timeout`
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }

        if self.port == 0 {
            return Err("port must be > 0".to_string());
        }

        if self.socket_timeout.is_zero() || self.attempt_timeout.is_zero() {
            return Err("timeouts must be > 0".to_string());
        }

        if self.attempt_timeout < self.socket_timeout {
            return Err("attempt_timeout must be >= socket_timeout".to_string());
        }

        if self.fragment_ttl < self.socket_timeout {
            tracing::warn!("fragment_ttl is shorter than socket_timeout, slow split responses will be dropped");
        }

        Ok(())
    }

    /// `host:port` string used for resolution and logging
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
