//! SQuery Configuration Management
//!
//! Loads query options from a `queryoptions.txt` file.
//!
//! # Format
//!
//! ```text
//! # comment
//! port = 2302
//! sockettimeout = 2000
//! byteorder = le
//! ```
//!
//! Timeouts are in milliseconds. Unknown keys are ignored and values that
//! fail to parse keep their default.

use squery_core::{ByteOrder, QueryError, Result};
use std::fs;
use std::path::Path;

/// Default options file looked up next to the working directory
pub const DEFAULT_OPTIONS_FILE: &str = "queryoptions.txt";

/// Query options from the options file
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Query port (from "port" option, default: 27015)
    pub port: u16,
    /// Per-exchange receive timeout in ms (from "sockettimeout" option)
    pub socket_timeout_ms: u64,
    /// Whole-query timeout in ms (from "attempttimeout" option)
    pub attempt_timeout_ms: u64,
    /// Challenge byte order (from "byteorder" option: le/be)
    pub byte_order: ByteOrder,
    /// Send the dedicated challenge request (from "legacychallenge" option)
    pub legacy_challenge: bool,
    /// Expect the GoldSrc info reply (from "goldsrcinfo" option)
    pub goldsrc_info: bool,
    /// Lifetime of incomplete split responses in ms (from "fragmentttl" option)
    pub fragment_ttl_ms: u64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            port: 27015,
            socket_timeout_ms: 2000,
            attempt_timeout_ms: 10000,
            byte_order: ByteOrder::Little,
            legacy_challenge: false,
            goldsrc_info: false,
            fragment_ttl_ms: 10000,
        }
    }
}

impl QueryOptions {
    /// Load options from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&content))
    }

    /// Load `queryoptions.txt` from the working directory, falling back to defaults
    pub fn load_default() -> Self {
        match Self::load_from_file(DEFAULT_OPTIONS_FILE) {
            Ok(options) => options,
            Err(e) => {
                tracing::debug!("{}, using default options", e);
                Self::default()
            }
        }
    }

    /// Parse options file content
    pub fn parse(content: &str) -> Self {
        let mut options = Self::default();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key=value
            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim();

                options.parse_option(key, value);
            }
        }

        options
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key.to_ascii_lowercase().as_str() {
            "port" => {
                self.port = value.parse().unwrap_or(27015);
            }
            "sockettimeout" => {
                self.socket_timeout_ms = value.parse().unwrap_or(2000);
            }
            "attempttimeout" => {
                self.attempt_timeout_ms = value.parse().unwrap_or(10000);
            }
            "byteorder" => {
                self.byte_order = ByteOrder::parse(value).unwrap_or_default();
            }
            "legacychallenge" => {
                self.legacy_challenge = value.parse().unwrap_or(false);
            }
            "goldsrcinfo" => {
                self.goldsrc_info = value.parse().unwrap_or(false);
            }
            "fragmentttl" => {
                self.fragment_ttl_ms = value.parse().unwrap_or(10000);
            }
            _ => {
                tracing::debug!("Unknown query option: {} = {}", key, value);
            }
        }
    }

    /// Log the effective options
    pub fn display(&self) {
        tracing::debug!("Query options:");
        tracing::debug!("  Port: {}", self.port);
        tracing::debug!("  Socket timeout: {} ms", self.socket_timeout_ms);
        tracing::debug!("  Attempt timeout: {} ms", self.attempt_timeout_ms);
        tracing::debug!("  Byte order: {}", self.byte_order.as_str());
        tracing::debug!("  Legacy challenge: {}", self.legacy_challenge);
        tracing::debug!("  GoldSrc info: {}", self.goldsrc_info);
        tracing::debug!("  Fragment TTL: {} ms", self.fragment_ttl_ms);
    }
}
