//! # SQuery Networking Layer
//!
//! Tokio-based UDP client for the Source/GoldSrc server query protocol.
//!
//! ## Modules
//!
//! - [`config`] - Query configuration options
//! - [`transport`] - Datagram transport and its UDP implementation
//! - [`exchange`] - Request/response exchange with challenge renewal
//! - [`session`] - Phase sequencing for one query
//! - [`state`] - Session state and query results
//! - [`tags`] - DayZ tag parsing

pub mod config;
pub mod exchange;
pub mod session;
pub mod state;
pub mod tags;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use config::{QueryConfig, DEFAULT_PORT};
pub use exchange::{Exchange, Exchanger, CHALLENGE_RETRY_LIMIT};
pub use session::{query_server, QuerySession};
pub use state::{GoldSrcMod, Player, RawState, ServerInfo, SessionState};
pub use tags::DayzTags;
pub use transport::{Transport, UdpTransport};
