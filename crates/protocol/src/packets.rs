//! Query command codes, response codes and datagram classification
//!
//! Every datagram starts with a signed 32-bit little-endian header:
//! `-1` carries a complete response, `-2` carries one fragment of a
//! multi-packet response and is followed by the transaction id.

use bytes::Bytes;
use squery_core::{QueryError, Result};

/// Header of a complete, single-datagram packet
pub const HEADER_SINGLE: i32 = -1;

/// Header of one fragment of a split response
pub const HEADER_SPLIT: i32 = -2;

/// Payload sent with the info request
pub const INFO_PROBE: &[u8] = b"Source Engine Query\0";

/// Request commands (client to server)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// A2S_INFO
    Info = 0x54,
    /// A2S_PLAYER
    Players = 0x55,
    /// A2S_RULES
    Rules = 0x56,
    /// A2S_SERVERQUERY_GETCHALLENGE (legacy)
    Challenge = 0x57,
}

impl Command {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Player and rules requests carry the challenge right after the command
    #[inline]
    pub fn challenge_first(self) -> bool {
        matches!(self, Self::Players | Self::Rules)
    }
}

/// Response codes (server to client)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    /// S2C_CHALLENGE
    Challenge = 0x41,
    /// A2S_PLAYER reply
    Players = 0x44,
    /// A2S_RULES reply
    Rules = 0x45,
    /// A2S_INFO reply
    Info = 0x49,
    /// GoldSrc A2S_INFO reply
    GoldSrcInfo = 0x6D,
}

impl ResponseCode {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x41 => Some(Self::Challenge),
            0x44 => Some(Self::Players),
            0x45 => Some(Self::Rules),
            0x49 => Some(Self::Info),
            0x6D => Some(Self::GoldSrcInfo),
            _ => None,
        }
    }
}

/// A received datagram after header inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    /// Complete response, header stripped
    Single(Bytes),
    /// Split fragment, starting at the transaction id
    Fragment(Bytes),
}

/// Classify a datagram by its leading header
pub fn classify(datagram: Bytes) -> Result<Datagram> {
    if datagram.len() < 4 {
        return Err(QueryError::Protocol(format!(
            "Datagram too short for header ({} bytes)",
            datagram.len()
        )));
    }

    let header = i32::from_le_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
    let body = datagram.slice(4..);

    match header {
        HEADER_SINGLE => Ok(Datagram::Single(body)),
        HEADER_SPLIT => Ok(Datagram::Fragment(body)),
        other => Err(QueryError::Protocol(format!(
            "Unknown packet header: 0x{:08x}",
            other as u32
        ))),
    }
}
