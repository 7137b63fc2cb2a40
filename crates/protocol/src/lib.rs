//! # SQuery Protocol Library
//!
//! This library implements the Source/GoldSrc server query wire format and
//! the binary mod list DayZ embeds in its rules.
//!
//! ## Architecture
//!
//! ### 1. Codecs Layer ([`codecs`])
//! `PacketReader`, a bounds-checked little-endian cursor over a payload:
//! integers, floats, null-terminated strings, skips in both directions.
//!
//! ### 2. Packets ([`packets`], [`packet_builder`])
//! Command and response codes, datagram classification by header
//! (`-1` single, `-2` split) and request construction with the challenge
//! placed where each command expects it.
//!
//! ### 3. Split Responses ([`fragments`], [`compression`])
//! Reassembly of multi-datagram responses in both the GoldSrc and the
//! Source header layouts, with bzip2 decompression when flagged.
//!
//! ### 4. DayZ ([`dayz`])
//! Decoder for the byte-stuffed mod list carried in DayZ rules.
//!
//! ## Usage Example
//!
//! ```rust
//! use squery_protocol::{build_request, Command, INFO_PROBE};
//! use squery_core::ByteOrder;
//!
//! let request = build_request(Command::Info, None, Some(INFO_PROBE), ByteOrder::Little);
//! assert_eq!(&request[..5], &[0xFF, 0xFF, 0xFF, 0xFF, 0x54]);
//! ```

pub mod codecs;
pub mod compression;
pub mod dayz;
pub mod fragments;
pub mod packet_builder;
pub mod packets;

// Re-export commonly used items
pub use codecs::PacketReader;
pub use dayz::{decode_mods, filter_mods, ModEntry, BUILTIN_DLC_TITLE};
pub use fragments::{FragmentAssembler, SplitFormat, DEFAULT_FRAGMENT_TTL};
pub use packet_builder::{build_request, NO_CHALLENGE};
pub use packets::*;
