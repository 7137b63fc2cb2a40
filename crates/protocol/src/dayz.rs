//! # DayZ Mod List Decoder
//!
//! DayZ smuggles its installed mods through the rules response as binary
//! chunks. The chunk bytes use a byte-stuffing scheme so that no raw zero
//! appears inside a null-terminated rule value:
//!
//! ```text
//! 01 01 -> 01
//! 01 02 -> 00
//! 01 03 -> FF
//! 01 xx -> 00 (unknown escape)
//! xx    -> xx
//! ```
//!
//! ## Layout (after unescaping)
//!
//! ```text
//! {version}{overflow}{dlc1}{dlc2}
//! {count} count x [{hash u32}[{flag} on all but the last]{id u32}{title}]
//! {count} count x [{title}]
//! ```
//!
//! Titles are a one-byte length followed by UTF-8 bytes.

use serde::{Deserialize, Serialize};
use squery_core::Result;
use tracing::debug;

use crate::codecs::PacketReader;

/// Title of the DayZ DLC map that shows up in the mod list of every server
pub const BUILTIN_DLC_TITLE: &str = "Livonia DLC";

/// One entry of the decoded mod list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModEntry {
    /// Steam Workshop id, absent for entries of the second section
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub title: String,
}

impl ModEntry {
    /// Whether this entry is a real workshop mod
    pub fn is_workshop_mod(&self) -> bool {
        self.id.is_some() && self.title != BUILTIN_DLC_TITLE
    }
}

/// Read one byte-stuffed byte
pub fn read_escaped_byte(reader: &mut PacketReader) -> Result<u8> {
    let byte = reader.read_u8()?;
    if byte != 1 {
        return Ok(byte);
    }

    Ok(match reader.read_u8()? {
        1 => 1,
        2 => 0,
        3 => 0xFF,
        _ => 0,
    })
}

/// Read `len` byte-stuffed bytes as a little-endian unsigned integer
pub fn read_escaped_uint(reader: &mut PacketReader, len: usize) -> Result<u64> {
    let mut value = 0u64;
    for shift in 0..len.min(8) {
        value |= (read_escaped_byte(reader)? as u64) << (shift * 8);
    }
    Ok(value)
}

/// Read a length-prefixed, byte-stuffed string
pub fn read_escaped_string(reader: &mut PacketReader) -> Result<String> {
    let len = read_escaped_byte(reader)?;
    let mut bytes = Vec::with_capacity(len as usize);
    for _ in 0..len {
        bytes.push(read_escaped_byte(reader)?);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode the mod list captured from the rules response
///
/// An empty capture (no binary chunks were present) yields an empty list.
pub fn decode_mods(data: &[u8]) -> Result<Vec<ModEntry>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    debug!("DAYZ BUFFER: {:02X?}", data);

    let mut reader = PacketReader::new(data.to_vec());
    let version = read_escaped_byte(&mut reader)?;
    let overflow = read_escaped_byte(&mut reader)?;
    let dlc1 = read_escaped_byte(&mut reader)?;
    let dlc2 = read_escaped_byte(&mut reader)?;
    debug!(version, overflow, dlc1, dlc2, "DayZ mod payload header");

    let mut mods = read_section(&mut reader, true)?;
    mods.extend(read_section(&mut reader, false)?);
    Ok(mods)
}

fn read_section(reader: &mut PacketReader, with_header: bool) -> Result<Vec<ModEntry>> {
    let count = read_escaped_byte(reader)?;
    let mut out = Vec::with_capacity(count as usize);

    for i in 0..count {
        let mut id = None;
        if with_header {
            let _hash = read_escaped_uint(reader, 4)?;
            // Present on every entry but the last one, meaning unknown
            if i != count - 1 {
                let _flag = read_escaped_byte(reader)?;
            }
            id = Some(read_escaped_uint(reader, 4)? as u32);
        }
        let title = read_escaped_string(reader)?;
        out.push(ModEntry { id, title });
    }

    Ok(out)
}

/// Keep only workshop mods, preserving order
pub fn filter_mods(mods: Vec<ModEntry>) -> Vec<ModEntry> {
    mods.into_iter().filter(ModEntry::is_workshop_mod).collect()
}
