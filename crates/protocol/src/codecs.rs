//! Sequential little-endian reader over a received payload
//!
//! Every query response is a flat run of little-endian integers, IEEE-754
//! floats and null-terminated strings. `PacketReader` walks one payload
//! front to back, fails on any read past the end, and supports skipping
//! backwards for the one parser that needs to un-read a peek.

use bytes::{Buf, Bytes};
use squery_core::{QueryError, Result};
use std::io::Cursor;

/// Cursor over a response payload
#[derive(Debug, Clone)]
pub struct PacketReader {
    cursor: Cursor<Bytes>,
}

impl PacketReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            cursor: Cursor::new(data.into()),
        }
    }

    /// Current offset from the start of the payload
    #[inline]
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    fn ensure(&self, len: usize, what: &str) -> Result<()> {
        if self.remaining() < len {
            return Err(QueryError::InvalidData(format!(
                "Not enough bytes for {} at offset {} ({} needed, {} left)",
                what,
                self.position(),
                len,
                self.remaining()
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1, "u8")?;
        Ok(self.cursor.get_u8())
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2, "u16")?;
        Ok(self.cursor.get_u16_le())
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4, "u32")?;
        Ok(self.cursor.get_u32_le())
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4, "i32")?;
        Ok(self.cursor.get_i32_le())
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8, "u64")?;
        Ok(self.cursor.get_u64_le())
    }

    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        self.ensure(4, "f32")?;
        Ok(self.cursor.get_f32_le())
    }

    /// Read a null-terminated string
    ///
    /// The terminator is consumed but not returned. Invalid UTF-8 is
    /// replaced rather than rejected, servers send whatever their locale
    /// produced.
    pub fn read_string(&mut self) -> Result<String> {
        let chunk = self.cursor.chunk();
        let len = chunk.iter().position(|&b| b == 0).ok_or_else(|| {
            QueryError::InvalidData(format!(
                "Unterminated string at offset {}",
                self.position()
            ))
        })?;

        let value = String::from_utf8_lossy(&chunk[..len]).into_owned();
        self.cursor.advance(len + 1);
        Ok(value)
    }

    /// Move the cursor by `offset` bytes, backwards when negative
    pub fn skip(&mut self, offset: isize) -> Result<()> {
        let target = self.position() as isize + offset;
        if target < 0 || target as usize > self.cursor.get_ref().len() {
            return Err(QueryError::InvalidData(format!(
                "Cannot skip {} bytes from offset {}",
                offset,
                self.position()
            )));
        }
        self.cursor.set_position(target as u64);
        Ok(())
    }

    /// Take everything that has not been read yet
    pub fn rest(&mut self) -> Bytes {
        let len = self.remaining();
        self.cursor.copy_to_bytes(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_reads() {
        let mut data = vec![0x07];
        data.extend_from_slice(&0x1234u16.to_le_bytes());
        data.extend_from_slice(&(-5i32).to_le_bytes());
        data.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&90_000_000_000u64.to_le_bytes());

        let mut reader = PacketReader::new(data);
        assert_eq!(reader.read_u8().unwrap(), 0x07);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_i32().unwrap(), -5);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_u64().unwrap(), 90_000_000_000);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_strings() {
        let mut reader = PacketReader::new(&b"de_dust2\0\0tail"[..]);
        assert_eq!(reader.read_string().unwrap(), "de_dust2");
        assert_eq!(reader.read_string().unwrap(), "");
        assert!(reader.read_string().is_err());
        assert_eq!(&reader.rest()[..], b"tail");
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut reader = PacketReader::new(vec![1, 2, 3]);
        assert!(reader.read_u32().is_err());
        // A failed read leaves the cursor untouched
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn test_back_skip() {
        let mut reader = PacketReader::new(vec![1, 2, 3, 4]);
        reader.skip(3).unwrap();
        reader.skip(-3).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert!(reader.skip(-2).is_err());
        assert!(reader.skip(4).is_err());
    }
}
