//! Compression layer for split responses
//!
//! Source servers may bzip2 the reassembled payload of a multi-packet
//! response. They never compress single packets, and nothing else is used.

use squery_core::{QueryError, Result};
use std::io::{Read, Write};

/// Upper bound for a decompressed response
pub const MAX_DECOMPRESSED_SIZE: usize = 4 * 1024 * 1024;

/// Decompress an assembled bzip2 payload of at most `limit` bytes
///
/// Output beyond `limit` is an error rather than being truncated.
pub fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let decoder = bzip2::read::BzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .take(limit as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| QueryError::InvalidCompressedPacket(e.to_string()))?;

    if decompressed.len() > limit {
        return Err(QueryError::InvalidCompressedPacket(format!(
            "Decompressed payload exceeds {} bytes",
            limit
        )));
    }
    Ok(decompressed)
}

/// Compress a payload the way a server would before splitting it
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bzip2_roundtrip() {
        let original = b"Hello, World! This is a test of the compression system.";

        let compressed = compress(original).unwrap();
        let decompressed = decompress(&compressed, original.len()).unwrap();

        assert_eq!(original, &decompressed[..]);
    }

    #[test]
    fn test_output_limit() {
        let original = vec![0u8; 64 * 1024];
        let compressed = compress(&original).unwrap();
        assert!(compressed.len() < 1024);

        let result = decompress(&compressed, 1024);
        assert!(matches!(result, Err(QueryError::InvalidCompressedPacket(_))));
        assert_eq!(decompress(&compressed, original.len()).unwrap().len(), original.len());
    }

    #[test]
    fn test_invalid_stream() {
        let result = decompress(b"definitely not bzip2", MAX_DECOMPRESSED_SIZE);
        assert!(matches!(result, Err(QueryError::InvalidCompressedPacket(_))));
    }
}
