//! # Split Response Reassembly
//!
//! Responses larger than one datagram arrive as fragments sharing a
//! transaction id. Two header layouts exist:
//!
//! ```text
//! GoldSrc: {id u32}{(index << 4) | total}{data}
//! Source:  {id u32}{total}{index}[max size u16][decompressed size u32, crc32 u32]{data}
//! ```
//!
//! - The max size field is missing on a handful of 2006-era engines.
//! - Bit 31 of a Source transaction id marks a bzip2 payload; the size and
//!   checksum words only follow on fragment 0 of such a payload.
//!
//! Once every index `0..total` is present the data is concatenated in
//! index order, decompressed if flagged, and the redundant single-packet
//! header at its front is dropped.
//!
//! Transaction ids are only unique within one request, so the table is
//! cleared before each new request.

use bytes::{Bytes, BytesMut};
use squery_core::{QueryError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::codecs::PacketReader;
use crate::compression;

/// Transaction id bit flagging a bzip2-compressed payload
pub const COMPRESSED_FLAG: u32 = 0x8000_0000;

/// How long an incomplete transaction is kept before it is dropped
pub const DEFAULT_FRAGMENT_TTL: Duration = Duration::from_secs(10);

/// Split header layout detected for the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitFormat {
    /// Use the one-byte GoldSrc index/total header
    pub goldsrc: bool,
    /// The engine omits the max packet size field
    pub skip_size: bool,
}

/// Fragments received so far for one transaction
#[derive(Debug)]
struct PendingTransaction {
    total: u8,
    compressed: bool,
    /// Decompressed size announced by fragment 0, zero when unknown
    decompressed_size: u32,
    parts: BTreeMap<u8, Bytes>,
    first_seen: Instant,
}

/// Collects fragments until a transaction is complete
#[derive(Debug)]
pub struct FragmentAssembler {
    pending: HashMap<u32, PendingTransaction>,
    completed: HashSet<u32>,
    ttl: Duration,
}

impl FragmentAssembler {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            completed: HashSet::new(),
            ttl,
        }
    }

    /// Number of transactions still waiting for fragments
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Forget every transaction, pending or assembled
    pub fn clear(&mut self) {
        self.pending.clear();
        self.completed.clear();
    }

    /// Add one fragment
    ///
    /// # Arguments
    /// * `fragment` - Datagram body after the split header, starting at the transaction id
    /// * `format` - Split header layout for this session
    ///
    /// # Returns
    /// - `Ok(Some(payload))` - This fragment completed its transaction
    /// - `Ok(None)` - More fragments are needed, or the fragment was ignored
    pub fn push(&mut self, fragment: Bytes, format: SplitFormat) -> Result<Option<Bytes>> {
        self.evict_expired();

        let mut reader = PacketReader::new(fragment);
        let transaction = reader.read_u32()?;

        if self.completed.contains(&transaction) {
            debug!("Ignoring late fragment for assembled transaction 0x{:08x}", transaction);
            return Ok(None);
        }

        let compressed = !format.goldsrc && transaction & COMPRESSED_FLAG != 0;

        let mut decompressed_size = 0;
        let (index, total) = if format.goldsrc {
            let packed = reader.read_u8()?;
            ((packed & 0xF0) >> 4, packed & 0x0F)
        } else {
            let total = reader.read_u8()?;
            let index = reader.read_u8()?;
            if !format.skip_size {
                reader.skip(2)?;
            }
            if index == 0 && compressed {
                decompressed_size = reader.read_u32()?;
                // crc32
                reader.skip(4)?;
            }
            (index, total)
        };

        let declared = self.pending.get(&transaction).map_or(total, |p| p.total);
        if index >= declared {
            warn!(
                "Ignoring fragment {} of transaction 0x{:08x} declaring {} fragments",
                index, transaction, declared
            );
            return Ok(None);
        }

        let entry = self.pending.entry(transaction).or_insert_with(|| PendingTransaction {
            total,
            compressed,
            decompressed_size: 0,
            parts: BTreeMap::new(),
            first_seen: Instant::now(),
        });
        if index == 0 {
            entry.decompressed_size = decompressed_size;
        }
        entry.parts.insert(index, reader.rest());

        debug!(
            "Received partial packet uid: 0x{:08x} num: {} ({}/{})",
            transaction,
            index,
            entry.parts.len(),
            entry.total
        );

        if entry.parts.len() != entry.total as usize {
            return Ok(None);
        }

        match self.pending.remove(&transaction) {
            Some(pending) => {
                self.completed.insert(transaction);
                assemble(transaction, pending).map(Some)
            }
            None => Ok(None),
        }
    }

    fn evict_expired(&mut self) {
        let ttl = self.ttl;
        self.pending.retain(|transaction, pending| {
            let keep = pending.first_seen.elapsed() < ttl;
            if !keep {
                warn!(
                    "Dropping incomplete transaction 0x{:08x} ({}/{} fragments)",
                    transaction,
                    pending.parts.len(),
                    pending.total
                );
            }
            keep
        });
    }
}

impl Default for FragmentAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAGMENT_TTL)
    }
}

/// Join a complete transaction into the response payload
fn assemble(transaction: u32, pending: PendingTransaction) -> Result<Bytes> {
    let mut joined = BytesMut::new();
    for index in 0..pending.total {
        let part = pending
            .parts
            .get(&index)
            .ok_or(QueryError::MissingFragment { transaction, index })?;
        joined.extend_from_slice(part);
    }

    let assembled = if pending.compressed {
        debug!("BZIP DETECTED - Extracting packet...");
        let limit = match pending.decompressed_size as usize {
            0 => compression::MAX_DECOMPRESSED_SIZE,
            size => size.min(compression::MAX_DECOMPRESSED_SIZE),
        };
        Bytes::from(compression::decompress(&joined, limit)?)
    } else {
        joined.freeze()
    };

    let mut reader = PacketReader::new(assembled);
    reader.skip(4)?;
    Ok(reader.rest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    const MODERN: SplitFormat = SplitFormat { goldsrc: false, skip_size: false };

    fn response() -> Vec<u8> {
        let mut data = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x45];
        data.extend((0..200u8).map(|i| i.wrapping_mul(7)));
        data
    }

    fn modern_fragments(transaction: u32, payload: &[u8], chunk: usize) -> Vec<Bytes> {
        let parts: Vec<&[u8]> = payload.chunks(chunk).collect();
        parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let mut buf = BytesMut::new();
                buf.put_u32_le(transaction);
                buf.put_u8(parts.len() as u8);
                buf.put_u8(index as u8);
                buf.put_u16_le(1248);
                buf.put_slice(part);
                buf.freeze()
            })
            .collect()
    }

    #[test]
    fn test_reassembly_is_order_independent() {
        let payload = response();
        let fragments = modern_fragments(0x10, &payload, 45);
        assert_eq!(fragments.len(), 5);

        let orders: [[usize; 5]; 4] = [
            [0, 1, 2, 3, 4],
            [4, 3, 2, 1, 0],
            [2, 0, 4, 1, 3],
            [1, 4, 0, 3, 2],
        ];

        for order in orders {
            let mut assembler = FragmentAssembler::default();
            let mut result = None;
            for (n, &i) in order.iter().enumerate() {
                let out = assembler.push(fragments[i].clone(), MODERN).unwrap();
                if n + 1 < order.len() {
                    assert!(out.is_none(), "assembled early for order {:?}", order);
                } else {
                    result = out;
                }
            }
            assert_eq!(&result.unwrap()[..], &payload[4..], "order {:?}", order);
            assert_eq!(assembler.pending_count(), 0);
        }
    }

    #[test]
    fn test_duplicate_fragments_do_not_complete() {
        let payload = response();
        let fragments = modern_fragments(0x11, &payload, 103);
        let mut assembler = FragmentAssembler::default();

        assert!(assembler.push(fragments[0].clone(), MODERN).unwrap().is_none());
        assert!(assembler.push(fragments[0].clone(), MODERN).unwrap().is_none());
        assert!(assembler.push(fragments[1].clone(), MODERN).unwrap().is_some());
    }

    #[test]
    fn test_assembles_once_per_transaction() {
        let payload = response();
        let fragments = modern_fragments(0x12, &payload, 150);
        let mut assembler = FragmentAssembler::default();

        assert!(assembler.push(fragments[0].clone(), MODERN).unwrap().is_none());
        assert!(assembler.push(fragments[1].clone(), MODERN).unwrap().is_some());
        // A retransmitted fragment after completion is ignored
        assert!(assembler.push(fragments[1].clone(), MODERN).unwrap().is_none());
        assert!(assembler.push(fragments[0].clone(), MODERN).unwrap().is_none());
        assert_eq!(assembler.pending_count(), 0);
    }

    #[test]
    fn test_clear_allows_reused_transaction() {
        let payload = response();
        let fragments = modern_fragments(0x05, &payload, 150);
        let mut assembler = FragmentAssembler::default();

        assert!(assembler.push(fragments[0].clone(), MODERN).unwrap().is_none());
        assert!(assembler.push(fragments[1].clone(), MODERN).unwrap().is_some());

        // next request, the server starts numbering from 5 again
        assembler.clear();
        assert!(assembler.push(fragments[0].clone(), MODERN).unwrap().is_none());
        let assembled = assembler.push(fragments[1].clone(), MODERN).unwrap().unwrap();
        assert_eq!(&assembled[..], &payload[4..]);
    }

    #[test]
    fn test_missing_fragment() {
        let mut parts = BTreeMap::new();
        parts.insert(0u8, Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF]));
        parts.insert(2u8, Bytes::from_static(&[0x01]));
        let pending = PendingTransaction {
            total: 3,
            compressed: false,
            decompressed_size: 0,
            parts,
            first_seen: Instant::now(),
        };

        let err = assemble(0x99, pending).unwrap_err();
        assert!(matches!(
            err,
            QueryError::MissingFragment { transaction: 0x99, index: 1 }
        ));
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let mut assembler = FragmentAssembler::default();
        let mut buf = BytesMut::new();
        buf.put_u32_le(0x20);
        buf.put_u8(2); // total
        buf.put_u8(5); // index
        buf.put_u16_le(1248);
        buf.put_slice(b"data");

        assert!(assembler.push(buf.freeze(), MODERN).unwrap().is_none());
        assert_eq!(assembler.pending_count(), 0);
    }

    #[test]
    fn test_goldsrc_split_format() {
        let payload = response();
        let (first, second) = payload.split_at(90);
        let format = SplitFormat { goldsrc: true, skip_size: false };
        let transaction = 0x8000_0042u32; // bit 31 means nothing for GoldSrc

        let mut assembler = FragmentAssembler::default();
        let frag = |index: u8, data: &[u8]| {
            let mut buf = BytesMut::new();
            buf.put_u32_le(transaction);
            buf.put_u8((index << 4) | 2);
            buf.put_slice(data);
            buf.freeze()
        };
        let one = frag(1, second);
        let zero = frag(0, first);

        assert!(assembler.push(one, format).unwrap().is_none());
        let assembled = assembler.push(zero, format).unwrap().unwrap();
        assert_eq!(&assembled[..], &payload[4..]);
    }

    #[test]
    fn test_skip_size_format() {
        let payload = response();
        let format = SplitFormat { goldsrc: false, skip_size: true };
        let mut buf = BytesMut::new();
        buf.put_u32_le(0x30);
        buf.put_u8(1);
        buf.put_u8(0);
        buf.put_slice(&payload);

        let mut assembler = FragmentAssembler::default();
        let assembled = assembler.push(buf.freeze(), format).unwrap().unwrap();
        assert_eq!(&assembled[..], &payload[4..]);
    }

    #[test]
    fn test_compressed_transaction() {
        let payload = response();
        let compressed = compression::compress(&payload).unwrap();
        let transaction = COMPRESSED_FLAG | 0x77;
        let (first, second) = compressed.split_at(compressed.len() / 2);

        let mut zero = BytesMut::new();
        zero.put_u32_le(transaction);
        zero.put_u8(2);
        zero.put_u8(0);
        zero.put_u16_le(1248);
        zero.put_u32_le(payload.len() as u32);
        zero.put_u32_le(0xCAFE_BABE);
        zero.put_slice(first);

        let mut one = BytesMut::new();
        one.put_u32_le(transaction);
        one.put_u8(2);
        one.put_u8(1);
        one.put_u16_le(1248);
        one.put_slice(second);

        let mut assembler = FragmentAssembler::default();
        assert!(assembler.push(one.freeze(), MODERN).unwrap().is_none());
        let assembled = assembler.push(zero.freeze(), MODERN).unwrap().unwrap();
        assert_eq!(&assembled[..], &payload[4..]);
    }

    #[test]
    fn test_compressed_size_is_enforced() {
        let payload = response();
        let compressed = compression::compress(&payload).unwrap();

        let mut buf = BytesMut::new();
        buf.put_u32_le(COMPRESSED_FLAG | 0x78);
        buf.put_u8(1);
        buf.put_u8(0);
        buf.put_u16_le(1248);
        // announces less than the stream expands to
        buf.put_u32_le(16);
        buf.put_u32_le(0);
        buf.put_slice(&compressed);

        let mut assembler = FragmentAssembler::default();
        let err = assembler.push(buf.freeze(), MODERN).unwrap_err();
        assert!(matches!(err, QueryError::InvalidCompressedPacket(_)));
    }

    #[test]
    fn test_corrupt_compressed_transaction() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(COMPRESSED_FLAG | 1);
        buf.put_u8(1);
        buf.put_u8(0);
        buf.put_u16_le(1248);
        buf.put_u64_le(0);
        buf.put_slice(b"not a bzip2 stream");

        let mut assembler = FragmentAssembler::default();
        let err = assembler.push(buf.freeze(), MODERN).unwrap_err();
        assert!(matches!(err, QueryError::InvalidCompressedPacket(_)));
        assert_eq!(assembler.pending_count(), 0);
    }

    #[test]
    fn test_stale_transactions_are_evicted() {
        let payload = response();
        let fragments = modern_fragments(0x40, &payload, 103);
        let mut assembler = FragmentAssembler::new(Duration::ZERO);

        assert!(assembler.push(fragments[0].clone(), MODERN).unwrap().is_none());
        assert_eq!(assembler.pending_count(), 1);
        // Fragment 0 expired before fragment 1 arrived
        assert!(assembler.push(fragments[1].clone(), MODERN).unwrap().is_none());
        assert_eq!(assembler.pending_count(), 1);
    }
}
