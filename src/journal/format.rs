//! The bit-exact journal file format.
//!
//! A journal is a 64-byte file header followed by zero or more chunks,
//! each a 32-byte chunk header and an LZ4-block-compressed payload of
//! packed 26-byte records. Files closed with at least one chunk carry an
//! index footer: one 32-byte entry per chunk and a 16-byte tail.
//!
//! ```text
//! ┌──────────────┬────────────────┬─────────┬───┬───────────────┬───────┐
//! │ FileHeader   │ ChunkHeader[0] │ LZ4[0]  │ … │ IndexEntry[·] │ Tail  │
//! │ 64 B         │ 32 B           │ var     │   │ 32 B each     │ 16 B  │
//! └──────────────┴────────────────┴─────────┴───┴───────────────┴───────┘
//! ```
//!
//! All integers are little-endian.

use crate::sim::RECORD_SIZE;

use super::error::JournalError;

/// Magic bytes at offset 0 of every journal file.
pub const FILE_MAGIC: [u8; 8] = *b"QRSDPLOG";

/// Magic bytes inside the 16-byte index tail.
pub const INDEX_MAGIC: [u8; 4] = *b"QIDX";

/// Size of the file header in bytes.
pub const FILE_HEADER_SIZE: usize = 64;

/// Size of a chunk header in bytes.
pub const CHUNK_HEADER_SIZE: usize = 32;

/// Size of one index entry in bytes.
pub const INDEX_ENTRY_SIZE: usize = 32;

/// Size of the index tail in bytes.
pub const INDEX_TAIL_SIZE: usize = 16;

/// Major format version written by this build.
pub const VERSION_MAJOR: u16 = 1;

/// Minor format version written by this build.
pub const VERSION_MINOR: u16 = 0;

/// Default records per chunk.
pub const DEFAULT_CHUNK_CAPACITY: u32 = 4096;

bitflags::bitflags! {
    /// File header flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderFlags: u32 {
        /// An index footer is present at the end of the file.
        const HAS_INDEX = 1 << 0;
    }
}

/// The 64-byte journal file header.
///
/// Session metadata is embedded so a journal is self-describing: a reader
/// can replay it against a book with the exact geometry that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Major format version.
    pub version_major: u16,
    /// Minor format version.
    pub version_minor: u16,
    /// Bytes per packed record (26 for this format generation).
    pub record_size: u32,
    /// Session RNG seed.
    pub seed: u64,
    /// Opening mid price in ticks.
    pub p0_ticks: i32,
    /// Price of one tick.
    pub tick_size: u32,
    /// Session length in seconds.
    pub session_seconds: u32,
    /// Levels per side of the producing book.
    pub levels_per_side: u32,
    /// Opening spread in ticks.
    pub initial_spread_ticks: u32,
    /// Seeded depth per level.
    pub initial_depth: u32,
    /// Records per chunk.
    pub chunk_capacity: u32,
    /// Header flag word.
    pub flags: HeaderFlags,
}

impl FileHeader {
    /// Header for a fresh journal with the current format version.
    #[must_use]
    pub fn new(
        seed: u64,
        p0_ticks: i32,
        tick_size: u32,
        session_seconds: u32,
        levels_per_side: u32,
        initial_spread_ticks: u32,
        initial_depth: u32,
        chunk_capacity: u32,
    ) -> Self {
        Self {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            record_size: RECORD_SIZE as u32,
            seed,
            p0_ticks,
            tick_size,
            session_seconds,
            levels_per_side,
            initial_spread_ticks,
            initial_depth,
            chunk_capacity,
            flags: HeaderFlags::empty(),
        }
    }

    /// Pack into the 64-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[0..8].copy_from_slice(&FILE_MAGIC);
        buf[8..10].copy_from_slice(&self.version_major.to_le_bytes());
        buf[10..12].copy_from_slice(&self.version_minor.to_le_bytes());
        buf[12..16].copy_from_slice(&self.record_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.seed.to_le_bytes());
        buf[24..28].copy_from_slice(&self.p0_ticks.to_le_bytes());
        buf[28..32].copy_from_slice(&self.tick_size.to_le_bytes());
        buf[32..36].copy_from_slice(&self.session_seconds.to_le_bytes());
        buf[36..40].copy_from_slice(&self.levels_per_side.to_le_bytes());
        buf[40..44].copy_from_slice(&self.initial_spread_ticks.to_le_bytes());
        buf[44..48].copy_from_slice(&self.initial_depth.to_le_bytes());
        buf[48..52].copy_from_slice(&self.chunk_capacity.to_le_bytes());
        buf[52..56].copy_from_slice(&self.flags.bits().to_le_bytes());
        // buf[56..64] reserved, zero.
        buf
    }

    /// Unpack and validate the 64-byte wire form.
    pub fn decode(buf: &[u8; FILE_HEADER_SIZE]) -> Result<Self, JournalError> {
        if buf[0..8] != FILE_MAGIC {
            let mut found = [0u8; 8];
            found.copy_from_slice(&buf[0..8]);
            return Err(JournalError::BadMagic { found });
        }
        let version_major = u16::from_le_bytes([buf[8], buf[9]]);
        if version_major > VERSION_MAJOR {
            return Err(JournalError::UnsupportedVersion {
                major: version_major,
            });
        }
        let record_size = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        if record_size == 0 {
            return Err(JournalError::BadRecordSize { record_size });
        }
        Ok(Self {
            version_major,
            version_minor: u16::from_le_bytes([buf[10], buf[11]]),
            record_size,
            seed: u64::from_le_bytes([
                buf[16], buf[17], buf[18], buf[19], buf[20], buf[21], buf[22], buf[23],
            ]),
            p0_ticks: i32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]),
            tick_size: u32::from_le_bytes([buf[28], buf[29], buf[30], buf[31]]),
            session_seconds: u32::from_le_bytes([buf[32], buf[33], buf[34], buf[35]]),
            levels_per_side: u32::from_le_bytes([buf[36], buf[37], buf[38], buf[39]]),
            initial_spread_ticks: u32::from_le_bytes([buf[40], buf[41], buf[42], buf[43]]),
            initial_depth: u32::from_le_bytes([buf[44], buf[45], buf[46], buf[47]]),
            chunk_capacity: u32::from_le_bytes([buf[48], buf[49], buf[50], buf[51]]),
            flags: HeaderFlags::from_bits_truncate(u32::from_le_bytes([
                buf[52], buf[53], buf[54], buf[55],
            ])),
        })
    }
}

/// The 32-byte header preceding every compressed chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Payload size before compression; always `record_count × record_size`.
    pub uncompressed_size: u32,
    /// Payload size on disk.
    pub compressed_size: u32,
    /// Records in this chunk.
    pub record_count: u32,
    /// Reserved; written as zero.
    pub chunk_flags: u32,
    /// Timestamp of the first record in the chunk.
    pub first_ts_ns: u64,
    /// Timestamp of the last record in the chunk.
    pub last_ts_ns: u64,
}

impl ChunkHeader {
    /// Pack into the 32-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut buf = [0u8; CHUNK_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.compressed_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.record_count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.chunk_flags.to_le_bytes());
        buf[16..24].copy_from_slice(&self.first_ts_ns.to_le_bytes());
        buf[24..32].copy_from_slice(&self.last_ts_ns.to_le_bytes());
        buf
    }

    /// Unpack the 32-byte wire form.
    #[must_use]
    pub fn decode(buf: &[u8; CHUNK_HEADER_SIZE]) -> Self {
        Self {
            uncompressed_size: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            compressed_size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            record_count: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            chunk_flags: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            first_ts_ns: u64::from_le_bytes([
                buf[16], buf[17], buf[18], buf[19], buf[20], buf[21], buf[22], buf[23],
            ]),
            last_ts_ns: u64::from_le_bytes([
                buf[24], buf[25], buf[26], buf[27], buf[28], buf[29], buf[30], buf[31],
            ]),
        }
    }
}

/// One 32-byte entry of the optional index footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkIndexEntry {
    /// File offset of the chunk's header.
    pub file_offset: u64,
    /// Timestamp of the first record in the chunk.
    pub first_ts_ns: u64,
    /// Timestamp of the last record in the chunk.
    pub last_ts_ns: u64,
    /// Records in the chunk.
    pub record_count: u32,
}

impl ChunkIndexEntry {
    /// Pack into the 32-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.file_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.first_ts_ns.to_le_bytes());
        buf[16..24].copy_from_slice(&self.last_ts_ns.to_le_bytes());
        buf[24..28].copy_from_slice(&self.record_count.to_le_bytes());
        // buf[28..32] reserved, zero.
        buf
    }

    /// Unpack the 32-byte wire form.
    #[must_use]
    pub fn decode(buf: &[u8; INDEX_ENTRY_SIZE]) -> Self {
        Self {
            file_offset: u64::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
            ]),
            first_ts_ns: u64::from_le_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
            last_ts_ns: u64::from_le_bytes([
                buf[16], buf[17], buf[18], buf[19], buf[20], buf[21], buf[22], buf[23],
            ]),
            record_count: u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]),
        }
    }
}

/// The 16-byte tail closing an index footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexTail {
    /// Number of index entries.
    pub chunk_count: u32,
    /// File offset of the first index entry.
    pub index_start_offset: u64,
}

impl IndexTail {
    /// Pack into the 16-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; INDEX_TAIL_SIZE] {
        let mut buf = [0u8; INDEX_TAIL_SIZE];
        buf[0..4].copy_from_slice(&self.chunk_count.to_le_bytes());
        buf[4..8].copy_from_slice(&INDEX_MAGIC);
        buf[8..16].copy_from_slice(&self.index_start_offset.to_le_bytes());
        buf
    }

    /// Unpack and validate the 16-byte wire form.
    pub fn decode(buf: &[u8; INDEX_TAIL_SIZE]) -> Result<Self, JournalError> {
        if buf[4..8] != INDEX_MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(&buf[4..8]);
            return Err(JournalError::BadIndexMagic { found });
        }
        Ok(Self {
            chunk_count: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            index_start_offset: u64::from_le_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
        })
    }
}
