//! Journal reader: indexed random access with a sequential-scan fallback.
//!
//! A reader first validates the file header. When `HAS_INDEX` is set it
//! loads the footer for O(1) chunk access and timestamp binary search;
//! otherwise it scans chunk headers until end-of-file. Truncated files
//! (interrupted writers) read cleanly up to the last complete chunk.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::sim::DiskEventRecord;

use super::error::JournalError;
use super::format::{
    CHUNK_HEADER_SIZE, ChunkHeader, ChunkIndexEntry, FILE_HEADER_SIZE, FileHeader, HeaderFlags,
    INDEX_ENTRY_SIZE, INDEX_TAIL_SIZE, IndexTail,
};

/// Reader for one journal file.
pub struct JournalReader {
    file: File,
    path: PathBuf,
    header: FileHeader,
    /// Loaded index entries when the file carries a footer.
    index: Option<Vec<ChunkIndexEntry>>,
    /// Offset at which chunk data ends (index start, or EOF when
    /// unindexed).
    data_end: u64,
}

impl JournalReader {
    /// Open a journal and validate its header (and footer, if flagged).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| JournalError::io(e, &path))?;
        let file_len = file
            .metadata()
            .map_err(|e| JournalError::io(e, &path))?
            .len();

        let mut header_buf = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut header_buf)
            .map_err(|e| JournalError::io(e, &path))?;
        let header = FileHeader::decode(&header_buf)?;

        let (index, data_end) = if header.flags.contains(HeaderFlags::HAS_INDEX)
            && file_len >= (FILE_HEADER_SIZE + INDEX_TAIL_SIZE) as u64
        {
            file.seek(SeekFrom::End(-(INDEX_TAIL_SIZE as i64)))
                .map_err(|e| JournalError::io(e, &path))?;
            let mut tail_buf = [0u8; INDEX_TAIL_SIZE];
            file.read_exact(&mut tail_buf)
                .map_err(|e| JournalError::io(e, &path))?;
            let tail = IndexTail::decode(&tail_buf)?;

            file.seek(SeekFrom::Start(tail.index_start_offset))
                .map_err(|e| JournalError::io(e, &path))?;
            let mut entries = Vec::with_capacity(tail.chunk_count as usize);
            let mut entry_buf = [0u8; INDEX_ENTRY_SIZE];
            for _ in 0..tail.chunk_count {
                file.read_exact(&mut entry_buf)
                    .map_err(|e| JournalError::io(e, &path))?;
                entries.push(ChunkIndexEntry::decode(&entry_buf));
            }
            debug!(path = %path.display(), chunks = entries.len(), "journal index loaded");
            (Some(entries), tail.index_start_offset)
        } else {
            (None, file_len)
        };

        Ok(Self {
            file,
            path,
            header,
            index,
            data_end,
        })
    }

    /// The validated file header.
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The index entries, when the file carries a footer.
    #[must_use]
    pub fn chunk_index(&self) -> Option<&[ChunkIndexEntry]> {
        self.index.as_deref()
    }

    /// Decode every record in stream order.
    ///
    /// Chunk boundaries carry no meaning; the result is the single logical
    /// record stream. A truncated tail (incomplete chunk header or short
    /// payload) ends the scan cleanly; a corrupt payload is a hard error.
    pub fn read_all(&mut self) -> Result<Vec<DiskEventRecord>, JournalError> {
        let mut records = Vec::new();
        let mut offset = FILE_HEADER_SIZE as u64;
        while let Some((chunk, payload)) = self.read_chunk_at(offset)? {
            decode_records(&chunk, &payload, offset, &mut records)?;
            offset += (CHUNK_HEADER_SIZE + payload.len()) as u64;
        }
        Ok(records)
    }

    /// Decode one chunk by index position (requires a footer).
    pub fn read_chunk(&mut self, chunk_idx: usize) -> Result<Vec<DiskEventRecord>, JournalError> {
        let Some(entry) = self.index.as_ref().and_then(|ix| ix.get(chunk_idx)).copied() else {
            return Ok(Vec::new());
        };
        let mut records = Vec::with_capacity(entry.record_count as usize);
        if let Some((chunk, payload)) = self.read_chunk_at(entry.file_offset)? {
            decode_records(&chunk, &payload, entry.file_offset, &mut records)?;
        }
        Ok(records)
    }

    /// Binary-search the index for the chunk covering `ts_ns`.
    ///
    /// Returns the position of the first chunk whose `last_ts_ns` is not
    /// below `ts_ns`, provided its `first_ts_ns` does not exceed `ts_ns`;
    /// `None` when unindexed or out of range.
    #[must_use]
    pub fn find_chunk_for_ts(&self, ts_ns: u64) -> Option<usize> {
        let index = self.index.as_ref()?;
        let pos = index.partition_point(|entry| entry.last_ts_ns < ts_ns);
        let entry = index.get(pos)?;
        (entry.first_ts_ns <= ts_ns).then_some(pos)
    }

    /// Decode all records with `from_ts ≤ ts_ns ≤ to_ts`.
    ///
    /// With an index, only the covering chunks are touched; without one,
    /// this falls back to a full scan plus filter.
    pub fn read_range(
        &mut self,
        from_ts: u64,
        to_ts: u64,
    ) -> Result<Vec<DiskEventRecord>, JournalError> {
        let in_range = |r: &DiskEventRecord| r.ts_ns >= from_ts && r.ts_ns <= to_ts;
        let Some(index) = self.index.clone() else {
            return Ok(self.read_all()?.into_iter().filter(in_range).collect());
        };

        let first = index.partition_point(|entry| entry.last_ts_ns < from_ts);
        let mut records = Vec::new();
        for (chunk_idx, entry) in index.iter().enumerate().skip(first) {
            if entry.first_ts_ns > to_ts {
                break;
            }
            records.extend(self.read_chunk(chunk_idx)?.into_iter().filter(in_range));
        }
        Ok(records)
    }

    /// Stream records without materialising the whole journal.
    ///
    /// Decompresses one chunk at a time; the iterator yields records in
    /// stream order and surfaces decode failures as items, stopping after
    /// the first error. A truncated tail simply ends the stream.
    #[must_use]
    pub fn records(&mut self) -> RecordIter<'_> {
        RecordIter {
            reader: self,
            offset: FILE_HEADER_SIZE as u64,
            buffered: Vec::new().into_iter(),
            failed: false,
        }
    }

    /// Read the chunk header and compressed payload at `offset`.
    ///
    /// Returns `Ok(None)` at the end of chunk data or on a truncated tail.
    fn read_chunk_at(
        &mut self,
        offset: u64,
    ) -> Result<Option<(ChunkHeader, Vec<u8>)>, JournalError> {
        if offset + CHUNK_HEADER_SIZE as u64 > self.data_end {
            return Ok(None);
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| JournalError::io(e, &self.path))?;

        let mut header_buf = [0u8; CHUNK_HEADER_SIZE];
        self.file
            .read_exact(&mut header_buf)
            .map_err(|e| JournalError::io(e, &self.path))?;
        let chunk = ChunkHeader::decode(&header_buf);

        let payload_end = offset + CHUNK_HEADER_SIZE as u64 + u64::from(chunk.compressed_size);
        if payload_end > self.data_end {
            // Interrupted writer: stop at the last complete chunk.
            debug!(offset, "truncated chunk payload; stopping scan");
            return Ok(None);
        }

        let mut payload = vec![0u8; chunk.compressed_size as usize];
        self.file
            .read_exact(&mut payload)
            .map_err(|e| JournalError::io(e, &self.path))?;
        Ok(Some((chunk, payload)))
    }
}

/// A chunk-at-a-time iterator over a journal's records.
///
/// Created by [`JournalReader::records`]. Holds one decompressed chunk
/// in memory at a time, so arbitrarily large journals stream in bounded
/// space.
pub struct RecordIter<'a> {
    reader: &'a mut JournalReader,
    /// Offset of the next chunk header to read.
    offset: u64,
    /// Records of the chunk currently being drained.
    buffered: std::vec::IntoIter<DiskEventRecord>,
    /// Set after yielding an error; the stream ends there.
    failed: bool,
}

impl Iterator for RecordIter<'_> {
    type Item = Result<DiskEventRecord, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(record) = self.buffered.next() {
                return Some(Ok(record));
            }
            // Current chunk drained: pull the next one.
            let (chunk, payload) = match self.reader.read_chunk_at(self.offset) {
                Ok(Some(next)) => next,
                Ok(None) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            let mut records = Vec::with_capacity(chunk.record_count as usize);
            if let Err(e) = decode_records(&chunk, &payload, self.offset, &mut records) {
                self.failed = true;
                return Some(Err(e));
            }
            self.offset += (CHUNK_HEADER_SIZE + payload.len()) as u64;
            self.buffered = records.into_iter();
        }
    }
}

/// Decompress a chunk payload and append its records.
fn decode_records(
    chunk: &ChunkHeader,
    payload: &[u8],
    offset: u64,
    out: &mut Vec<DiskEventRecord>,
) -> Result<(), JournalError> {
    let raw = lz4_flex::block::decompress(payload, chunk.uncompressed_size as usize).map_err(
        |e| JournalError::Decompression {
            offset,
            message: e.to_string(),
        },
    )?;

    let expected = chunk.record_count as usize * crate::sim::RECORD_SIZE;
    if raw.len() != expected {
        return Err(JournalError::SizeMismatch {
            offset,
            expected,
            actual: raw.len(),
        });
    }

    let mut record_buf = [0u8; crate::sim::RECORD_SIZE];
    for packed in raw.chunks_exact(crate::sim::RECORD_SIZE) {
        record_buf.copy_from_slice(packed);
        out.push(DiskEventRecord::decode(&record_buf));
    }
    Ok(())
}
