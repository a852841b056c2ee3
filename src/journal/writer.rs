//! Chunked, LZ4-compressed journal writer.
//!
//! Records are buffered up to the chunk capacity, compressed with the LZ4
//! block format and written behind a 32-byte chunk header. On close, any
//! partial chunk is flushed, the index footer is written (when at least
//! one chunk exists) and the file header is re-patched with `HAS_INDEX`.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::sim::{DiskEventRecord, RECORD_SIZE};

use super::error::JournalError;
use super::format::{
    ChunkHeader, ChunkIndexEntry, FILE_HEADER_SIZE, FileHeader, HeaderFlags, IndexTail,
};

/// Append-only writer for one journal file.
pub struct JournalWriter {
    file: File,
    path: PathBuf,
    header: FileHeader,
    /// Packed record bytes of the chunk being built.
    buffer: Vec<u8>,
    first_ts_ns: u64,
    last_ts_ns: u64,
    /// Per-chunk index collected for the footer.
    index: Vec<ChunkIndexEntry>,
    /// Current end-of-file offset.
    offset: u64,
    records_written: u64,
    closed: bool,
}

impl JournalWriter {
    /// Create a journal file and write its header.
    ///
    /// An existing file at `path` is truncated. The header is written with
    /// an empty flag word; `close` patches it if an index is appended.
    pub fn create<P: AsRef<Path>>(path: P, header: FileHeader) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| JournalError::io(e, &path))?;

        let mut opening = header;
        opening.flags = HeaderFlags::empty();
        file.write_all(&opening.encode())
            .map_err(|e| JournalError::io(e, &path))?;

        let capacity = header.chunk_capacity.max(1) as usize * RECORD_SIZE;
        Ok(Self {
            file,
            path,
            header: opening,
            buffer: Vec::with_capacity(capacity),
            first_ts_ns: 0,
            last_ts_ns: 0,
            index: Vec::new(),
            offset: FILE_HEADER_SIZE as u64,
            records_written: 0,
            closed: false,
        })
    }

    /// Records appended so far (flushed or buffered).
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Chunks flushed so far.
    #[must_use]
    pub fn chunks_written(&self) -> usize {
        self.index.len()
    }

    /// Current file size in bytes (header plus flushed chunks).
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, flushing a chunk when the capacity fills.
    pub fn append(&mut self, record: &DiskEventRecord) -> Result<(), JournalError> {
        if self.closed {
            return Err(JournalError::AlreadyClosed);
        }
        if self.buffer.is_empty() {
            self.first_ts_ns = record.ts_ns;
        }
        self.last_ts_ns = record.ts_ns;
        self.buffer.extend_from_slice(&record.to_bytes());
        self.records_written += 1;

        let buffered = self.buffer.len() / RECORD_SIZE;
        if buffered >= self.header.chunk_capacity.max(1) as usize {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Flush the partial chunk, write the index footer and patch the
    /// header. Returns the final file size in bytes.
    ///
    /// A journal closed with zero records stays header-only: no chunks,
    /// no index, no flag.
    pub fn close(&mut self) -> Result<u64, JournalError> {
        if self.closed {
            return Err(JournalError::AlreadyClosed);
        }
        self.flush_chunk()?;

        if !self.index.is_empty() {
            let index_start_offset = self.offset;
            for entry in &self.index {
                self.file
                    .write_all(&entry.encode())
                    .map_err(|e| JournalError::io(e, &self.path))?;
            }
            let tail = IndexTail {
                chunk_count: self.index.len() as u32,
                index_start_offset,
            };
            self.file
                .write_all(&tail.encode())
                .map_err(|e| JournalError::io(e, &self.path))?;
            self.offset = index_start_offset
                + (self.index.len() * super::format::INDEX_ENTRY_SIZE) as u64
                + super::format::INDEX_TAIL_SIZE as u64;

            // Re-patch the header now that the index exists.
            self.header.flags |= HeaderFlags::HAS_INDEX;
            self.file
                .seek(SeekFrom::Start(0))
                .map_err(|e| JournalError::io(e, &self.path))?;
            self.file
                .write_all(&self.header.encode())
                .map_err(|e| JournalError::io(e, &self.path))?;
        }

        self.file
            .flush()
            .map_err(|e| JournalError::io(e, &self.path))?;
        self.closed = true;
        debug!(
            path = %self.path.display(),
            records = self.records_written,
            chunks = self.index.len(),
            bytes = self.offset,
            "journal closed"
        );
        Ok(self.offset)
    }

    fn flush_chunk(&mut self) -> Result<(), JournalError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let record_count = (self.buffer.len() / RECORD_SIZE) as u32;
        let compressed = lz4_flex::block::compress(&self.buffer);
        let chunk_header = ChunkHeader {
            uncompressed_size: self.buffer.len() as u32,
            compressed_size: compressed.len() as u32,
            record_count,
            chunk_flags: 0,
            first_ts_ns: self.first_ts_ns,
            last_ts_ns: self.last_ts_ns,
        };

        self.file
            .write_all(&chunk_header.encode())
            .map_err(|e| JournalError::io(e, &self.path))?;
        self.file
            .write_all(&compressed)
            .map_err(|e| JournalError::io(e, &self.path))?;

        self.index.push(ChunkIndexEntry {
            file_offset: self.offset,
            first_ts_ns: self.first_ts_ns,
            last_ts_ns: self.last_ts_ns,
            record_count,
        });
        self.offset += (super::format::CHUNK_HEADER_SIZE + compressed.len()) as u64;
        self.buffer.clear();
        Ok(())
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort; an unclosed journal is still readable by the
            // sequential-scan path up to the last flushed chunk.
            let _ = self.close();
        }
    }
}
