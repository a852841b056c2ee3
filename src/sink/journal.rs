//! The primary sink: a chunked compressed journal file.

use std::path::Path;

use crate::journal::{FileHeader, JournalError, JournalWriter};
use crate::sim::{DiskEventRecord, EventRecord, TradingSession};

use super::{EventSink, SinkError};

/// Writes records to one per-day journal file.
///
/// This is the source of truth for a session: any failure here propagates
/// to the producer and terminates the day.
pub struct JournalSink {
    writer: JournalWriter,
    /// Final file size, available after `close`.
    file_size: Option<u64>,
}

impl JournalSink {
    /// Create a journal file at `path` described by `header`.
    pub fn create<P: AsRef<Path>>(path: P, header: FileHeader) -> Result<Self, JournalError> {
        Ok(Self {
            writer: JournalWriter::create(path, header)?,
            file_size: None,
        })
    }

    /// Create a journal whose header mirrors a session's parameters.
    pub fn for_session<P: AsRef<Path>>(
        path: P,
        session: &TradingSession,
        chunk_capacity: u32,
    ) -> Result<Self, JournalError> {
        let header = FileHeader::new(
            session.seed,
            session.p0_ticks,
            session.tick_size,
            session.session_seconds,
            session.levels_per_side as u32,
            session.initial_spread_ticks.max(0) as u32,
            session.initial_depth,
            chunk_capacity,
        );
        Self::create(path, header)
    }

    /// Records appended so far.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.writer.records_written()
    }

    /// Final file size in bytes; `None` before `close`.
    #[must_use]
    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }
}

impl EventSink for JournalSink {
    fn append(&mut self, event: &EventRecord) -> Result<(), SinkError> {
        let disk = DiskEventRecord::from(event);
        self.writer.append(&disk)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let size = self.writer.close()?;
        self.file_size = Some(size);
        Ok(())
    }
}
