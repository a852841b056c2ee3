//! Event sinks: where produced records go.
//!
//! A producer writes through exactly one [`EventSink`]. The journal sink
//! is the primary source of truth; the broker sink is best-effort fanout;
//! the multiplex sink composes them. Sinks are exclusively owned by the
//! producer that writes to them.

mod broker;
mod journal;
mod multiplex;

use std::fmt;

use crate::journal::JournalError;
use crate::sim::EventRecord;

pub use broker::{BrokerConfig, BrokerSink};
pub use journal::JournalSink;
pub use multiplex::MultiplexSink;

/// Errors surfaced by sinks.
///
/// Only primary-sink errors ever reach the producer; best-effort sinks
/// log and count their failures internally.
#[derive(Debug)]
#[non_exhaustive]
pub enum SinkError {
    /// The underlying journal failed.
    Journal(JournalError),

    /// The broker client could not be constructed or torn down.
    Broker {
        /// Human-readable description of the failure.
        message: String,
    },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Journal(err) => write!(f, "journal sink error: {err}"),
            SinkError::Broker { message } => write!(f, "broker sink error: {message}"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<JournalError> for SinkError {
    fn from(err: JournalError) -> Self {
        SinkError::Journal(err)
    }
}

/// A destination for produced event records.
///
/// `append` is called once per emitted record, in stream order, from the
/// producer's thread. `close` flushes and releases resources; a sink must
/// tolerate `close` being its last call with records still buffered.
pub trait EventSink: Send {
    /// Accept one record.
    fn append(&mut self, event: &EventRecord) -> Result<(), SinkError>;

    /// Flush buffered state and release resources.
    fn close(&mut self) -> Result<(), SinkError>;
}

/// An in-memory sink collecting records, for tests and replay tooling.
#[derive(Debug, Default)]
pub struct VecSink {
    records: Vec<EventRecord>,
}

impl VecSink {
    /// An empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected records in arrival order.
    #[must_use]
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// The collected records as packed 26-byte disk bytes.
    #[must_use]
    pub fn packed_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.records.len() * crate::sim::RECORD_SIZE);
        for record in &self.records {
            out.extend_from_slice(&crate::sim::DiskEventRecord::from(record).to_bytes());
        }
        out
    }
}

impl EventSink for VecSink {
    fn append(&mut self, event: &EventRecord) -> Result<(), SinkError> {
        self.records.push(*event);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
