//! Run orchestration: configuration, calendar, manifest, and the
//! per-security session runner.

mod calendar;
mod config;
mod manifest;
mod runner;

use std::fmt;
use std::path::PathBuf;

use crate::journal::JournalError;
use crate::sink::SinkError;

pub use calendar::{business_day_on_or_after, is_business_day, next_business_day};
pub use config::{RunConfig, SEED_STRIDE, SecurityConfig};
pub use manifest::{
    DayPerformance, Manifest, PerformanceReport, SecuritySessions, SessionEntry,
};
pub use runner::{DayResult, RunReport, SessionRunner};

/// Errors that abort a run or one security's worker.
#[derive(Debug)]
#[non_exhaustive]
pub enum RunError {
    /// The configuration cannot be honoured.
    InvalidConfig {
        /// What is wrong with it.
        message: String,
    },

    /// Filesystem trouble outside the journal itself.
    Io {
        /// The underlying I/O error message.
        message: String,
        /// The path involved, if known.
        path: Option<PathBuf>,
    },

    /// The primary journal failed.
    Journal(JournalError),

    /// The primary sink failed mid-session.
    Sink(SinkError),

    /// A run artefact could not be serialised.
    Serialize {
        /// The underlying serialisation error message.
        message: String,
    },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::InvalidConfig { message } => write!(f, "invalid run config: {message}"),
            RunError::Io { message, path } => match path {
                Some(p) => write!(f, "run I/O error on {}: {message}", p.display()),
                None => write!(f, "run I/O error: {message}"),
            },
            RunError::Journal(err) => write!(f, "run journal error: {err}"),
            RunError::Sink(err) => write!(f, "run sink error: {err}"),
            RunError::Serialize { message } => write!(f, "run artefact error: {message}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<JournalError> for RunError {
    fn from(err: JournalError) -> Self {
        RunError::Journal(err)
    }
}

impl From<SinkError> for RunError {
    fn from(err: SinkError) -> Self {
        RunError::Sink(err)
    }
}
