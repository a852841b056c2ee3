//! Run manifest and performance documents.
//!
//! The manifest is the run's table of contents: which journal file holds
//! which (security, date, seed). Single-security runs emit the flat
//! format `1.0`; multi-security runs nest sessions per security under
//! format `1.1`.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::RunError;

/// One session (one day of one security) in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntry {
    /// Trading date.
    pub date: NaiveDate,
    /// The session's derived seed.
    pub seed: u64,
    /// Journal filename, relative to the run directory.
    pub file: String,
}

/// Per-security session list for the nested format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySessions {
    /// Ticker symbol.
    pub symbol: String,
    /// Sessions in day order.
    pub sessions: Vec<SessionEntry>,
}

/// The run manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// `"1.0"` for the flat single-security form, `"1.1"` for the nested
    /// multi-security form.
    pub format_version: String,
    /// Unique run identifier.
    pub run_id: String,
    /// Producing system identifier.
    pub producer: String,
    /// The run's base seed.
    pub base_seed: u64,
    /// Seed derivation strategy.
    pub seed_strategy: String,
    /// Session length in simulated seconds.
    pub session_seconds: u32,
    /// Flat session list (format `1.0` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<SessionEntry>>,
    /// Nested per-security lists (format `1.1` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub securities: Option<Vec<SecuritySessions>>,
}

impl Manifest {
    /// Flat manifest for a single-security run.
    #[must_use]
    pub fn single(
        run_id: String,
        base_seed: u64,
        session_seconds: u32,
        sessions: Vec<SessionEntry>,
    ) -> Self {
        Self {
            format_version: "1.0".to_string(),
            run_id,
            producer: "qrsdp".to_string(),
            base_seed,
            seed_strategy: "sequential".to_string(),
            session_seconds,
            sessions: Some(sessions),
            securities: None,
        }
    }

    /// Nested manifest for a multi-security run.
    #[must_use]
    pub fn multi(
        run_id: String,
        base_seed: u64,
        session_seconds: u32,
        securities: Vec<SecuritySessions>,
    ) -> Self {
        Self {
            format_version: "1.1".to_string(),
            run_id,
            producer: "qrsdp".to_string(),
            base_seed,
            seed_strategy: "sequential".to_string(),
            session_seconds,
            sessions: None,
            securities: Some(securities),
        }
    }

    /// Serialise to pretty JSON at `path`.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), RunError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| RunError::Serialize {
            message: e.to_string(),
        })?;
        fs::write(path.as_ref(), json).map_err(|e| RunError::Io {
            message: e.to_string(),
            path: Some(path.as_ref().to_path_buf()),
        })
    }
}

/// Per-day throughput figures for the optional performance document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPerformance {
    /// Ticker symbol.
    pub symbol: String,
    /// Trading date.
    pub date: NaiveDate,
    /// Records written.
    pub events_written: u64,
    /// Final journal size in bytes.
    pub file_size: u64,
    /// Wall seconds spent producing and writing.
    pub write_seconds: f64,
    /// Wall seconds spent on the sequential read-back, when measured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_seconds: Option<f64>,
}

/// The performance document: one entry per completed day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// The run this report belongs to.
    pub run_id: String,
    /// Per-day figures in completion order per security.
    pub days: Vec<DayPerformance>,
}

impl PerformanceReport {
    /// Serialise to pretty JSON at `path`.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), RunError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| RunError::Serialize {
            message: e.to_string(),
        })?;
        fs::write(path.as_ref(), json).map_err(|e| RunError::Io {
            message: e.to_string(),
            path: Some(path.as_ref().to_path_buf()),
        })
    }
}
