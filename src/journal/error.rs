//! Error types for the journal subsystem.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while writing or reading a journal file.
#[derive(Debug)]
#[non_exhaustive]
pub enum JournalError {
    /// An I/O error occurred while reading or writing the file.
    Io {
        /// The underlying I/O error message.
        message: String,
        /// The file path involved, if known.
        path: Option<PathBuf>,
    },

    /// The file does not start with the journal magic.
    BadMagic {
        /// The eight bytes found where the magic was expected.
        found: [u8; 8],
    },

    /// The file's major version is not supported by this reader.
    UnsupportedVersion {
        /// The major version found in the header.
        major: u16,
    },

    /// The header's record size is zero or disagrees with this build.
    BadRecordSize {
        /// The record size found in the header.
        record_size: u32,
    },

    /// A chunk payload failed LZ4 decompression.
    Decompression {
        /// File offset of the chunk header.
        offset: u64,
        /// The underlying decoder error message.
        message: String,
    },

    /// A decompressed chunk's size disagrees with its record count.
    SizeMismatch {
        /// File offset of the chunk header.
        offset: u64,
        /// `record_count × record_size` from the chunk header.
        expected: usize,
        /// Actual decompressed byte count.
        actual: usize,
    },

    /// The index tail does not carry the index magic.
    BadIndexMagic {
        /// The four bytes found where the index magic was expected.
        found: [u8; 4],
    },

    /// The writer was used after `close`.
    AlreadyClosed,
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalError::Io { message, path } => match path {
                Some(p) => write!(f, "journal I/O error on {}: {message}", p.display()),
                None => write!(f, "journal I/O error: {message}"),
            },
            JournalError::BadMagic { found } => {
                write!(f, "bad journal magic: {found:02x?}")
            }
            JournalError::UnsupportedVersion { major } => {
                write!(f, "unsupported journal major version {major}")
            }
            JournalError::BadRecordSize { record_size } => {
                write!(f, "bad journal record size {record_size}")
            }
            JournalError::Decompression { offset, message } => {
                write!(f, "chunk at offset {offset} failed to decompress: {message}")
            }
            JournalError::SizeMismatch {
                offset,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "chunk at offset {offset} decompressed to {actual} bytes, expected {expected}"
                )
            }
            JournalError::BadIndexMagic { found } => {
                write!(f, "bad index magic: {found:02x?}")
            }
            JournalError::AlreadyClosed => write!(f, "journal writer already closed"),
        }
    }
}

impl std::error::Error for JournalError {}

impl JournalError {
    /// Wrap an I/O error with the offending path.
    pub(crate) fn io(err: std::io::Error, path: &std::path::Path) -> Self {
        JournalError::Io {
            message: err.to_string(),
            path: Some(path.to_path_buf()),
        }
    }
}
