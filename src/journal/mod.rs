//! Chunked, LZ4-compressed, self-describing binary journal.

mod error;
mod format;
mod reader;
mod writer;

pub use error::JournalError;
pub use format::{
    CHUNK_HEADER_SIZE, ChunkHeader, ChunkIndexEntry, DEFAULT_CHUNK_CAPACITY, FILE_HEADER_SIZE,
    FILE_MAGIC, FileHeader, HeaderFlags, INDEX_ENTRY_SIZE, INDEX_MAGIC, INDEX_TAIL_SIZE,
    IndexTail, VERSION_MAJOR, VERSION_MINOR,
};
pub use reader::{JournalReader, RecordIter};
pub use writer::JournalWriter;
