//! Prelude module that re-exports commonly used types and traits.
//!
//! Instead of importing each type individually, you can use:
//!
//! ```rust
//! use qrsdp::prelude::*;
//! ```

// Simulation core
pub use crate::sim::{
    Book, BookFeatures, BookLevel, BookSeed, BookState, CurveEstimator, DEFAULT_MARKET_OPEN_NS,
    DiskEventRecord, EventFlags, EventRecord, EventSide, EventType, HlrParams, Intensities,
    IntensityCurve, IntensityModel, NANOS_PER_SEC, Producer, RECORD_SIZE, SessionResult,
    SimRng, SimpleImbalanceParams, TailRule, TradingSession,
};

// Journal format and access
pub use crate::journal::{
    ChunkHeader, ChunkIndexEntry, FileHeader, HeaderFlags, JournalError, JournalReader,
    JournalWriter, RecordIter,
};

// Sinks
pub use crate::sink::{
    BrokerConfig, BrokerSink, EventSink, JournalSink, MultiplexSink, SinkError, VecSink,
};

// Wire-protocol feed handling
pub use crate::feed::{
    FeedConfig, FeedConsumer, FeedDestination, FeedError, ItchEncoder, MoldFramer,
    UdpFeedSender, encode_system_event,
};

// Run orchestration
pub use crate::run::{
    DayResult, Manifest, RunConfig, RunError, RunReport, SecurityConfig, SessionEntry,
    SessionRunner,
};
