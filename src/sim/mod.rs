//! The synthetic market engine: book, intensity models, samplers, and the
//! event production loop.

mod attrs;
mod book;
mod calibrate;
mod curves;
mod events;
mod intensity;
mod producer;
mod sampler;
mod session;

pub use attrs::{AttributeSampler, EventAttrs};
pub use book::{ApplyOutcome, Book, BookFeatures, BookLevel, BookSeed, BookState};
pub use calibrate::CurveEstimator;
pub use curves::{CurveError, HlrParams, IntensityCurve, TailRule};
pub use events::{
    DiskEventRecord, EventFlags, EventRecord, EventSide, EventType, RECORD_SIZE,
};
pub use intensity::{INTENSITY_FLOOR, Intensities, IntensityModel, SimpleImbalanceParams};
pub use producer::{Producer, SessionResult};
pub use sampler::{
    DEAD_SESSION_DT, SimRng, sample_delta_t, sample_event_type, sample_index_from_weights,
};
pub use session::{DEFAULT_MARKET_OPEN_NS, NANOS_PER_SEC, TradingSession};
