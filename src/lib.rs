//! # QRSDP — Deterministic Synthetic Exchange Event Producer
//!
//! A seeded limit-order-book simulator that emits a time-ordered stream of
//! order-flow events (adds, cancels, executions), persists it to a
//! chunked, LZ4-compressed binary journal, and optionally fans it out to a
//! NATS JetStream topic from which a separate feed handler re-encodes it
//! as ITCH-style messages in MoldUDP64 packets over UDP.
//!
//! ## Architecture
//!
//! ```text
//!          SessionRunner
//!               │
//!    ┌──────────┴──────────┐     (one thread per security)
//!    ▼                     ▼
//! Producer(A)  ...   Producer(Z)
//!    │                     │
//!    ▼                     ▼
//! Book · Intensity · Sampler · RNG
//!    │
//!    ▼
//!  MultiplexSink ────► JournalSink (per-day file)
//!         │
//!         └───► BrokerSink ──► JetStream topic
//!                                     │
//!                                     ▼
//!                          FeedConsumer (separate process)
//!                          ItchEncoder + MoldFramer + UdpFeedSender
//! ```
//!
//! ## Determinism
//!
//! Given an identical [`sim::TradingSession`] (seed included), the
//! produced record stream is byte-identical across runs. Every producer
//! owns one RNG handle; the draw order per event step is fixed and part
//! of the contract. Per-security streams are statistically independent by
//! seed derivation: `seed(security, day) = base + security · STRIDE + day`.
//!
//! ## Key pieces
//!
//! - [`sim`] — the market engine: [`sim::Book`] (top-K level arrays with
//!   shift-on-depletion), [`sim::IntensityModel`] (scalar imbalance or
//!   queue-reactive curves), [`sim::Producer`] (the competing-risk event
//!   loop), and a [`sim::CurveEstimator`] calibration scaffold.
//! - [`journal`] — the self-describing binary journal:
//!   [`journal::JournalWriter`] / [`journal::JournalReader`], 64-byte
//!   header, LZ4-block chunks, optional index footer for O(1) seeks.
//! - [`sink`] — [`sink::EventSink`] implementations: the journal (source
//!   of truth), the best-effort NATS publisher, and the fault-isolating
//!   multiplexer.
//! - [`feed`] — the wire side: [`feed::ItchEncoder`],
//!   [`feed::MoldFramer`], [`feed::UdpFeedSender`] and the
//!   [`feed::FeedConsumer`] bus loop.
//! - [`run`] — [`run::SessionRunner`]: per-security threads, multi-day
//!   close-to-open chaining, manifest and performance artefacts, graceful
//!   signal shutdown.
//!
//! ## Example
//!
//! ```rust,no_run
//! use qrsdp::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = TradingSession {
//!     seed: 42,
//!     p0_ticks: 10_000,
//!     session_seconds: 30,
//!     levels_per_side: 5,
//!     tick_size: 100,
//!     initial_spread_ticks: 2,
//!     initial_depth: 50,
//!     intensity: IntensityModel::Simple(SimpleImbalanceParams::default()),
//!     level_alpha: 0.7,
//!     spread_improve_coeff: 0.0,
//!     reinit_probability: 0.0,
//!     reinit_depth_mean: 0.0,
//!     market_open_ns: DEFAULT_MARKET_OPEN_NS,
//! };
//! let mut sink = JournalSink::for_session("day0.qrsdp", &session, 4096)?;
//! let mut producer = Producer::new(session);
//! let result = producer.run_session(&mut sink)?;
//! sink.close()?;
//! println!("{} events, close {}", result.events_written, result.close_ticks);
//! # Ok(())
//! # }
//! ```

pub mod feed;
pub mod journal;
pub mod prelude;
pub mod run;
pub mod sim;
pub mod sink;

pub use feed::{FeedConsumer, FeedError, ItchEncoder, MoldFramer, UdpFeedSender};
pub use journal::{JournalError, JournalReader, JournalWriter};
pub use run::{RunConfig, RunError, SessionRunner};
pub use sim::{
    Book, DiskEventRecord, EventRecord, IntensityModel, Producer, SessionResult, TradingSession,
};
pub use sink::{BrokerSink, EventSink, JournalSink, MultiplexSink, SinkError};
