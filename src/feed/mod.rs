//! The wire-protocol feed handler: ITCH encoding, MoldUDP64 framing, UDP
//! output, and the bus consumer loop that drives them.

mod consumer;
mod itch;
mod mold;
mod udp;

use std::fmt;

pub use consumer::{DayTracker, DayTransition, FeedConfig, FeedConsumer};
pub use itch::{
    ADD_ORDER_SIZE, EVENT_END_OF_MARKET, EVENT_END_OF_MESSAGES, EVENT_START_OF_MARKET,
    EVENT_START_OF_MESSAGES, ItchEncoder, ORDER_DELETE_SIZE, ORDER_EXECUTED_SIZE,
    STOCK_DIRECTORY_SIZE, SYSTEM_EVENT_SIZE, encode_system_event, pad_symbol,
};
pub use mold::{MOLD_HEADER_SIZE, MOLD_PAYLOAD_BUDGET, MoldFramer};
pub use udp::{FeedDestination, UdpFeedSender};

/// Errors surfaced by the feed handler.
#[derive(Debug)]
#[non_exhaustive]
pub enum FeedError {
    /// The bus could not be reached or the subscription failed.
    Bus {
        /// Human-readable description of the failure.
        message: String,
    },

    /// The UDP socket could not be opened or configured.
    Socket {
        /// Human-readable description of the failure.
        message: String,
    },
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Bus { message } => write!(f, "feed bus error: {message}"),
            FeedError::Socket { message } => write!(f, "feed socket error: {message}"),
        }
    }
}

impl std::error::Error for FeedError {}
