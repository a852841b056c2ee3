//! ITCH 5.0-style message encoder.
//!
//! All multi-byte integers are big-endian; timestamps are 6-byte
//! big-endian nanoseconds-since-midnight (the lower 48 bits); stock
//! symbols are 8 bytes, right-padded with ASCII spaces. Message sizes are
//! normative:
//!
//! | type | message          | bytes |
//! |------|------------------|-------|
//! | `S`  | System Event     | 12    |
//! | `R`  | Stock Directory  | 39    |
//! | `A`  | Add Order        | 36    |
//! | `D`  | Order Delete     | 19    |
//! | `E`  | Order Executed   | 31    |

use bytes::BufMut;

use crate::sim::{DiskEventRecord, EventType};

/// System Event message size.
pub const SYSTEM_EVENT_SIZE: usize = 12;
/// Stock Directory message size.
pub const STOCK_DIRECTORY_SIZE: usize = 39;
/// Add Order (no MPID) message size.
pub const ADD_ORDER_SIZE: usize = 36;
/// Order Delete message size.
pub const ORDER_DELETE_SIZE: usize = 19;
/// Order Executed message size.
pub const ORDER_EXECUTED_SIZE: usize = 31;

/// System event code: start of messages.
pub const EVENT_START_OF_MESSAGES: u8 = b'O';
/// System event code: start of market hours.
pub const EVENT_START_OF_MARKET: u8 = b'Q';
/// System event code: end of market hours.
pub const EVENT_END_OF_MARKET: u8 = b'M';
/// System event code: end of messages.
pub const EVENT_END_OF_MESSAGES: u8 = b'E';

/// Mask selecting the 48 timestamp bits that fit the wire field.
const TS_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// Append the 6-byte big-endian truncated timestamp.
fn put_ts48(buf: &mut Vec<u8>, ts_ns: u64) {
    buf.put_uint(ts_ns & TS_MASK, 6);
}

/// Right-pad a symbol into the fixed 8-byte stock field.
#[must_use]
pub fn pad_symbol(symbol: &str) -> [u8; 8] {
    let mut field = [b' '; 8];
    for (dst, src) in field.iter_mut().zip(symbol.bytes()) {
        *dst = src;
    }
    field
}

/// Encode a System Event message (not tied to any one symbol).
#[must_use]
pub fn encode_system_event(ts_ns: u64, event_code: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SYSTEM_EVENT_SIZE);
    buf.put_u8(b'S');
    buf.put_u16(0); // stock locate
    buf.put_u16(0); // tracking number
    put_ts48(&mut buf, ts_ns);
    buf.put_u8(event_code);
    buf
}

/// Per-symbol stateful encoder.
///
/// Keeps the stock locate assigned on first sight, the padded symbol
/// field, the tick-size multiplier for wire prices, and the monotone
/// match number attached to executions.
#[derive(Debug, Clone)]
pub struct ItchEncoder {
    stock_locate: u16,
    symbol_field: [u8; 8],
    tick_size: u32,
    next_match: u64,
}

impl ItchEncoder {
    /// Build an encoder for one symbol.
    #[must_use]
    pub fn new(symbol: &str, stock_locate: u16, tick_size: u32) -> Self {
        Self {
            stock_locate,
            symbol_field: pad_symbol(symbol),
            tick_size,
            next_match: 0,
        }
    }

    /// The locate id assigned to this symbol.
    #[must_use]
    pub fn stock_locate(&self) -> u16 {
        self.stock_locate
    }

    /// Wire price for a tick price.
    #[must_use]
    fn wire_price(&self, price_ticks: i32) -> u32 {
        (i64::from(price_ticks) * i64::from(self.tick_size)).clamp(0, i64::from(u32::MAX)) as u32
    }

    /// Encode a Stock Directory message announcing this symbol.
    #[must_use]
    pub fn stock_directory(&self, ts_ns: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(STOCK_DIRECTORY_SIZE);
        buf.put_u8(b'R');
        buf.put_u16(self.stock_locate);
        buf.put_u16(0); // tracking number
        put_ts48(&mut buf, ts_ns);
        buf.put_slice(&self.symbol_field);
        buf.put_u8(b'Q'); // market category
        buf.put_u8(b'N'); // financial status
        buf.put_u32(100); // round lot size
        buf.put_u8(b'N'); // round lots only
        buf.put_u8(b'C'); // issue classification
        buf.put_slice(b"Z "); // issue subtype
        buf.put_u8(b'P'); // authenticity
        buf.put_u8(b' '); // short sale threshold
        buf.put_u8(b' '); // IPO flag
        buf.put_u8(b' '); // LULD tier
        buf.put_u8(b'N'); // ETP flag
        buf.put_u32(0); // ETP leverage factor
        buf.put_u8(b'N'); // inverse indicator
        buf
    }

    /// Encode one event record; `None` for unknown discriminants.
    ///
    /// Adds become `A`, cancels become full deletes `D`, executions
    /// become `E` with the next match number.
    #[must_use]
    pub fn encode(&mut self, record: &DiskEventRecord) -> Option<Vec<u8>> {
        match record.event_type()? {
            EventType::AddBid => Some(self.add_order(record, b'B')),
            EventType::AddAsk => Some(self.add_order(record, b'S')),
            EventType::CancelBid | EventType::CancelAsk => Some(self.order_delete(record)),
            EventType::ExecuteBuy | EventType::ExecuteSell => Some(self.order_executed(record)),
        }
    }

    fn add_order(&self, record: &DiskEventRecord, buy_sell: u8) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ADD_ORDER_SIZE);
        buf.put_u8(b'A');
        buf.put_u16(self.stock_locate);
        buf.put_u16(0);
        put_ts48(&mut buf, record.ts_ns);
        buf.put_u64(record.order_id);
        buf.put_u8(buy_sell);
        buf.put_u32(record.qty);
        buf.put_slice(&self.symbol_field);
        buf.put_u32(self.wire_price(record.price_ticks));
        buf
    }

    fn order_delete(&self, record: &DiskEventRecord) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ORDER_DELETE_SIZE);
        buf.put_u8(b'D');
        buf.put_u16(self.stock_locate);
        buf.put_u16(0);
        put_ts48(&mut buf, record.ts_ns);
        buf.put_u64(record.order_id);
        buf
    }

    fn order_executed(&mut self, record: &DiskEventRecord) -> Vec<u8> {
        self.next_match += 1;
        let mut buf = Vec::with_capacity(ORDER_EXECUTED_SIZE);
        buf.put_u8(b'E');
        buf.put_u16(self.stock_locate);
        buf.put_u16(0);
        put_ts48(&mut buf, record.ts_ns);
        buf.put_u64(record.order_id);
        buf.put_u32(record.qty);
        buf.put_u64(self.next_match);
        buf
    }
}
