//! Order-flow event types and the packed on-disk record codec.
//!
//! Two record shapes exist. [`EventRecord`] is the in-memory form produced
//! by the simulation loop and consumed by sinks; it carries a [`EventFlags`]
//! word describing what the event did to the book. [`DiskEventRecord`] is
//! the 26-byte packed little-endian form written to journals and published
//! on the bus; it drops the flags word.
//!
//! # On-Disk Record Format (26 bytes, little-endian)
//!
//! ```text
//! [8 bytes: ts_ns][1 byte: type][1 byte: side]
//! [4 bytes: price_ticks (i32)][4 bytes: qty][8 bytes: order_id]
//! ```

use serde::{Deserialize, Serialize};

/// Size of a packed [`DiskEventRecord`] in bytes.
pub const RECORD_SIZE: usize = 26;

/// The six order-flow event kinds, in canonical sampling order.
///
/// The discriminants are the wire encoding and must not be reordered:
/// every categorical draw walks the rates in this order, and journals and
/// bus payloads store the raw discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventType {
    /// Liquidity added to a bid level.
    AddBid = 0,
    /// Liquidity added to an ask level.
    AddAsk = 1,
    /// Liquidity removed from a bid level without a trade.
    CancelBid = 2,
    /// Liquidity removed from an ask level without a trade.
    CancelAsk = 3,
    /// A marketable buy consuming the best ask.
    ExecuteBuy = 4,
    /// A marketable sell consuming the best bid.
    ExecuteSell = 5,
}

impl EventType {
    /// All event kinds in canonical order.
    pub const ALL: [EventType; 6] = [
        EventType::AddBid,
        EventType::AddAsk,
        EventType::CancelBid,
        EventType::CancelAsk,
        EventType::ExecuteBuy,
        EventType::ExecuteSell,
    ];

    /// Decode a wire discriminant. Returns `None` for unknown values.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EventType::AddBid),
            1 => Some(EventType::AddAsk),
            2 => Some(EventType::CancelBid),
            3 => Some(EventType::CancelAsk),
            4 => Some(EventType::ExecuteBuy),
            5 => Some(EventType::ExecuteSell),
            _ => None,
        }
    }

    /// True for the two marketable kinds.
    #[must_use]
    #[inline]
    pub fn is_execution(self) -> bool {
        matches!(self, EventType::ExecuteBuy | EventType::ExecuteSell)
    }

    /// True for the two passive add kinds.
    #[must_use]
    #[inline]
    pub fn is_add(self) -> bool {
        matches!(self, EventType::AddBid | EventType::AddAsk)
    }
}

/// Which side of the book an event touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventSide {
    /// The bid (buy) side.
    Bid = 0,
    /// The ask (sell) side.
    Ask = 1,
    /// Not side-specific (reserved; no core event uses it today).
    Na = 2,
}

impl EventSide {
    /// Decode a wire discriminant. Returns `None` for unknown values.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EventSide::Bid),
            1 => Some(EventSide::Ask),
            2 => Some(EventSide::Na),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Per-event effect flags carried in memory but not persisted.
    ///
    /// Sinks that need them must capture them before the record is packed;
    /// the 26-byte disk form has no flags field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct EventFlags: u32 {
        /// The best ask was depleted and the ask ladder shifted up.
        const ASK_SHIFTED = 1 << 0;
        /// The best bid was depleted and the bid ladder shifted down.
        const BID_SHIFTED = 1 << 1;
        /// The book's depths were resampled after this event.
        const BOOK_REINIT = 1 << 2;
    }
}

/// An order-flow event as produced by the simulation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    /// Nanoseconds since the session epoch (market-open offset included).
    pub ts_ns: u64,
    /// The event kind.
    pub kind: EventType,
    /// The side of the book the event touches.
    pub side: EventSide,
    /// Price in integer ticks.
    pub price_ticks: i32,
    /// Quantity in units (always 1 for the unit-size flow model).
    pub qty: u32,
    /// Monotonically increasing per-producer order identifier.
    pub order_id: u64,
    /// Effect flags (shifts, reinitialisation).
    pub flags: EventFlags,
}

/// The 26-byte packed form written to journals and published on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskEventRecord {
    /// Nanoseconds since the session epoch.
    pub ts_ns: u64,
    /// Raw event kind discriminant.
    pub kind: u8,
    /// Raw side discriminant.
    pub side: u8,
    /// Price in integer ticks.
    pub price_ticks: i32,
    /// Quantity in units.
    pub qty: u32,
    /// Per-producer order identifier.
    pub order_id: u64,
}

impl DiskEventRecord {
    /// Pack into a caller-provided 26-byte buffer.
    pub fn encode_into(&self, buf: &mut [u8; RECORD_SIZE]) {
        buf[0..8].copy_from_slice(&self.ts_ns.to_le_bytes());
        buf[8] = self.kind;
        buf[9] = self.side;
        buf[10..14].copy_from_slice(&self.price_ticks.to_le_bytes());
        buf[14..18].copy_from_slice(&self.qty.to_le_bytes());
        buf[18..26].copy_from_slice(&self.order_id.to_le_bytes());
    }

    /// Pack into a fresh 26-byte array.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Unpack from a 26-byte buffer.
    #[must_use]
    pub fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        Self {
            ts_ns: u64::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
            ]),
            kind: buf[8],
            side: buf[9],
            price_ticks: i32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]),
            qty: u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]),
            order_id: u64::from_le_bytes([
                buf[18], buf[19], buf[20], buf[21], buf[22], buf[23], buf[24], buf[25],
            ]),
        }
    }

    /// Decode the kind back into its enum form, if recognised.
    #[must_use]
    pub fn event_type(&self) -> Option<EventType> {
        EventType::from_u8(self.kind)
    }

    /// Reconstruct an in-memory record with empty flags.
    ///
    /// Returns `None` if the kind or side discriminant is unknown.
    #[must_use]
    pub fn to_event(&self) -> Option<EventRecord> {
        Some(EventRecord {
            ts_ns: self.ts_ns,
            kind: EventType::from_u8(self.kind)?,
            side: EventSide::from_u8(self.side)?,
            price_ticks: self.price_ticks,
            qty: self.qty,
            order_id: self.order_id,
            flags: EventFlags::empty(),
        })
    }
}

impl From<&EventRecord> for DiskEventRecord {
    fn from(event: &EventRecord) -> Self {
        Self {
            ts_ns: event.ts_ns,
            kind: event.kind as u8,
            side: event.side as u8,
            price_ticks: event.price_ticks,
            qty: event.qty,
            order_id: event.order_id,
        }
    }
}
