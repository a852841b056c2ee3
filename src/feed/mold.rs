//! MoldUDP64 session framing.
//!
//! Messages are packed into datagrams under a 20-byte header:
//!
//! ```text
//! ┌──────────────┬──────────────────┬───────────────┬──────────────────┐
//! │ session[10]  │ sequence_number  │ message_count │ blocks…          │
//! │ space-padded │ u64 BE           │ u16 BE        │ (len u16 BE,     │
//! │              │                  │               │  payload[len])   │
//! └──────────────┴──────────────────┴───────────────┴──────────────────┘
//! ```
//!
//! The sequence number is the sequence of the first message in the packet
//! and advances by the packet's message count on emit.

use bytes::BufMut;

/// Size of the packet header in bytes.
pub const MOLD_HEADER_SIZE: usize = 20;

/// Per-packet payload budget, leaving room for IP/UDP headers in a
/// 1500-byte MTU.
pub const MOLD_PAYLOAD_BUDGET: usize = 1400;

/// Packs ITCH messages into MoldUDP64 packets and emits them through a
/// caller-supplied send callback.
#[derive(Debug, Clone)]
pub struct MoldFramer {
    session: [u8; 10],
    sequence: u64,
    /// Concatenated `(length, payload)` blocks of the packet being built.
    buf: Vec<u8>,
    count: u16,
}

impl MoldFramer {
    /// Build a framer for the given session id (space-padded to 10).
    #[must_use]
    pub fn new(session: &str) -> Self {
        let mut field = [b' '; 10];
        for (dst, src) in field.iter_mut().zip(session.bytes()) {
            *dst = src;
        }
        Self {
            session: field,
            sequence: 1,
            buf: Vec::with_capacity(MOLD_PAYLOAD_BUDGET),
            count: 0,
        }
    }

    /// The sequence number the next packet will carry.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Messages buffered in the packet under construction.
    #[must_use]
    pub fn buffered(&self) -> u16 {
        self.count
    }

    /// Append a message, emitting the current packet first when it would
    /// overflow the payload budget.
    ///
    /// A single message larger than the budget still goes out, alone in
    /// an oversized packet.
    pub fn add_message(&mut self, payload: &[u8], send: &mut dyn FnMut(&[u8])) {
        let block_len = 2 + payload.len();
        if self.count > 0 && self.buf.len() + block_len > MOLD_PAYLOAD_BUDGET {
            self.emit(send);
        }
        self.buf.put_u16(payload.len() as u16);
        self.buf.put_slice(payload);
        self.count += 1;
    }

    /// Emit whatever is buffered; a no-op when the packet is empty.
    pub fn flush(&mut self, send: &mut dyn FnMut(&[u8])) {
        if self.count > 0 {
            self.emit(send);
        }
    }

    fn emit(&mut self, send: &mut dyn FnMut(&[u8])) {
        let mut packet = Vec::with_capacity(MOLD_HEADER_SIZE + self.buf.len());
        packet.put_slice(&self.session);
        packet.put_u64(self.sequence);
        packet.put_u16(self.count);
        packet.put_slice(&self.buf);
        send(&packet);
        self.sequence += u64::from(self.count);
        self.buf.clear();
        self.count = 0;
    }
}
