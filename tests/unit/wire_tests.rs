//! Wire-protocol encoding sanity: ITCH messages framed in Mold packets.

use qrsdp::feed::{
    ADD_ORDER_SIZE, DayTracker, DayTransition, EVENT_END_OF_MARKET, EVENT_START_OF_MARKET,
    MOLD_HEADER_SIZE, encode_system_event,
};
use qrsdp::prelude::*;

#[test]
fn test_add_bid_record_end_to_end_bytes() {
    let record = DiskEventRecord {
        ts_ns: 1_500_000_000,
        kind: EventType::AddBid as u8,
        side: EventSide::Bid as u8,
        price_ticks: 10_000,
        qty: 1,
        order_id: 0,
    };
    let mut encoder = ItchEncoder::new("QRSD", 1, 100);
    let message = encoder
        .encode(&record)
        .unwrap_or_else(|| panic!("encode"));

    // Normative Add Order shape.
    assert_eq!(message.len(), ADD_ORDER_SIZE);
    assert_eq!(message[0], b'A');
    assert_eq!(message[19], b'B');
    let mut ts_bytes = [0u8; 8];
    ts_bytes[2..8].copy_from_slice(&message[5..11]);
    assert_eq!(u64::from_be_bytes(ts_bytes), 1_500_000_000);
    assert_eq!(
        u32::from_be_bytes([message[20], message[21], message[22], message[23]]),
        1
    );
    assert_eq!(
        u32::from_be_bytes([message[32], message[33], message[34], message[35]]),
        1_000_000
    );

    // One message in one Mold packet: 20 + 2 + 36 bytes, count 1, seq 1.
    let mut framer = MoldFramer::new("QRSDP0001");
    let mut packets: Vec<Vec<u8>> = Vec::new();
    let mut send = |pkt: &[u8]| packets.push(pkt.to_vec());
    framer.add_message(&message, &mut send);
    framer.flush(&mut send);
    assert_eq!(packets.len(), 1);
    let packet = &packets[0];
    assert_eq!(packet.len(), MOLD_HEADER_SIZE + 2 + ADD_ORDER_SIZE);
    assert_eq!(packet.len(), 58);
    assert_eq!(u16::from_be_bytes([packet[18], packet[19]]), 1);
    let seq = u64::from_be_bytes([
        packet[10], packet[11], packet[12], packet[13], packet[14], packet[15], packet[16],
        packet[17],
    ]);
    assert_eq!(seq, 1);
    assert_eq!(framer.sequence(), 2);
}

#[test]
fn test_full_session_stream_encodes_and_frames() {
    let session = super::reference_session(42);
    let mut sink = VecSink::new();
    Producer::new(session)
        .run_session(&mut sink)
        .unwrap_or_else(|e| panic!("run: {e}"));

    let mut encoder = ItchEncoder::new("QRSD", 1, 100);
    let mut framer = MoldFramer::new("QRSDP0001");
    let mut packets: Vec<Vec<u8>> = Vec::new();
    let mut messages = 0u64;
    {
        let mut send = |pkt: &[u8]| packets.push(pkt.to_vec());
        for record in sink.records() {
            let disk = DiskEventRecord::from(record);
            let message = encoder
                .encode(&disk)
                .unwrap_or_else(|| panic!("encode"));
            framer.add_message(&message, &mut send);
            messages += 1;
        }
        framer.flush(&mut send);
    }
    assert!(!packets.is_empty());

    // Every packet respects the header layout and the budget (no message
    // here exceeds it), and the message counts add up.
    let mut counted = 0u64;
    let mut expected_seq = 1u64;
    for packet in &packets {
        assert!(packet.len() > MOLD_HEADER_SIZE);
        assert!(packet.len() <= MOLD_HEADER_SIZE + 1400);
        let seq = u64::from_be_bytes([
            packet[10], packet[11], packet[12], packet[13], packet[14], packet[15], packet[16],
            packet[17],
        ]);
        assert_eq!(seq, expected_seq);
        let count = u64::from(u16::from_be_bytes([packet[18], packet[19]]));
        assert!(count > 0);
        counted += count;
        expected_seq += count;

        // Walk the blocks: lengths must tile the packet exactly.
        let mut offset = MOLD_HEADER_SIZE;
        let mut blocks = 0u64;
        while offset < packet.len() {
            let len = usize::from(u16::from_be_bytes([packet[offset], packet[offset + 1]]));
            offset += 2 + len;
            blocks += 1;
        }
        assert_eq!(offset, packet.len());
        assert_eq!(blocks, count);
    }
    assert_eq!(counted, messages);
}

#[test]
fn test_system_event_codes_round_the_day() {
    let open = encode_system_event(34_200_000_000_000, EVENT_START_OF_MARKET);
    let close = encode_system_event(34_230_000_000_000, EVENT_END_OF_MARKET);
    assert_eq!(open[0], b'S');
    assert_eq!(open[11], b'Q');
    assert_eq!(close[11], b'M');
}

#[test]
fn test_day_rollover_emits_close_then_open() {
    // The tracker drives the consumer's system events; a regression in
    // timestamps means the producer moved to the next day's file.
    let mut day = DayTracker::default();
    assert_eq!(day.on_event(34_200_000_000_100), DayTransition::First);
    assert_eq!(day.on_event(34_230_000_000_000), DayTransition::Same);
    match day.on_event(34_200_000_000_050) {
        DayTransition::Rollover { prev_ts_ns } => {
            assert_eq!(prev_ts_ns, 34_230_000_000_000);
        }
        other => panic!("expected rollover, got {other:?}"),
    }
}

#[test]
fn test_udp_sender_delivers_mold_packet() {
    use std::net::UdpSocket;

    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap_or_else(|e| panic!("bind: {e}"));
    let addr = receiver.local_addr().unwrap_or_else(|e| panic!("addr: {e}"));
    let mut sender = UdpFeedSender::open(&FeedDestination::Unicast {
        addr: addr.to_string(),
    })
    .unwrap_or_else(|e| panic!("open: {e}"));

    let mut framer = MoldFramer::new("NET");
    let mut send = |pkt: &[u8]| sender.send(pkt);
    framer.add_message(&encode_system_event(7, EVENT_START_OF_MARKET), &mut send);
    framer.flush(&mut send);

    let mut buf = [0u8; 2048];
    let (len, _) = receiver
        .recv_from(&mut buf)
        .unwrap_or_else(|e| panic!("recv: {e}"));
    assert_eq!(len, MOLD_HEADER_SIZE + 2 + 12);
    assert_eq!(&buf[0..10], b"NET       ");
}
