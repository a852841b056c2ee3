//! Journal round trips and boundary behaviours.

use qrsdp::prelude::*;

use super::reference_session;

#[test]
fn test_thin_book_session_shifts_and_replays() {
    let mut session = reference_session(777);
    session.levels_per_side = 3;
    session.initial_depth = 1;
    session.session_seconds = 2;

    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let path = dir.path().join("thin.qrsdp");
    let mut sink =
        JournalSink::for_session(&path, &session, 4096).unwrap_or_else(|e| panic!("sink: {e}"));
    let result = Producer::new(session.clone())
        .run_session(&mut sink)
        .unwrap_or_else(|e| panic!("run: {e}"));
    sink.close().unwrap_or_else(|e| panic!("close: {e}"));
    assert!(result.shift_count > 0, "depth-1 book must shift");

    // An independent replay must observe at least one shift and keep the
    // invariants after every event.
    let mut reader = JournalReader::open(&path).unwrap_or_else(|e| panic!("open: {e}"));
    let records = reader.read_all().unwrap_or_else(|e| panic!("read: {e}"));
    let mut book = Book::new(&session.book_seed());
    let mut shifts = 0u64;
    for record in &records {
        let event = record.to_event().unwrap_or_else(|| panic!("bad record"));
        let pre_bid = book.best_bid();
        let pre_ask = book.best_ask();
        book.apply(&event);
        if book.best_ask() > pre_ask || book.best_bid() < pre_bid {
            shifts += 1;
        }
        assert!(book.best_bid() < book.best_ask());
        for k in 1..3 {
            assert!(book.price_at(EventSide::Bid, k) < book.price_at(EventSide::Bid, k - 1));
            assert!(book.price_at(EventSide::Ask, k) > book.price_at(EventSide::Ask, k - 1));
        }
    }
    assert!(shifts > 0);
}

#[test]
fn test_zero_event_journal_roundtrips() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let path = dir.path().join("zero.qrsdp");
    let session = reference_session(1);
    let mut sink =
        JournalSink::for_session(&path, &session, 4096).unwrap_or_else(|e| panic!("sink: {e}"));
    sink.close().unwrap_or_else(|e| panic!("close: {e}"));

    let mut reader = JournalReader::open(&path).unwrap_or_else(|e| panic!("open: {e}"));
    assert_eq!(reader.header().seed, 1);
    assert!(!reader.header().flags.contains(HeaderFlags::HAS_INDEX));
    assert!(
        reader
            .read_all()
            .unwrap_or_else(|e| panic!("read: {e}"))
            .is_empty()
    );
}

#[test]
fn test_header_mirrors_session_parameters() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let path = dir.path().join("hdr.qrsdp");
    let session = reference_session(42);
    let mut sink =
        JournalSink::for_session(&path, &session, 128).unwrap_or_else(|e| panic!("sink: {e}"));
    sink.close().unwrap_or_else(|e| panic!("close: {e}"));

    let reader = JournalReader::open(&path).unwrap_or_else(|e| panic!("open: {e}"));
    let header = reader.header();
    assert_eq!(header.seed, 42);
    assert_eq!(header.p0_ticks, 10_000);
    assert_eq!(header.tick_size, 100);
    assert_eq!(header.session_seconds, 30);
    assert_eq!(header.levels_per_side, 5);
    assert_eq!(header.initial_spread_ticks, 2);
    assert_eq!(header.initial_depth, 50);
    assert_eq!(header.chunk_capacity, 128);
    assert_eq!(header.record_size, RECORD_SIZE as u32);
}

#[test]
fn test_estimator_consumes_full_journal() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let path = dir.path().join("cal.qrsdp");
    let session = reference_session(7);
    let mut sink =
        JournalSink::for_session(&path, &session, 4096).unwrap_or_else(|e| panic!("sink: {e}"));
    Producer::new(session.clone())
        .run_session(&mut sink)
        .unwrap_or_else(|e| panic!("run: {e}"));
    sink.close().unwrap_or_else(|e| panic!("close: {e}"));

    let mut reader = JournalReader::open(&path).unwrap_or_else(|e| panic!("open: {e}"));
    let records = reader.read_all().unwrap_or_else(|e| panic!("read: {e}"));

    let mut estimator = CurveEstimator::new(&session.book_seed(), 64);
    for record in &records {
        estimator.observe(record);
    }
    let params = estimator.finish();
    assert!(params.validate().is_ok());
    assert_eq!(params.levels, 5);
    // A 30-second stream has observations at moderate queue sizes: the
    // estimated best-level add curve must differ from the default family
    // somewhere.
    let defaults = HlrParams::default_with_levels(5);
    let changed = (0..=64).any(|n| params.add_bid[0].value(n) != defaults.add_bid[0].value(n));
    assert!(changed, "estimator never updated a cell");
}
