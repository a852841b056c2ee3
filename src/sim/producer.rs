//! The event production loop: a continuous-time competing-risk simulator.
//!
//! One producer owns one book, one intensity model, one attribute sampler
//! and one RNG; it advances simulated time by exponential waiting times and
//! emits one [`EventRecord`] per step into a sink. The RNG call order per
//! step is fixed (Δt, then the type or joint type+level draw, then
//! attributes, then the reinit coin flip) and must not be reordered: it is
//! what makes two runs of the same session byte-identical.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::attrs::AttributeSampler;
use super::book::Book;
use super::events::{EventFlags, EventRecord, EventType};
use super::sampler::{SimRng, sample_delta_t, sample_event_type, sample_index_from_weights};
use super::session::{NANOS_PER_SEC, TradingSession};
use crate::sink::{EventSink, SinkError};

/// Outcome of one completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionResult {
    /// Mid price in ticks at end of session; the next day opens here.
    pub close_ticks: i32,
    /// Number of records emitted to the sink.
    pub events_written: u64,
    /// Number of steps on which a best price changed.
    pub shift_count: u64,
}

/// A single-security event producer for one trading day.
pub struct Producer {
    session: TradingSession,
    book: Book,
    rng: SimRng,
    attrs: AttributeSampler,
    /// Simulated seconds since session open.
    t: f64,
    next_order_id: u64,
    events_written: u64,
    shift_count: u64,
}

impl Producer {
    /// Build a producer with a freshly seeded book and RNG.
    #[must_use]
    pub fn new(session: TradingSession) -> Self {
        let book = Book::new(&session.book_seed());
        let rng = SimRng::new(session.seed);
        let attrs = AttributeSampler::new(session.level_alpha, session.spread_improve_coeff);
        Self {
            session,
            book,
            rng,
            attrs,
            t: 0.0,
            next_order_id: 0,
            events_written: 0,
            shift_count: 0,
        }
    }

    /// The book as it currently stands.
    #[must_use]
    pub fn book(&self) -> &Book {
        &self.book
    }

    /// Number of records emitted so far.
    #[must_use]
    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Number of best-price changes so far.
    #[must_use]
    pub fn shift_count(&self) -> u64 {
        self.shift_count
    }

    /// Simulated seconds since session open.
    #[must_use]
    pub fn sim_elapsed(&self) -> f64 {
        self.t
    }

    /// Produce and emit one event.
    ///
    /// Returns `Ok(false)` when the session is over; no event is emitted
    /// at or past end-of-session.
    pub fn step_one_event(&mut self, sink: &mut dyn EventSink) -> Result<bool, SinkError> {
        let horizon = f64::from(self.session.session_seconds);
        if self.t >= horizon {
            return Ok(false);
        }

        let state = self.book.state();
        let intensities = self.session.intensity.compute(&state);
        let total = intensities.total();

        self.t += sample_delta_t(&mut self.rng, total);
        if self.t >= horizon {
            return Ok(false);
        }

        // Joint type+level draw when the model provides per-level weights,
        // otherwise the aggregate type draw.
        let (kind, level_hint) = match self.session.intensity.per_level_weights(&state) {
            Some(weights) => {
                let idx = sample_index_from_weights(&mut self.rng, &weights);
                decode_weight_index(idx, self.session.levels_per_side)
            }
            None => (sample_event_type(&mut self.rng, &intensities), None),
        };

        let attrs = self.attrs.sample(&mut self.rng, kind, level_hint, &self.book);

        let order_id = self.next_order_id;
        self.next_order_id += 1;

        let mut event = EventRecord {
            ts_ns: self.session.market_open_ns + (self.t * NANOS_PER_SEC as f64) as u64,
            kind,
            side: attrs.side,
            price_ticks: attrs.price_ticks,
            qty: attrs.qty,
            order_id,
            flags: EventFlags::empty(),
        };

        let pre_bid = self.book.best_bid();
        let pre_ask = self.book.best_ask();
        self.book.apply(&event);
        let post_bid = self.book.best_bid();
        let post_ask = self.book.best_ask();

        let mut flags = EventFlags::empty();
        if post_ask > pre_ask {
            flags |= EventFlags::ASK_SHIFTED;
        }
        if post_bid < pre_bid {
            flags |= EventFlags::BID_SHIFTED;
        }

        // Any best-price change counts as a shift and arms the
        // queue-reactive resample; the coin is always drawn so the stream
        // shape does not depend on the configured probability.
        if post_bid != pre_bid || post_ask != pre_ask {
            self.shift_count += 1;
            if self.rng.next_unit() < self.session.reinit_probability {
                let mean = self.session.effective_reinit_mean();
                self.book.reinitialize(&mut self.rng, mean);
                flags |= EventFlags::BOOK_REINIT;
                trace!(order_id, "book depths resampled after shift");
            }
        }

        event.flags = flags;
        sink.append(&event)?;
        self.events_written += 1;
        Ok(true)
    }

    /// Run the session to completion as fast as the sink allows.
    pub fn run_session(&mut self, sink: &mut dyn EventSink) -> Result<SessionResult, SinkError> {
        self.run_internal(sink, None, None)
    }

    /// Run the session with wall-clock pacing and a cooperative stop flag.
    ///
    /// After each event the producer sleeps until
    /// `wall_elapsed · speed ≥ sim_elapsed`. Pacing never changes step
    /// semantics; a paced run emits the same records as an unpaced one.
    pub fn run_session_paced(
        &mut self,
        sink: &mut dyn EventSink,
        speed: f64,
        stop: &AtomicBool,
    ) -> Result<SessionResult, SinkError> {
        self.run_internal(sink, Some(speed), Some(stop))
    }

    /// Run the session checking a cooperative stop flag between steps.
    pub fn run_session_with_stop(
        &mut self,
        sink: &mut dyn EventSink,
        stop: &AtomicBool,
    ) -> Result<SessionResult, SinkError> {
        self.run_internal(sink, None, Some(stop))
    }

    fn run_internal(
        &mut self,
        sink: &mut dyn EventSink,
        pacing: Option<f64>,
        stop: Option<&AtomicBool>,
    ) -> Result<SessionResult, SinkError> {
        let started = Instant::now();
        loop {
            if let Some(flag) = stop
                && flag.load(Ordering::Relaxed)
            {
                debug!(
                    events = self.events_written,
                    "session interrupted by stop flag"
                );
                break;
            }
            if !self.step_one_event(sink)? {
                break;
            }
            if let Some(speed) = pacing
                && speed > 0.0
            {
                let due = Duration::from_secs_f64(self.t / speed);
                let elapsed = started.elapsed();
                if due > elapsed {
                    std::thread::sleep(due - elapsed);
                }
            }
        }
        Ok(SessionResult {
            close_ticks: self.book.mid_ticks(),
            events_written: self.events_written,
            shift_count: self.shift_count,
        })
    }
}

/// Decode a flat weight-vector index into `(event type, level hint)`.
///
/// The vector is ordered `[add_bid_0..K, add_ask_0..K, cancel_bid_0..K,
/// cancel_ask_0..K, exec_buy, exec_sell]`; executions carry no hint.
fn decode_weight_index(idx: usize, levels: usize) -> (EventType, Option<usize>) {
    if idx < levels {
        (EventType::AddBid, Some(idx))
    } else if idx < 2 * levels {
        (EventType::AddAsk, Some(idx - levels))
    } else if idx < 3 * levels {
        (EventType::CancelBid, Some(idx - 2 * levels))
    } else if idx < 4 * levels {
        (EventType::CancelAsk, Some(idx - 3 * levels))
    } else if idx == 4 * levels {
        (EventType::ExecuteBuy, None)
    } else {
        (EventType::ExecuteSell, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::curves::HlrParams;
    use crate::sim::intensity::{IntensityModel, SimpleImbalanceParams};
    use crate::sim::session::DEFAULT_MARKET_OPEN_NS;
    use crate::sink::VecSink;

    fn session(seed: u64) -> TradingSession {
        TradingSession {
            seed,
            p0_ticks: 10_000,
            session_seconds: 5,
            levels_per_side: 5,
            tick_size: 100,
            initial_spread_ticks: 2,
            initial_depth: 10,
            intensity: IntensityModel::Simple(SimpleImbalanceParams::default()),
            level_alpha: 0.7,
            spread_improve_coeff: 0.0,
            reinit_probability: 0.0,
            reinit_depth_mean: 0.0,
            market_open_ns: DEFAULT_MARKET_OPEN_NS,
        }
    }

    #[test]
    fn test_timestamps_are_monotone_and_offset() {
        let mut producer = Producer::new(session(42));
        let mut sink = VecSink::new();
        let result = producer
            .run_session(&mut sink)
            .unwrap_or_else(|e| panic!("run: {e}"));
        assert!(result.events_written > 0);
        assert_eq!(sink.records().len() as u64, result.events_written);

        let mut last = 0u64;
        for record in sink.records() {
            assert!(record.ts_ns >= DEFAULT_MARKET_OPEN_NS);
            assert!(record.ts_ns >= last);
            last = record.ts_ns;
        }
    }

    #[test]
    fn test_same_seed_identical_streams() {
        let mut first = VecSink::new();
        let mut second = VecSink::new();
        Producer::new(session(42))
            .run_session(&mut first)
            .unwrap_or_else(|e| panic!("run: {e}"));
        Producer::new(session(42))
            .run_session(&mut second)
            .unwrap_or_else(|e| panic!("run: {e}"));
        assert_eq!(first.records(), second.records());
        assert!(!first.records().is_empty());
    }

    #[test]
    fn test_different_seeds_diverge_early() {
        let mut first = VecSink::new();
        let mut second = VecSink::new();
        Producer::new(session(42))
            .run_session(&mut first)
            .unwrap_or_else(|e| panic!("run: {e}"));
        Producer::new(session(43))
            .run_session(&mut second)
            .unwrap_or_else(|e| panic!("run: {e}"));
        let n = first.records().len().min(second.records().len()).min(50);
        assert!(first.records()[..n] != second.records()[..n]);
    }

    #[test]
    fn test_order_ids_are_sequential() {
        let mut sink = VecSink::new();
        Producer::new(session(7))
            .run_session(&mut sink)
            .unwrap_or_else(|e| panic!("run: {e}"));
        for (i, record) in sink.records().iter().enumerate() {
            assert_eq!(record.order_id, i as u64);
        }
    }

    #[test]
    fn test_no_event_emitted_past_session_end() {
        let mut producer = Producer::new(session(42));
        let mut sink = VecSink::new();
        while producer
            .step_one_event(&mut sink)
            .unwrap_or_else(|e| panic!("step: {e}"))
        {}
        let horizon = DEFAULT_MARKET_OPEN_NS + 5 * NANOS_PER_SEC;
        for record in sink.records() {
            assert!(record.ts_ns < horizon);
        }
        // Further steps stay finished.
        assert!(
            !producer
                .step_one_event(&mut sink)
                .unwrap_or_else(|e| panic!("step: {e}"))
        );
    }

    #[test]
    fn test_shift_flags_match_replay() {
        let mut s = session(777);
        s.levels_per_side = 3;
        s.initial_depth = 1;
        s.session_seconds = 2;
        let mut sink = VecSink::new();
        let result = Producer::new(s.clone())
            .run_session(&mut sink)
            .unwrap_or_else(|e| panic!("run: {e}"));
        assert!(result.shift_count > 0, "thin book must shift");

        // Replay through an independent book; flags must agree.
        let mut book = Book::new(&s.book_seed());
        for record in sink.records() {
            let pre_bid = book.best_bid();
            let pre_ask = book.best_ask();
            book.apply(record);
            assert_eq!(
                record.flags.contains(EventFlags::ASK_SHIFTED),
                book.best_ask() > pre_ask
            );
            assert_eq!(
                record.flags.contains(EventFlags::BID_SHIFTED),
                book.best_bid() < pre_bid
            );
            assert!(book.best_bid() < book.best_ask());
        }
    }

    #[test]
    fn test_hlr_model_covers_all_event_types() {
        let mut s = session(4242);
        s.levels_per_side = 2;
        s.intensity = IntensityModel::Hlr(HlrParams::default_with_levels(2));
        let mut sink = VecSink::new();
        Producer::new(s)
            .run_session(&mut sink)
            .unwrap_or_else(|e| panic!("run: {e}"));

        let mut counts = [0u64; 6];
        for record in sink.records() {
            counts[record.kind as usize] += 1;
        }
        for (kind, count) in EventType::ALL.iter().zip(counts) {
            assert!(count > 0, "no {kind:?} events in HLR run");
        }
    }

    #[test]
    fn test_reinit_resamples_depths() {
        let mut s = session(99);
        s.levels_per_side = 3;
        s.initial_depth = 1;
        s.reinit_probability = 1.0;
        s.reinit_depth_mean = 40.0;
        s.session_seconds = 2;
        let mut sink = VecSink::new();
        let mut producer = Producer::new(s);
        producer
            .run_session(&mut sink)
            .unwrap_or_else(|e| panic!("run: {e}"));
        let reinits = sink
            .records()
            .iter()
            .filter(|r| r.flags.contains(EventFlags::BOOK_REINIT))
            .count();
        assert!(reinits > 0, "certain reinit probability never fired");
    }

    #[test]
    fn test_pacing_never_changes_the_stream() {
        let mut s = session(123);
        s.session_seconds = 1;
        let mut plain = VecSink::new();
        Producer::new(s.clone())
            .run_session(&mut plain)
            .unwrap_or_else(|e| panic!("run: {e}"));

        // A very fast paced run must emit the identical records.
        let stop = AtomicBool::new(false);
        let mut paced = VecSink::new();
        Producer::new(s)
            .run_session_paced(&mut paced, 1_000_000.0, &stop)
            .unwrap_or_else(|e| panic!("run: {e}"));
        assert_eq!(plain.records(), paced.records());
    }

    #[test]
    fn test_stop_flag_halts_mid_session() {
        let mut s = session(5);
        s.session_seconds = 3_600;
        let stop = AtomicBool::new(true);
        let mut sink = VecSink::new();
        let result = Producer::new(s)
            .run_session_with_stop(&mut sink, &stop)
            .unwrap_or_else(|e| panic!("run: {e}"));
        // Raised before the first step: nothing is emitted, the close is
        // the seeded mid.
        assert_eq!(result.events_written, 0);
        assert_eq!(result.close_ticks, 10_000);
    }

    #[test]
    fn test_decode_weight_index_layout() {
        let k = 3;
        assert_eq!(decode_weight_index(0, k), (EventType::AddBid, Some(0)));
        assert_eq!(decode_weight_index(2, k), (EventType::AddBid, Some(2)));
        assert_eq!(decode_weight_index(3, k), (EventType::AddAsk, Some(0)));
        assert_eq!(decode_weight_index(8, k), (EventType::CancelBid, Some(2)));
        assert_eq!(decode_weight_index(11, k), (EventType::CancelAsk, Some(2)));
        assert_eq!(decode_weight_index(12, k), (EventType::ExecuteBuy, None));
        assert_eq!(decode_weight_index(13, k), (EventType::ExecuteSell, None));
    }
}
