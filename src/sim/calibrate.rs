//! Curve calibration scaffold: estimate queue-reactive intensities from a
//! recorded event stream.
//!
//! The estimator replays records against an independent book, tallying how
//! often each event kind occurred at each (level, queue size) cell and how
//! long each cell was occupied. `finish` converts count/time ratios into
//! [`IntensityCurve`] tables, starting from the default family so cells
//! that were never observed keep a sane value. This is a scaffold, not a
//! fitting pipeline: no smoothing, no confidence intervals.

use super::book::{Book, BookSeed};
use super::curves::{HlrParams, IntensityCurve};
use super::events::{DiskEventRecord, EventSide, EventType};
use super::session::NANOS_PER_SEC;

/// Per-(level, queue-size) tallies for one event family on one side.
#[derive(Debug, Clone)]
struct CellTally {
    /// Event counts per level per queue size.
    counts: Vec<Vec<u64>>,
}

impl CellTally {
    fn new(levels: usize, n_max: usize) -> Self {
        Self {
            counts: vec![vec![0; n_max + 1]; levels],
        }
    }

    fn bump(&mut self, level: usize, n: usize) {
        if let Some(row) = self.counts.get_mut(level)
            && let Some(cell) = row.get_mut(n)
        {
            *cell += 1;
        }
    }
}

/// Streaming estimator for the queue-reactive curve family.
pub struct CurveEstimator {
    levels: usize,
    n_max: usize,
    book: Book,
    last_ts_ns: Option<u64>,
    /// Seconds spent with each (side, level, queue size) occupied.
    dwell_bid: Vec<Vec<f64>>,
    dwell_ask: Vec<Vec<f64>>,
    add_bid: CellTally,
    add_ask: CellTally,
    cancel_bid: CellTally,
    cancel_ask: CellTally,
    exec_buy: Vec<u64>,
    exec_sell: Vec<u64>,
}

impl CurveEstimator {
    /// Build an estimator replaying against the given book geometry.
    #[must_use]
    pub fn new(seed: &BookSeed, n_max: usize) -> Self {
        let levels = seed.levels_per_side;
        Self {
            levels,
            n_max,
            book: Book::new(seed),
            last_ts_ns: None,
            dwell_bid: vec![vec![0.0; n_max + 1]; levels],
            dwell_ask: vec![vec![0.0; n_max + 1]; levels],
            add_bid: CellTally::new(levels, n_max),
            add_ask: CellTally::new(levels, n_max),
            cancel_bid: CellTally::new(levels, n_max),
            cancel_ask: CellTally::new(levels, n_max),
            exec_buy: vec![0; n_max + 1],
            exec_sell: vec![0; n_max + 1],
        }
    }

    /// Feed one record in stream order.
    ///
    /// Records with unknown kind/side discriminants are skipped; so are
    /// records whose price is outside the replay book's window.
    pub fn observe(&mut self, record: &DiskEventRecord) {
        let Some(event) = record.to_event() else {
            return;
        };

        // Accrue dwell time in the pre-event state.
        if let Some(last) = self.last_ts_ns {
            let dt = record.ts_ns.saturating_sub(last) as f64 / NANOS_PER_SEC as f64;
            for k in 0..self.levels {
                let nb = self.cell(self.book.depth_at(EventSide::Bid, k));
                let na = self.cell(self.book.depth_at(EventSide::Ask, k));
                self.dwell_bid[k][nb] += dt;
                self.dwell_ask[k][na] += dt;
            }
        }
        self.last_ts_ns = Some(record.ts_ns);

        match event.kind {
            EventType::AddBid => {
                if let Some(k) = self.level_of(EventSide::Bid, event.price_ticks) {
                    let n = self.cell(self.book.depth_at(EventSide::Bid, k));
                    self.add_bid.bump(k, n);
                }
            }
            EventType::AddAsk => {
                if let Some(k) = self.level_of(EventSide::Ask, event.price_ticks) {
                    let n = self.cell(self.book.depth_at(EventSide::Ask, k));
                    self.add_ask.bump(k, n);
                }
            }
            EventType::CancelBid => {
                if let Some(k) = self.level_of(EventSide::Bid, event.price_ticks) {
                    let n = self.cell(self.book.depth_at(EventSide::Bid, k));
                    self.cancel_bid.bump(k, n);
                }
            }
            EventType::CancelAsk => {
                if let Some(k) = self.level_of(EventSide::Ask, event.price_ticks) {
                    let n = self.cell(self.book.depth_at(EventSide::Ask, k));
                    self.cancel_ask.bump(k, n);
                }
            }
            EventType::ExecuteBuy => {
                let n = self.cell(self.book.depth_at(EventSide::Ask, 0));
                self.exec_buy[n] += 1;
            }
            EventType::ExecuteSell => {
                let n = self.cell(self.book.depth_at(EventSide::Bid, 0));
                self.exec_sell[n] += 1;
            }
        }

        self.book.apply(&event);
    }

    /// Convert the tallies into a curve set.
    ///
    /// Observed cells get `count / dwell_seconds`; unobserved cells keep
    /// the default-family value at that coordinate.
    #[must_use]
    pub fn finish(&self) -> HlrParams {
        let mut params = HlrParams::default_with_levels(self.levels);
        params.n_max = self.n_max;

        let estimate = |tally: &CellTally, dwell: &[Vec<f64>], base: &[IntensityCurve]| {
            (0..self.levels)
                .map(|k| IntensityCurve {
                    values: (0..=self.n_max)
                        .map(|n| {
                            let time = dwell[k][n];
                            if time > 0.0 && tally.counts[k][n] > 0 {
                                tally.counts[k][n] as f64 / time
                            } else {
                                base[k].value(n)
                            }
                        })
                        .collect(),
                    tail: base[k].tail,
                })
                .collect::<Vec<_>>()
        };

        params.add_bid = estimate(&self.add_bid, &self.dwell_bid, &params.add_bid);
        params.add_ask = estimate(&self.add_ask, &self.dwell_ask, &params.add_ask);
        params.cancel_bid = estimate(&self.cancel_bid, &self.dwell_bid, &params.cancel_bid);
        params.cancel_ask = estimate(&self.cancel_ask, &self.dwell_ask, &params.cancel_ask);

        let market = |counts: &[u64], dwell: &[Vec<f64>], base: &IntensityCurve| IntensityCurve {
            values: (0..=self.n_max)
                .map(|n| {
                    let time = dwell[0][n];
                    if time > 0.0 && counts[n] > 0 {
                        counts[n] as f64 / time
                    } else {
                        base.value(n)
                    }
                })
                .collect(),
            tail: base.tail,
        };
        params.market_buy = market(&self.exec_buy, &self.dwell_ask, &params.market_buy);
        params.market_sell = market(&self.exec_sell, &self.dwell_bid, &params.market_sell);
        params
    }

    fn cell(&self, depth: u32) -> usize {
        (depth as usize).min(self.n_max)
    }

    fn level_of(&self, side: EventSide, price_ticks: i32) -> Option<usize> {
        (0..self.levels).find(|k| self.book.price_at(side, *k) == price_ticks)
    }
}
