//! The simulated limit order book: top-K price-ordered level arrays.
//!
//! Unlike a matching engine's book, this book is the *authority* on market
//! state: events are generated against it and applied to it by the same
//! owner, so levels are plain value-owned arrays with no interior
//! synchronisation. Bid prices strictly decrease with index and ask prices
//! strictly increase; executions at the top of book are the only path by
//! which the mid price moves (shift-on-depletion).

use super::events::{EventRecord, EventSide, EventType};
use super::sampler::SimRng;

/// One price level: a price in ticks and the queued depth at that price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookLevel {
    /// Price in integer ticks.
    pub price_ticks: i32,
    /// Total resting quantity at this price.
    pub depth: u32,
}

/// Initial book geometry for [`Book::seed`].
#[derive(Debug, Clone, Copy)]
pub struct BookSeed {
    /// Opening mid price in ticks.
    pub p0_ticks: i32,
    /// Number of levels maintained per side.
    pub levels_per_side: usize,
    /// Opening spread in ticks (at least 1).
    pub initial_spread_ticks: i32,
    /// Depth assigned to every seeded level and to refilled levels after a
    /// shift.
    pub initial_depth: u32,
}

/// Top-of-book features snapshotted before each intensity computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookFeatures {
    /// Best bid price in ticks.
    pub best_bid_ticks: i32,
    /// Best ask price in ticks.
    pub best_ask_ticks: i32,
    /// Depth at the best bid.
    pub best_bid_depth: u32,
    /// Depth at the best ask.
    pub best_ask_depth: u32,
    /// `best_ask − best_bid`, always ≥ 1.
    pub spread_ticks: i32,
    /// Normalised top-of-book queue imbalance in `[−1, 1]`.
    pub imbalance: f64,
}

/// Full state snapshot handed to intensity models: top-of-book features
/// plus the per-level depth vectors needed by queue-reactive models.
#[derive(Debug, Clone)]
pub struct BookState {
    /// Top-of-book features.
    pub features: BookFeatures,
    /// Depth at each bid level, index 0 = best.
    pub bid_depths: Vec<u32>,
    /// Depth at each ask level, index 0 = best.
    pub ask_depths: Vec<u32>,
}

impl BookState {
    /// Total resting bid quantity across all levels.
    #[must_use]
    pub fn total_bid_depth(&self) -> u64 {
        self.bid_depths.iter().map(|d| u64::from(*d)).sum()
    }

    /// Total resting ask quantity across all levels.
    #[must_use]
    pub fn total_ask_depth(&self) -> u64 {
        self.ask_depths.iter().map(|d| u64::from(*d)).sum()
    }
}

/// What an [`Book::apply`] call did to the best prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// The best ask was depleted and the ask ladder shifted up one tick.
    pub ask_shifted: bool,
    /// The best bid was depleted and the bid ladder shifted down one tick.
    pub bid_shifted: bool,
}

/// Denominator guard for the imbalance ratio.
const IMBALANCE_EPSILON: f64 = 1e-9;

/// A top-K limit order book owned by a single producer.
#[derive(Debug, Clone)]
pub struct Book {
    bids: Vec<BookLevel>,
    asks: Vec<BookLevel>,
    num_levels: usize,
    initial_depth: u32,
}

impl Book {
    /// Build and seed a book in one call.
    #[must_use]
    pub fn new(seed: &BookSeed) -> Self {
        let mut book = Self {
            bids: Vec::with_capacity(seed.levels_per_side),
            asks: Vec::with_capacity(seed.levels_per_side),
            num_levels: seed.levels_per_side,
            initial_depth: seed.initial_depth,
        };
        book.seed(seed);
        book
    }

    /// (Re-)initialise all levels from the given geometry.
    ///
    /// With spread `s`, the best bid sits at `p0 − ⌊s/2⌋` and the best ask
    /// at `p0 + (s − ⌊s/2⌋)`; deeper levels step one tick per index.
    pub fn seed(&mut self, seed: &BookSeed) {
        let half = seed.initial_spread_ticks / 2;
        let best_bid = seed.p0_ticks - half;
        let best_ask = seed.p0_ticks + (seed.initial_spread_ticks - half);

        self.num_levels = seed.levels_per_side;
        self.initial_depth = seed.initial_depth;
        self.bids.clear();
        self.asks.clear();
        for k in 0..seed.levels_per_side {
            self.bids.push(BookLevel {
                price_ticks: best_bid - k as i32,
                depth: seed.initial_depth,
            });
            self.asks.push(BookLevel {
                price_ticks: best_ask + k as i32,
                depth: seed.initial_depth,
            });
        }
    }

    /// Number of levels maintained per side.
    #[must_use]
    #[inline]
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Best bid price in ticks.
    #[must_use]
    #[inline]
    pub fn best_bid(&self) -> i32 {
        self.bids[0].price_ticks
    }

    /// Best ask price in ticks.
    #[must_use]
    #[inline]
    pub fn best_ask(&self) -> i32 {
        self.asks[0].price_ticks
    }

    /// Mid price in ticks, rounded toward the bid.
    #[must_use]
    #[inline]
    pub fn mid_ticks(&self) -> i32 {
        (self.best_bid() + self.best_ask()) / 2
    }

    /// Depth at level `k` of the given side, 0 if out of range.
    #[must_use]
    pub fn depth_at(&self, side: EventSide, k: usize) -> u32 {
        let levels = self.side_levels(side);
        levels.get(k).map_or(0, |lvl| lvl.depth)
    }

    /// Price at level `k` of the given side, 0 if out of range.
    #[must_use]
    pub fn price_at(&self, side: EventSide, k: usize) -> i32 {
        let levels = self.side_levels(side);
        levels.get(k).map_or(0, |lvl| lvl.price_ticks)
    }

    /// Top-of-book features for the intensity models.
    #[must_use]
    pub fn features(&self) -> BookFeatures {
        let bid0 = self.bids[0];
        let ask0 = self.asks[0];
        let qb = f64::from(bid0.depth);
        let qa = f64::from(ask0.depth);
        BookFeatures {
            best_bid_ticks: bid0.price_ticks,
            best_ask_ticks: ask0.price_ticks,
            best_bid_depth: bid0.depth,
            best_ask_depth: ask0.depth,
            spread_ticks: ask0.price_ticks - bid0.price_ticks,
            imbalance: (qb - qa) / (qb + qa + IMBALANCE_EPSILON),
        }
    }

    /// Full state snapshot (features plus per-level depth vectors).
    #[must_use]
    pub fn state(&self) -> BookState {
        BookState {
            features: self.features(),
            bid_depths: self.bids.iter().map(|lvl| lvl.depth).collect(),
            ask_depths: self.asks.iter().map(|lvl| lvl.depth).collect(),
        }
    }

    /// Apply an event to the book, returning which best prices shifted.
    ///
    /// Adds at a known price deepen that level; adds one tick inside the
    /// spread become the new best level (the deepest level on that side
    /// drops off). Cancels saturate at zero. Executions decrement the best
    /// level of the opposite side and shift the ladder when it empties.
    /// Prices outside the K-level window are ignored.
    pub fn apply(&mut self, event: &EventRecord) -> ApplyOutcome {
        match event.kind {
            EventType::AddBid => {
                self.apply_add(EventSide::Bid, event.price_ticks, event.qty);
                ApplyOutcome::default()
            }
            EventType::AddAsk => {
                self.apply_add(EventSide::Ask, event.price_ticks, event.qty);
                ApplyOutcome::default()
            }
            EventType::CancelBid => {
                self.apply_cancel(EventSide::Bid, event.price_ticks, event.qty);
                ApplyOutcome::default()
            }
            EventType::CancelAsk => {
                self.apply_cancel(EventSide::Ask, event.price_ticks, event.qty);
                ApplyOutcome::default()
            }
            EventType::ExecuteBuy => ApplyOutcome {
                ask_shifted: self.apply_execute(EventSide::Ask),
                bid_shifted: false,
            },
            EventType::ExecuteSell => ApplyOutcome {
                ask_shifted: false,
                bid_shifted: self.apply_execute(EventSide::Bid),
            },
        }
    }

    /// Resample every level's depth from a Poisson distribution.
    ///
    /// Used by the queue-reactive extension after a price shift. Draws flow
    /// through the producer's single RNG handle: bids first (best to
    /// deepest), then asks.
    pub fn reinitialize(&mut self, rng: &mut SimRng, mean: f64) {
        for lvl in &mut self.bids {
            lvl.depth = rng.poisson(mean);
        }
        for lvl in &mut self.asks {
            lvl.depth = rng.poisson(mean);
        }
    }

    fn side_levels(&self, side: EventSide) -> &[BookLevel] {
        match side {
            EventSide::Ask => &self.asks,
            _ => &self.bids,
        }
    }

    fn apply_add(&mut self, side: EventSide, price_ticks: i32, qty: u32) {
        let (best_bid, best_ask) = (self.best_bid(), self.best_ask());
        let levels = match side {
            EventSide::Ask => &mut self.asks,
            _ => &mut self.bids,
        };

        if let Some(lvl) = levels.iter_mut().find(|lvl| lvl.price_ticks == price_ticks) {
            lvl.depth = lvl.depth.saturating_add(qty);
            return;
        }

        // A price one tick inside the spread starts a new best level; the
        // deepest level on that side drops off to keep K constant.
        let improves = match side {
            EventSide::Bid => price_ticks == best_bid + 1 && price_ticks < best_ask,
            EventSide::Ask => price_ticks == best_ask - 1 && price_ticks > best_bid,
            EventSide::Na => false,
        };
        if improves {
            levels.insert(
                0,
                BookLevel {
                    price_ticks,
                    depth: qty,
                },
            );
            levels.pop();
        }
        // Anything else is out of the K-window: silent no-op.
    }

    fn apply_cancel(&mut self, side: EventSide, price_ticks: i32, qty: u32) {
        let levels = match side {
            EventSide::Ask => &mut self.asks,
            _ => &mut self.bids,
        };
        if let Some(lvl) = levels.iter_mut().find(|lvl| lvl.price_ticks == price_ticks) {
            lvl.depth = lvl.depth.saturating_sub(qty);
        }
    }

    /// Consume one unit at the best level of `side`; shift the ladder when
    /// the level empties. Returns true if a shift happened.
    fn apply_execute(&mut self, side: EventSide) -> bool {
        let step: i32 = match side {
            EventSide::Ask => 1,
            _ => -1,
        };
        let levels = match side {
            EventSide::Ask => &mut self.asks,
            _ => &mut self.bids,
        };

        if levels[0].depth > 0 {
            levels[0].depth -= 1;
        }
        if levels[0].depth > 0 {
            return false;
        }

        // Shift: the remaining ladder moves up one slot and a fresh level
        // opens one tick beyond the deepest survivor.
        let old_best = levels[0].price_ticks;
        let count = levels.len();
        for k in 0..count - 1 {
            levels[k] = levels[k + 1];
        }
        let anchor = if count >= 2 {
            levels[count - 2].price_ticks
        } else {
            old_best
        };
        levels[count - 1] = BookLevel {
            price_ticks: anchor + step,
            depth: self.initial_depth,
        };
        true
    }
}
