//! Event attribute sampling: which side, which price, what quantity.
//!
//! Once the event type (and, under HLR, the level) is chosen, the
//! attribute sampler resolves the concrete order attributes against the
//! current book. All flow is unit-size; prices always land inside the
//! K-level window except through the explicit spread-improvement branch.

use super::book::Book;
use super::events::{EventSide, EventType};
use super::sampler::{SimRng, sample_index_from_weights};

/// Resolved attributes for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventAttrs {
    /// The side of the book the event touches.
    pub side: EventSide,
    /// Price in integer ticks.
    pub price_ticks: i32,
    /// Quantity in units (always 1).
    pub qty: u32,
}

/// Samples order attributes for a chosen event type.
///
/// `level_alpha` shapes the geometric level preference of adds when no
/// level hint is available (`exp(−α·k)` weights). A positive
/// `spread_improve_coeff` enables adds one tick inside the spread with
/// probability `min(1, (spread − 1) · coeff)` whenever the spread exceeds
/// one tick.
#[derive(Debug, Clone, Copy)]
pub struct AttributeSampler {
    /// Decay of the add-level preference.
    pub level_alpha: f64,
    /// Spread-improvement probability coefficient; 0 disables the branch.
    pub spread_improve_coeff: f64,
}

impl AttributeSampler {
    /// Build a sampler from the session parameters.
    #[must_use]
    pub fn new(level_alpha: f64, spread_improve_coeff: f64) -> Self {
        Self {
            level_alpha,
            spread_improve_coeff,
        }
    }

    /// Resolve attributes for `kind` against the current book.
    ///
    /// The draw order is fixed: the spread-improvement coin first (only
    /// when the branch is armed), then the level draw (only when no hint
    /// is supplied and the type needs one). Executions never draw.
    pub fn sample(
        &self,
        rng: &mut SimRng,
        kind: EventType,
        level_hint: Option<usize>,
        book: &Book,
    ) -> EventAttrs {
        match kind {
            EventType::AddBid => self.sample_add(rng, EventSide::Bid, level_hint, book),
            EventType::AddAsk => self.sample_add(rng, EventSide::Ask, level_hint, book),
            EventType::CancelBid => self.sample_cancel(rng, EventSide::Bid, level_hint, book),
            EventType::CancelAsk => self.sample_cancel(rng, EventSide::Ask, level_hint, book),
            EventType::ExecuteBuy => EventAttrs {
                side: EventSide::Ask,
                price_ticks: book.best_ask(),
                qty: 1,
            },
            EventType::ExecuteSell => EventAttrs {
                side: EventSide::Bid,
                price_ticks: book.best_bid(),
                qty: 1,
            },
        }
    }

    fn sample_add(
        &self,
        rng: &mut SimRng,
        side: EventSide,
        level_hint: Option<usize>,
        book: &Book,
    ) -> EventAttrs {
        let spread = book.best_ask() - book.best_bid();
        if spread > 1 && self.spread_improve_coeff > 0.0 {
            let p = ((f64::from(spread) - 1.0) * self.spread_improve_coeff).min(1.0);
            if rng.next_unit() < p {
                let price_ticks = match side {
                    EventSide::Bid => book.best_bid() + 1,
                    _ => book.best_ask() - 1,
                };
                return EventAttrs {
                    side,
                    price_ticks,
                    qty: 1,
                };
            }
        }

        let k = match level_hint {
            Some(k) => k.min(book.num_levels().saturating_sub(1)),
            None => {
                let weights: Vec<f64> = (0..book.num_levels())
                    .map(|k| (-self.level_alpha * k as f64).exp())
                    .collect();
                sample_index_from_weights(rng, &weights)
            }
        };
        EventAttrs {
            side,
            price_ticks: book.price_at(side, k),
            qty: 1,
        }
    }

    fn sample_cancel(
        &self,
        rng: &mut SimRng,
        side: EventSide,
        level_hint: Option<usize>,
        book: &Book,
    ) -> EventAttrs {
        let k = match level_hint {
            Some(k) => k.min(book.num_levels().saturating_sub(1)),
            None => {
                let weights: Vec<f64> = (0..book.num_levels())
                    .map(|k| f64::from(book.depth_at(side, k)))
                    .collect();
                if weights.iter().sum::<f64>() <= 0.0 {
                    // Every level empty: nothing to weight, target the top.
                    0
                } else {
                    sample_index_from_weights(rng, &weights)
                }
            }
        };
        EventAttrs {
            side,
            price_ticks: book.price_at(side, k),
            qty: 1,
        }
    }
}
