//! State-dependent event rate models.
//!
//! An intensity model maps a [`BookState`] snapshot to six non-negative
//! rates, one per event kind in canonical order. Two models exist behind
//! the [`IntensityModel`] enum: a scalar imbalance model and the
//! queue-reactive curve (HLR) model, which additionally exposes a flat
//! per-level weight vector so the producer can draw event type and level
//! in one categorical step.

use serde::{Deserialize, Serialize};

use super::book::BookState;
use super::curves::HlrParams;

/// Floor applied to every computed rate. NaN, infinite, and negative
/// rates are replaced by the floor rather than clamped.
pub const INTENSITY_FLOOR: f64 = 1e-9;

/// Sanitise one rate: finite and at least [`INTENSITY_FLOOR`].
#[inline]
fn clamp_rate(rate: f64) -> f64 {
    if !rate.is_finite() || rate < INTENSITY_FLOOR {
        INTENSITY_FLOOR
    } else {
        rate
    }
}

/// The six event rates, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intensities {
    /// Rate of bid-side adds.
    pub add_bid: f64,
    /// Rate of ask-side adds.
    pub add_ask: f64,
    /// Rate of bid-side cancels.
    pub cancel_bid: f64,
    /// Rate of ask-side cancels.
    pub cancel_ask: f64,
    /// Rate of marketable buys.
    pub exec_buy: f64,
    /// Rate of marketable sells.
    pub exec_sell: f64,
}

impl Intensities {
    /// Build from raw rates, applying the floor to each.
    #[must_use]
    pub fn clamped(
        add_bid: f64,
        add_ask: f64,
        cancel_bid: f64,
        cancel_ask: f64,
        exec_buy: f64,
        exec_sell: f64,
    ) -> Self {
        Self {
            add_bid: clamp_rate(add_bid),
            add_ask: clamp_rate(add_ask),
            cancel_bid: clamp_rate(cancel_bid),
            cancel_ask: clamp_rate(cancel_ask),
            exec_buy: clamp_rate(exec_buy),
            exec_sell: clamp_rate(exec_sell),
        }
    }

    /// The six rates as an array in canonical order.
    #[must_use]
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.add_bid,
            self.add_ask,
            self.cancel_bid,
            self.cancel_ask,
            self.exec_buy,
            self.exec_sell,
        ]
    }

    /// Sum of all six rates.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

/// Parameters of the scalar imbalance model.
///
/// Rates depend on the top-of-book imbalance `I`, the spread, and total
/// side depth:
///
/// ```text
/// m          = exp(spread_sensitivity · (spread − neutral_spread))
/// add_bid    = L · (1 − sI·I) · m          add_ask   = L · (1 + sI·I) · m
/// exec_sell  = M · (ε + max( sI·I, 0)) / m exec_buy  = M · (ε + max(−sI·I, 0)) / m
/// cancel_bid = C · sC · total_bid_depth    cancel_ask = C · sC · total_ask_depth
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimpleImbalanceParams {
    /// Base add rate `L`.
    pub base_add: f64,
    /// Base cancel rate `C` (per unit of total side depth).
    pub base_cancel: f64,
    /// Base execution rate `M`.
    pub base_exec: f64,
    /// Baseline execution fraction `ε` independent of imbalance.
    pub exec_epsilon: f64,
    /// Imbalance sensitivity `sI`.
    pub imbalance_sensitivity: f64,
    /// Cancel depth sensitivity `sC`.
    pub cancel_depth_sensitivity: f64,
    /// Spread sensitivity; 0 disables the spread multiplier.
    #[serde(default)]
    pub spread_sensitivity: f64,
    /// Spread (ticks) at which the multiplier is 1.
    #[serde(default = "default_neutral_spread")]
    pub neutral_spread: f64,
}

fn default_neutral_spread() -> f64 {
    1.0
}

impl Default for SimpleImbalanceParams {
    fn default() -> Self {
        Self {
            base_add: 20.0,
            base_cancel: 0.1,
            base_exec: 5.0,
            exec_epsilon: 0.2,
            imbalance_sensitivity: 1.0,
            cancel_depth_sensitivity: 1.0,
            spread_sensitivity: 0.0,
            neutral_spread: 1.0,
        }
    }
}

impl SimpleImbalanceParams {
    fn compute(&self, state: &BookState) -> Intensities {
        let imbalance = state.features.imbalance;
        let spread = f64::from(state.features.spread_ticks);
        let tilt = self.imbalance_sensitivity * imbalance;
        let spread_mult = (self.spread_sensitivity * (spread - self.neutral_spread)).exp();

        let add_bid = self.base_add * (1.0 - tilt) * spread_mult;
        let add_ask = self.base_add * (1.0 + tilt) * spread_mult;
        let exec_sell = self.base_exec * (self.exec_epsilon + tilt.max(0.0)) / spread_mult;
        let exec_buy = self.base_exec * (self.exec_epsilon + (-tilt).max(0.0)) / spread_mult;
        let cancel_bid =
            self.base_cancel * self.cancel_depth_sensitivity * state.total_bid_depth() as f64;
        let cancel_ask =
            self.base_cancel * self.cancel_depth_sensitivity * state.total_ask_depth() as f64;

        Intensities::clamped(add_bid, add_ask, cancel_bid, cancel_ask, exec_buy, exec_sell)
    }
}

/// The available intensity models.
///
/// Tagged for configuration files:
/// `{"model": "simple", ...}` or `{"model": "hlr", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum IntensityModel {
    /// Scalar imbalance model.
    Simple(SimpleImbalanceParams),
    /// Queue-reactive curve model.
    Hlr(HlrParams),
}

impl IntensityModel {
    /// Compute the six aggregate rates for the given book state.
    #[must_use]
    pub fn compute(&self, state: &BookState) -> Intensities {
        match self {
            IntensityModel::Simple(params) => params.compute(state),
            IntensityModel::Hlr(params) => {
                let weights = hlr_weights(params, state);
                let k = params.levels;
                let seg = |range: std::ops::Range<usize>| weights[range].iter().sum::<f64>();
                Intensities::clamped(
                    seg(0..k),
                    seg(k..2 * k),
                    seg(2 * k..3 * k),
                    seg(3 * k..4 * k),
                    weights[4 * k],
                    weights[4 * k + 1],
                )
            }
        }
    }

    /// Flat per-level weight vector for the joint type+level draw.
    ///
    /// Length `4K + 2`, ordered `[add_bid_0..K, add_ask_0..K,
    /// cancel_bid_0..K, cancel_ask_0..K, exec_buy, exec_sell]`. Only the
    /// HLR model exposes it; the simple model returns `None` and the
    /// producer falls back to the aggregate type draw.
    #[must_use]
    pub fn per_level_weights(&self, state: &BookState) -> Option<Vec<f64>> {
        match self {
            IntensityModel::Simple(_) => None,
            IntensityModel::Hlr(params) => Some(hlr_weights(params, state)),
        }
    }
}

/// Per-level rate vector for the HLR model, already carrying the
/// imbalance and spread modifiers so the aggregate totals and the joint
/// draw agree on the same numbers.
fn hlr_weights(params: &HlrParams, state: &BookState) -> Vec<f64> {
    let k = params.levels;
    let tilt = params.imbalance_sensitivity * state.features.imbalance;
    let spread = f64::from(state.features.spread_ticks);
    let spread_mult = (params.spread_sensitivity * (spread - 1.0)).exp();
    let bid_add_mod = (1.0 - tilt).max(0.0) * spread_mult;
    let ask_add_mod = (1.0 + tilt).max(0.0) * spread_mult;

    let depth = |depths: &[u32], i: usize| depths.get(i).copied().unwrap_or(0) as usize;

    let mut weights = Vec::with_capacity(4 * k + 2);
    for i in 0..k {
        let n = depth(&state.bid_depths, i);
        weights.push(clamp_rate(params.add_bid[i].value(n) * bid_add_mod));
    }
    for i in 0..k {
        let n = depth(&state.ask_depths, i);
        weights.push(clamp_rate(params.add_ask[i].value(n) * ask_add_mod));
    }
    for i in 0..k {
        let n = depth(&state.bid_depths, i);
        weights.push(clamp_rate(params.cancel_bid[i].value(n)));
    }
    for i in 0..k {
        let n = depth(&state.ask_depths, i);
        weights.push(clamp_rate(params.cancel_ask[i].value(n)));
    }
    let ask0 = depth(&state.ask_depths, 0);
    let bid0 = depth(&state.bid_depths, 0);
    weights.push(clamp_rate(params.market_buy.value(ask0) / spread_mult));
    weights.push(clamp_rate(params.market_sell.value(bid0) / spread_mult));
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::book::{Book, BookSeed};

    fn state() -> BookState {
        Book::new(&BookSeed {
            p0_ticks: 10_000,
            levels_per_side: 3,
            initial_spread_ticks: 2,
            initial_depth: 10,
        })
        .state()
    }

    #[test]
    fn test_total_equals_sum_of_rates() {
        let model = IntensityModel::Simple(SimpleImbalanceParams::default());
        let intensities = model.compute(&state());
        let sum: f64 = intensities.as_array().iter().sum();
        assert!((intensities.total() - sum).abs() <= f64::EPSILON * sum);
    }

    #[test]
    fn test_balanced_book_is_symmetric() {
        let model = IntensityModel::Simple(SimpleImbalanceParams::default());
        let intensities = model.compute(&state());
        assert!((intensities.add_bid - intensities.add_ask).abs() < 1e-6);
        assert!((intensities.exec_buy - intensities.exec_sell).abs() < 1e-6);
        assert!((intensities.cancel_bid - intensities.cancel_ask).abs() < 1e-12);
    }

    #[test]
    fn test_bid_heavy_book_tilts_flow() {
        let mut book = Book::new(&BookSeed {
            p0_ticks: 10_000,
            levels_per_side: 3,
            initial_spread_ticks: 2,
            initial_depth: 10,
        });
        // Drain most of the ask queue: imbalance goes positive.
        for _ in 0..8 {
            book.apply(&crate::sim::events::EventRecord {
                ts_ns: 0,
                kind: crate::sim::events::EventType::CancelAsk,
                side: crate::sim::events::EventSide::Ask,
                price_ticks: book.best_ask(),
                qty: 1,
                order_id: 0,
                flags: crate::sim::events::EventFlags::empty(),
            });
        }
        let model = IntensityModel::Simple(SimpleImbalanceParams::default());
        let intensities = model.compute(&book.state());
        // Bid-heavy: fewer bid adds, more ask adds, sells dominate buys.
        assert!(intensities.add_ask > intensities.add_bid);
        assert!(intensities.exec_sell > intensities.exec_buy);
    }

    #[test]
    fn test_rates_never_below_floor() {
        let params = SimpleImbalanceParams {
            base_add: 0.0,
            base_cancel: 0.0,
            base_exec: 0.0,
            ..SimpleImbalanceParams::default()
        };
        let intensities = IntensityModel::Simple(params).compute(&state());
        for rate in intensities.as_array() {
            assert!(rate >= INTENSITY_FLOOR);
            assert!(rate.is_finite());
        }
    }

    #[test]
    fn test_spread_multiplier_shifts_mix() {
        let params = SimpleImbalanceParams {
            spread_sensitivity: -0.5,
            ..SimpleImbalanceParams::default()
        };
        let narrow = IntensityModel::Simple(params).compute(&state());

        let wide_seed = BookSeed {
            p0_ticks: 10_000,
            levels_per_side: 3,
            initial_spread_ticks: 6,
            initial_depth: 10,
        };
        let wide = IntensityModel::Simple(params).compute(&Book::new(&wide_seed).state());
        // Wider spread with negative sensitivity: fewer adds, more execs.
        assert!(wide.add_bid < narrow.add_bid);
        assert!(wide.exec_buy > narrow.exec_buy);
    }

    #[test]
    fn test_hlr_weight_vector_shape_and_order() {
        let params = HlrParams::default_with_levels(3);
        let model = IntensityModel::Hlr(params.clone());
        let s = state();
        let weights = model
            .per_level_weights(&s)
            .unwrap_or_else(|| panic!("hlr exposes weights"));
        assert_eq!(weights.len(), 4 * 3 + 2);

        let intensities = model.compute(&s);
        let from_weights: f64 = weights.iter().sum();
        assert!((intensities.total() - from_weights).abs() < 1e-9);

        // Segment sums match the aggregate rates.
        let add_bid: f64 = weights[0..3].iter().sum();
        assert!((intensities.add_bid - add_bid).abs() < 1e-12);
        assert!((intensities.exec_buy - weights[12]).abs() < 1e-12);
        assert!((intensities.exec_sell - weights[13]).abs() < 1e-12);
    }

    #[test]
    fn test_simple_model_has_no_weight_vector() {
        let model = IntensityModel::Simple(SimpleImbalanceParams::default());
        assert!(model.per_level_weights(&state()).is_none());
    }

    #[test]
    fn test_hlr_cancel_weight_follows_depth() {
        let params = HlrParams::default_with_levels(2);
        let model = IntensityModel::Hlr(params);
        let mut s = state();
        s.bid_depths = vec![0, 5];
        s.ask_depths = vec![5, 5];
        let weights = model
            .per_level_weights(&s)
            .unwrap_or_else(|| panic!("weights"));
        // cancel_bid_0 sees an empty queue: floor only.
        assert!(weights[4] <= INTENSITY_FLOOR);
        assert!(weights[5] > weights[4]);
    }
}
