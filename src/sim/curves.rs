//! Queue-indexed intensity curves for the queue-reactive (HLR) model.
//!
//! A curve is a table of non-negative rates indexed by queue size, plus a
//! tail rule for sizes beyond the table. Curve sets load from JSON (the
//! output of the calibration estimator) or fall back to a built-in default
//! family.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Behaviour of a curve for queue sizes beyond the last table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TailRule {
    /// Reuse the last table value.
    #[default]
    Flat,
    /// Return zero.
    Zero,
}

/// A table of non-negative rates indexed by queue size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityCurve {
    /// Rate at queue size `n`, for `n < values.len()`.
    pub values: Vec<f64>,
    /// Tail behaviour for `n >= values.len()`.
    #[serde(default)]
    pub tail: TailRule,
}

impl IntensityCurve {
    /// Build a curve from a rate function over `0..=n_max`.
    #[must_use]
    pub fn from_fn(n_max: usize, tail: TailRule, f: impl Fn(usize) -> f64) -> Self {
        Self {
            values: (0..=n_max).map(f).collect(),
            tail,
        }
    }

    /// Rate at queue size `n`, applying the tail rule past the table.
    #[must_use]
    pub fn value(&self, n: usize) -> f64 {
        match self.values.get(n) {
            Some(v) => *v,
            None => match self.tail {
                TailRule::Flat => self.values.last().copied().unwrap_or(0.0),
                TailRule::Zero => 0.0,
            },
        }
    }

    /// Largest tabulated queue size.
    #[must_use]
    pub fn n_max(&self) -> usize {
        self.values.len().saturating_sub(1)
    }

    fn check(&self, name: &str) -> Result<(), CurveError> {
        if self.values.is_empty() {
            return Err(CurveError {
                message: format!("curve {name} has no values"),
            });
        }
        for (n, v) in self.values.iter().enumerate() {
            if !v.is_finite() || *v < 0.0 {
                return Err(CurveError {
                    message: format!("curve {name} has invalid value {v} at queue size {n}"),
                });
            }
        }
        Ok(())
    }
}

/// Error raised when a curve set fails validation or fails to load.
#[derive(Debug)]
pub struct CurveError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl fmt::Display for CurveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intensity curve error: {}", self.message)
    }
}

impl std::error::Error for CurveError {}

/// Parameter set for the queue-reactive (HLR) intensity model.
///
/// Carries one add curve and one cancel curve per level per side, two
/// market-order curves keyed on the best opposite queue size, and the two
/// global sensitivities shared with the simple model (both default to 0,
/// leaving the model purely queue-reactive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlrParams {
    /// Add curves per bid level, index 0 = best.
    pub add_bid: Vec<IntensityCurve>,
    /// Add curves per ask level, index 0 = best.
    pub add_ask: Vec<IntensityCurve>,
    /// Cancel curves per bid level.
    pub cancel_bid: Vec<IntensityCurve>,
    /// Cancel curves per ask level.
    pub cancel_ask: Vec<IntensityCurve>,
    /// Market buy rate as a function of the best ask queue size.
    pub market_buy: IntensityCurve,
    /// Market sell rate as a function of the best bid queue size.
    pub market_sell: IntensityCurve,
    /// Number of levels per side the curves cover.
    pub levels: usize,
    /// Largest tabulated queue size.
    pub n_max: usize,
    /// Imbalance sensitivity applied to the add totals (0 disables).
    #[serde(default)]
    pub imbalance_sensitivity: f64,
    /// Spread sensitivity applied to adds and executions (0 disables).
    #[serde(default)]
    pub spread_sensitivity: f64,
}

/// Default largest tabulated queue size.
const DEFAULT_N_MAX: usize = 20;

impl HlrParams {
    /// Built-in default curve family for `levels` levels per side.
    ///
    /// Adds decay with queue size and with level depth, cancels grow
    /// linearly with queue size, market orders decay with the opposite
    /// best queue. The family is a sane starting point, not a calibration.
    #[must_use]
    pub fn default_with_levels(levels: usize) -> Self {
        let n_max = DEFAULT_N_MAX;
        let level_scale = |k: usize| (-0.6 * k as f64).exp();
        let add = |k: usize| {
            IntensityCurve::from_fn(n_max, TailRule::Flat, move |n| {
                8.0 * level_scale(k) / (1.0 + 0.15 * n as f64)
            })
        };
        let cancel = |k: usize| {
            IntensityCurve::from_fn(n_max, TailRule::Flat, move |n| {
                0.25 * level_scale(k) * n as f64
            })
        };
        let market =
            || IntensityCurve::from_fn(n_max, TailRule::Flat, |n| 3.0 / (1.0 + 0.1 * n as f64));

        Self {
            add_bid: (0..levels).map(add).collect(),
            add_ask: (0..levels).map(add).collect(),
            cancel_bid: (0..levels).map(cancel).collect(),
            cancel_ask: (0..levels).map(cancel).collect(),
            market_buy: market(),
            market_sell: market(),
            levels,
            n_max,
            imbalance_sensitivity: 0.0,
            spread_sensitivity: 0.0,
        }
    }

    /// Load a curve set from a JSON string and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, CurveError> {
        let params: Self = serde_json::from_str(json).map_err(|e| CurveError {
            message: format!("curve JSON parse failed: {e}"),
        })?;
        params.validate()?;
        Ok(params)
    }

    /// Load a curve set from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CurveError> {
        let json = fs::read_to_string(path.as_ref()).map_err(|e| CurveError {
            message: format!("cannot read {}: {e}", path.as_ref().display()),
        })?;
        Self::from_json_str(&json)
    }

    /// Check structural consistency and value ranges.
    ///
    /// Also warns when `cancel(n_max) ≤ add(n_max)` at any level: with a
    /// `FLAT` tail such a pair lets queue depth grow without bound.
    pub fn validate(&self) -> Result<(), CurveError> {
        if self.levels == 0 {
            return Err(CurveError {
                message: "levels must be at least 1".to_string(),
            });
        }
        for (name, curves) in [
            ("add_bid", &self.add_bid),
            ("add_ask", &self.add_ask),
            ("cancel_bid", &self.cancel_bid),
            ("cancel_ask", &self.cancel_ask),
        ] {
            if curves.len() != self.levels {
                return Err(CurveError {
                    message: format!(
                        "{name} has {} curves but levels = {}",
                        curves.len(),
                        self.levels
                    ),
                });
            }
            for (k, curve) in curves.iter().enumerate() {
                curve.check(&format!("{name}[{k}]"))?;
            }
        }
        self.market_buy.check("market_buy")?;
        self.market_sell.check("market_sell")?;

        for (k, (add, cancel)) in [
            (&self.add_bid, &self.cancel_bid),
            (&self.add_ask, &self.cancel_ask),
        ]
        .into_iter()
        .flat_map(|(a, c)| a.iter().zip(c.iter()))
        .enumerate()
        {
            if cancel.value(self.n_max) <= add.value(self.n_max) {
                warn!(
                    level = k % self.levels,
                    "cancel(n_max) <= add(n_max); depth may grow unboundedly under a FLAT tail"
                );
            }
        }
        Ok(())
    }
}
