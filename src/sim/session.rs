//! Per-day, per-security session configuration.

use serde::{Deserialize, Serialize};

use super::book::BookSeed;
use super::intensity::IntensityModel;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Default market-open offset: 09:30:00 as nanoseconds since midnight.
pub const DEFAULT_MARKET_OPEN_NS: u64 = 34_200 * NANOS_PER_SEC;

/// Everything a producer needs to run one trading day for one security.
///
/// Constructed by the runner once per (security, day); plain data, cheap
/// to clone. Given identical fields (seed included) the produced event
/// stream is byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSession {
    /// RNG seed for this session.
    pub seed: u64,
    /// Opening mid price in ticks (the previous close when chaining days).
    pub p0_ticks: i32,
    /// Session length in simulated seconds.
    pub session_seconds: u32,
    /// Levels maintained per side.
    pub levels_per_side: usize,
    /// Price of one tick in the venue's smallest currency unit.
    pub tick_size: u32,
    /// Opening spread in ticks.
    pub initial_spread_ticks: i32,
    /// Seeded depth per level, also the refill depth after shifts.
    pub initial_depth: u32,
    /// The intensity model driving event rates.
    pub intensity: IntensityModel,
    /// Add-level preference decay for the attribute sampler.
    #[serde(default = "default_level_alpha")]
    pub level_alpha: f64,
    /// Spread-improvement coefficient; 0 disables the branch.
    #[serde(default)]
    pub spread_improve_coeff: f64,
    /// Probability of a depth resample after a best-price change.
    #[serde(default)]
    pub reinit_probability: f64,
    /// Poisson mean for resampled depths; 0 means use `initial_depth`.
    #[serde(default)]
    pub reinit_depth_mean: f64,
    /// Offset added to every emitted timestamp (ns since midnight).
    #[serde(default = "default_market_open_ns")]
    pub market_open_ns: u64,
}

fn default_level_alpha() -> f64 {
    0.7
}

fn default_market_open_ns() -> u64 {
    DEFAULT_MARKET_OPEN_NS
}

impl TradingSession {
    /// The book geometry implied by this session.
    #[must_use]
    pub fn book_seed(&self) -> BookSeed {
        BookSeed {
            p0_ticks: self.p0_ticks,
            levels_per_side: self.levels_per_side,
            initial_spread_ticks: self.initial_spread_ticks,
            initial_depth: self.initial_depth,
        }
    }

    /// Effective Poisson mean for queue-reactive depth resampling.
    #[must_use]
    pub fn effective_reinit_mean(&self) -> f64 {
        if self.reinit_depth_mean > 0.0 {
            self.reinit_depth_mean
        } else {
            f64::from(self.initial_depth)
        }
    }

    /// Reject geometries the book cannot represent.
    pub fn validate(&self) -> Result<(), String> {
        if self.levels_per_side == 0 {
            return Err("levels_per_side must be at least 1".to_string());
        }
        if self.initial_spread_ticks < 1 {
            return Err("initial_spread_ticks must be at least 1".to_string());
        }
        if self.session_seconds == 0 {
            return Err("session_seconds must be positive".to_string());
        }
        if self.tick_size == 0 {
            return Err("tick_size must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.reinit_probability) {
            return Err("reinit_probability must be in [0, 1]".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::intensity::SimpleImbalanceParams;

    fn session() -> TradingSession {
        TradingSession {
            seed: 42,
            p0_ticks: 10_000,
            session_seconds: 30,
            levels_per_side: 5,
            tick_size: 100,
            initial_spread_ticks: 2,
            initial_depth: 50,
            intensity: IntensityModel::Simple(SimpleImbalanceParams::default()),
            level_alpha: 0.7,
            spread_improve_coeff: 0.0,
            reinit_probability: 0.0,
            reinit_depth_mean: 0.0,
            market_open_ns: DEFAULT_MARKET_OPEN_NS,
        }
    }

    #[test]
    fn test_validate_accepts_sane_session() {
        assert!(session().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_geometry() {
        let mut s = session();
        s.levels_per_side = 0;
        assert!(s.validate().is_err());

        let mut s = session();
        s.initial_spread_ticks = 0;
        assert!(s.validate().is_err());

        let mut s = session();
        s.reinit_probability = 1.5;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_reinit_mean_defaults_to_initial_depth() {
        let mut s = session();
        assert_eq!(s.effective_reinit_mean(), 50.0);
        s.reinit_depth_mean = 12.5;
        assert_eq!(s.effective_reinit_mean(), 12.5);
    }

    #[test]
    fn test_session_json_roundtrip() {
        let s = session();
        let json = serde_json::to_string(&s).unwrap_or_default();
        let back: TradingSession =
            serde_json::from_str(&json).unwrap_or_else(|e| panic!("parse: {e}"));
        assert_eq!(back.seed, 42);
        assert_eq!(back.market_open_ns, DEFAULT_MARKET_OPEN_NS);
    }
}
