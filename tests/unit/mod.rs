//! Integration test aggregator.

mod determinism_tests;
mod journal_roundtrip_tests;
mod runner_tests;
mod wire_tests;

use qrsdp::prelude::*;

/// The reference single-day configuration used across integration tests.
pub fn reference_session(seed: u64) -> TradingSession {
    TradingSession {
        seed,
        p0_ticks: 10_000,
        session_seconds: 30,
        levels_per_side: 5,
        tick_size: 100,
        initial_spread_ticks: 2,
        initial_depth: 50,
        intensity: IntensityModel::Simple(SimpleImbalanceParams {
            base_add: 20.0,
            base_cancel: 0.1,
            base_exec: 5.0,
            exec_epsilon: 0.2,
            imbalance_sensitivity: 1.0,
            cancel_depth_sensitivity: 1.0,
            spread_sensitivity: 0.0,
            neutral_spread: 1.0,
        }),
        level_alpha: 0.7,
        spread_improve_coeff: 0.0,
        reinit_probability: 0.0,
        reinit_depth_mean: 0.0,
        market_open_ns: DEFAULT_MARKET_OPEN_NS,
    }
}
