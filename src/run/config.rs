//! Run configuration: what to simulate, for how long, and where it goes.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::journal::DEFAULT_CHUNK_CAPACITY;
use crate::sim::{DEFAULT_MARKET_OPEN_NS, IntensityModel, TradingSession};
use crate::sink::BrokerConfig;

use super::RunError;

/// Seed distance between adjacent securities.
///
/// With `seed(i, j) = base + i·STRIDE + j`, runs of up to `STRIDE` days
/// never reuse a seed across securities.
pub const SEED_STRIDE: u64 = 8192;

/// Per-security book and flow parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Ticker symbol; also the journal subdirectory and bus subject key.
    pub symbol: String,
    /// Day-0 opening mid price in ticks.
    pub p0_ticks: i32,
    /// Price of one tick.
    pub tick_size: u32,
    /// Levels maintained per side.
    pub levels_per_side: usize,
    /// Opening spread in ticks.
    pub initial_spread_ticks: i32,
    /// Seeded depth per level.
    pub initial_depth: u32,
    /// Intensity model and parameters.
    pub intensity: IntensityModel,
    /// Add-level preference decay.
    #[serde(default = "default_level_alpha")]
    pub level_alpha: f64,
    /// Spread-improvement coefficient; 0 disables.
    #[serde(default)]
    pub spread_improve_coeff: f64,
    /// Probability of a depth resample after a best-price change.
    #[serde(default)]
    pub reinit_probability: f64,
    /// Poisson mean for resampled depths; 0 means `initial_depth`.
    #[serde(default)]
    pub reinit_depth_mean: f64,
    /// Timestamp offset added to every record (ns since midnight).
    #[serde(default = "default_market_open_ns")]
    pub market_open_ns: u64,
}

fn default_level_alpha() -> f64 {
    0.7
}

fn default_market_open_ns() -> u64 {
    DEFAULT_MARKET_OPEN_NS
}

fn default_speed() -> f64 {
    1.0
}

fn default_chunk_capacity() -> u32 {
    DEFAULT_CHUNK_CAPACITY
}

/// A full run: securities × business days under one base seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Base seed; per-session seeds derive from it.
    pub base_seed: u64,
    /// Number of business days to run; 0 means until stopped.
    pub num_days: u32,
    /// Session length in simulated seconds.
    pub session_seconds: u32,
    /// Output directory for journals and the manifest.
    pub out_dir: PathBuf,
    /// First calendar date; weekends roll forward to Monday.
    pub start_date: NaiveDate,
    /// The securities to simulate, one worker thread each.
    pub securities: Vec<SecurityConfig>,
    /// Records per journal chunk.
    #[serde(default = "default_chunk_capacity")]
    pub chunk_capacity: u32,
    /// Optional broker fanout.
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
    /// Pace event emission against the wall clock.
    #[serde(default)]
    pub realtime: bool,
    /// Realtime speed multiplier (2.0 = twice real time).
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Re-read each journal after close and record the read throughput.
    #[serde(default)]
    pub measure_read_back: bool,
}

impl RunConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, RunError> {
        let json = fs::read_to_string(path.as_ref()).map_err(|e| RunError::Io {
            message: e.to_string(),
            path: Some(path.as_ref().to_path_buf()),
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| RunError::InvalidConfig {
            message: format!("config parse failed: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations a run cannot honour.
    pub fn validate(&self) -> Result<(), RunError> {
        let invalid = |message: String| RunError::InvalidConfig { message };
        if self.securities.is_empty() {
            return Err(invalid("at least one security is required".to_string()));
        }
        for (i, a) in self.securities.iter().enumerate() {
            if a.symbol.is_empty() {
                return Err(invalid(format!("security {i} has an empty symbol")));
            }
            for b in &self.securities[i + 1..] {
                if a.symbol == b.symbol {
                    return Err(invalid(format!("duplicate symbol {}", a.symbol)));
                }
            }
        }
        if self.chunk_capacity == 0 {
            return Err(invalid("chunk_capacity must be at least 1".to_string()));
        }
        if self.realtime && !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(invalid(format!("invalid realtime speed {}", self.speed)));
        }
        for (i, security) in self.securities.iter().enumerate() {
            self.session_for(i, 0, security.p0_ticks)
                .validate()
                .map_err(|message| {
                    invalid(format!("security {}: {message}", security.symbol))
                })?;
            if let IntensityModel::Hlr(params) = &security.intensity {
                params.validate().map_err(|e| {
                    invalid(format!("security {}: {e}", security.symbol))
                })?;
            }
        }
        Ok(())
    }

    /// Deterministic per-session seed: `base + i·STRIDE + j`.
    #[must_use]
    pub fn seed_for(&self, security_idx: usize, day_idx: u32) -> u64 {
        self.base_seed + security_idx as u64 * SEED_STRIDE + u64::from(day_idx)
    }

    /// Build the session for one (security, day) with the given opening
    /// price (the previous close when chaining).
    #[must_use]
    pub fn session_for(&self, security_idx: usize, day_idx: u32, p0_ticks: i32) -> TradingSession {
        let security = &self.securities[security_idx];
        TradingSession {
            seed: self.seed_for(security_idx, day_idx),
            p0_ticks,
            session_seconds: self.session_seconds,
            levels_per_side: security.levels_per_side,
            tick_size: security.tick_size,
            initial_spread_ticks: security.initial_spread_ticks,
            initial_depth: security.initial_depth,
            intensity: security.intensity.clone(),
            level_alpha: security.level_alpha,
            spread_improve_coeff: security.spread_improve_coeff,
            reinit_probability: security.reinit_probability,
            reinit_depth_mean: security.reinit_depth_mean,
            market_open_ns: security.market_open_ns,
        }
    }
}
