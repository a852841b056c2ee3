//! Deterministic random sampling: timing and event selection.
//!
//! All randomness in a producer flows through one [`SimRng`] handle seeded
//! once at session start. The call order per event step is fixed (Δt, then
//! the type or joint type+level draw, then attributes, then the reinit coin
//! flip) and is part of the determinism contract: two sessions with the
//! same configuration produce byte-identical event streams.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::events::EventType;
use super::intensity::Intensities;

/// Sentinel Δt (seconds) returned when the total intensity is non-positive
/// or non-finite; large enough to end any session harmlessly.
pub const DEAD_SESSION_DT: f64 = 1e9;

/// Lower clamp applied to the uniform draw before the log transform.
const MIN_UNIFORM: f64 = 1e-10;

/// A deterministic, seedable random source owned by exactly one producer.
///
/// Wraps a `ChaCha8Rng` seeded from the session seed. Every helper that
/// needs randomness (exponential waiting times, categorical draws, Poisson
/// depth resampling) takes this handle explicitly, so the draw sequence is
/// visible in the call graph.
#[derive(Debug, Clone)]
pub struct SimRng {
    inner: ChaCha8Rng,
}

impl SimRng {
    /// Seed a fresh generator for one session.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Next uniform double in `[0, 1)`.
    #[inline]
    pub fn next_unit(&mut self) -> f64 {
        self.inner.random::<f64>()
    }

    /// Draw from a Poisson distribution by Knuth inversion.
    ///
    /// Uses only [`next_unit`](Self::next_unit) draws so the consumed
    /// stream is fully determined by the call sequence. Non-positive or
    /// non-finite means yield 0.
    pub fn poisson(&mut self, mean: f64) -> u32 {
        if !mean.is_finite() || mean <= 0.0 {
            return 0;
        }
        let limit = (-mean).exp();
        let mut k: u32 = 0;
        let mut p = 1.0f64;
        loop {
            p *= self.next_unit();
            if p <= limit {
                return k;
            }
            k = k.saturating_add(1);
        }
    }
}

/// Draw an exponential waiting time for the given total intensity.
///
/// The uniform is clamped to `[1e-10, 1 − ε)` before the log transform so
/// the result is always finite and positive. A non-positive or non-finite
/// total returns [`DEAD_SESSION_DT`] without consuming a draw.
#[must_use]
pub fn sample_delta_t(rng: &mut SimRng, total: f64) -> f64 {
    if !total.is_finite() || total <= 0.0 {
        return DEAD_SESSION_DT;
    }
    let u = rng.next_unit().clamp(MIN_UNIFORM, 1.0 - f64::EPSILON);
    -u.ln() / total
}

/// Draw an event type from the six intensities in canonical order.
///
/// Cumulative-sum categorical draw; the last type is the fallback when
/// floating-point rounding leaves the target above the final cumulative.
#[must_use]
pub fn sample_event_type(rng: &mut SimRng, intensities: &Intensities) -> EventType {
    let rates = intensities.as_array();
    let idx = sample_index_from_weights(rng, &rates);
    EventType::ALL[idx]
}

/// Draw an index from an arbitrary non-negative weight vector.
///
/// Used for the HLR joint type+level draw over the `4K + 2` flat weight
/// vector. The final index is the rounding fallback. An empty slice
/// returns 0 without consuming a draw.
#[must_use]
pub fn sample_index_from_weights(rng: &mut SimRng, weights: &[f64]) -> usize {
    if weights.is_empty() {
        return 0;
    }
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return weights.len() - 1;
    }
    let target = rng.next_unit() * total;
    let mut cumulative = 0.0f64;
    for (idx, w) in weights.iter().enumerate() {
        cumulative += w;
        if target < cumulative {
            return idx;
        }
    }
    weights.len() - 1
}
