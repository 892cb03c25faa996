//! Seeded random stream for phase generation.
//!
//! Wraps `ChaCha8Rng` so the same seed yields the same sequence on every
//! platform, including wasm32.

use std::f64::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic pseudorandom stream keyed by an integer seed.
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    /// Uniform f64 in [0, 1).
    pub fn random(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Uniform phase in [0, 2π).
    pub fn phase(&mut self) -> f64 {
        let phase = self.random() * TAU;
        // rounding can land exactly on TAU for values just below 1.0
        if phase >= TAU { 0.0 } else { phase }
    }
}
