//! Randomize presets: bulk-overwrite parameter groups before a re-render.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::params::{FilterType, ModulationType, ParameterSet, SEED_MAX};

/// Which parameter group a randomize action rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RandomizeMode {
    /// Wave-table and filter settings tuned toward a choir-like pad.
    Choir,
    /// Base frequency, bandwidth and seed.
    PadsynthOnly,
    SeedOnly,
    /// `PadsynthOnly` followed by `Choir`.
    All,
}

const CHOIR_FILTERS: [FilterType; 8] = [
    FilterType::LowPass1,
    FilterType::BandStop1,
    FilterType::LowPass2,
    FilterType::BandStop2,
    FilterType::Cos,
    FilterType::Sin,
    FilterType::LowShelf,
    FilterType::Peaking,
];

/// Overwrite the fields `mode` covers. Everything else is left as is.
pub fn randomize<R: Rng + ?Sized>(params: &mut ParameterSet, mode: RandomizeMode, rng: &mut R) {
    match mode {
        RandomizeMode::Choir => choir(params, rng),
        RandomizeMode::PadsynthOnly => padsynth(params, rng),
        RandomizeMode::SeedOnly => params.seed = rng.gen_range(0..=SEED_MAX),
        RandomizeMode::All => {
            padsynth(params, rng);
            choir(params, rng);
        }
    }
}

fn padsynth<R: Rng + ?Sized>(params: &mut ParameterSet, rng: &mut R) {
    params.base_frequency = rng.gen_range(1.0..=1000.0);
    params.bandwidth = rng.gen_range(0.01..=200.0);
    params.seed = rng.gen_range(0..=SEED_MAX);
}

fn choir<R: Rng + ?Sized>(params: &mut ParameterSet, rng: &mut R) {
    // half the draws land below zero and pin the shape param to 0
    params.base_shape_param = rng.gen_range(-0.32..0.32_f64).clamp(0.0, 1.0);
    params.modulation = ModulationType::Sine;
    params.mod_p1 = 36.0 / 127.0;
    params.mod_p2 = 68.0 / 127.0;
    params.mod_p3 = 89.0 / 127.0;
    params.filter_type = CHOIR_FILTERS.choose(rng).copied().unwrap_or(FilterType::LowPass1);
    params.filter_cutoff = rng.gen_range(0.78125..1.0);
    params.filter_q = rng.gen_range(0.12..0.16);
    params.harmonic_shift = rng.gen_range(7..=15);
    params.adaptive_harmonics = true;
    params.adaptive_base_freq = rng.gen_range(0.7..1.2_f64).min(1.0);
    params.adaptive_power = rng.gen_range(0.3..1.0);
}
