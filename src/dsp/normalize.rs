//! Peak normalization and edge fades for a finished wave.

use std::f32::consts::PI;

use crate::params::RenderOptions;
use crate::wave::Wave;

/// Fade length as a fraction of the sample rate (2 ms).
pub const FADE_SECONDS: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    pub normalize: bool,
    /// Samples ramped at each end; 0 disables the fade.
    pub fade_samples: usize,
}

impl Normalizer {
    pub fn new(options: &RenderOptions, sample_rate: f64) -> Self {
        Normalizer {
            normalize: options.normalize,
            fade_samples: if options.fade { (FADE_SECONDS * sample_rate).floor() as usize } else { 0 },
        }
    }

    pub fn process(&self, wave: &mut Wave) {
        if self.normalize {
            normalize_peak(wave);
        }
        if self.fade_samples > 0 {
            fade_edges(wave, self.fade_samples);
        }
    }
}

/// Divide every sample by the peak magnitude. All-zero waves are left alone.
pub fn normalize_peak(wave: &mut Wave) {
    let peak = wave.peak();
    if peak == 0.0 || !peak.is_finite() {
        return;
    }
    for ch in &mut wave.data {
        for s in ch.iter_mut() {
            *s /= peak;
        }
    }
}

/// Raised-cosine ramp over the first and last `samples` of every channel,
/// clamped to half the channel length.
pub fn fade_edges(wave: &mut Wave, samples: usize) {
    for ch in &mut wave.data {
        let len = ch.len();
        let n = samples.min(len / 2);
        for i in 0..n {
            let gain = 0.5 - 0.5 * (PI * i as f32 / n as f32).cos();
            ch[i] *= gain;
            ch[len - 1 - i] *= gain;
        }
    }
}
