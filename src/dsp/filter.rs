//! Spectral filter: closed-form magnitude responses over harmonic amplitudes.
//!
//! The second-order responses are the analog prototypes of the Audio EQ
//! Cookbook biquads, evaluated directly as magnitudes rather than run as
//! an IIR over time. Frequencies are normalized so 1.0 is the output
//! Nyquist.

use crate::params::FilterType;

/// A magnitude response with its corner and resonance resolved from
/// the normalized UI controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralFilter {
    pub filter_type: FilterType,
    /// Corner frequency, normalized to Nyquist.
    pub cutoff: f64,
    /// Resonance / slope.
    pub q: f64,
    /// Linear gain for the shelf and peaking types.
    pub gain: f64,
}

impl SpectralFilter {
    /// Resolve `cutoff` and `q` (both in [0, 1]) into filter coordinates.
    pub fn new(filter_type: FilterType, cutoff: f64, q: f64) -> Self {
        let gain_db = (q - 0.5) * 48.0;
        SpectralFilter {
            filter_type,
            cutoff: 2.0_f64.powf(10.0 * (cutoff - 1.0)),
            q: 0.5 + 19.5 * q,
            gain: 10.0_f64.powf(gain_db / 20.0),
        }
    }

    /// Magnitude at normalized frequency `x`. Never negative.
    pub fn magnitude(&self, x: f64) -> f64 {
        let r = x.max(1e-9) / self.cutoff;
        let octaves = r.log2();
        let m = match self.filter_type {
            FilterType::None => 1.0,
            FilterType::LowPass1 => 1.0 / (1.0 + r * r).sqrt(),
            FilterType::HighPass1a => r / (1.0 + r * r).sqrt(),
            FilterType::HighPass1b => 1.0 - 1.0 / (1.0 + r * r).sqrt(),
            FilterType::BandPass1 => (-octaves * octaves * self.q * 0.25).exp(),
            FilterType::BandStop1 => 1.0 - (-octaves * octaves * self.q * 0.25).exp(),
            FilterType::LowPass2 => 1.0 / self.resonant_denominator(r),
            FilterType::HighPass2 => r * r / self.resonant_denominator(r),
            FilterType::BandPass2 => (r / self.q) / self.resonant_denominator(r),
            FilterType::BandStop2 => (1.0 - r * r).abs() / self.resonant_denominator(r),
            FilterType::Cos => (std::f64::consts::FRAC_PI_2 * r).cos().abs().powf(self.q * 0.5),
            FilterType::Sin => (std::f64::consts::FRAC_PI_2 * r).sin().abs().powf(self.q * 0.5),
            FilterType::LowShelf => 1.0 + (self.gain - 1.0) / (1.0 + r * r),
            FilterType::Peaking => 1.0 + (self.gain - 1.0) * (-octaves * octaves * 4.0).exp(),
        };
        m.max(0.0)
    }

    fn resonant_denominator(&self, r: f64) -> f64 {
        let a = 1.0 - r * r;
        let b = r / self.q;
        (a * a + b * b).sqrt().max(1e-9)
    }

    /// Scale each amplitude by the response at its harmonic.
    ///
    /// `amplitudes[k]` is harmonic `k + 1`, which sits at
    /// `(k + 1) * base_frequency / nyquist`.
    pub fn apply(&self, amplitudes: &[f64], base_frequency: f64, nyquist: f64) -> Vec<f64> {
        if self.filter_type == FilterType::None {
            return amplitudes.to_vec();
        }
        amplitudes
            .iter()
            .enumerate()
            .map(|(k, &a)| {
                let x = (k + 1) as f64 * base_frequency / nyquist;
                (a * self.magnitude(x)).max(0.0)
            })
            .collect()
    }
}
