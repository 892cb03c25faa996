//! Inverse synthesizer: half-spectrum → one loopable buffer.
//!
//! The spectrum is rendered at the oversampled rate, then band-limited
//! and decimated back to the output rate in the frequency domain. Both
//! steps treat the buffer as periodic, so the result loops seamlessly.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::harmonics::Harmonic;
use crate::params::{ParameterSet, RenderLength};

/// Buffer geometry for one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthWindow {
    /// Oversampled length (transform size).
    pub len: usize,
    /// Length after decimation.
    pub output_len: usize,
    pub over_sampling: usize,
    /// Position of the fundamental, in bins. Harmonic `h` sits at `h * fundamental_bin`.
    pub fundamental_bin: f64,
    /// Buffer holds exactly one period, so every harmonic owns one bin.
    pub single_period: bool,
}

impl SynthWindow {
    pub fn for_params(params: &ParameterSet) -> Self {
        let over_sampling = params.over_sampling.max(1) as usize;
        let single_period = params.length == RenderLength::SinglePeriod;
        let (output_len, fundamental_bin) = match params.length {
            RenderLength::SinglePeriod => {
                let period = (params.sample_rate / params.base_frequency).round();
                ((period as usize).max(2), 1.0)
            }
            RenderLength::Seconds(seconds) => {
                let output_len = smooth_length(params.sample_rate * seconds);
                let len = output_len * over_sampling;
                (output_len, params.base_frequency * len as f64 / params.render_rate())
            }
        };
        SynthWindow {
            len: output_len * over_sampling,
            output_len,
            over_sampling,
            fundamental_bin,
            single_period,
        }
    }

    /// Number of half-spectrum bins, DC through Nyquist.
    pub fn bins(&self) -> usize {
        self.len / 2 + 1
    }
}

/// Smallest integer ≥ `target` (and ≥ 2) whose prime factors are all ≤ 7.
pub fn smooth_length(target: f64) -> usize {
    let mut n = (target.ceil() as usize).max(2);
    loop {
        let mut m = n;
        for p in [2, 3, 5, 7] {
            while m % p == 0 {
                m /= p;
            }
        }
        if m == 1 {
            return n;
        }
        n += 1;
    }
}

/// Performs the inverse transform and decimation, reusing FFT plans.
pub struct InverseSynthesizer {
    planner: FftPlanner<f64>,
}

impl InverseSynthesizer {
    pub fn new() -> Self {
        InverseSynthesizer { planner: FftPlanner::new() }
    }

    /// Bin `k` with amplitude `a` and phase `φ` becomes `a·cos(2πkn/len + φ)`.
    /// DC and Nyquist are left empty.
    pub fn inverse(&mut self, bins: &[Harmonic], len: usize) -> Vec<f64> {
        let mut spectrum = vec![Complex::new(0.0, 0.0); len];
        for (k, bin) in bins.iter().enumerate().skip(1) {
            if 2 * k >= len {
                break;
            }
            let c = Complex::from_polar(0.5 * bin.amplitude, bin.phase);
            spectrum[k] = c;
            spectrum[len - k] = c.conj();
        }
        let ifft: Arc<dyn Fft<f64>> = self.planner.plan_fft_inverse(len);
        ifft.process(&mut spectrum);
        spectrum.iter().map(|c| c.re).collect()
    }

    /// Low-pass below the target Nyquist and keep every `len/output_len`-th
    /// sample, done as spectral truncation of the periodic buffer.
    pub fn decimate(&mut self, samples: &[f64], output_len: usize) -> Vec<f64> {
        let len = samples.len();
        if output_len >= len {
            return samples.to_vec();
        }
        let mut spectrum: Vec<Complex<f64>> =
            samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        self.planner.plan_fft_forward(len).process(&mut spectrum);

        let scale = 1.0 / len as f64;
        let mut reduced = vec![Complex::new(0.0, 0.0); output_len];
        reduced[0] = spectrum[0] * scale;
        for k in 1..output_len {
            // strictly below the output Nyquist
            if 2 * k >= output_len {
                break;
            }
            reduced[k] = spectrum[k] * scale;
            reduced[output_len - k] = spectrum[len - k] * scale;
        }
        self.planner.plan_fft_inverse(output_len).process(&mut reduced);
        reduced.iter().map(|c| c.re).collect()
    }
}

impl Default for InverseSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}
