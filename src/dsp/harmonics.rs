//! Harmonic profile: per-harmonic amplitudes and the PADsynth spread.
//!
//! Amplitudes come from the magnitude spectrum of one period of the
//! modulated base shape, weighted by the overtone envelope and remapped
//! by the harmonic shift. `spread` gives every bin of the window a seeded
//! phase, then turns every harmonic into spectrum according to the pad
//! type: a Gaussian band, or a handful of detuned partials.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

use super::random::SeededRandom;
use super::shape::{SHAPE_TABLE_SIZE, sample_period};
use super::synth::SynthWindow;
use crate::params::{PadType, ParameterSet};

/// Highest harmonic the shape table can resolve.
pub const MAX_HARMONICS: usize = SHAPE_TABLE_SIZE / 2 - 1;

/// Gaussian bands are cut off at this many standard deviations.
const SPREAD_SIGMAS: f64 = 4.0;
const MIN_SIGMA_BINS: f64 = 0.5;

/// Detuned partials per harmonic for `PadType::AdditiveChoir`.
pub const CHOIR_VOICES: usize = 3;

/// One spectral bin: linear magnitude and phase in [0, 2π).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Harmonic {
    pub amplitude: f64,
    pub phase: f64,
}

/// Harmonics that fit below the output Nyquist, at least one.
pub fn nyquist_harmonics(sample_rate: f64, base_frequency: f64) -> usize {
    let fit = (0.5 * sample_rate / base_frequency).floor();
    (fit as usize).clamp(1, MAX_HARMONICS)
}

/// Harmonic count under the adaptive policy.
///
/// The reference pitch spans 30 Hz to ~30 kHz over `adaptive_base_freq`;
/// above it the count falls off as `(f_ref / f)^e`. Never below one.
pub fn adaptive_harmonics(
    max_count: usize,
    base_frequency: f64,
    adaptive_base_freq: f64,
    adaptive_power: f64,
) -> usize {
    let reference = 30.0 * 2.0_f64.powf(10.0 * adaptive_base_freq);
    let exponent = 0.25 + 2.0 * adaptive_power;
    let ratio = (reference / base_frequency).powf(exponent).min(1.0);
    ((max_count as f64 * ratio).floor() as usize).max(1)
}

/// Builds the per-harmonic amplitudes and the spread spectrum for one channel.
pub struct HarmonicProfileBuilder<'a> {
    params: &'a ParameterSet,
}

impl<'a> HarmonicProfileBuilder<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        HarmonicProfileBuilder { params }
    }

    pub fn harmonic_count(&self) -> usize {
        let p = self.params;
        let max_count = nyquist_harmonics(p.sample_rate, p.base_frequency);
        if p.adaptive_harmonics {
            adaptive_harmonics(max_count, p.base_frequency, p.adaptive_base_freq, p.adaptive_power)
        } else {
            max_count
        }
    }

    /// Magnitudes of harmonics 1..=MAX_HARMONICS of the modulated base
    /// shape, scaled so the strongest is 1.
    pub fn shape_amplitudes(&self) -> Vec<f64> {
        let p = self.params;
        let table = sample_period(p.base_shape, p.base_shape_param, p.modulation, p.mod_p1, p.mod_p2, p.mod_p3);
        let mut spectrum: Vec<Complex<f64>> = table.iter().map(|&s| Complex::new(s, 0.0)).collect();
        FftPlanner::new().plan_fft_forward(SHAPE_TABLE_SIZE).process(&mut spectrum);

        let mut amplitudes: Vec<f64> = spectrum[1..=MAX_HARMONICS].iter().map(|c| c.norm()).collect();
        let peak = amplitudes.iter().fold(0.0_f64, |m, &a| m.max(a));
        if peak > 0.0 {
            for a in &mut amplitudes {
                *a /= peak;
            }
        }
        amplitudes
    }

    /// Amplitude of each rendered harmonic; index 0 is the fundamental.
    ///
    /// Output harmonic `k` takes source `k - harmonic_shift`; sources
    /// outside the harmonic count contribute silence.
    pub fn amplitudes(&self) -> Vec<f64> {
        let count = self.harmonic_count();
        let shape = self.shape_amplitudes();
        let envelope = self.params.overtone_envelope.as_deref().filter(|e| !e.is_empty());

        let source: Vec<f64> = (0..count)
            .map(|k| {
                let gain = envelope.map_or(1.0, |e| e[k.min(e.len() - 1)]);
                shape[k] * gain
            })
            .collect();

        let shift = self.params.harmonic_shift as i64;
        (0..count as i64)
            .map(|k| {
                let src = k - shift;
                if (0..count as i64).contains(&src) { source[src as usize] } else { 0.0 }
            })
            .collect()
    }

    /// Draw one phase per bin in ascending bin order, then place every
    /// harmonic's energy according to the pad type.
    pub fn spread(&self, amplitudes: &[f64], window: &SynthWindow, rng: &mut SeededRandom) -> Vec<Harmonic> {
        let mut spectrum: Vec<Harmonic> = (0..window.bins())
            .map(|_| Harmonic { amplitude: 0.0, phase: rng.phase() })
            .collect();
        // highest bin strictly below Nyquist
        let last = (window.len / 2).saturating_sub(1);
        if last == 0 {
            return spectrum;
        }
        match self.params.pad_type {
            PadType::FrequencyShiftChoir => self.gaussian_bands(&mut spectrum, amplitudes, window, last),
            PadType::AdditiveChoir => self.detuned_partials(&mut spectrum, amplitudes, window, last, rng),
        }
        spectrum
    }

    /// Each harmonic becomes a Gaussian band whose total energy equals
    /// `amplitude²`, so loudness does not depend on bandwidth or on `h`.
    fn gaussian_bands(&self, spectrum: &mut [Harmonic], amplitudes: &[f64], window: &SynthWindow, last: usize) {
        let width = 2.0_f64.powf(self.params.bandwidth / 1200.0) - 1.0;

        for (k, &amplitude) in amplitudes.iter().enumerate() {
            if amplitude <= 0.0 {
                continue;
            }
            if window.single_period {
                if k < last {
                    spectrum[k + 1].amplitude += amplitude;
                }
                continue;
            }

            let center = (k + 1) as f64 * window.fundamental_bin;
            let sigma = (width * center).max(MIN_SIGMA_BINS);
            let lo = (center - SPREAD_SIGMAS * sigma).ceil().max(1.0) as usize;
            let hi = ((center + SPREAD_SIGMAS * sigma).floor().max(0.0) as usize).min(last);
            if lo > hi {
                continue;
            }

            let profile: Vec<f64> = (lo..=hi)
                .map(|i| {
                    let d = (i as f64 - center) / sigma;
                    (-d * d).exp()
                })
                .collect();
            let energy: f64 = profile.iter().map(|g| g * g).sum();
            if energy <= 0.0 {
                continue;
            }
            let scale = amplitude / energy.sqrt();
            for (bin, g) in spectrum[lo..=hi].iter_mut().zip(&profile) {
                bin.amplitude += scale * g;
            }
        }
    }

    /// Each harmonic becomes `CHOIR_VOICES` partials, each detuned by up to
    /// `±bandwidth` cents and snapped to the nearest bin. Detunes are drawn
    /// for every harmonic, silent or not, so muting one does not move the rest.
    fn detuned_partials(
        &self,
        spectrum: &mut [Harmonic],
        amplitudes: &[f64],
        window: &SynthWindow,
        last: usize,
        rng: &mut SeededRandom,
    ) {
        let voice_gain = (CHOIR_VOICES as f64).sqrt().recip();
        for (k, &amplitude) in amplitudes.iter().enumerate() {
            let center = (k + 1) as f64 * window.fundamental_bin;
            for _ in 0..CHOIR_VOICES {
                let cents = (2.0 * rng.random() - 1.0) * self.params.bandwidth;
                let bin = (center * 2.0_f64.powf(cents / 1200.0)).round();
                if amplitude > 0.0 && bin >= 1.0 && bin <= last as f64 {
                    spectrum[bin as usize].amplitude += amplitude * voice_gain;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{BaseShape, ModulationType, OVERTONE_ENVELOPE_LEN, PadType, RenderLength};

    fn plain(base_frequency: f64) -> ParameterSet {
        ParameterSet {
            base_frequency,
            base_shape: BaseShape::Saw,
            base_shape_param: 0.0,
            modulation: ModulationType::None,
            harmonic_shift: 0,
            adaptive_harmonics: false,
            length: RenderLength::SinglePeriod,
            over_sampling: 1,
            ..Default::default()
        }
    }

    #[test]
    fn sine_shape_has_only_a_fundamental() {
        let params = ParameterSet { base_shape: BaseShape::Sine, ..plain(220.0) };
        let amps = HarmonicProfileBuilder::new(&params).shape_amplitudes();
        assert!((amps[0] - 1.0).abs() < 1e-9);
        for (k, &a) in amps.iter().enumerate().skip(1) {
            assert!(a < 1e-9, "harmonic {} should be silent, got {a}", k + 1);
        }
    }

    #[test]
    fn saw_harmonics_fall_off() {
        let params = plain(220.0);
        let amps = HarmonicProfileBuilder::new(&params).shape_amplitudes();
        assert!(amps[0] > amps[1] && amps[1] > amps[3] && amps[3] > amps[9]);
    }

    #[test]
    fn fixed_count_follows_nyquist() {
        let builder_params = plain(441.0);
        let builder = HarmonicProfileBuilder::new(&builder_params);
        assert_eq!(builder.harmonic_count(), 50);
        assert_eq!(nyquist_harmonics(44100.0, 30000.0), 1);
        assert_eq!(nyquist_harmonics(44100.0, 1.0), MAX_HARMONICS);
    }

    #[test]
    fn adaptive_count_is_non_increasing_in_pitch() {
        let mut previous = usize::MAX;
        for i in 1..400 {
            let f = i as f64 * 5.0;
            let max_count = nyquist_harmonics(44100.0, f);
            let count = adaptive_harmonics(max_count, f, 0.4, 0.6);
            assert!(count >= 1);
            assert!(count <= previous, "count rose from {previous} to {count} at {f} Hz");
            previous = count;
        }
    }

    #[test]
    fn adaptive_count_keeps_the_fundamental() {
        assert_eq!(adaptive_harmonics(100, 20000.0, 0.0, 1.0), 1);
    }

    #[test]
    fn shift_moves_amplitudes_up() {
        let base = plain(220.0);
        let shifted = ParameterSet { harmonic_shift: 3, ..base.clone() };
        let a = HarmonicProfileBuilder::new(&base).amplitudes();
        let b = HarmonicProfileBuilder::new(&shifted).amplitudes();
        assert_eq!(a.len(), b.len());
        assert_eq!(&b[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(b[3], a[0]);
        assert_eq!(b[10], a[7]);
    }

    #[test]
    fn shift_past_count_is_silent() {
        let base = plain(2205.0);
        let count = HarmonicProfileBuilder::new(&base).harmonic_count();
        for shift in [count as i32, count as i32 + 5, -(count as i32)] {
            let params = ParameterSet { harmonic_shift: shift, ..base.clone() };
            let amps = HarmonicProfileBuilder::new(&params).amplitudes();
            assert!(amps.iter().all(|&a| a == 0.0), "shift {shift} should silence everything");
        }
    }

    #[test]
    fn overtone_envelope_weights_harmonics() {
        let mut envelope = vec![0.0; OVERTONE_ENVELOPE_LEN];
        envelope[0] = 1.0;
        let params = ParameterSet { overtone_envelope: Some(envelope), ..plain(220.0) };
        let amps = HarmonicProfileBuilder::new(&params).amplitudes();
        assert!(amps[0] > 0.0);
        assert!(amps[1..].iter().all(|&a| a == 0.0));
    }

    #[test]
    fn envelope_index_clamps_to_last_entry() {
        let mut envelope = vec![0.0; OVERTONE_ENVELOPE_LEN];
        envelope[OVERTONE_ENVELOPE_LEN - 1] = 1.0;
        // 40 Hz leaves room for more harmonics than the envelope has entries
        let params = ParameterSet { overtone_envelope: Some(envelope), ..plain(40.0) };
        let builder = HarmonicProfileBuilder::new(&params);
        let amps = builder.amplitudes();
        let shape = builder.shape_amplitudes();
        assert!(amps.len() > OVERTONE_ENVELOPE_LEN);
        assert_eq!(amps[OVERTONE_ENVELOPE_LEN + 10], shape[OVERTONE_ENVELOPE_LEN + 10]);
        assert_eq!(amps[0], 0.0);
    }

    #[test]
    fn spread_draws_one_phase_per_bin() {
        let params = plain(441.0);
        let window = SynthWindow::for_params(&params);
        let builder = HarmonicProfileBuilder::new(&params);
        let amps = builder.amplitudes();
        let spectrum = builder.spread(&amps, &window, &mut SeededRandom::new(7));

        let mut rng = SeededRandom::new(7);
        for (i, bin) in spectrum.iter().enumerate() {
            assert_eq!(bin.phase.to_bits(), rng.phase().to_bits(), "phase mismatch at bin {i}");
        }
    }

    #[test]
    fn silent_bins_do_not_shift_phase_stream() {
        let params = plain(441.0);
        let window = SynthWindow::for_params(&params);
        let builder = HarmonicProfileBuilder::new(&params);
        let amps = builder.amplitudes();
        let mut muted = amps.clone();
        muted[2] = 0.0;
        muted[5] = 0.0;
        let a = builder.spread(&amps, &window, &mut SeededRandom::new(3));
        let b = builder.spread(&muted, &window, &mut SeededRandom::new(3));
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.phase, y.phase);
        }
    }

    #[test]
    fn spread_centers_harmonics_and_leaves_dc_empty() {
        let params = ParameterSet { length: RenderLength::Seconds(0.1), ..plain(441.0) };
        let window = SynthWindow::for_params(&params);
        let builder = HarmonicProfileBuilder::new(&params);
        let amps = vec![1.0];
        let spectrum = builder.spread(&amps, &window, &mut SeededRandom::new(0));
        assert_eq!(spectrum[0].amplitude, 0.0);
        assert_eq!(spectrum[spectrum.len() - 1].amplitude, 0.0);

        let center = window.fundamental_bin.round() as usize;
        let peak_bin = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.amplitude.total_cmp(&b.1.amplitude))
            .map(|(i, _)| i)
            .unwrap_or(0);
        assert!(peak_bin.abs_diff(center) <= 1, "peak at {peak_bin}, expected near {center}");
    }

    fn band_energy(spectrum: &[Harmonic]) -> f64 {
        spectrum.iter().map(|b| b.amplitude * b.amplitude).sum()
    }

    fn lone_harmonic(k: usize, amplitude: f64) -> Vec<f64> {
        let mut amps = vec![0.0; k + 1];
        amps[k] = amplitude;
        amps
    }

    #[test]
    fn band_energy_ignores_bandwidth_and_harmonic_number() {
        for bandwidth in [10.0, 50.0, 200.0] {
            let params = ParameterSet { bandwidth, length: RenderLength::Seconds(0.5), ..plain(220.0) };
            let window = SynthWindow::for_params(&params);
            let builder = HarmonicProfileBuilder::new(&params);
            for k in [0, 19] {
                let spectrum = builder.spread(&lone_harmonic(k, 0.7), &window, &mut SeededRandom::new(1));
                let energy = band_energy(&spectrum);
                assert!(
                    (energy - 0.49).abs() < 1e-9,
                    "harmonic {} at {bandwidth} cents carries energy {energy}",
                    k + 1
                );
            }
        }
    }

    #[test]
    fn single_period_harmonics_stay_on_their_bins() {
        let params = ParameterSet { bandwidth: 200.0, ..plain(441.0) };
        let window = SynthWindow::for_params(&params);
        let builder = HarmonicProfileBuilder::new(&params);
        let spectrum = builder.spread(&lone_harmonic(4, 0.5), &window, &mut SeededRandom::new(2));
        for (i, bin) in spectrum.iter().enumerate() {
            let expected = if i == 5 { 0.5 } else { 0.0 };
            assert_eq!(bin.amplitude, expected, "bin {i}");
        }
    }

    #[test]
    fn additive_choir_places_sparse_detuned_partials() {
        let base = ParameterSet { length: RenderLength::Seconds(0.5), ..plain(220.0) };
        let additive = ParameterSet { pad_type: PadType::AdditiveChoir, ..base.clone() };
        let window = SynthWindow::for_params(&base);
        let amps = HarmonicProfileBuilder::new(&base).amplitudes();

        let bands = HarmonicProfileBuilder::new(&base).spread(&amps, &window, &mut SeededRandom::new(4));
        let partials = HarmonicProfileBuilder::new(&additive).spread(&amps, &window, &mut SeededRandom::new(4));
        assert_ne!(bands, partials);

        let voiced = amps.iter().filter(|&&a| a > 0.0).count();
        let lit = partials.iter().filter(|b| b.amplitude > 0.0).count();
        assert!(lit >= 1 && lit <= voiced * CHOIR_VOICES, "{lit} bins lit for {voiced} harmonics");

        // phases come first, so both pad types share them
        for (a, b) in bands.iter().zip(&partials) {
            assert_eq!(a.phase, b.phase);
        }
    }

    #[test]
    fn additive_partials_stay_within_bandwidth() {
        let params = ParameterSet {
            pad_type: PadType::AdditiveChoir,
            bandwidth: 100.0,
            length: RenderLength::Seconds(0.5),
            ..plain(220.0)
        };
        let window = SynthWindow::for_params(&params);
        let spectrum = HarmonicProfileBuilder::new(&params).spread(&lone_harmonic(9, 1.0), &window, &mut SeededRandom::new(6));
        let center = 10.0 * window.fundamental_bin;
        let reach = center * (2.0_f64.powf(100.0 / 1200.0) - 1.0) + 1.0;
        for (i, bin) in spectrum.iter().enumerate() {
            if bin.amplitude > 0.0 {
                assert!((i as f64 - center).abs() <= reach, "partial at bin {i}, center {center}");
            }
        }
    }
}
