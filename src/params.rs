//! Render parameter types.
//!
//! A `ParameterSet` is an immutable description of one channel's render.
//! A `RenderRequest` wraps one together with the channel layout; the
//! orchestrator fans it out into per-channel copies with offset seeds.
//! Field names serialize as camelCase so a JS host can post them directly.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::dsp::synth::SynthWindow;
use crate::error::{ParamError, RequestError};

/// Largest seed the UI offers, also the default per-channel seed stride.
pub const SEED_MAX: u64 = ((1u64 << 53) - 1) / 2;

/// Number of entries the overtone editor produces (index 0 = fundamental).
pub const OVERTONE_ENVELOPE_LEN: usize = 64;

/// Accepted range for `RenderLength::Seconds`.
pub const MIN_LENGTH_SECONDS: f64 = 0.02;
pub const MAX_LENGTH_SECONDS: f64 = 4.0;

pub const MAX_OVERSAMPLING: u32 = 64;

/// Accepted range for `baseFrequency`, in Hz.
pub const MIN_BASE_FREQUENCY: f64 = 1.0;
pub const MAX_BASE_FREQUENCY: f64 = 1000.0;

/// Accepted range for `sampleRate`, in Hz.
pub const MIN_SAMPLE_RATE: f64 = 8000.0;
pub const MAX_SAMPLE_RATE: f64 = 384_000.0;

/// Largest oversampled buffer a single channel render may allocate.
pub const MAX_RENDER_LEN: usize = 1 << 24;

// ── Shape / modulation / filter selectors ───────────────────

/// Base waveform evaluated over one period to derive harmonic amplitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseShape {
    Sine,
    Triangle,
    Pulse,
    Saw,
    Power,
    Gauss,
    Diode,
    Abssine,
    Pulsesine,
    Stretchsine,
    Chirp,
    Absstretchsine,
    Chebyshev,
    Sqr,
    Spike,
    Circle,
}

impl BaseShape {
    pub const ALL: [BaseShape; 16] = [
        BaseShape::Sine,
        BaseShape::Triangle,
        BaseShape::Pulse,
        BaseShape::Saw,
        BaseShape::Power,
        BaseShape::Gauss,
        BaseShape::Diode,
        BaseShape::Abssine,
        BaseShape::Pulsesine,
        BaseShape::Stretchsine,
        BaseShape::Chirp,
        BaseShape::Absstretchsine,
        BaseShape::Chebyshev,
        BaseShape::Sqr,
        BaseShape::Spike,
        BaseShape::Circle,
    ];
}

impl TryFrom<u8> for BaseShape {
    type Error = ParamError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        BaseShape::ALL
            .get(index as usize)
            .copied()
            .ok_or(ParamError::UnknownVariant { kind: "base shape", index })
    }
}

/// Phase-axis warp applied before the base shape is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModulationType {
    None,
    Reverse,
    Sine,
    Power,
}

impl ModulationType {
    pub const ALL: [ModulationType; 4] = [
        ModulationType::None,
        ModulationType::Reverse,
        ModulationType::Sine,
        ModulationType::Power,
    ];
}

impl TryFrom<u8> for ModulationType {
    type Error = ParamError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        ModulationType::ALL
            .get(index as usize)
            .copied()
            .ok_or(ParamError::UnknownVariant { kind: "modulation type", index })
    }
}

/// Magnitude response applied to the harmonic amplitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    None,
    LowPass1,
    HighPass1a,
    HighPass1b,
    BandPass1,
    BandStop1,
    LowPass2,
    HighPass2,
    BandPass2,
    BandStop2,
    Cos,
    Sin,
    LowShelf,
    Peaking,
}

impl FilterType {
    pub const ALL: [FilterType; 14] = [
        FilterType::None,
        FilterType::LowPass1,
        FilterType::HighPass1a,
        FilterType::HighPass1b,
        FilterType::BandPass1,
        FilterType::BandStop1,
        FilterType::LowPass2,
        FilterType::HighPass2,
        FilterType::BandPass2,
        FilterType::BandStop2,
        FilterType::Cos,
        FilterType::Sin,
        FilterType::LowShelf,
        FilterType::Peaking,
    ];
}

impl TryFrom<u8> for FilterType {
    type Error = ParamError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        FilterType::ALL
            .get(index as usize)
            .copied()
            .ok_or(ParamError::UnknownVariant { kind: "filter type", index })
    }
}

/// How each harmonic is turned into spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PadType {
    /// Continuous Gaussian band per harmonic.
    FrequencyShiftChoir,
    /// A few discrete detuned partials per harmonic.
    AdditiveChoir,
}

impl PadType {
    pub const ALL: [PadType; 2] = [PadType::FrequencyShiftChoir, PadType::AdditiveChoir];
}

impl TryFrom<u8> for PadType {
    type Error = ParamError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        PadType::ALL
            .get(index as usize)
            .copied()
            .ok_or(ParamError::UnknownVariant { kind: "pad type", index })
    }
}

/// A selector posted either as its numeric index or as its name.
#[derive(Deserialize)]
#[serde(untagged)]
enum SelectorRepr<T> {
    Index(u64),
    Name(T),
}

fn selector<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + TryFrom<u8, Error = ParamError>,
{
    match SelectorRepr::<T>::deserialize(deserializer)? {
        SelectorRepr::Index(index) => {
            let index = u8::try_from(index)
                .map_err(|_| D::Error::custom(format!("selector index {index} is out of range")))?;
            T::try_from(index).map_err(D::Error::custom)
        }
        SelectorRepr::Name(value) => Ok(value),
    }
}

/// How per-slot renders map onto output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelMode {
    /// One independent render per output channel.
    #[serde(alias = "stereo")]
    Independent,
    /// One render duplicated to every output channel.
    Mono,
    /// One render; channel 1 is rotated by half the buffer.
    Phase,
}

/// Length of the rendered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderLength {
    /// Exactly one period of the base frequency.
    SinglePeriod,
    /// A loopable window of the given duration.
    Seconds(f64),
}

// ── ParameterSet ────────────────────────────────────────────

/// Everything one channel render depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterSet {
    /// Output sample rate in Hz.
    pub sample_rate: f64,
    /// Internal render rate multiplier (>= 1).
    pub over_sampling: u32,
    pub length: RenderLength,
    /// Fundamental in Hz.
    pub base_frequency: f64,
    /// Spectral spread of each harmonic, in cents.
    pub bandwidth: f64,
    pub seed: u64,
    #[serde(deserialize_with = "selector")]
    pub pad_type: PadType,
    #[serde(deserialize_with = "selector")]
    pub base_shape: BaseShape,
    pub base_shape_param: f64,
    #[serde(deserialize_with = "selector")]
    pub modulation: ModulationType,
    pub mod_p1: f64,
    pub mod_p2: f64,
    pub mod_p3: f64,
    #[serde(deserialize_with = "selector")]
    pub filter_type: FilterType,
    pub filter_cutoff: f64,
    pub filter_q: f64,
    /// Output harmonic `k` takes source harmonic `k - harmonic_shift`.
    pub harmonic_shift: i32,
    pub adaptive_harmonics: bool,
    pub adaptive_base_freq: f64,
    pub adaptive_power: f64,
    /// Per-harmonic gain in [0, 1], already min-max normalized by its producer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overtone_envelope: Option<Vec<f64>>,
    pub channel_index: usize,
    pub total_channels: usize,
}

impl Default for ParameterSet {
    fn default() -> Self {
        ParameterSet {
            sample_rate: 44100.0,
            over_sampling: 16,
            length: RenderLength::Seconds(0.8),
            base_frequency: 220.0,
            bandwidth: 50.0,
            seed: 0,
            pad_type: PadType::FrequencyShiftChoir,
            base_shape: BaseShape::Stretchsine,
            base_shape_param: 0.4,
            modulation: ModulationType::Reverse,
            mod_p1: 36.0 / 127.0,
            mod_p2: 68.0 / 127.0,
            mod_p3: 89.0 / 127.0,
            filter_type: FilterType::LowPass1,
            filter_cutoff: 102.0 / 128.0,
            filter_q: 16.0 / 127.0,
            harmonic_shift: 7,
            adaptive_harmonics: true,
            adaptive_base_freq: 124.0 / 128.0,
            adaptive_power: 78.0 / 127.0,
            overtone_envelope: None,
            channel_index: 0,
            total_channels: 1,
        }
    }
}

impl ParameterSet {
    /// Internal render rate (`sample_rate * over_sampling`).
    pub fn render_rate(&self) -> f64 {
        self.sample_rate * self.over_sampling as f64
    }

    /// Copy of these parameters addressed to channel `index` of `total`,
    /// with the seed offset by `index * stride`.
    pub fn for_channel(&self, index: usize, total: usize, stride: u64) -> ParameterSet {
        let mut params = self.clone();
        params.seed = self.seed.wrapping_add((index as u64).wrapping_mul(stride));
        params.channel_index = index;
        params.total_channels = total;
        params
    }

    /// Check every field against the render contract.
    pub fn validate(&self) -> Result<(), ParamError> {
        positive("sampleRate", self.sample_rate)?;
        positive("baseFrequency", self.base_frequency)?;
        positive("bandwidth", self.bandwidth)?;
        ranged("sampleRate", self.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE)?;
        ranged("baseFrequency", self.base_frequency, MIN_BASE_FREQUENCY, MAX_BASE_FREQUENCY)?;

        if self.over_sampling == 0 {
            return Err(ParamError::NonPositive { field: "overSampling", value: 0.0 });
        }
        if self.over_sampling > MAX_OVERSAMPLING {
            return Err(ParamError::OutOfRange {
                field: "overSampling",
                value: self.over_sampling as f64,
                min: 1.0,
                max: MAX_OVERSAMPLING as f64,
            });
        }

        if let RenderLength::Seconds(seconds) = self.length {
            finite("length", seconds)?;
            ranged("length", seconds, MIN_LENGTH_SECONDS, MAX_LENGTH_SECONDS)?;
        }

        // every field SynthWindow reads is bounded by now
        let len = SynthWindow::for_params(self).len;
        if len > MAX_RENDER_LEN {
            return Err(ParamError::RenderTooLong { len, max: MAX_RENDER_LEN });
        }

        for (field, value) in [
            ("baseShapeParam", self.base_shape_param),
            ("modP1", self.mod_p1),
            ("modP2", self.mod_p2),
            ("modP3", self.mod_p3),
            ("filterCutoff", self.filter_cutoff),
            ("filterQ", self.filter_q),
            ("adaptiveBaseFreq", self.adaptive_base_freq),
            ("adaptivePower", self.adaptive_power),
        ] {
            unit(field, value)?;
        }

        if let Some(envelope) = &self.overtone_envelope {
            if envelope.len() != OVERTONE_ENVELOPE_LEN {
                return Err(ParamError::EnvelopeLength {
                    expected: OVERTONE_ENVELOPE_LEN,
                    found: envelope.len(),
                });
            }
            for &value in envelope {
                unit("overtoneEnvelope", value)?;
            }
        }

        if self.total_channels == 0 || self.channel_index >= self.total_channels {
            return Err(ParamError::OutOfRange {
                field: "channelIndex",
                value: self.channel_index as f64,
                min: 0.0,
                max: self.total_channels.saturating_sub(1) as f64,
            });
        }

        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ParamError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ParamError::NotFinite { field, value })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ParamError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ParamError::NonPositive { field, value })
    }
}

fn ranged(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ParamError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ParamError::OutOfRange { field, value, min, max })
    }
}

fn unit(field: &'static str, value: f64) -> Result<(), ParamError> {
    finite(field, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParamError::OutOfUnitRange { field, value })
    }
}

// ── RenderOptions ───────────────────────────────────────────

/// Post-processing toggles applied to the assembled wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Scale so the loudest sample across all channels hits 1.0.
    pub normalize: bool,
    /// Ramp the first and last 2 ms to zero.
    pub fade: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { normalize: true, fade: true }
    }
}

// ── RenderRequest ───────────────────────────────────────────

/// One render cycle: the base parameters plus the output channel layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub total_channels: usize,
    pub channel_mode: ChannelMode,
    pub params: ParameterSet,
    #[serde(default = "default_seed_stride")]
    pub seed_stride: u64,
}

fn default_seed_stride() -> u64 {
    SEED_MAX
}

impl RenderRequest {
    pub fn new(params: ParameterSet, total_channels: usize, channel_mode: ChannelMode) -> Self {
        RenderRequest {
            total_channels,
            channel_mode,
            params,
            seed_stride: SEED_MAX,
        }
    }

    /// Number of independent renders this request needs.
    pub fn dispatch_count(&self) -> usize {
        match self.channel_mode {
            ChannelMode::Independent => self.total_channels,
            ChannelMode::Mono | ChannelMode::Phase => 1,
        }
    }

    /// Per-slot parameter copies, seeds offset by slot index.
    pub fn channel_params(&self) -> Vec<ParameterSet> {
        let count = self.dispatch_count();
        (0..count)
            .map(|ch| self.params.for_channel(ch, count, self.seed_stride))
            .collect()
    }

    pub fn validate(&self) -> Result<(), crate::error::WaveSynthError> {
        if self.total_channels == 0 {
            return Err(RequestError::NoChannels.into());
        }
        for params in self.channel_params() {
            params.validate()?;
        }
        Ok(())
    }
}
