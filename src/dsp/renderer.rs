//! Single-channel render pipeline, inline multi-channel render, and WAV export.

use std::sync::atomic::{AtomicBool, Ordering};

use log::trace;

use super::filter::SpectralFilter;
use super::harmonics::HarmonicProfileBuilder;
use super::normalize::Normalizer;
use super::random::SeededRandom;
use super::synth::{InverseSynthesizer, SynthWindow};
use crate::error::WaveSynthError;
use crate::params::{ParameterSet, RenderOptions, RenderRequest};
use crate::wave::{ChannelDeriver, Wave};

/// Render one channel's raw buffer. Pure function of `params`.
///
/// Expects parameters that already passed `ParameterSet::validate`.
pub fn render_channel(params: &ParameterSet) -> Vec<f32> {
    render_channel_cancellable(params, &AtomicBool::new(false)).unwrap_or_default()
}

/// `render_channel` that gives up between stages once `cancel` is set.
/// Returns `None` when it stopped early.
pub fn render_channel_cancellable(params: &ParameterSet, cancel: &AtomicBool) -> Option<Vec<f32>> {
    let cancelled = || cancel.load(Ordering::Relaxed);
    let window = SynthWindow::for_params(params);
    let builder = HarmonicProfileBuilder::new(params);

    let amplitudes = builder.amplitudes();
    let filter = SpectralFilter::new(params.filter_type, params.filter_cutoff, params.filter_q);
    let amplitudes = filter.apply(&amplitudes, params.base_frequency, 0.5 * params.sample_rate);
    if cancelled() {
        return None;
    }

    let mut rng = SeededRandom::new(params.seed);
    let bins = builder.spread(&amplitudes, &window, &mut rng);
    if cancelled() {
        return None;
    }
    trace!(
        "channel {}: {} harmonics, {} bins, {} -> {} samples",
        params.channel_index,
        amplitudes.len(),
        bins.len(),
        window.len,
        window.output_len
    );

    let mut synth = InverseSynthesizer::new();
    let mut samples = synth.inverse(&bins, window.len);
    if window.over_sampling > 1 {
        if cancelled() {
            return None;
        }
        samples = synth.decimate(&samples, window.output_len);
    }
    Some(samples.into_iter().map(|s| s as f32).collect())
}

/// Render every slot of `request` on the calling thread, then derive and
/// post-process the output channels.
pub fn render_wave(request: &RenderRequest, options: &RenderOptions) -> Result<Wave, WaveSynthError> {
    request.validate()?;
    let slots: Vec<Vec<f32>> = request.channel_params().iter().map(render_channel).collect();
    Ok(finish(request, options, slots))
}

/// Channel derivation followed by normalization and fades.
pub(crate) fn finish(request: &RenderRequest, options: &RenderOptions, slots: Vec<Vec<f32>>) -> Wave {
    let mut wave = ChannelDeriver::new(request.channel_mode, request.total_channels).derive(slots);
    Normalizer::new(options, request.params.sample_rate).process(&mut wave);
    wave
}

/// Encode a wave as a 16-bit PCM WAV byte buffer (interleaved).
pub fn encode_wav(wave: &Wave, sample_rate: u32) -> Vec<u8> {
    let pcm: Vec<i16> = wave
        .interleaved()
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect();
    let channels = wave.channels as u16;

    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (pcm.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for sample in pcm {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}
