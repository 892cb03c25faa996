//! Multi-channel output buffer and channel derivation.

use serde::{Deserialize, Serialize};

use crate::params::ChannelMode;

/// A rendered multi-channel buffer. Every channel has `frames` samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    pub channels: usize,
    pub frames: usize,
    pub data: Vec<Vec<f32>>,
}

impl Wave {
    /// Build from per-channel sample vectors, truncating to the shortest.
    pub fn from_channels(mut data: Vec<Vec<f32>>) -> Self {
        let frames = data.iter().map(Vec::len).min().unwrap_or(0);
        for ch in &mut data {
            ch.truncate(frames);
        }
        Wave { channels: data.len(), frames, data }
    }

    /// Peak absolute sample across all channels.
    pub fn peak(&self) -> f32 {
        self.data
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    /// Interleave channels frame by frame.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.channels * self.frames);
        for i in 0..self.frames {
            for ch in &self.data {
                out.push(ch[i]);
            }
        }
        out
    }
}

/// Rotate `samples` left by `shift` samples, in place.
pub fn rotate(samples: &mut [f32], shift: usize) {
    if samples.len() < 2 {
        return;
    }
    let shift = shift % samples.len();
    samples.rotate_left(shift);
}

/// Maps the completed per-slot buffers onto the requested output channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelDeriver {
    pub mode: ChannelMode,
    pub total_channels: usize,
}

impl ChannelDeriver {
    pub fn new(mode: ChannelMode, total_channels: usize) -> Self {
        ChannelDeriver { mode, total_channels }
    }

    /// Assemble the output wave.
    ///
    /// `Independent` passes slot `i` to channel `i` (reusing the last slot
    /// if fewer were rendered). `Mono` copies slot 0 everywhere. `Phase`
    /// copies slot 0 and rotates channel 1 by half its length.
    pub fn derive(&self, slots: Vec<Vec<f32>>) -> Wave {
        if slots.is_empty() || self.total_channels == 0 {
            return Wave::from_channels(Vec::new());
        }

        let mut data: Vec<Vec<f32>> = match self.mode {
            ChannelMode::Independent => {
                let last = slots.len() - 1;
                let mut slots = slots;
                let extra: Vec<Vec<f32>> = (slots.len()..self.total_channels)
                    .map(|_| slots[last].clone())
                    .collect();
                slots.truncate(self.total_channels);
                slots.extend(extra);
                slots
            }
            ChannelMode::Mono | ChannelMode::Phase => {
                let source = slots.into_iter().next().unwrap_or_default();
                vec![source; self.total_channels]
            }
        };

        if self.mode == ChannelMode::Phase && data.len() > 1 {
            let half = data[1].len() / 2;
            rotate(&mut data[1], half);
        }

        Wave::from_channels(data)
    }
}
