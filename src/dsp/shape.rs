//! Base waveform shapes and phase-axis modulation.
//!
//! Each shape is a function of phase `x` in [0, 1) and a shape parameter
//! in [0, 1]. The modulation warps the phase axis before the shape is
//! evaluated. The results only ever reach the output through their
//! harmonic magnitudes, so DC offsets are irrelevant.

use std::f64::consts::{PI, TAU};

use crate::params::{BaseShape, ModulationType};

/// Points sampled per period when deriving harmonic amplitudes.
pub const SHAPE_TABLE_SIZE: usize = 2048;

/// Evaluate `shape` at phase `x` with parameter `a`.
pub fn evaluate(shape: BaseShape, x: f64, a: f64) -> f64 {
    match shape {
        BaseShape::Sine => -(TAU * x).sin(),
        BaseShape::Triangle => {
            let peak = 0.01 + 0.98 * a;
            if x < peak {
                2.0 * x / peak - 1.0
            } else {
                1.0 - 2.0 * (x - peak) / (1.0 - peak)
            }
        }
        BaseShape::Pulse => {
            let duty = 0.01 + 0.98 * a;
            if x < duty { 1.0 } else { -1.0 }
        }
        BaseShape::Saw => {
            let y = 2.0 * x - 1.0;
            y * (1.0 - a) + y * y * y * a
        }
        BaseShape::Power => {
            let exponent = 2.0_f64.powf(a * 8.0 - 4.0);
            2.0 * x.powf(exponent) - 1.0
        }
        BaseShape::Gauss => {
            let width = 0.02 + 0.48 * a;
            let d = (x - 0.5) / width;
            2.0 * (-d * d).exp() - 1.0
        }
        BaseShape::Diode => {
            let threshold = a * 1.98 - 0.99;
            let s = (TAU * x).sin();
            2.0 * ((s - threshold).max(0.0) / (1.0 - threshold)) - 1.0
        }
        BaseShape::Abssine => {
            let exponent = 1.0 + 7.0 * a;
            2.0 * (PI * x).sin().abs().powf(exponent) - 1.0
        }
        BaseShape::Pulsesine => {
            let width = 1.0 - 0.98 * a;
            if x < width { (TAU * x / width).sin() } else { 0.0 }
        }
        BaseShape::Stretchsine => {
            let stretch = 2.0_f64.powf(a * 4.0 - 2.0);
            (TAU * x.powf(stretch)).sin()
        }
        BaseShape::Chirp => {
            let sweep = 4.0 * a;
            (TAU * (x + sweep * x * x)).sin()
        }
        BaseShape::Absstretchsine => {
            let stretch = 2.0_f64.powf(a * 4.0 - 2.0);
            2.0 * (TAU * x.powf(stretch)).sin().abs() - 1.0
        }
        BaseShape::Chebyshev => {
            let order = 1.0 + 15.0 * a;
            (order * (2.0 * x - 1.0).clamp(-1.0, 1.0).acos()).cos()
        }
        BaseShape::Sqr => {
            let drive = 1.0 + 20.0 * a;
            ((TAU * x).sin() * drive).tanh() / drive.tanh()
        }
        BaseShape::Spike => {
            let width = 0.01 + 0.49 * a;
            let d = (x - 0.5).abs();
            if d < width { 1.0 - d / width } else { 0.0 }
        }
        BaseShape::Circle => {
            let squash = 1.0 - 0.9 * a;
            let (u, sign) = if x < 0.5 {
                ((4.0 * x - 1.0) / squash, 1.0)
            } else {
                ((4.0 * x - 3.0) / squash, -1.0)
            };
            if u.abs() < 1.0 { sign * (1.0 - u * u).sqrt() } else { 0.0 }
        }
    }
}

/// Warp phase `t` in [0, 1) by the selected modulation. Output wraps to [0, 1).
pub fn modulate(modulation: ModulationType, t: f64, p1: f64, p2: f64, p3: f64) -> f64 {
    // integer wobble count keeps the warped period seamless
    let wobbles = 1.0 + (p3 * 4.0).floor();
    let depth = p1 * p1 * 0.5 / wobbles;
    let warped = match modulation {
        ModulationType::None => return t,
        ModulationType::Reverse => 1.0 - t + depth * (TAU * (wobbles * t + p2)).sin(),
        ModulationType::Sine => t + depth * (TAU * (wobbles * t + p2)).sin(),
        ModulationType::Power => {
            let exponent = 1.0 + 4.0 * p3;
            t + p1 * 0.5 * ((1.0 - (TAU * (t + p2)).cos()) * 0.5).powf(exponent)
        }
    };
    let wrapped = warped.rem_euclid(1.0);
    // rem_euclid rounds tiny negatives up to exactly 1.0
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

/// One period of the modulated shape, `SHAPE_TABLE_SIZE` points long.
pub fn sample_period(
    shape: BaseShape,
    a: f64,
    modulation: ModulationType,
    p1: f64,
    p2: f64,
    p3: f64,
) -> Vec<f64> {
    (0..SHAPE_TABLE_SIZE)
        .map(|i| {
            let x = i as f64 / SHAPE_TABLE_SIZE as f64;
            evaluate(shape, modulate(modulation, x, p1, p2, p3), a)
        })
        .collect()
}
