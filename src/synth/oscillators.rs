//! Stateless waveform functions.
//!
//! Every waveform is a pure function of elapsed time, frequency and selector, so voices can be
//! evaluated independently without any shared state.

use std::f32::consts::PI;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
    /// Plucked string: bright attack whose upper partials die away first.
    Pluck,
    /// Soft pad: odd-leaning partials that swell in over the first second.
    Pad,
    /// Saw-like lead with gentle saturation.
    Lead,
    /// Octave-stacked drawbar organ.
    Organ,
}

const PLUCK_PARTIALS: &[(u32, f32)] = &[(1, 1.0), (2, 0.5), (3, 0.25), (4, 0.125)];
const PAD_PARTIALS: &[(u32, f32)] = &[(1, 1.0), (2, 0.35), (3, 0.2), (5, 0.1)];
const LEAD_PARTIALS: &[(u32, f32)] = &[(1, 1.0), (2, 0.5), (3, 0.333), (4, 0.25), (5, 0.2), (6, 0.166)];
const ORGAN_PARTIALS: &[(u32, f32)] = &[(1, 1.0), (2, 0.5), (4, 0.25), (8, 0.125)];

/// Evaluates a waveform `time` seconds after the voice started, at the instantaneous `frequency`.
/// The result is always within [-1, 1].
pub fn evaluate(time: f64, frequency: f32, wave: Waveform) -> f32 {
    let time = time.max(0.0);
    match wave {
        Waveform::Sine => sine(phase(time, frequency)),
        Waveform::Triangle => triangle(phase(time, frequency)),
        Waveform::Square => square(phase(time, frequency)),
        Waveform::Sawtooth => sawtooth(phase(time, frequency)),
        Waveform::Pluck => partials(time, frequency, PLUCK_PARTIALS, |n, t| (-3.0 * n as f32 * t).exp()),
        Waveform::Pad => {
            let swell = 1.0 - (-4.0 * time as f32).exp();
            swell * partials(time, frequency, PAD_PARTIALS, |_, _| 1.0)
        }
        Waveform::Lead => {
            let drive: f32 = 1.5;
            (drive * partials(time, frequency, LEAD_PARTIALS, |_, _| 1.0)).tanh() / drive.tanh()
        }
        Waveform::Organ => partials(time, frequency, ORGAN_PARTIALS, |_, _| 1.0),
    }
}

/// Position within the current cycle, between 0 and 1.
fn phase(time: f64, frequency: f32) -> f32 {
    (time * frequency as f64).fract() as f32
}

/// Weighted sum of integer-ratio harmonics, normalized by the total weight.
/// `shape` scales each partial by harmonic number and elapsed seconds and must stay within [0, 1].
fn partials(time: f64, frequency: f32, recipe: &[(u32, f32)], shape: impl Fn(u32, f32) -> f32) -> f32 {
    let secs = time as f32;
    let mut sum = 0.0;
    let mut total = 0.0;
    for &(n, weight) in recipe {
        sum += weight * shape(n, secs) * sine(phase(time, frequency * n as f32));
        total += weight;
    }
    (sum / total).clamp(-1.0, 1.0)
}

fn sine(phase: f32) -> f32 {
    (2.0 * PI * phase).sin()
}

fn square(phase: f32) -> f32 {
    if phase < 0.5 {
        1.0
    } else {
        -1.0
    }
}

fn triangle(phase: f32) -> f32 {
    1.0 - (4.0 * phase - 2.0).abs()
}

fn sawtooth(phase: f32) -> f32 {
    2.0 * phase - 1.0
}
