use crate::util::{lerp, ratio_from_semitones};

pub const VIBRATO_POINTS: usize = 16;

/// How the LFO sweeps through the vibrato table.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LfoShape {
    /// Forward sweep, wrapping from the last entry back to the first.
    #[default]
    Ramp,
    /// Forward over the first half of the cycle, backward over the second.
    PingPong,
    /// Holds each entry without interpolating.
    Stepped,
}

/// Per-voice table of pitch offsets in semitones, swept once per LFO cycle.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct VibratoTable {
    offsets: [f32; VIBRATO_POINTS],
}

impl VibratoTable {
    pub fn new(offsets: [f32; VIBRATO_POINTS]) -> Self {
        Self { offsets }
    }

    /// A sinusoidal table with the given depth in semitones.
    pub fn sine(depth: f32) -> Self {
        Self::new(core::array::from_fn(|i| {
            depth * (2.0 * std::f32::consts::PI * i as f32 / VIBRATO_POINTS as f32).sin()
        }))
    }

    pub fn offsets(&self) -> &[f32; VIBRATO_POINTS] {
        &self.offsets
    }

    /// Interpolated semitone offset `elapsed` seconds into the vibrato, at `rate` cycles per second.
    pub fn offset(&self, rate: f32, elapsed: f64, shape: LfoShape) -> f32 {
        let phase = (rate as f64 * elapsed).rem_euclid(1.0) as f32;
        let n = VIBRATO_POINTS as f32;
        match shape {
            LfoShape::Ramp => self.interpolate(phase * n, true),
            LfoShape::PingPong => {
                let sweep = 1.0 - (2.0 * phase - 1.0).abs();
                self.interpolate(sweep * (n - 1.0), false)
            }
            LfoShape::Stepped => self.offsets[(phase * n) as usize % VIBRATO_POINTS],
        }
    }

    /// Frequency multiplier for the current vibrato position.
    pub fn multiplier(&self, rate: f32, elapsed: f64, shape: LfoShape) -> f32 {
        ratio_from_semitones(self.offset(rate, elapsed, shape))
    }

    fn interpolate(&self, position: f32, wrap: bool) -> f32 {
        let lower = (position.floor() as usize).min(VIBRATO_POINTS - 1);
        let upper = if wrap {
            (lower + 1) % VIBRATO_POINTS
        } else {
            (lower + 1).min(VIBRATO_POINTS - 1)
        };
        lerp(self.offsets[lower], self.offsets[upper], position - lower as f32)
    }
}
