use crate::util::lerp;

/// Steepness of the exponential release curve.
const RELEASE_CURVE: f32 = 8.0;

/// Envelope timings in samples, with the amplitudes reached at the end of attack and during sustain.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct EnvelopeShape {
    pub attack: u32,
    pub decay: u32,
    pub release: u32,
    pub attack_amplitude: f32,
    pub sustain_amplitude: f32,
}

impl EnvelopeShape {
    /// Builds a shape from durations in seconds.
    pub fn from_secs(
        sample_rate: u32,
        attack: f32,
        decay: f32,
        sustain_amplitude: f32,
        release: f32,
        attack_amplitude: f32,
    ) -> Self {
        let samples = |secs: f32| (secs.max(0.0) * sample_rate as f32).round() as u32;
        Self {
            attack: samples(attack),
            decay: samples(decay),
            release: samples(release),
            attack_amplitude,
            sustain_amplitude,
        }
    }
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        Self::from_secs(48_000, 0.01, 0.1, 0.6, 0.3, 1.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum EnvelopePhase {
    Attack,
    Decay,
    Sustain,
    Release,
    Finished,
}

/// Consumer-side envelope state for one voice allocation.
///
/// `running_time` counts samples spent in attack, decay and release only, so the sustain hold
/// does not shift the release curve.
#[derive(Clone, Copy, Debug)]
pub struct Envelope {
    phase: EnvelopePhase,
    running_time: u64,
    release_start: u64,
}

impl Envelope {
    pub fn new() -> Self {
        Self {
            phase: EnvelopePhase::Attack,
            running_time: 0,
            release_start: u64::MAX,
        }
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == EnvelopePhase::Finished
    }

    /// Produces the amplitude for the current sample and advances by one sample.
    ///
    /// A phase whose exit condition already holds falls through to the next one within the same
    /// call, so zero-length stages are skipped.
    pub fn advance(&mut self, shape: &EnvelopeShape, released: bool) -> f32 {
        use EnvelopePhase::*;
        let attack = shape.attack as u64;
        let decay_end = attack + shape.decay as u64;

        let amp = loop {
            match self.phase {
                Attack => {
                    if self.running_time < attack {
                        let t = self.running_time as f32 / attack as f32;
                        break lerp(0.0, shape.attack_amplitude, t);
                    }
                    self.phase = Decay;
                }
                Decay => {
                    if self.running_time < decay_end {
                        let t = (self.running_time - attack) as f32 / shape.decay as f32;
                        break lerp(shape.attack_amplitude, shape.sustain_amplitude, t);
                    }
                    self.phase = Sustain;
                }
                Sustain => {
                    if !released && shape.sustain_amplitude > 0.0 {
                        break shape.sustain_amplitude;
                    }
                    self.release_start = self.release_start.min(self.running_time);
                    self.phase = Release;
                }
                Release => {
                    let elapsed = self.running_time - self.release_start;
                    if elapsed < shape.release as u64 {
                        let t = elapsed as f32 / shape.release as f32;
                        break shape.sustain_amplitude * (-RELEASE_CURVE * t).exp();
                    }
                    self.phase = Finished;
                }
                Finished => break 0.0,
            }
        };

        if matches!(self.phase, Attack | Decay | Release) {
            self.running_time += 1;
        }
        amp
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}
