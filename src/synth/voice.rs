use super::{
    envelope::{Envelope, EnvelopePhase, EnvelopeShape},
    oscillators::{self, Waveform},
    vibrato::{LfoShape, VibratoTable},
};
use crate::{
    config::{non_negative, ConfigError},
    note::Note,
};

/// Largest accepted envelope amplitude; keeps the sum of any number of voices finite.
const MAX_AMPLITUDE: f32 = 16.0;
/// Largest accepted vibrato excursion, in semitones either way.
const MAX_VIBRATO_SEMITONES: f32 = 48.0;

/// Everything needed to sound one note. Written once by the producer before the voice is
/// published and never changed until the slot is reclaimed.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct VoiceParams {
    /// The oscillator wave form.
    pub waveform: Waveform,
    pub envelope: EnvelopeShape,
    pub pitch: Note,
    /// Vibrato LFO rate in cycles per second.
    pub vibrato_rate: f32,
    pub vibrato: VibratoTable,
    pub lfo: LfoShape,
}

impl VoiceParams {
    pub fn with_pitch(self, pitch: Note) -> Self {
        Self { pitch, ..self }
    }

    /// Rejects values that would put NaN or infinities into the mix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("vibrato rate", self.vibrato_rate)?;
        for (name, amp) in [
            ("attack amplitude", self.envelope.attack_amplitude),
            ("sustain amplitude", self.envelope.sustain_amplitude),
        ] {
            non_negative(name, amp)?;
            if amp > MAX_AMPLITUDE {
                return Err(ConfigError::BadValue(name, amp));
            }
        }
        if let Some(&offset) = self
            .vibrato
            .offsets()
            .iter()
            .find(|o| !(o.abs() <= MAX_VIBRATO_SEMITONES))
        {
            return Err(ConfigError::BadValue("vibrato offset", offset));
        }
        Ok(())
    }

    /// Scales both envelope amplitudes, e.g. by key velocity.
    pub fn scaled(self, gain: f32) -> Self {
        let mut params = self;
        params.envelope.attack_amplitude *= gain;
        params.envelope.sustain_amplitude *= gain;
        params
    }
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            envelope: EnvelopeShape::default(),
            pitch: Note::middle_c(),
            vibrato_rate: 5.0,
            vibrato: VibratoTable::sine(0.15),
            lfo: LfoShape::Ramp,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct ActiveVoice {
    params: VoiceParams,
    frequency: f32,
    start_time: u64,
    envelope: Envelope,
}

/// Render-thread state of one voice slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct Voice {
    active: Option<ActiveVoice>,
}

impl Voice {
    /// Begins a new allocation cycle at `start_time`, in samples.
    pub fn start(&mut self, params: VoiceParams, frequency: f32, start_time: u64) {
        self.active = Some(ActiveVoice {
            params,
            frequency,
            start_time,
            envelope: Envelope::new(),
        });
    }

    pub fn stop(&mut self) {
        self.active = None;
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The envelope phase, or `None` when the slot is idle.
    pub fn phase(&self) -> Option<EnvelopePhase> {
        self.active.as_ref().map(|v| v.envelope.phase())
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == Some(EnvelopePhase::Finished)
    }

    /// Produces the voice's contribution at sample time `now` and advances its envelope.
    pub fn process(&mut self, now: u64, inv_sample_rate: f64, released: bool) -> f32 {
        let Some(voice) = self.active.as_mut() else {
            return 0.0;
        };
        let params = &voice.params;

        let amp = voice.envelope.advance(&params.envelope, released);
        if amp == 0.0 {
            return 0.0;
        }

        let elapsed = now.saturating_sub(voice.start_time) as f64 * inv_sample_rate;
        let frequency = voice.frequency * params.vibrato.multiplier(params.vibrato_rate, elapsed, params.lfo);
        amp * oscillators::evaluate(elapsed, frequency, params.waveform)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn square_params() -> VoiceParams {
        VoiceParams {
            waveform: Waveform::Square,
            envelope: EnvelopeShape {
                attack: 0,
                decay: 0,
                release: 100,
                attack_amplitude: 1.0,
                sustain_amplitude: 0.5,
            },
            vibrato: VibratoTable::default(),
            ..Default::default()
        }
    }

    #[test]
    fn test_idle_voice_is_silent() {
        let mut voice = Voice::default();
        assert_eq!(voice.process(0, 1.0 / 48_000.0, false), 0.0);
        assert_eq!(voice.phase(), None);
    }

    #[test]
    fn test_output_follows_envelope() {
        let mut voice = Voice::default();
        voice.start(square_params(), 1.0, 10);
        assert_eq!(voice.process(10, 1.0 / 48_000.0, false), 0.5);
        assert_eq!(voice.phase(), Some(EnvelopePhase::Sustain));
    }

    #[test]
    fn test_release_finishes() {
        let mut voice = Voice::default();
        voice.start(square_params(), 1.0, 0);
        for now in 0..101 {
            voice.process(now, 1.0 / 48_000.0, true);
        }
        assert!(voice.is_finished());
        voice.stop();
        assert!(!voice.is_active());
    }

    #[test]
    fn test_validate() {
        assert_eq!(VoiceParams::default().validate(), Ok(()));
        assert_eq!(square_params().validate(), Ok(()));

        let mut params = square_params();
        params.envelope.sustain_amplitude = f32::NAN;
        assert!(params.validate().is_err());

        let mut params = square_params();
        params.envelope.attack_amplitude = 1e30;
        assert_eq!(params.validate(), Err(ConfigError::BadValue("attack amplitude", 1e30)));

        let mut params = square_params();
        params.vibrato_rate = f32::INFINITY;
        assert!(params.validate().is_err());

        let mut offsets = [0.0; 16];
        offsets[7] = f32::NAN;
        let params = VoiceParams {
            vibrato: VibratoTable::new(offsets),
            ..square_params()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_scaled() {
        let params = square_params().scaled(0.5);
        assert_eq!(params.envelope.attack_amplitude, 0.5);
        assert_eq!(params.envelope.sustain_amplitude, 0.25);
    }
}
