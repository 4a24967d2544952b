use crate::synth::{
    envelope::EnvelopeShape,
    oscillators::Waveform,
    vibrato::{LfoShape, VibratoTable, VIBRATO_POINTS},
    VoiceParams,
};
use crate::note::Note;
use thiserror::Error;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Highest accepted A4 reference, keeping every table frequency finite.
const MAX_TUNING: f32 = 100_000.0;

/// Output sample encoding.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SampleFormat {
    #[default]
    F32,
    I16,
}

impl From<SampleFormat> for cpal::SampleFormat {
    fn from(format: SampleFormat) -> Self {
        match format {
            SampleFormat::F32 => cpal::SampleFormat::F32,
            SampleFormat::I16 => cpal::SampleFormat::I16,
        }
    }
}

/// Default voice shape applied to every key press without an override.
#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub waveform: Waveform,
    pub envelope: EnvelopeShape,
    /// Vibrato LFO rate in cycles per second.
    pub vibrato_rate: f32,
    /// Vibrato offsets in semitones; must hold exactly 16 entries.
    pub vibrato: Vec<f32>,
    pub lfo: LfoShape,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        let defaults = VoiceParams::default();
        Self {
            waveform: defaults.waveform,
            envelope: defaults.envelope,
            vibrato_rate: defaults.vibrato_rate,
            vibrato: defaults.vibrato.offsets().to_vec(),
            lfo: defaults.lfo,
        }
    }
}

/// Engine configuration, fixed for the lifetime of the engine.
#[derive(Clone, Debug)]
pub struct SynthConfig {
    /// Polyphony ceiling.
    pub max_voices: usize,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
    /// Frequency of A4 in Hz.
    pub tuning: f32,
    pub voice: VoiceConfig,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            max_voices: 32,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 2,
            sample_format: SampleFormat::F32,
            tuning: 440.0,
            voice: VoiceConfig::default(),
        }
    }
}

impl SynthConfig {
    /// Checks everything the render callback relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_voices == 0 {
            return Err(ConfigError::NoVoices);
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        if !(self.tuning > 0.0 && self.tuning <= MAX_TUNING) {
            return Err(ConfigError::BadTuning(self.tuning));
        }

        self.default_voice()?.validate()
    }

    /// The default voice parameters, after validation.
    pub fn voice_params(&self) -> Result<VoiceParams, ConfigError> {
        self.validate()?;
        self.default_voice()
    }

    fn default_voice(&self) -> Result<VoiceParams, ConfigError> {
        let offsets: [f32; VIBRATO_POINTS] = self.voice.vibrato[..]
            .try_into()
            .map_err(|_| ConfigError::VibratoTableSize(self.voice.vibrato.len()))?;
        Ok(VoiceParams {
            waveform: self.voice.waveform,
            envelope: self.voice.envelope,
            pitch: Note::middle_c(),
            vibrato_rate: self.voice.vibrato_rate,
            vibrato: VibratoTable::new(offsets),
            lfo: self.voice.lfo,
        })
    }
}

pub(crate) fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::BadValue(name, value))
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("at least one voice is required")]
    NoVoices,
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,
    #[error("channel count must be non-zero")]
    ZeroChannels,
    #[error("tuning reference must be a positive frequency up to 100 kHz, got {0}")]
    BadTuning(f32),
    #[error("vibrato table needs 16 entries, got {0}")]
    VibratoTableSize(usize),
    #[error("invalid {0}: {1}")]
    BadValue(&'static str, f32),
}
