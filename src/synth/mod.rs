//! Lock-free polyphonic note synthesizer.
//!
//! [`new_synth`] splits the engine into a [`SynthController`] for the input thread and a
//! [`SynthRenderer`] for the audio callback. The two share nothing but atomic voice bit-sets and
//! the voice parameter slots they guard.

pub use self::controller::{KeyEvent, KeyPress, NoteOn, SynthController};
pub use self::envelope::{EnvelopePhase, EnvelopeShape};
pub use self::oscillators::Waveform;
pub use self::renderer::SynthRenderer;
pub use self::vibrato::{LfoShape, VibratoTable};
pub use self::voice::VoiceParams;
use crate::config::{ConfigError, SynthConfig};
use tracing::info;

mod controller;
pub mod envelope;
pub mod frequency;
pub mod oscillators;
mod renderer;
pub mod shared;
pub mod vibrato;
mod voice;

/// Validates `config` and builds the producer and consumer halves of a synthesizer.
pub fn new_synth(config: &SynthConfig) -> Result<(SynthController, SynthRenderer), ConfigError> {
    let defaults = config.voice_params()?;
    let (producer, consumer) = shared::voice_state(config.max_voices);
    let frequencies = frequency::FrequencyTable::new(config.tuning);

    info!(
        voices = config.max_voices,
        sample_rate = config.sample_rate,
        channels = config.channels,
        "synth created"
    );

    Ok((
        SynthController::new(producer, defaults),
        SynthRenderer::new(consumer, frequencies, config.sample_rate, config.channels),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    fn render(renderer: &mut SynthRenderer, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * renderer.channels()];
        renderer.render(&mut out);
        out
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SynthConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(matches!(new_synth(&config), Err(ConfigError::ZeroSampleRate)));
    }

    #[test]
    fn test_silence_without_notes() {
        let (_controller, mut renderer) = new_synth(&SynthConfig::default()).unwrap();
        assert!(render(&mut renderer, 256).iter().all(|&s| s == 0.0));
        assert_eq!(renderer.sample_counter(), 256);
    }

    #[test]
    fn test_channels_are_identical() {
        let config = SynthConfig {
            channels: 3,
            ..Default::default()
        };
        let (mut controller, mut renderer) = new_synth(&config).unwrap();
        controller.note_on(KeyPress::new(60));
        let out = render(&mut renderer, 1024);
        assert!(out.iter().any(|&s| s != 0.0));
        for frame in out.chunks(3) {
            assert_eq!(frame[0], frame[1]);
            assert_eq!(frame[0], frame[2]);
        }
    }

    #[test]
    fn test_voice_is_reclaimed_after_release() {
        let mut config = SynthConfig::default();
        config.voice.envelope = EnvelopeShape {
            attack: 10,
            decay: 10,
            release: 100,
            attack_amplitude: 1.0,
            sustain_amplitude: 0.5,
        };
        let (mut controller, mut renderer) = new_synth(&config).unwrap();
        controller.note_on(KeyPress::new(60));
        render(&mut renderer, 64);
        assert_eq!(renderer.voice_phase(0), Some(EnvelopePhase::Sustain));

        controller.note_off(60);
        render(&mut renderer, 64);
        assert_eq!(renderer.voice_phase(0), Some(EnvelopePhase::Release));
        assert_eq!(controller.active_voices(), 1);

        render(&mut renderer, 64);
        assert_eq!(renderer.voice_phase(0), None);
        assert_eq!(controller.active_voices(), 0);
    }

    #[test]
    fn test_panic_stop_silences_immediately() {
        let (mut controller, mut renderer) = new_synth(&SynthConfig::default()).unwrap();
        controller.update((60..64).map(KeyPress::new), []);
        render(&mut renderer, 128);
        assert_eq!(controller.active_voices(), 4);

        controller.panic_stop();
        assert!(render(&mut renderer, 128).iter().all(|&s| s == 0.0));
        assert_eq!(controller.active_voices(), 0);
        assert_eq!(renderer.voice_phase(0), None);
    }

    #[test]
    fn test_panic_stop_spares_later_notes() {
        let (mut controller, mut renderer) = new_synth(&SynthConfig::default()).unwrap();
        controller.update((60..64).map(KeyPress::new), []);
        render(&mut renderer, 128);

        controller.panic_stop();
        assert_eq!(controller.note_on(KeyPress::new(72)), NoteOn::Started(4));
        let out = render(&mut renderer, 1024);
        assert!(out.iter().any(|&s| s != 0.0));
        assert_eq!(controller.active_voices(), 1);
        assert_eq!(renderer.voice_phase(0), None);
        assert!(renderer.voice_phase(4).is_some());
        assert_eq!(controller.note_off(72), Some(4));
    }

    #[test]
    fn test_panic_stop_before_first_callback() {
        let (mut controller, mut renderer) = new_synth(&SynthConfig::default()).unwrap();
        controller.update((60..63).map(KeyPress::new), []);
        controller.panic_stop();
        assert!(render(&mut renderer, 128).iter().all(|&s| s == 0.0));
        assert_eq!(controller.active_voices(), 0);
    }

    #[test]
    fn test_i16_output() {
        let config = SynthConfig {
            sample_format: crate::config::SampleFormat::I16,
            ..Default::default()
        };
        let (mut controller, mut renderer) = new_synth(&config).unwrap();
        controller.note_on(KeyPress::new(69));
        let mut out = vec![0i16; 2048];
        renderer.render(&mut out);
        assert!(out.iter().any(|&s| s != 0));
    }
}
