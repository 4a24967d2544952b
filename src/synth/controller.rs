use super::{shared::ProducerHandle, voice::VoiceParams};
use crate::note::Note;
use tracing::{debug, trace};

/// A newly pressed key.
#[derive(Clone, Copy, Debug)]
pub struct KeyPress {
    pub key: u32,
    /// Pitch to sound; defaults to the key index itself.
    pub pitch: Option<Note>,
    /// Replaces the configured voice parameters for this note only.
    pub voice: Option<VoiceParams>,
}

impl KeyPress {
    pub fn new(key: u32) -> Self {
        Self {
            key,
            pitch: None,
            voice: None,
        }
    }

    pub fn with_pitch(self, pitch: Note) -> Self {
        Self {
            pitch: Some(pitch),
            ..self
        }
    }

    pub fn with_voice(self, voice: VoiceParams) -> Self {
        Self {
            voice: Some(voice),
            ..self
        }
    }
}

/// One input event for the producer.
#[derive(Clone, Copy, Debug)]
pub enum KeyEvent {
    Down(KeyPress),
    Up(u32),
    /// Release every held voice.
    AllNotesOff,
    /// Silence everything at once, skipping release phases.
    StopAll,
}

/// Outcome of a key press.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NoteOn {
    /// A voice was allocated in this slot.
    Started(usize),
    /// The key already holds a voice that has not been released.
    AlreadySounding(usize),
    /// Every slot is busy, so the note does not sound.
    Dropped,
    /// The voice override holds values that cannot be rendered.
    Rejected,
}

/// Producer side of the synthesizer: turns key events into voice allocations and releases.
///
/// Never blocks on the audio thread. Lives on whichever thread handles input.
pub struct SynthController {
    shared: ProducerHandle,
    defaults: VoiceParams,
    /// The key each slot was last allocated for, until that key is released.
    bindings: Box<[Option<u32>]>,
}

impl SynthController {
    pub(super) fn new(shared: ProducerHandle, defaults: VoiceParams) -> Self {
        let bindings = vec![None; shared.voices()].into_boxed_slice();
        Self {
            shared,
            defaults,
            bindings,
        }
    }

    pub fn max_voices(&self) -> usize {
        self.bindings.len()
    }

    /// Number of slots currently owned by sounding or releasing voices.
    pub fn active_voices(&self) -> usize {
        self.shared.running_count()
    }

    pub fn defaults(&self) -> &VoiceParams {
        &self.defaults
    }

    /// Allocates a voice for a key that is not already sounding.
    pub fn note_on(&mut self, press: KeyPress) -> NoteOn {
        if let Some(slot) = self.bound_slot(press.key) {
            if !self.shared.is_released(slot) {
                trace!(key = press.key, slot, "key already sounding");
                return NoteOn::AlreadySounding(slot);
            }
            self.bindings[slot] = None;
        }

        let pitch = press.pitch.unwrap_or_else(|| Note::from_key(press.key));
        let params = press.voice.unwrap_or(self.defaults).with_pitch(pitch);
        if let Err(err) = params.validate() {
            debug!(key = press.key, "rejecting voice override: {}", err);
            return NoteOn::Rejected;
        }

        let Some(claimed) = self.shared.claim() else {
            debug!(key = press.key, "no free voice, dropping note");
            return NoteOn::Dropped;
        };
        let slot = claimed.publish(params);
        self.bindings[slot] = Some(press.key);
        trace!(key = press.key, slot, %pitch, "voice started");
        NoteOn::Started(slot)
    }

    /// Releases the voice held by `key`, returning its slot.
    pub fn note_off(&mut self, key: u32) -> Option<usize> {
        let slot = self.bound_slot(key)?;
        self.bindings[slot] = None;
        self.shared.release(slot).then_some(slot)
    }

    /// Applies one input update: presses first, so a key tapped within a single update still sounds.
    pub fn update(
        &mut self,
        pressed: impl IntoIterator<Item = KeyPress>,
        released: impl IntoIterator<Item = u32>,
    ) {
        for press in pressed {
            self.note_on(press);
        }
        for key in released {
            self.note_off(key);
        }
    }

    pub fn handle(&mut self, event: KeyEvent) {
        match event {
            KeyEvent::Down(press) => {
                self.note_on(press);
            }
            KeyEvent::Up(key) => {
                self.note_off(key);
            }
            KeyEvent::AllNotesOff => self.all_notes_off(),
            KeyEvent::StopAll => self.panic_stop(),
        }
    }

    /// Releases every held voice; each one fades out through its release phase.
    pub fn all_notes_off(&mut self) {
        for slot in 0..self.bindings.len() {
            if self.bindings[slot].take().is_some() {
                self.shared.release(slot);
            }
        }
    }

    /// Silences every voice sounding now on the next audio callback, skipping release phases.
    /// Notes started after this call, even before that callback, are left to play.
    pub fn panic_stop(&mut self) {
        self.bindings.fill(None);
        self.shared.request_stop_all();
        debug!("stop-all requested");
    }

    /// The running slot bound to `key`, dropping the binding if the voice was already reclaimed.
    fn bound_slot(&mut self, key: u32) -> Option<usize> {
        let slot = self.bindings.iter().position(|&b| b == Some(key))?;
        if self.shared.is_running(slot) {
            Some(slot)
        } else {
            self.bindings[slot] = None;
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::synth::shared::{voice_state, ConsumerHandle, VoiceMask};

    fn controller(voices: usize) -> (SynthController, ConsumerHandle) {
        let (producer, consumer) = voice_state(voices);
        (SynthController::new(producer, VoiceParams::default()), consumer)
    }

    fn reclaim(consumer: &mut ConsumerHandle, slots: &[usize]) {
        let mut finished = VoiceMask::new(consumer.voices());
        for &slot in slots {
            finished.insert(slot);
        }
        consumer.reclaim(&finished);
    }

    #[test]
    fn test_drops_when_full() {
        let (mut synth, _consumer) = controller(32);
        for key in 0..32 {
            assert_eq!(synth.note_on(KeyPress::new(key)), NoteOn::Started(key as usize));
        }
        assert_eq!(synth.note_on(KeyPress::new(32)), NoteOn::Dropped);
        assert_eq!(synth.active_voices(), 32);
    }

    #[test]
    fn test_rejects_unrenderable_override() {
        let (mut synth, _consumer) = controller(4);
        let mut voice = VoiceParams::default();
        voice.envelope.sustain_amplitude = f32::NAN;
        assert_eq!(synth.note_on(KeyPress::new(60).with_voice(voice)), NoteOn::Rejected);
        assert_eq!(synth.active_voices(), 0);
        assert_eq!(synth.note_off(60), None);
        assert_eq!(synth.note_on(KeyPress::new(60)), NoteOn::Started(0));
    }

    #[test]
    fn test_repeated_key_is_not_reallocated() {
        let (mut synth, _consumer) = controller(4);
        assert_eq!(synth.note_on(KeyPress::new(60)), NoteOn::Started(0));
        assert_eq!(synth.note_on(KeyPress::new(60)), NoteOn::AlreadySounding(0));
        assert_eq!(synth.active_voices(), 1);
    }

    #[test]
    fn test_released_key_can_sound_again() {
        let (mut synth, _consumer) = controller(4);
        synth.note_on(KeyPress::new(60));
        assert_eq!(synth.note_off(60), Some(0));
        // The first voice is still fading out, so a second slot is used.
        assert_eq!(synth.note_on(KeyPress::new(60)), NoteOn::Started(1));
        assert_eq!(synth.note_off(60), Some(1));
        assert_eq!(synth.note_off(60), None);
    }

    #[test]
    fn test_note_off_for_unknown_key() {
        let (mut synth, _consumer) = controller(4);
        assert_eq!(synth.note_off(12), None);
    }

    #[test]
    fn test_reclaimed_binding_is_forgotten() {
        let (mut synth, mut consumer) = controller(2);
        synth.note_on(KeyPress::new(60));
        reclaim(&mut consumer, &[0]);
        assert_eq!(synth.note_off(60), None);
        assert_eq!(synth.note_on(KeyPress::new(60)), NoteOn::Started(0));
    }

    #[test]
    fn test_pitch_and_overrides() {
        let (mut synth, mut consumer) = controller(2);
        let voice = VoiceParams::default().scaled(0.5);
        synth.note_on(KeyPress::new(3).with_pitch(Note(70)).with_voice(voice));
        synth.note_on(KeyPress::new(300));

        assert_eq!(consumer.params(0), Some(voice.with_pitch(Note(70))));
        assert_eq!(consumer.params(1).map(|p| p.pitch), Some(Note::MAX));
    }

    #[test]
    fn test_update_presses_before_releases() {
        let (mut synth, _consumer) = controller(4);
        synth.update([KeyPress::new(1), KeyPress::new(2)], [2]);
        assert_eq!(synth.active_voices(), 2);
        assert_eq!(synth.note_off(1), Some(0));
        assert_eq!(synth.note_off(2), None);
    }

    #[test]
    fn test_handle() {
        let (mut synth, _consumer) = controller(4);
        synth.handle(KeyEvent::Down(KeyPress::new(5)));
        synth.handle(KeyEvent::Down(KeyPress::new(6)));
        assert_eq!(synth.active_voices(), 2);
        synth.handle(KeyEvent::Up(5));
        assert_eq!(synth.note_off(5), None);
        synth.handle(KeyEvent::AllNotesOff);
        assert_eq!(synth.note_off(6), None);
    }

    #[test]
    fn test_all_notes_off() {
        let (mut synth, consumer) = controller(4);
        synth.update((0..3).map(KeyPress::new), []);
        synth.all_notes_off();

        let mut running = VoiceMask::new(4);
        let mut released = VoiceMask::new(4);
        consumer.snapshot(&mut running, &mut released);
        assert_eq!(released, running);
        assert_eq!(released.count(), 3);
    }
}
