use crate::{
    note::Note,
    synth::{KeyEvent, KeyPress, VoiceParams},
};

/// MIDI controller numbers with a channel-mode meaning.
const ALL_SOUND_OFF: u8 = 120;
const ALL_NOTES_OFF: u8 = 123;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MidiEvent {
    NoteOn {
        channel: u8,
        note: Note,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: Note,
        velocity: u8,
    },
    ControlChange {
        channel: u8,
        control: u8,
        value: u8,
    },
    Invalid,
}

impl MidiEvent {
    pub fn from_raw(data: &[u8]) -> Self {
        match *data {
            [a @ 0x80..=0x8f, note @ 0..=0x7f, velocity] => MidiEvent::NoteOff {
                channel: a & 0x0f,
                note: note.into(),
                velocity,
            },
            [a @ 0x90..=0x9f, note @ 0..=0x7f, velocity] => MidiEvent::NoteOn {
                channel: a & 0x0f,
                note: note.into(),
                velocity,
            },
            [a @ 0xb0..=0xbf, control, value] => MidiEvent::ControlChange {
                channel: a & 0x0f,
                control,
                value,
            },
            _ => MidiEvent::Invalid,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, MidiEvent::Invalid)
    }

    /// Translates the message into a synth key event, keyed by note number.
    /// Velocity scales the envelope amplitudes of `defaults`; a zero-velocity note-on is a key-up.
    pub fn to_key_event(&self, defaults: &VoiceParams) -> Option<KeyEvent> {
        match *self {
            MidiEvent::NoteOn { note, velocity, .. } if velocity > 0 => {
                let voice = defaults.scaled(velocity as f32 / 127.0);
                Some(KeyEvent::Down(
                    KeyPress::new(note.0 as u32).with_pitch(note).with_voice(voice),
                ))
            }
            MidiEvent::NoteOn { note, .. } | MidiEvent::NoteOff { note, .. } => Some(KeyEvent::Up(note.0 as u32)),
            MidiEvent::ControlChange {
                control: ALL_NOTES_OFF, ..
            } => Some(KeyEvent::AllNotesOff),
            MidiEvent::ControlChange {
                control: ALL_SOUND_OFF, ..
            } => Some(KeyEvent::StopAll),
            _ => None,
        }
    }
}
