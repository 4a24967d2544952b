use crate::util::hz_from_note;

const PITCH_CLASSES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// A pitch index on the 128-step equal-tempered scale, numbered like MIDI notes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Note(pub u8);

impl Note {
    pub const MAX: Note = Note(127);

    pub fn middle_c() -> Self {
        Self(60)
    }

    /// Maps an arbitrary key index onto the pitch range, saturating at the top.
    pub fn from_key(key: u32) -> Self {
        Self(key.min(Self::MAX.0 as u32) as u8)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn pitch_class(&self) -> &'static str {
        PITCH_CLASSES[self.0 as usize % 12]
    }

    pub fn octave(&self) -> i8 {
        (self.0 / 12) as i8 - 1
    }

    /// Frequency in Hz for the given A4 reference.
    pub fn frequency(&self, a4: f32) -> f32 {
        hz_from_note(self.0, a4)
    }

    pub fn transpose(&self, offset: i8) -> Self {
        Self(self.0.saturating_add_signed(offset).min(Self::MAX.0))
    }
}

impl From<u8> for Note {
    fn from(value: u8) -> Self {
        Self(value.min(Self::MAX.0))
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

impl std::fmt::Debug for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Note({} = {})", self.0, self)
    }
}
