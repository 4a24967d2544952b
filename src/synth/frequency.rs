use crate::note::Note;

const PITCH_COUNT: usize = Note::MAX.0 as usize + 1;

/// Precomputed frequencies for every pitch index of the equal-tempered scale.
#[derive(Clone, Debug)]
pub struct FrequencyTable {
    hz: [f32; PITCH_COUNT],
}

impl FrequencyTable {
    /// Builds the table around the given A4 reference frequency.
    pub fn new(a4: f32) -> Self {
        Self {
            hz: core::array::from_fn(|i| Note(i as u8).frequency(a4)),
        }
    }

    pub fn frequency(&self, note: Note) -> f32 {
        self.hz[note.index()]
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new(440.0)
    }
}
