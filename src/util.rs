/// Converts a pitch offset in semitones to the corresponding frequency ratio.
pub fn ratio_from_semitones(semitones: f32) -> f32 {
    2.0_f32.powf(semitones / 12.0)
}

/// Converts a MIDI note value to a frequency in Hz, given the frequency of A4.
pub fn hz_from_note(note: u8, a4: f32) -> f32 {
    a4 * ratio_from_semitones(note as f32 - 69.0)
}

/// Linearly interpolates between `a` and `b`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
