//! Pitch-name parsing and 12-TET frequency resolution.
//!
//! Pitch names follow `<letter><accidental?><octave>`, e.g. `"A4"`, `"Eb3"`,
//! `"G#3"`. Frequencies are referenced to A4 = 440 Hz.

use crate::error::PitchError;

/// A parsed pitch: semitone offset within the octave (C = 0) plus octave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pitch {
    pub semitone: u8,
    pub octave: u16,
}

impl Pitch {
    /// MIDI note number, `(octave + 1) * 12 + semitone`.
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.semitone as i32
    }

    pub fn frequency_hz(&self) -> f32 {
        midi_to_hz(self.midi() as f32)
    }
}

/// Semitone offset for a letter/accidental pair, `None` for pairs such as `Cb` or `E#`.
fn semitone_offset(letter: char, accidental: Option<char>) -> Option<u8> {
    let offset = match (letter, accidental) {
        ('C', None) => 0,
        ('C', Some('#')) | ('D', Some('b')) => 1,
        ('D', None) => 2,
        ('D', Some('#')) | ('E', Some('b')) => 3,
        ('E', None) => 4,
        ('F', None) => 5,
        ('F', Some('#')) | ('G', Some('b')) => 6,
        ('G', None) => 7,
        ('G', Some('#')) | ('A', Some('b')) => 8,
        ('A', None) => 9,
        ('A', Some('#')) | ('B', Some('b')) => 10,
        ('B', None) => 11,
        _ => return None,
    };
    Some(offset)
}

/// Parse a pitch name into its semitone and octave.
pub fn parse_pitch(name: &str) -> Result<Pitch, PitchError> {
    let malformed = || PitchError::Malformed(name.to_string());

    let mut chars = name.chars();
    let letter = chars.next().filter(|c| ('A'..='G').contains(c)).ok_or_else(malformed)?;
    let rest = chars.as_str();
    let (accidental, octave_str) = match rest.chars().next() {
        Some(c @ ('#' | 'b')) => (Some(c), &rest[1..]),
        _ => (None, rest),
    };
    if octave_str.is_empty() || !octave_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let octave: u16 = octave_str.parse().map_err(|_| malformed())?;
    let semitone = semitone_offset(letter, accidental)
        .ok_or_else(|| PitchError::UnknownPitchClass(name.to_string()))?;

    Ok(Pitch { semitone, octave })
}

/// Resolve a pitch name to Hertz, reporting malformed names as errors.
pub fn try_resolve(name: &str) -> Result<f32, PitchError> {
    parse_pitch(name).map(|p| p.frequency_hz())
}

/// Resolve a pitch name to Hertz. Malformed names are logged and yield 0.0,
/// which downstream stages treat as silent.
pub fn resolve(name: &str) -> f32 {
    match try_resolve(name) {
        Ok(hz) => hz,
        Err(e) => {
            log::error!("{}", e);
            0.0
        }
    }
}

/// Convert a MIDI note number to Hertz (A4=440 Hz).
///
/// Monotonic and exhibits octave symmetry: +12 semitones doubles the frequency.
pub fn midi_to_hz(midi: f32) -> f32 {
    440.0 * (2.0_f32).powf((midi - 69.0) / 12.0)
}
