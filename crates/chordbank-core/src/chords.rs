use crate::constants::FILTER_COUNT;

/// Four pitch names ordered (root, third, fifth, extension), one per filter channel.
pub type Voicing = [&'static str; FILTER_COUNT];

/// Voicings used by the march arrangements.
pub const MARCH_CHORDS: &[(&str, Voicing)] = &[
    ("Am", ["A2", "C3", "E3", "A3"]),
    ("E7", ["E3", "G#3", "B3", "D4"]),
    ("Dm", ["D3", "F3", "A3", "D4"]),
    ("F", ["C3", "F3", "A3", "C4"]),
    ("C", ["C3", "E3", "G3", "C4"]),
    ("G", ["D3", "G3", "B3", "D4"]),
    ("Cm", ["C3", "Eb3", "G3", "C4"]),
    ("Ddim7", ["D3", "F3", "Ab3", "B3"]),
    ("Dhalfdim7", ["D3", "F3", "Ab3", "C4"]),
    ("Csus4", ["C3", "F3", "G3", "C4"]),
    ("Eb", ["Eb3", "G3", "Bb3", "Eb4"]),
    ("Bb", ["Bb2", "D3", "F3", "Bb3"]),
    ("CtoE", ["E3", "G3", "C4", "E4"]),
    ("Fm", ["C3", "F3", "Ab3", "C4"]),
];

/// Static chord-name lookup. Cheap to copy; entries are never mutated.
#[derive(Clone, Copy, Debug)]
pub struct ChordTable {
    entries: &'static [(&'static str, Voicing)],
}

impl ChordTable {
    pub const fn new(entries: &'static [(&'static str, Voicing)]) -> Self {
        Self { entries }
    }

    pub fn voicing(&self, chord: &str) -> Option<&'static Voicing> {
        self.entries
            .iter()
            .find(|(name, _)| *name == chord)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, chord: &str) -> bool {
        self.voicing(chord).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ChordTable {
    fn default() -> Self {
        Self::new(MARCH_CHORDS)
    }
}
