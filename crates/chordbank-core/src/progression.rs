//! Chord progressions and their expansion into per-filter target frequencies.

use smallvec::SmallVec;

use crate::chords::ChordTable;
use crate::constants::FILTER_COUNT;
use crate::error::ProgressionError;
use crate::pitch::resolve;

use self::BarEntry::{Chord, Split};

/// Target centre frequency for each filter channel, in Hertz. Zero means silent.
pub type FilterTargets = [f32; FILTER_COUNT];

/// One bar of a progression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarEntry {
    /// A single chord held for the whole bar.
    Chord(&'static str),
    /// The bar divided into equal subdivisions, one sub-chord each.
    Split(&'static [&'static str]),
}

impl BarEntry {
    /// Number of timed events this bar produces.
    pub fn subdivisions(&self) -> usize {
        match self {
            Chord(_) => 1,
            Split(parts) => parts.len(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Chord(name) => (*name).to_string(),
            Split(parts) => format!("[{}]", parts.join(", ")),
        }
    }
}

/// "March for the Beloved", chord changes as written in the score (A minor).
#[rustfmt::skip]
pub const MARCHING_ORIG: &[BarEntry] = &[
    Chord("Am"), Chord("Am"), Chord("Am"), Chord("E7"),
    Chord("Dm"), Chord("Am"), Chord("E7"), Chord("Am"),
    Chord("Am"), Chord("Am"), Chord("Am"), Chord("E7"),
    Chord("Dm"), Chord("Am"), Chord("E7"), Chord("Am"),
    Chord("F"), Chord("Am"), Chord("C"), Chord("E7"),
    Chord("F"), Chord("Am"), Chord("C"), Chord("G"),
    Chord("Am"), Chord("Dm"), Chord("Am"), Chord("E7"),
    Chord("Am"), Chord("Am"), Chord("E7"), Chord("Am"),
];

/// Reharmonised arrangement in C minor with split bars.
#[rustfmt::skip]
pub const MARCHING_NEW: &[BarEntry] = &[
    Chord("Cm"), Chord("Cm"), Split(&["Cm", "Cm", "Cm", "Ddim7"]), Split(&["Eb", "CtoE"]),
    Chord("Fm"), Chord("Cm"), Chord("G"), Chord("Cm"),
    Chord("Cm"), Chord("Cm"), Split(&["Cm", "Cm", "Cm", "Ddim7"]), Split(&["Eb", "CtoE"]),
    Chord("Fm"), Chord("Cm"), Chord("G"), Chord("Cm"),
    Chord("Fm"), Chord("Cm"), Chord("Bb"), Split(&["Eb", "CtoE"]),
    Chord("Fm"), Chord("Cm"), Chord("Dhalfdim7"), Split(&["Csus4", "G"]),
    Chord("Cm"), Chord("Fm"), Chord("Eb"), Chord("G"),
    Chord("Cm"), Chord("Eb"), Chord("G"), Chord("Cm"),
];

/// A named, looping sequence of bars.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progression {
    name: &'static str,
    bars: &'static [BarEntry],
}

impl Progression {
    pub const BUILTIN_NAMES: &'static [&'static str] = &["marching_orig", "marching_new"];

    pub fn new(name: &'static str, bars: &'static [BarEntry]) -> Result<Self, ProgressionError> {
        if bars.is_empty() {
            return Err(ProgressionError::Empty(name));
        }
        if let Some(bar) = bars.iter().position(|b| b.subdivisions() == 0) {
            return Err(ProgressionError::EmptySplit { name, bar });
        }
        Ok(Self { name, bars })
    }

    /// Look up one of the built-in arrangements by name.
    pub fn builtin(name: &str) -> Option<Self> {
        let (name, bars) = match name {
            "marching_orig" => ("marching_orig", MARCHING_ORIG),
            "marching_new" => ("marching_new", MARCHING_NEW),
            _ => return None,
        };
        Self::new(name, bars).ok()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bars(&self) -> &'static [BarEntry] {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bar for an unbounded bar index; the progression wraps.
    pub fn bar_at(&self, index: usize) -> &'static BarEntry {
        &self.bars[index % self.bars.len()]
    }
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            name: "marching_new",
            bars: MARCHING_NEW,
        }
    }
}

/// How a sub-chord is voiced across the four channels of its subdivision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubChordVoicing {
    /// Sub-chord at index `i` contributes its pitch `i` (or pitch 0) to every channel.
    #[default]
    IndexedPitch,
    /// Each subdivision plays its sub-chord's full four-note voicing.
    FullChord,
}

/// Result of expanding one bar.
#[derive(Clone, Debug, PartialEq)]
pub enum Expansion {
    Whole(FilterTargets),
    Subdivided(SmallVec<[FilterTargets; 4]>),
}

/// Frequencies of a chord's four pitches, or all zeros for an unknown chord.
pub fn chord_targets(chord: &str, table: &ChordTable) -> FilterTargets {
    match table.voicing(chord) {
        Some(voicing) => voicing.map(resolve),
        None => {
            log::warn!("unknown chord {:?}; filters go silent for this slot", chord);
            [0.0; FILTER_COUNT]
        }
    }
}

fn indexed_targets(chord: &str, index: usize, table: &ChordTable) -> FilterTargets {
    match table.voicing(chord) {
        Some(voicing) => {
            let pitch = voicing.get(index).unwrap_or(&voicing[0]);
            [resolve(pitch); FILTER_COUNT]
        }
        None => {
            log::warn!("unknown sub-chord {:?}; filters go silent for this slot", chord);
            [0.0; FILTER_COUNT]
        }
    }
}

/// Expand a bar with the default sub-chord voicing.
pub fn expand(entry: &BarEntry, table: &ChordTable) -> Expansion {
    expand_with(entry, table, SubChordVoicing::default())
}

pub fn expand_with(entry: &BarEntry, table: &ChordTable, voicing: SubChordVoicing) -> Expansion {
    match entry {
        Chord(name) => Expansion::Whole(chord_targets(name, table)),
        Split(parts) => Expansion::Subdivided(
            parts
                .iter()
                .enumerate()
                .map(|(i, sub)| match voicing {
                    SubChordVoicing::IndexedPitch => indexed_targets(sub, i, table),
                    SubChordVoicing::FullChord => chord_targets(sub, table),
                })
                .collect(),
        ),
    }
}

/// Length of one bar in seconds, `beats_per_bar * 60 / bpm`.
pub fn bar_duration_secs(bpm: f32, beats_per_bar: u32) -> f64 {
    beats_per_bar as f64 * 60.0 / bpm as f64
}

/// Start offsets (seconds from bar start) of `count` equal subdivisions.
pub fn subdivision_offsets(bar_secs: f64, count: usize) -> impl Iterator<Item = f64> {
    let step = if count == 0 { 0.0 } else { bar_secs / count as f64 };
    (0..count).map(move |i| i as f64 * step)
}
