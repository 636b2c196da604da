//! Pitch-ratio table
//!
//! Maps computer keys to notes across two configurable octaves.
//! Each entry stores the ratio of the note to the base frequency, where the
//! base frequency is the pitch of `A` in octave 1.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Base frequency a new controller starts with
pub const DEFAULT_BASE_FREQUENCY: f64 = 440.0;

/// Base frequency restored by `reset()`
pub const RESET_BASE_FREQUENCY: f64 = 220.0;

/// Exclusive upper bound for the base frequency
pub const MAX_BASE_FREQUENCY: f64 = 30000.0;

/// Lowest selectable octave
pub const MIN_OCTAVE: u8 = 1;

/// Highest selectable octave
pub const MAX_OCTAVE: u8 = 7;

/// Default octave of the lower key row
pub const DEFAULT_FIRST_OCTAVE: u8 = 1;

/// Default octave of the upper key row
pub const DEFAULT_SECOND_OCTAVE: u8 = 2;

/// Semitone of `A` within a C-based octave
const A_SEMITONE: i32 = 9;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Keyboard layout preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardLayout {
    /// US QWERTY layout
    #[default]
    Us,
    /// German QWERTZ layout
    German,
}

/// Which of the two octave rows a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OctaveRow {
    /// Bottom and home row, tuned by `first_octave`
    First,
    /// Number and QWERTY row, tuned by `second_octave`
    Second,
}

/// A key mapping entry: computer key -> semitone within its row
#[derive(Debug, Clone)]
pub struct KeyMapping {
    /// The character representing this key (lowercase)
    pub key_char: char,
    /// Semitone above C (0-11)
    pub semitone: u8,
    /// Row the key belongs to
    pub row: OctaveRow,
}

impl KeyboardLayout {
    /// Key rows for this layout
    ///
    /// ```text
    ///  Second octave (number + QWERTY rows, US):
    ///     2   3       5   6   7
    ///    Q   W   E   R   T   Y   U
    ///
    ///  First octave (home + bottom rows, US):
    ///     S   D       G   H   J
    ///    Z   X   C   V   B   N   M
    /// ```
    ///
    /// German QWERTZ swaps Z and Y.
    pub fn mappings(self) -> Vec<KeyMapping> {
        let (first, second) = match self {
            KeyboardLayout::Us => ("zsxdcvgbhnjm", "q2w3er5t6y7u"),
            KeyboardLayout::German => ("ysxdcvgbhnjm", "q2w3er5t6z7u"),
        };

        let build_row = |keys: &str, row: OctaveRow| -> Vec<KeyMapping> {
            keys.chars()
                .enumerate()
                .map(|(semitone, key_char)| KeyMapping {
                    key_char,
                    semitone: semitone as u8,
                    row,
                })
                .collect()
        };

        let mut mappings = build_row(first, OctaveRow::First);
        mappings.extend(build_row(second, OctaveRow::Second));
        mappings
    }
}

/// A single table entry
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEntry {
    /// Note label, e.g. `A1` or `C#2`
    pub note: String,
    /// Ratio to the base frequency
    pub ratio: f64,
}

/// Key -> (note, ratio) table derived from the octave settings
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    layout: KeyboardLayout,
    first_octave: u8,
    second_octave: u8,
    entries: HashMap<char, NoteEntry>,
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new(KeyboardLayout::default(), DEFAULT_FIRST_OCTAVE, DEFAULT_SECOND_OCTAVE)
    }
}

impl FrequencyTable {
    /// Build the table for a layout and two octaves.
    ///
    /// Octaves are expected to be validated already.
    pub fn new(layout: KeyboardLayout, first_octave: u8, second_octave: u8) -> Self {
        let entries = layout
            .mappings()
            .into_iter()
            .map(|m| {
                let octave = match m.row {
                    OctaveRow::First => first_octave,
                    OctaveRow::Second => second_octave,
                };
                let entry = NoteEntry {
                    note: note_label(m.semitone, octave),
                    ratio: pitch_ratio(m.semitone, octave),
                };
                (m.key_char, entry)
            })
            .collect();

        Self {
            layout,
            first_octave,
            second_octave,
            entries,
        }
    }

    /// Layout this table was built for
    pub fn layout(&self) -> KeyboardLayout {
        self.layout
    }

    /// Octave of the lower row
    pub fn first_octave(&self) -> u8 {
        self.first_octave
    }

    /// Octave of the upper row
    pub fn second_octave(&self) -> u8 {
        self.second_octave
    }

    /// Look up a key. Only single characters match, case-insensitively.
    pub fn get(&self, key: &str) -> Option<&NoteEntry> {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => self.entries.get(&c.to_ascii_lowercase()),
            _ => None,
        }
    }

    /// Check if a key is part of the key set
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of mapped keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries sorted from lowest to highest pitch
    pub fn sorted(&self) -> Vec<(char, &NoteEntry)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(&k, e)| (k, e)).collect();
        entries.sort_by(|a, b| a.1.ratio.total_cmp(&b.1.ratio).then(a.0.cmp(&b.0)));
        entries
    }
}

/// Ratio of a note to `A` in octave 1
pub fn pitch_ratio(semitone: u8, octave: u8) -> f64 {
    let octave_factor = 2f64.powi(octave as i32 - 1);
    octave_factor * 2f64.powf((semitone as i32 - A_SEMITONE) as f64 / 12.0)
}

/// Note label for a semitone above C in the given octave
pub fn note_label(semitone: u8, octave: u8) -> String {
    format!("{}{}", NOTE_NAMES[(semitone % 12) as usize], octave)
}

/// Check that a base frequency lies in (0, 30000)
pub fn validate_base_frequency(frequency: f64) -> Result<f64> {
    if frequency > 0.0 && frequency < MAX_BASE_FREQUENCY {
        Ok(frequency)
    } else if frequency <= 0.0 {
        Err(Error::Configuration(format!(
            "Base frequency boundaries exceeded. Base frequency must be higher than 0, got {}",
            frequency
        )))
    } else {
        // also covers NaN
        Err(Error::Configuration(format!(
            "Base frequency boundaries exceeded. Base frequency must be lower than {}, got {}",
            MAX_BASE_FREQUENCY, frequency
        )))
    }
}

/// Check that an octave lies in 1..=7
pub fn validate_octave(octave: u8) -> Result<u8> {
    if (MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
        Ok(octave)
    } else {
        Err(Error::Configuration(format!(
            "Octave out of range. Please select an octave between {} and {}, got {}",
            MIN_OCTAVE, MAX_OCTAVE, octave
        )))
    }
}
