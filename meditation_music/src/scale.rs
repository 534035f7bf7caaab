// Scale catalog and degree-to-pitch mapping.
//
// A scale is an ordered list of semitone offsets from the tonic. Bound to a
// key (tonic pitch class) it becomes a `ScaleDefinition`, which maps any
// integer scale degree at any octave to a MIDI pitch. Degrees past either
// end of the list wrap into neighbouring octaves, so the generator can walk
// freely without bounds checks.
//
// This module provides:
// - The supported scales and their names (with a few aliases)
// - `resolve`, turning the caller's key/scale strings into a definition
// - Key name parsing with a fixed fallback to C
//
// Used by generator.rs for both the melody walk and chord stacking.

use crate::error::{MusicError, Result};
use serde::{Deserialize, Serialize};

/// Tonic used when a key name cannot be parsed (C).
pub const DEFAULT_KEY: u8 = 0;

/// The supported scales, each defined by its interval pattern from the tonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scale {
    /// Major pentatonic: 1 2 3 5 6. The default, and the most forgiving.
    Pentatonic,
    /// Minor pentatonic: 1 b3 4 5 b7
    MinorPentatonic,
    /// Ionian
    Major,
    /// Aeolian
    NaturalMinor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
}

impl Scale {
    pub const ALL: [Scale; 8] = [
        Scale::Pentatonic,
        Scale::MinorPentatonic,
        Scale::Major,
        Scale::NaturalMinor,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
    ];

    /// Semitone offsets from the tonic, strictly increasing, starting at 0.
    pub fn offsets(self) -> &'static [u8] {
        match self {
            Scale::Pentatonic => &[0, 2, 4, 7, 9],
            Scale::MinorPentatonic => &[0, 3, 5, 7, 10],
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
        }
    }

    /// Canonical catalog name.
    pub fn name(self) -> &'static str {
        match self {
            Scale::Pentatonic => "pentatonic",
            Scale::MinorPentatonic => "minor-pentatonic",
            Scale::Major => "major",
            Scale::NaturalMinor => "natural-minor",
            Scale::Dorian => "dorian",
            Scale::Phrygian => "phrygian",
            Scale::Lydian => "lydian",
            Scale::Mixolydian => "mixolydian",
        }
    }

    /// Look up a scale by name. Case-insensitive; `_` and spaces count as `-`.
    pub fn from_name(name: &str) -> Option<Scale> {
        let normalized: String = name
            .trim()
            .chars()
            .map(|c| match c {
                '_' | ' ' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "pentatonic" | "major-pentatonic" => Some(Scale::Pentatonic),
            "minor-pentatonic" => Some(Scale::MinorPentatonic),
            "major" | "ionian" => Some(Scale::Major),
            "natural-minor" | "minor" | "aeolian" => Some(Scale::NaturalMinor),
            "dorian" => Some(Scale::Dorian),
            "phrygian" => Some(Scale::Phrygian),
            "lydian" => Some(Scale::Lydian),
            "mixolydian" => Some(Scale::Mixolydian),
            _ => None,
        }
    }
}

/// A scale bound to a tonic pitch class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleDefinition {
    pub scale: Scale,
    /// Pitch class of the tonic (0 = C, 2 = D, ...).
    pub tonic: u8,
}

impl ScaleDefinition {
    pub fn new(scale: Scale, tonic: u8) -> Self {
        ScaleDefinition {
            scale,
            tonic: tonic % 12,
        }
    }

    pub fn offsets(&self) -> &'static [u8] {
        self.scale.offsets()
    }

    /// Number of degrees per octave.
    pub fn degree_count(&self) -> i32 {
        self.offsets().len() as i32
    }

    /// MIDI pitch of a scale degree at an octave (octave 4 holds middle C).
    ///
    /// Degree 0 is the tonic. Negative degrees and degrees past the end of
    /// the scale wrap into lower and higher octaves. A result outside the
    /// MIDI range is folded back by whole octaves, keeping its pitch class.
    pub fn pitch_at(&self, degree: i32, octave: i32) -> u8 {
        let offsets = self.offsets();
        let n = offsets.len() as i32;
        let octave_shift = degree.div_euclid(n) as i64;
        let offset = offsets[degree.rem_euclid(n) as usize] as i64;

        let mut pitch = (octave as i64 + 1 + octave_shift) * 12 + self.tonic as i64 + offset;
        if pitch > 127 {
            pitch -= (pitch - 127 + 11) / 12 * 12;
        } else if pitch < 0 {
            pitch += (-pitch + 11) / 12 * 12;
        }
        pitch as u8
    }

    /// Check if a MIDI pitch belongs to this scale.
    pub fn contains(&self, pitch: u8) -> bool {
        let pc = (pitch % 12 + 12 - self.tonic) % 12;
        self.offsets().contains(&pc)
    }

    /// The degree whose offset lies closest to `semitones` above the tonic.
    /// Ties go to the lower degree.
    ///
    /// Lets "IV" and "V" mean something in scales that lack a perfect 4th or
    /// 5th (the pentatonic has no 4th; its IV equivalent is the 3rd).
    pub fn degree_nearest(&self, semitones: u8) -> i32 {
        let mut best = 0;
        let mut best_dist = u8::MAX;
        for (degree, &offset) in self.offsets().iter().enumerate() {
            let dist = offset.abs_diff(semitones);
            if dist < best_dist {
                best = degree as i32;
                best_dist = dist;
            }
        }
        best
    }
}

/// Resolve the caller's key and scale names.
///
/// Unknown scales are rejected. Unknown keys fall back to [`DEFAULT_KEY`]
/// with a warning; see [`key_or_default`].
pub fn resolve(key: &str, scale_name: &str) -> Result<ScaleDefinition> {
    let scale =
        Scale::from_name(scale_name).ok_or_else(|| MusicError::UnknownScale(scale_name.to_string()))?;
    Ok(ScaleDefinition::new(scale, key_or_default(key)))
}

/// Parse a key name such as `C`, `f#`, `Bb`, `E♭` into a pitch class.
pub fn parse_key(name: &str) -> Option<u8> {
    let name = name.trim();
    let mut chars = name.chars();
    let natural: i8 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let accidental: i8 = match chars.as_str() {
        "" => 0,
        "#" | "♯" | "s" | "sharp" => 1,
        "b" | "♭" | "flat" => -1,
        _ => return None,
    };
    Some((natural + accidental).rem_euclid(12) as u8)
}

/// Parse a key name, falling back to C when it is not recognised.
pub fn key_or_default(name: &str) -> u8 {
    parse_key(name).unwrap_or_else(|| {
        log::warn!("Unknown key '{name}', using {}", pitch_name(DEFAULT_KEY));
        DEFAULT_KEY
    })
}

pub fn pitch_name(pc: u8) -> &'static str {
    match pc % 12 {
        0 => "C",
        1 => "C#",
        2 => "D",
        3 => "Eb",
        4 => "E",
        5 => "F",
        6 => "F#",
        7 => "G",
        8 => "Ab",
        9 => "A",
        10 => "Bb",
        _ => "B",
    }
}
