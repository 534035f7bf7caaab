// The composed song: melody notes, sustained chords, and section markers.
//
// All positions and lengths are in quarter-note beats. The generator works
// in whole sixteenth steps internally, so every beat value here is an exact
// binary fraction and sums of durations compare exactly.
//
// The structure is the "source of truth" for a composition. MIDI is derived
// from it (midi.rs), and it serializes with the field names the playback
// client expects.

use serde::{Deserialize, Serialize};

/// Fixed meter: 4/4.
pub const BEATS_PER_BAR: u32 = 4;

/// One melodic note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Onset in beats from the start of the piece.
    pub start: f64,
    #[serde(rename = "dur")]
    pub duration: f64,
    /// MIDI pitch, 0-127.
    #[serde(rename = "midi")]
    pub pitch: u8,
    /// 1-127.
    #[serde(rename = "vel")]
    pub velocity: u8,
}

impl NoteEvent {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A group of pitches sounding together for the whole span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    pub start: f64,
    #[serde(rename = "dur")]
    pub duration: f64,
    /// Ascending, deduplicated, never empty.
    pub notes: Vec<u8>,
}

impl ChordEvent {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A labelled structural point. Never sounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub position: f64,
    pub label: String,
}

/// Everything a composition produced, plus the parameters needed to replay it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongStructure {
    /// Sorted by start, gapless, non-overlapping.
    pub melody: Vec<NoteEvent>,
    /// Tiles the piece with no gaps.
    pub chords: Vec<ChordEvent>,
    /// Sorted by position.
    pub markers: Vec<Marker>,
    /// The seed actually used, whether supplied or drawn.
    pub seed: u64,
    pub bars: u32,
    pub bpm: u32,
    /// Note name of the resolved tonic.
    pub key: String,
    /// Canonical name of the resolved scale.
    pub scale: String,
    /// Density after clamping.
    pub density: u8,
}

impl SongStructure {
    /// Length of the piece in beats.
    pub fn total_beats(&self) -> f64 {
        (self.bars * BEATS_PER_BAR) as f64
    }
}
