// Composition parameters, loadable from JSON.
//
// Mirrors the request body a playback front-end sends: every field is
// optional and missing ones take the defaults below (C pentatonic, 8 bars at
// 44 bpm, density 1, fresh seed). Unknown fields are ignored so a request
// object can be passed through as-is.

use crate::error::Result;
use crate::generator::compose_structure;
use crate::song::SongStructure;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeParams {
    pub key: String,
    pub scale: String,
    pub bars: i64,
    pub bpm: i64,
    pub density: i64,
    /// `None` draws a fresh seed; the one used is reported in the result.
    pub seed: Option<u64>,
}

impl Default for ComposeParams {
    fn default() -> Self {
        ComposeParams {
            key: "C".to_string(),
            scale: "pentatonic".to_string(),
            bars: 8,
            bpm: 44,
            density: 1,
            seed: None,
        }
    }
}

impl ComposeParams {
    pub fn from_json_str(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load parameters from a JSON file.
    pub fn load(path: &Path) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&contents)?)
    }

    pub fn compose(&self) -> Result<SongStructure> {
        compose_structure(
            &self.key,
            &self.scale,
            self.bars,
            self.bpm,
            self.density,
            self.seed,
        )
    }
}
