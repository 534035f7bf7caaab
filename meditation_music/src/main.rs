// Meditation MIDI Composer, CLI entry point.
//
// Composes a piece and writes it as a Standard MIDI File, optionally with
// the structure (melody, chords, markers, seed, bpm) as JSON for playback.
// Parameters come from an optional JSON file, then command-line flags.
//
// Usage:
//   cargo run -p meditation_music -- [--params FILE] [--key KEY] [--scale SCALE]
//     [--bars N] [--bpm N] [--density N] [--seed N] [--out FILE.mid] [--json FILE]
//
// Scales: pentatonic, minor-pentatonic, major, natural-minor, dorian,
//   phrygian, lydian, mixolydian

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use meditation_music::midi::{download_filename, write_midi};
use meditation_music::params::ComposeParams;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "generate", about = "Compose a meditative melody and write it as MIDI")]
struct Args {
    /// JSON file with any of: key, scale, bars, bpm, density, seed.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Tonic, e.g. C, F#, Bb. Unknown names fall back to C.
    #[arg(short, long)]
    key: Option<String>,

    #[arg(short, long)]
    scale: Option<String>,

    #[arg(short, long)]
    bars: Option<i64>,

    #[arg(long)]
    bpm: Option<i64>,

    /// 1 (sparse) to 4 (busy).
    #[arg(short, long)]
    density: Option<i64>,

    /// Reuse a reported seed to reproduce a piece exactly.
    #[arg(long)]
    seed: Option<u64>,

    /// Output path. Defaults to meditation_<seed>.mid.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Also write the song structure as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut params = match &args.params {
        Some(path) => ComposeParams::load(path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("reading parameters from {}", path.display()))?,
        None => ComposeParams::default(),
    };
    if let Some(key) = args.key {
        params.key = key;
    }
    if let Some(scale) = args.scale {
        params.scale = scale;
    }
    if let Some(bars) = args.bars {
        params.bars = bars;
    }
    if let Some(bpm) = args.bpm {
        params.bpm = bpm;
    }
    if let Some(density) = args.density {
        params.density = density;
    }
    if args.seed.is_some() {
        params.seed = args.seed;
    }

    let song = params.compose().context("composing")?;
    info!(
        "Composed {} {}, {} bars at {} bpm, seed {}",
        song.key, song.scale, song.bars, song.bpm, song.seed
    );
    info!(
        "{} melody notes, {} chords",
        song.melody.len(),
        song.chords.len()
    );

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(download_filename(song.seed)));
    write_midi(&song, &out).with_context(|| format!("writing MIDI to {}", out.display()))?;
    info!("Wrote {}", out.display());

    if let Some(json_path) = args.json {
        let json = serde_json::to_string_pretty(&song)?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("writing structure to {}", json_path.display()))?;
        info!("Wrote {}", json_path.display());
    }

    println!("{}", out.display());
    Ok(())
}
