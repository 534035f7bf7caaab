// Structure generation: from parameters to melody, chords, and markers.
//
// The piece is laid out bar by bar on a sixteenth-note step grid. The
// melody is a random walk over scale degrees, biased toward small steps, with
// durations drawn from a palette that gets shorter as density rises. The
// last note of every bar is clipped to the bar line, which is what keeps
// the melody exactly `bars * 4` beats long. Chords hold for one or two bars
// and are built from alternate scale degrees above a I/IV/V root. Markers
// sit at fixed points.
//
// Velocity is not random: it follows a slow triangular swell over the whole
// piece with a light accent on each downbeat.
//
// Every random choice goes through the `SeededRng` created here, in a fixed
// order (all melody draws, then all chord draws), so a seed fully determines
// the output. Depends on scale.rs for pitches; the result is consumed by
// midi.rs.

use crate::error::{MusicError, Result};
use crate::scale::{self, ScaleDefinition};
use crate::song::{BEATS_PER_BAR, ChordEvent, Marker, NoteEvent, SongStructure};
use log::{debug, warn};
use meditation_prng::{SeededRng, entropy_seed};

/// Grid resolution: sixteenth notes.
pub const STEPS_PER_BEAT: u32 = 4;
const STEPS_PER_BAR: u32 = BEATS_PER_BAR * STEPS_PER_BEAT;

pub const MAX_BARS: i64 = 1024;
pub const MAX_BPM: i64 = 1000;
pub const MIN_DENSITY: u8 = 1;
pub const MAX_DENSITY: u8 = 4;

const MELODY_OCTAVE: i32 = 4;
const CHORD_OCTAVE: i32 = 3;

/// Degree steps for the melodic walk. Repeats weight the draw toward
/// stepwise motion.
const MELODIC_STEPS: [i32; 10] = [-2, -1, -1, -1, 0, 0, 1, 1, 1, 2];
const LEAPS: [i32; 4] = [-4, -3, 3, 4];
const LEAP_CHANCE: f64 = 0.08;

/// Per density level; density 4 halves a drawn duration about half the time.
const SUBDIVIDE_CHANCE_PER_LEVEL: f64 = 0.12;

/// Chance of doubling the chord root an octave below.
const BASS_CHANCE: f64 = 0.35;

const VELOCITY_FLOOR: u32 = 56;
const VELOCITY_SWELL: u32 = 32;
const DOWNBEAT_ACCENT: u32 = 4;

/// Compose a piece.
///
/// `bars` and `bpm` must be positive (and at most [`MAX_BARS`] /
/// [`MAX_BPM`]). `density` is clamped into 1..=4. With `seed == None` a
/// fresh seed is drawn and reported in the result.
pub fn compose_structure(
    key: &str,
    scale_name: &str,
    bars: i64,
    bpm: i64,
    density: i64,
    seed: Option<u64>,
) -> Result<SongStructure> {
    let bars = validate_bars(bars)?;
    let bpm = validate_bpm(bpm)?;
    let density = clamp_density(density);
    let scale = scale::resolve(key, scale_name)?;

    let seed = match seed {
        Some(seed) => seed,
        None => {
            let drawn = entropy_seed()?;
            debug!("No seed supplied, drew {drawn}");
            drawn
        }
    };
    let mut rng = SeededRng::new(seed);

    let melody = generate_melody(&scale, bars, density, &mut rng);
    let chords = generate_chords(&scale, bars, density, &mut rng);
    let markers = structural_markers(bars);

    debug!(
        "Composed {} {} in {} bars at {} bpm (density {}, seed {}): {} notes, {} chords",
        scale::pitch_name(scale.tonic),
        scale.scale.name(),
        bars,
        bpm,
        density,
        seed,
        melody.len(),
        chords.len()
    );

    Ok(SongStructure {
        melody,
        chords,
        markers,
        seed,
        bars,
        bpm,
        key: scale::pitch_name(scale.tonic).to_string(),
        scale: scale.scale.name().to_string(),
        density,
    })
}

fn validate_bars(bars: i64) -> Result<u32> {
    if bars <= 0 {
        return Err(MusicError::invalid("bars", format!("must be positive, got {bars}")));
    }
    if bars > MAX_BARS {
        return Err(MusicError::invalid(
            "bars",
            format!("must be at most {MAX_BARS}, got {bars}"),
        ));
    }
    Ok(bars as u32)
}

fn validate_bpm(bpm: i64) -> Result<u32> {
    if bpm <= 0 {
        return Err(MusicError::invalid("bpm", format!("must be positive, got {bpm}")));
    }
    if bpm > MAX_BPM {
        return Err(MusicError::invalid(
            "bpm",
            format!("must be at most {MAX_BPM}, got {bpm}"),
        ));
    }
    Ok(bpm as u32)
}

fn clamp_density(density: i64) -> u8 {
    let clamped = density.clamp(MIN_DENSITY as i64, MAX_DENSITY as i64) as u8;
    if clamped as i64 != density {
        warn!("Density {density} out of range, using {clamped}");
    }
    clamped
}

/// Note lengths in steps (whole = 16, half = 8, quarter = 4, eighth = 2).
/// Duplicates weight the uniform draw.
fn duration_palette(density: u8) -> &'static [u32] {
    match density {
        0 | 1 => &[16, 8, 8, 4],
        2 => &[8, 8, 4, 4],
        3 => &[8, 4, 4, 2],
        _ => &[4, 4, 2, 2],
    }
}

fn steps_to_beats(steps: u32) -> f64 {
    steps as f64 / STEPS_PER_BEAT as f64
}

fn generate_melody(
    scale: &ScaleDefinition,
    bars: u32,
    density: u8,
    rng: &mut SeededRng,
) -> Vec<NoteEvent> {
    let total_steps = bars * STEPS_PER_BAR;
    let palette = duration_palette(density);
    let subdivide_chance = SUBDIVIDE_CHANCE_PER_LEVEL * density as f64;

    // Keep the walk within an octave below and two above the tonic.
    let n = scale.degree_count();
    let (low, high) = (-n, 2 * n);

    let mut melody = Vec::new();
    let mut degree = 0;

    for bar in 0..bars {
        let bar_end = (bar + 1) * STEPS_PER_BAR;
        let mut cursor = bar * STEPS_PER_BAR;

        while cursor < bar_end {
            if cursor > 0 {
                degree = next_degree(degree, low, high, rng);
            }

            let mut length = rng.choice(palette).copied().unwrap_or(STEPS_PER_BEAT);
            if length > 1 && rng.random_bool(subdivide_chance) {
                length /= 2;
            }
            // Clip to the bar line.
            let length = length.min(bar_end - cursor);

            melody.push(NoteEvent {
                start: steps_to_beats(cursor),
                duration: steps_to_beats(length),
                pitch: scale.pitch_at(degree, MELODY_OCTAVE),
                velocity: swell_velocity(cursor, total_steps),
            });
            cursor += length;
        }
    }

    // End on the tonic.
    if let Some(last) = melody.last_mut() {
        last.pitch = scale.pitch_at(nearest_tonic(degree, n), MELODY_OCTAVE);
    }

    melody
}

/// One step of the melodic walk, reflected back if it would leave
/// `[low, high]`.
fn next_degree(current: i32, low: i32, high: i32, rng: &mut SeededRng) -> i32 {
    let table: &[i32] = if rng.random_bool(LEAP_CHANCE) {
        &LEAPS
    } else {
        &MELODIC_STEPS
    };
    let step = rng.choice(table).copied().unwrap_or(0);
    let next = current + step;
    if (low..=high).contains(&next) {
        next
    } else {
        current - step
    }
}

/// The tonic degree (a multiple of `n`) closest to `degree`, preferring the
/// lower one on a tie.
fn nearest_tonic(degree: i32, n: i32) -> i32 {
    let below = degree.div_euclid(n) * n;
    if degree - below <= below + n - degree {
        below
    } else {
        below + n
    }
}

/// Triangular swell: quietest at both ends, loudest at the midpoint.
fn swell_velocity(step: u32, total_steps: u32) -> u8 {
    let from_edge = step.min(total_steps - step);
    let swell = VELOCITY_SWELL * 2 * from_edge / total_steps;
    let accent = if step % STEPS_PER_BAR == 0 {
        DOWNBEAT_ACCENT
    } else {
        0
    };
    (VELOCITY_FLOOR + swell + accent) as u8
}

fn generate_chords(
    scale: &ScaleDefinition,
    bars: u32,
    density: u8,
    rng: &mut SeededRng,
) -> Vec<ChordEvent> {
    // Sparse pieces change harmony every two bars.
    let span_bars = if density <= 1 { 2 } else { 1 };
    let roots = [0, scale.degree_nearest(5), scale.degree_nearest(7)];
    let n = scale.degree_count();

    let mut chords = Vec::new();
    let mut bar = 0;
    while bar < bars {
        let span = span_bars.min(bars - bar);
        let root = if bar == 0 || bar + span >= bars {
            0
        } else {
            rng.choice(&roots).copied().unwrap_or(0)
        };

        // Alternate scale degrees: a third in heptatonic scales, not in
        // pentatonic ones.
        let mut notes: Vec<u8> = [root, root + 2, root + 4]
            .iter()
            .map(|&d| scale.pitch_at(d, CHORD_OCTAVE))
            .collect();
        if rng.random_bool(BASS_CHANCE) {
            notes.push(scale.pitch_at(root - n, CHORD_OCTAVE));
        }
        notes.sort_unstable();
        notes.dedup();

        chords.push(ChordEvent {
            start: steps_to_beats(bar * STEPS_PER_BAR),
            duration: steps_to_beats(span * STEPS_PER_BAR),
            notes,
        });
        bar += span;
    }
    chords
}

fn structural_markers(bars: u32) -> Vec<Marker> {
    let total = (bars * BEATS_PER_BAR) as f64;
    let marker = |position: f64, label: &str| Marker {
        position,
        label: label.to_string(),
    };

    let mut markers = vec![marker(0.0, "start"), marker(total / 2.0, "midpoint")];
    if bars >= 2 {
        markers.push(marker(((bars - 1) * BEATS_PER_BAR) as f64, "final bar"));
    }
    markers.push(marker(total, "end"));
    markers
}
