// MIDI output from song structures.
//
// Converts a SongStructure into a Standard MIDI File (SMF Format 1) with
// three tracks: tempo, melody (channel 0), chords (channel 1). Beat
// positions map to ticks at 480 per quarter note, rounded to the nearest
// tick.
//
// Uses the `midly` crate for writing. Each track is assembled as an
// in-memory event list and midly measures the serialized payload to fill in
// every chunk length, so the declared and actual lengths cannot drift.

use crate::error::{MusicError, Result};
use crate::song::SongStructure;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Media type for serving rendered files.
pub const MIDI_CONTENT_TYPE: &str = "audio/midi";

/// Largest value a tempo meta-event can carry (24 bits).
const MAX_TEMPO_MICROSECONDS: u32 = 0x00FF_FFFF;

const MELODY_CHANNEL: u8 = 0;
const CHORD_CHANNEL: u8 = 1;

// General MIDI programs (zero-based).
const MELODY_PROGRAM: u8 = 75; // Pan Flute
const CHORD_PROGRAM: u8 = 89; // Pad 2 (warm)

/// Chords sit under the melody at a fixed, quiet level.
const CHORD_VELOCITY: u8 = 48;

/// Render a song to SMF bytes.
///
/// Pitches and velocities must fit in 7 bits. A structure built by
/// `compose_structure` always does; one deserialized from elsewhere may not,
/// and is rejected with `InvalidParameter` instead of being masked.
pub fn encode_midi(song: &SongStructure) -> Result<Vec<u8>> {
    check_seven_bit(song)?;
    let smf = song_to_smf(song);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Render a song and write it to a file.
pub fn write_midi(song: &SongStructure, path: &Path) -> Result<()> {
    let bytes = encode_midi(song)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Download name for a rendered song: `meditation_<seed>.mid`.
pub fn download_filename(seed: u64) -> String {
    format!("meditation_{seed}.mid")
}

/// Microseconds per quarter note. Integer division truncates; tempos too
/// slow to fit in 24 bits (below 4 bpm) are clamped to the slowest
/// representable value.
pub fn tempo_microseconds(bpm: u32) -> u32 {
    (60_000_000 / bpm.max(1)).min(MAX_TEMPO_MICROSECONDS)
}

pub fn beats_to_ticks(beats: f64) -> u32 {
    (beats * TICKS_PER_QUARTER as f64).round() as u32
}

fn check_seven_bit(song: &SongStructure) -> Result<()> {
    for note in &song.melody {
        if note.pitch > 127 {
            return Err(MusicError::invalid("pitch", format!("{} is above 127", note.pitch)));
        }
        if note.velocity > 127 {
            return Err(MusicError::invalid(
                "velocity",
                format!("{} is above 127", note.velocity),
            ));
        }
    }
    if let Some(&pitch) = song.chords.iter().flat_map(|c| &c.notes).find(|&&p| p > 127) {
        return Err(MusicError::invalid("pitch", format!("{pitch} is above 127")));
    }
    Ok(())
}

/// A note-on or note-off at an absolute tick.
#[derive(Debug, Clone, Copy)]
struct NoteSwitch {
    tick: u32,
    on: bool,
    key: u8,
    vel: u8,
}

impl NoteSwitch {
    fn pair(start: f64, end: f64, key: u8, vel: u8) -> [NoteSwitch; 2] {
        [
            NoteSwitch {
                tick: beats_to_ticks(start),
                on: true,
                key,
                vel,
            },
            NoteSwitch {
                tick: beats_to_ticks(end),
                on: false,
                key,
                vel: 0,
            },
        ]
    }
}

fn song_to_smf(song: &SongStructure) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo track
    let tempo_track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds(
                song.bpm,
            )))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];
    smf.tracks.push(tempo_track);

    let melody: Vec<NoteSwitch> = song
        .melody
        .iter()
        .flat_map(|n| NoteSwitch::pair(n.start, n.end(), n.pitch, n.velocity))
        .collect();
    smf.tracks
        .push(note_track("Melody", MELODY_CHANNEL, MELODY_PROGRAM, melody));

    let chords: Vec<NoteSwitch> = song
        .chords
        .iter()
        .flat_map(|c| {
            c.notes
                .iter()
                .flat_map(move |&key| NoteSwitch::pair(c.start, c.end(), key, CHORD_VELOCITY))
        })
        .collect();
    smf.tracks
        .push(note_track("Chords", CHORD_CHANNEL, CHORD_PROGRAM, chords));

    smf
}

/// Build one instrument track from unordered note switches.
fn note_track(
    name: &'static str,
    channel: u8,
    program: u8,
    mut switches: Vec<NoteSwitch>,
) -> Track<'static> {
    let channel = u4::new(channel);

    // Stable sort: at equal ticks offs come first, and simultaneous ons keep
    // their input (ascending pitch) order.
    switches.sort_by_key(|s| (s.tick, s.on));

    let mut track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(program),
                },
            },
        },
    ];

    let mut last_event_tick: u32 = 0;
    for switch in switches {
        // Range-checked by `check_seven_bit`; `u7::new` would mask silently.
        let key = u7::new(switch.key);
        let vel = u7::new(switch.vel);
        let message = if switch.on {
            MidiMessage::NoteOn { key, vel }
        } else {
            MidiMessage::NoteOff { key, vel }
        };
        track.push(TrackEvent {
            delta: u28::new(switch.tick - last_event_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_event_tick = switch.tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::compose_structure;
    use crate::song::{ChordEvent, NoteEvent};
    use std::collections::HashMap;

    fn tiny_song() -> SongStructure {
        SongStructure {
            melody: vec![
                NoteEvent {
                    start: 0.0,
                    duration: 1.0,
                    pitch: 60,
                    velocity: 70,
                },
                NoteEvent {
                    start: 1.0,
                    duration: 3.0,
                    pitch: 60,
                    velocity: 72,
                },
            ],
            chords: vec![ChordEvent {
                start: 0.0,
                duration: 4.0,
                notes: vec![48, 52, 55],
            }],
            markers: Vec::new(),
            seed: 0,
            bars: 1,
            bpm: 60,
            key: "C".into(),
            scale: "major".into(),
            density: 1,
        }
    }

    /// Walk the raw chunks, checking each declared length against the bytes
    /// that follow. Returns the number of track chunks.
    fn walk_chunks(bytes: &[u8]) -> usize {
        assert_eq!(&bytes[0..4], b"MThd");
        assert_eq!(&bytes[4..8], &6u32.to_be_bytes());
        let mut offset = 14;
        let mut tracks = 0;
        while offset < bytes.len() {
            assert_eq!(&bytes[offset..offset + 4], b"MTrk");
            let len = u32::from_be_bytes(bytes[offset + 4..offset + 8].try_into().unwrap()) as usize;
            let payload = &bytes[offset + 8..offset + 8 + len];
            // Every track payload ends with the end-of-track meta-event.
            assert_eq!(&payload[len - 3..], &[0xFF, 0x2F, 0x00]);
            offset += 8 + len;
            tracks += 1;
        }
        assert_eq!(offset, bytes.len(), "trailing bytes after last chunk");
        tracks
    }

    /// Absolute-tick note on/off events for one parsed track.
    fn note_events(track: &[TrackEvent]) -> Vec<(u32, bool, u8, u8)> {
        let mut tick = 0;
        let mut out = Vec::new();
        for ev in track {
            tick += ev.delta.as_int();
            if let TrackEventKind::Midi { channel, message } = ev.kind {
                match message {
                    MidiMessage::NoteOn { key, .. } => {
                        out.push((tick, true, channel.as_int(), key.as_int()))
                    }
                    MidiMessage::NoteOff { key, .. } => {
                        out.push((tick, false, channel.as_int(), key.as_int()))
                    }
                    _ => {}
                }
            }
        }
        out
    }

    fn assert_matched(events: &[(u32, bool, u8, u8)]) {
        let mut open: HashMap<(u8, u8), u32> = HashMap::new();
        for &(tick, on, channel, key) in events {
            if on {
                assert!(
                    open.insert((channel, key), tick).is_none(),
                    "key {key} started twice at tick {tick}"
                );
            } else {
                let started = open
                    .remove(&(channel, key))
                    .unwrap_or_else(|| panic!("note off without note on: key {key} at {tick}"));
                assert!(tick > started);
            }
        }
        assert!(open.is_empty(), "unterminated notes: {open:?}");
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_midi(&tiny_song()).unwrap();
        assert_eq!(&bytes[8..10], &[0, 1]); // format 1
        assert_eq!(&bytes[10..12], &[0, 3]); // three tracks
        assert_eq!(&bytes[12..14], &TICKS_PER_QUARTER.to_be_bytes());
        assert_eq!(walk_chunks(&bytes), 3);
    }

    #[test]
    fn test_tempo_track() {
        let bytes = encode_midi(&tiny_song()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(480)));

        let tempo = &smf.tracks[0];
        assert_eq!(tempo.len(), 2);
        assert_eq!(
            tempo[0].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(1_000_000)))
        );
        assert_eq!(tempo[1].kind, TrackEventKind::Meta(MetaMessage::EndOfTrack));
    }

    #[test]
    fn test_repeated_pitch_releases_before_restrike() {
        let bytes = encode_midi(&tiny_song()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let events = note_events(&smf.tracks[1]);
        assert_eq!(
            events,
            vec![
                (0, true, 0, 60),
                (480, false, 0, 60),
                (480, true, 0, 60),
                (1920, false, 0, 60),
            ]
        );
        assert_matched(&events);
    }

    #[test]
    fn test_chord_notes_start_and_stop_together() {
        let bytes = encode_midi(&tiny_song()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let events = note_events(&smf.tracks[2]);
        assert_eq!(
            events,
            vec![
                (0, true, 1, 48),
                (0, true, 1, 52),
                (0, true, 1, 55),
                (1920, false, 1, 48),
                (1920, false, 1, 52),
                (1920, false, 1, 55),
            ]
        );
    }

    #[test]
    fn test_composed_songs_are_well_formed() {
        for (scale, density) in [("pentatonic", 1), ("major", 2), ("dorian", 3), ("lydian", 4)] {
            for seed in 0..5 {
                let song = compose_structure("F#", scale, 6, 72, density, Some(seed)).unwrap();
                let bytes = encode_midi(&song).unwrap();
                assert_eq!(walk_chunks(&bytes), 3);

                let smf = Smf::parse(&bytes).unwrap();
                let end_tick = 6 * 4 * TICKS_PER_QUARTER as u32;
                for track in &smf.tracks[1..] {
                    let events = note_events(track);
                    assert_matched(&events);
                    assert_eq!(events.last().map(|e| e.0), Some(end_tick));
                    assert!(events.windows(2).all(|w| w[0].0 <= w[1].0));
                }

                let ons = note_events(&smf.tracks[1]).iter().filter(|e| e.1).count();
                assert_eq!(ons, song.melody.len());
            }
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let song = compose_structure("Bb", "mixolydian", 8, 48, 2, Some(77)).unwrap();
        assert_eq!(encode_midi(&song).unwrap(), encode_midi(&song).unwrap());
    }

    #[test]
    fn test_tempo_microseconds() {
        assert_eq!(tempo_microseconds(60), 1_000_000);
        assert_eq!(tempo_microseconds(44), 1_363_636);
        assert_eq!(tempo_microseconds(120), 500_000);
        assert_eq!(tempo_microseconds(1), MAX_TEMPO_MICROSECONDS);
    }

    #[test]
    fn test_beats_to_ticks() {
        assert_eq!(beats_to_ticks(0.0), 0);
        assert_eq!(beats_to_ticks(0.25), 120);
        assert_eq!(beats_to_ticks(32.0), 15_360);
    }

    #[test]
    fn test_write_midi_to_file() {
        let song = compose_structure("C", "pentatonic", 2, 60, 1, Some(42)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(download_filename(song.seed));
        write_midi(&song, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), encode_midi(&song).unwrap());
        assert!(path.ends_with("meditation_42.mid"));
        assert_eq!(MIDI_CONTENT_TYPE, "audio/midi");
    }

    #[test]
    fn test_out_of_range_pitch_is_rejected() {
        let mut song = tiny_song();
        song.melody[1].pitch = 200;
        let err = encode_midi(&song).unwrap_err();
        assert!(
            matches!(err, MusicError::InvalidParameter { name: "pitch", .. }),
            "got {err:?}"
        );

        let mut song = tiny_song();
        song.chords[0].notes.push(128);
        assert!(matches!(
            encode_midi(&song),
            Err(MusicError::InvalidParameter { name: "pitch", .. })
        ));
    }

    #[test]
    fn test_out_of_range_velocity_is_rejected() {
        let mut song = tiny_song();
        song.melody[0].velocity = 128;
        assert!(matches!(
            encode_midi(&song),
            Err(MusicError::InvalidParameter { name: "velocity", .. })
        ));

        // Boundary values still encode.
        song.melody[0].velocity = 127;
        song.melody[0].pitch = 127;
        assert!(encode_midi(&song).is_ok());
    }
}
