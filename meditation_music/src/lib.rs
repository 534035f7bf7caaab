// Meditation MIDI Composer
//
// Composes short, calm pieces (a melody over sustained chords) from a key,
// scale, length, tempo, density, and seed, and renders them as Standard MIDI
// Files. The same composition is available as plain event lists for
// client-side playback.
//
// Architecture:
// - scale.rs: Scale catalog, key parsing, degree-to-pitch mapping
// - song.rs: Event types and the SongStructure aggregate
// - generator.rs: Seeded melody walk, chord spans, markers, velocity swell
// - midi.rs: SMF Format 1 output via midly
// - params.rs: JSON-loadable parameters with service defaults
// - error.rs: MusicError
//
// The composer is deterministic given a seed. Each call owns its own
// `SeededRng`, so calls can run concurrently without coordination.

pub mod error;
pub mod generator;
pub mod midi;
pub mod params;
pub mod scale;
pub mod song;

pub use error::MusicError;
pub use generator::compose_structure;
pub use midi::encode_midi;
pub use params::ComposeParams;
pub use song::SongStructure;
