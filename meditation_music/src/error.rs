// Error taxonomy for composition and encoding.
//
// Parameter problems are the caller's fault and carry the offending name so
// a transport layer can report them verbatim. `Encode` only exists because
// the SMF writer is fallible in its signature; a structure produced by
// `compose_structure` never triggers it.

use meditation_prng::EntropyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MusicError {
    /// A numeric parameter was out of its accepted range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The scale name is not in the catalog.
    #[error("unknown scale `{0}`")]
    UnknownScale(String),

    /// No seed was supplied and the OS entropy source failed.
    #[error("could not draw a random seed: {0}")]
    Entropy(#[from] EntropyError),

    #[error("failed to write MIDI: {0}")]
    Encode(#[from] std::io::Error),
}

impl MusicError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        MusicError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MusicError>;
