// Deterministic, portable pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// The core generator is hand-rolled so that the output stream is frozen by
// this file alone: no RNG crate upgrade can change what a seed composes.
//
// Every generative decision in `meditation_music` draws from a `SeededRng`
// owned by a single composition call. Nothing here is global, so concurrent
// compositions never share state.
//
// **Critical constraint: determinism.** Every method on `SeededRng` must
// produce identical output given the same prior state, regardless of
// platform, compiler version, or optimization level. Floats are only ever
// produced by exact integer-to-float conversions of generator output.
//
// The one non-deterministic entry point is `entropy_seed`, used when a caller
// supplies no seed. It only picks a seed; the stream that follows is as
// reproducible as any other once that seed is reported back.

use serde::{Deserialize, Serialize};

pub use getrandom::Error as EntropyError;

/// Seeds drawn from entropy are masked to 31 bits so they survive a round
/// trip through JSON numbers and JavaScript clients unchanged.
pub const ENTROPY_SEED_MASK: u64 = 0x7FFF_FFFF;

/// Xoshiro256++ PRNG, the composer's sole source of randomness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeededRng {
    s: [u64; 4],
}

impl SeededRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    /// Two `SeededRng` instances created with the same seed will produce
    /// identical output sequences.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f64` in [0, 1).
    ///
    /// Uses the upper 53 bits of a `u64` to fill the mantissa of an f64, so
    /// every value is an exact multiple of 2^-53.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform random integer in `[low, high)`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        // Rejection sampling to avoid modulo bias.
        let threshold = range.wrapping_neg() % range; // = (2^64 - range) % range
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Generate a uniform random signed integer in `[low, high)`.
    ///
    /// The span is computed in unsigned space, so the full `i64` range is
    /// usable. Panics if `low >= high`.
    pub fn range_i64(&mut self, low: i64, high: i64) -> i64 {
        assert!(low < high, "range_i64: low must be less than high");
        let span = high.wrapping_sub(low) as u64;
        low.wrapping_add(self.range_u64(0, span) as i64)
    }

    /// Generate a uniform random `usize` in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Return `true` with probability `p`, `false` otherwise.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick one element uniformly. Returns `None` for an empty slice without
    /// advancing the generator.
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.range_usize(0, items.len());
        items.get(idx)
    }
}

/// Draw a fresh seed from the operating system's entropy source.
///
/// The result is masked with [`ENTROPY_SEED_MASK`]; feed it to
/// [`SeededRng::new`] and report it to whoever needs to reproduce the run.
pub fn entropy_seed() -> Result<u64, EntropyError> {
    let mut buf = [0u8; 8];
    getrandom::getrandom(&mut buf)?;
    Ok(u64::from_le_bytes(buf) & ENTROPY_SEED_MASK)
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
