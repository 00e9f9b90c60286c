//! Deterministic keyed stream for candidate-pixel selection.
//!
//! Encode and decode must draw bit-identical sequences from the master key
//! alone, on every platform, so the generator is pinned precisely:
//! ChaCha20 (`rand_chacha::ChaCha20Rng`) seeded with the SHA-256 digest of
//! the ASCII lowercase-hex form of the key. Floats come from the top 53
//! bits of each 64-bit draw, which makes `next_float_unit` a pure integer
//! construction with no platform-dependent rounding.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

use crate::crypto::MasterKey;

/// Keyed ChaCha20 stream exposing the uniform primitives the candidate
/// selection needs. An explicit value, never process-global state.
pub struct KeyStream {
    rng: ChaCha20Rng,
}

impl KeyStream {
    pub fn new(key: &MasterKey) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.to_hex().as_bytes());
        let seed: [u8; 32] = hasher.finalize().into();
        Self {
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    /// Uniform value in `[0, 1)`, 53-bit resolution.
    pub fn next_float_unit(&mut self) -> f64 {
        (self.rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform index in `[0, max)`.
    pub fn next_index(&mut self, max: usize) -> usize {
        (self.next_float_unit() * max as f64) as usize % max
    }
}
