//! # Veilchain Steganography Library
//!
//! Hides a short encrypted message inside a raster image as a keyed
//! pointer chain: a pseudorandom candidate-pixel set is derived from a
//! 256-bit master key, and the ciphertext is spelled out along a chain of
//! those pixels linked through a keyed MAC. Without the compact key the
//! modified pixels are indistinguishable from noise; with it, extraction
//! needs neither the original cover nor the message length up front.
//!
//! ## Quick Start
//!
//! ```no_run
//! use veilchain::progress::NullSink;
//! use veilchain::{PixelGrid, VeilchainStego};
//!
//! # fn main() -> anyhow::Result<()> {
//! let cover = image::open("cover.png")?;
//! let mut grid = PixelGrid::from_image(&cover);
//!
//! let engine = VeilchainStego::new();
//! let message = b"meet at the usual place";
//! let outcome = engine.embed(&mut grid, message, &mut NullSink)?;
//! grid.into_image().save("stego.png")?;
//!
//! // later, with only the stego file and the printed key
//! let stego = image::open("stego.png")?;
//! let recovered = engine.extract(&PixelGrid::from_image(&stego), &outcome.key)?;
//! assert_eq!(recovered, message);
//! # Ok(())
//! # }
//! ```
//!
//! ## Design highlights
//!
//! - **Keyed candidate set**: pixel positions come from a ChaCha20 stream
//!   seeded by the master key; encode and decode rebuild it bit-identically
//! - **Pointer chain**: each node's G/B bytes resolve to the next node via
//!   HMAC-SHA256, so links exist only relative to the key
//! - **Minimal distortion**: every byte placement commits the candidate
//!   and pointer pair with the least Euclidean pixel change
//! - **AES-256-GCM envelope**: the key alone rebuilds the cipher state;
//!   tampering surfaces as a clean decryption error
//!
//! ## Modules
//!
//! - `keystream`: deterministic keyed stream for candidate selection
//! - `pointer`: candidate set, pointer resolution, precomputed buckets
//! - `chain`: backward chain construction and forward traversal
//! - `crypto`: master keys, AEAD envelope, keyed MAC
//! - `key`: compact serialised-key format
//! - `steganography`: the embed/extract engine

pub mod chain;
pub mod crypto;
pub mod error;
pub mod grid;
pub mod key;
pub mod keystream;
pub mod pointer;
pub mod progress;
pub mod steganography;

// Re-export main types for convenience
pub use crypto::{derive_master_key, MasterKey};
pub use error::{Result, VeilchainError};
pub use grid::{PixelGrid, Px};
pub use key::StegoKey;
pub use progress::{CancelFlag, Phase, ProgressSink};
pub use steganography::{
    calculate_capacity, EmbedOutcome, EmbedStats, VeilchainStego, DEFAULT_ALIAS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
