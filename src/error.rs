use thiserror::Error;

/// Error type for the library
#[derive(Error, Debug)]
pub enum VeilchainError {
    /// The ciphertext needs more chain pixels than the cover can provide.
    #[error("message too long for image: needs {needed} chain pixels, image provides {available}")]
    Capacity { needed: usize, available: usize },

    /// AEAD or MAC machinery failed outside of an authentication check.
    #[error("cipher failure: {0}")]
    Crypto(String),

    /// The serialised key is too short, non-hex, or numerically inconsistent.
    #[error("malformed stego key: {0}")]
    KeyFormat(String),

    /// Decryption rejected the recovered ciphertext (wrong key or tampered image).
    #[error("decryption failed: wrong key or corrupted stego image")]
    Decrypt,

    /// The backward chain search ran out of unused candidates. Indicates a bug
    /// when the candidate set was sized correctly.
    #[error("no usable chain candidate left while placing ciphertext byte {index}")]
    ExhaustedCandidates { index: usize },

    /// Cooperative cancellation was requested through the cancel flag.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, VeilchainError>;
