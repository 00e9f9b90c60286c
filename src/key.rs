//! Compact key serialisation.
//!
//! One lowercase hex string, fields concatenated in fixed order:
//! master key (64 chars), alias count (4), chain length (4), start
//! position (the remainder, sized to the image: `⌈log₁₆(W·H)⌉` digits).
//! Big-endian throughout, no separators, no prefix.

use crate::crypto::MasterKey;
use crate::error::{Result, VeilchainError};

/// Offsets of the fixed-width fields, in hex chars.
const MASTER_END: usize = 64;
const ALIAS_END: usize = 68;
const LEN_END: usize = 72;

/// Parsed form of the serialised key: everything a decode needs besides
/// the stego image itself.
#[derive(Debug, Clone)]
pub struct StegoKey {
    pub master: MasterKey,
    /// Effective alias count (post-renegotiation).
    pub alias: u16,
    /// Ciphertext length in bytes.
    pub chain_len: u16,
    /// Chain entry point: a position into the candidate set.
    pub start: usize,
}

/// Hex digits needed for a start position in an image of `pixel_count`
/// pixels: the smallest `d` with `16^d ≥ W·H`, at least 1.
pub fn start_width(pixel_count: usize) -> usize {
    let mut width = 1;
    let mut cap = 16usize;
    while cap < pixel_count {
        cap = cap.saturating_mul(16);
        width += 1;
    }
    width
}

impl StegoKey {
    pub fn serialise(&self, pixel_count: usize) -> String {
        format!(
            "{}{:04x}{:04x}{:0width$x}",
            self.master.to_hex(),
            self.alias,
            self.chain_len,
            self.start,
            width = start_width(pixel_count)
        )
    }

    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.len() <= LEN_END {
            return Err(VeilchainError::KeyFormat(format!(
                "key is {} chars, need at least {}",
                text.len(),
                LEN_END + 1
            )));
        }
        if !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(VeilchainError::KeyFormat(
                "key contains non-hex characters".into(),
            ));
        }

        let master = MasterKey::from_hex(&text[..MASTER_END])?;
        let alias = u16::from_str_radix(&text[MASTER_END..ALIAS_END], 16)
            .map_err(|_| VeilchainError::KeyFormat("unreadable alias field".into()))?;
        let chain_len = u16::from_str_radix(&text[ALIAS_END..LEN_END], 16)
            .map_err(|_| VeilchainError::KeyFormat("unreadable length field".into()))?;
        let start = usize::from_str_radix(&text[LEN_END..], 16)
            .map_err(|_| VeilchainError::KeyFormat("unreadable start position".into()))?;

        if alias == 0 {
            return Err(VeilchainError::KeyFormat("alias count is zero".into()));
        }
        if chain_len == 0 {
            return Err(VeilchainError::KeyFormat("chain length is zero".into()));
        }

        Ok(Self {
            master,
            alias,
            chain_len,
            start,
        })
    }
}
