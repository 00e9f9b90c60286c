//! Main steganography engine: the encrypt → select → chain → package
//! pipeline for embedding, and its exact reverse for extraction.
//!
//! Everything downstream of the master key is deterministic, so embedding
//! the same message into the same cover under the same key and alias count
//! produces byte-identical stego output and an identical serialised key.

use rayon::prelude::*;

use crate::chain::{build_chain, walk_chain};
use crate::crypto::{derive_master_key, open, seal, MasterKey};
use crate::error::{Result, VeilchainError};
use crate::grid::PixelGrid;
use crate::key::StegoKey;
use crate::pointer::{negotiate_alias, CandidateSet, PointerTable};
use crate::progress::{CancelFlag, Phase, ProgressSink};

/// Default alias count: on average 32 pointer values per candidate, giving
/// a 2048-pixel candidate set on covers of any real size.
pub const DEFAULT_ALIAS: u16 = 32;

/// GCM tag bytes the chain carries on top of the plaintext.
const SEAL_OVERHEAD: usize = 16;

/// Summary of what an embed actually touched.
#[derive(Debug, Clone)]
pub struct EmbedStats {
    /// Pixels in the cover, `W·H`.
    pub total_pixels: usize,
    /// Chain positions, equal to the ciphertext length.
    pub chain_len: usize,
    /// Chain pixels whose stored bytes differ from the cover.
    pub pixels_modified: usize,
    /// Individual channel bytes that changed.
    pub channels_modified: usize,
    /// `pixels_modified` as a percentage of the whole image.
    pub percent_modified: f64,
}

/// Result of a successful embed: the compact key and the damage report.
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    pub key: String,
    pub stats: EmbedStats,
}

/// Pointer-chain steganography engine.
pub struct VeilchainStego {
    alias: u16,
    cancel: Option<CancelFlag>,
}

impl Default for VeilchainStego {
    fn default() -> Self {
        Self::new()
    }
}

impl VeilchainStego {
    pub fn new() -> Self {
        Self {
            alias: DEFAULT_ALIAS,
            cancel: None,
        }
    }

    /// Engine with a caller-chosen alias count. Values that cannot seat the
    /// ciphertext are renegotiated downward during embed; the effective
    /// value travels in the serialised key.
    pub fn with_alias(alias: u16) -> Self {
        Self {
            alias: alias.max(1),
            cancel: None,
        }
    }

    /// Attach a cancellation handle, observed at the per-byte yield points.
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn check_cancel(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => Err(VeilchainError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Embed under a freshly derived master key (the normal path: one key
    /// per message, never reused).
    pub fn embed(
        &self,
        grid: &mut PixelGrid,
        message: &[u8],
        progress: &mut dyn ProgressSink,
    ) -> Result<EmbedOutcome> {
        let master = derive_master_key();
        self.embed_with_key(grid, message, &master, progress)
    }

    /// Embed under a caller-supplied master key. Reproducible by design;
    /// sealing *different* messages under one key forfeits the AEAD's
    /// nonce guarantees, so reuse keys only to reproduce identical runs.
    pub fn embed_with_key(
        &self,
        grid: &mut PixelGrid,
        message: &[u8],
        master: &MasterKey,
        progress: &mut dyn ProgressSink,
    ) -> Result<EmbedOutcome> {
        self.check_cancel()?;
        progress.report(0.0, Phase::Encrypt);
        let ciphertext = seal(master, message)?;
        let chain_len = ciphertext.len();

        let pixel_count = grid.pixel_count();
        if chain_len > pixel_count {
            return Err(VeilchainError::Capacity {
                needed: chain_len,
                available: pixel_count,
            });
        }
        if chain_len > u16::MAX as usize {
            // the key format carries the length as two bytes
            return Err(VeilchainError::Capacity {
                needed: chain_len,
                available: u16::MAX as usize,
            });
        }

        let alias = negotiate_alias(self.alias, chain_len);

        progress.report(0.0, Phase::SelectPixels);
        self.check_cancel()?;
        let set = CandidateSet::select(master, pixel_count, alias);
        if set.len() < chain_len {
            return Err(VeilchainError::Capacity {
                needed: chain_len,
                available: set.len(),
            });
        }

        progress.report(0.0, Phase::PreparePointers);
        self.check_cancel()?;
        let table = PointerTable::build(master, set.len());

        progress.report(0.0, Phase::EncodeBytes);
        let before = grid.as_bytes().to_vec();
        let mut placed = 0usize;
        let start = build_chain(grid, &set, &table, &ciphertext, |_| {
            placed += 1;
            progress.report(placed as f64 / chain_len as f64, Phase::EncodeBytes);
            self.check_cancel()
        })?;

        progress.report(1.0, Phase::WritePixels);
        let stats = embed_stats(&before, grid, chain_len);

        progress.report(1.0, Phase::PackageKey);
        let key = StegoKey {
            master: master.clone(),
            alias,
            chain_len: chain_len as u16,
            start,
        }
        .serialise(pixel_count);

        progress.report(1.0, Phase::Done);
        Ok(EmbedOutcome { key, stats })
    }

    /// Recover the plaintext from a stego image and its serialised key.
    /// Needs neither the original cover nor the plaintext length.
    pub fn extract(&self, grid: &PixelGrid, key_text: &str) -> Result<Vec<u8>> {
        self.check_cancel()?;
        let key = StegoKey::parse(key_text)?;
        let pixel_count = grid.pixel_count();
        let chain_len = key.chain_len as usize;

        if chain_len > pixel_count {
            return Err(VeilchainError::KeyFormat(format!(
                "chain of {} exceeds the {} pixels of this image",
                chain_len, pixel_count
            )));
        }

        let set = CandidateSet::select(&key.master, pixel_count, key.alias);
        if chain_len > set.len() {
            return Err(VeilchainError::KeyFormat(
                "chain longer than the candidate set".into(),
            ));
        }
        if key.start >= set.len() {
            return Err(VeilchainError::KeyFormat(format!(
                "start position {} outside candidate set of {}",
                key.start,
                set.len()
            )));
        }

        let ciphertext = walk_chain(grid, &set, &key.master, chain_len, key.start);
        open(&key.master, &ciphertext)
    }
}

/// Largest message (in bytes) an image of `pixel_count` pixels can carry.
/// Alias renegotiation makes this independent of the requested alias count:
/// the chain is bounded by the image, the pointer space, and the two-byte
/// length field, minus the seal overhead.
pub fn calculate_capacity(pixel_count: usize) -> usize {
    pixel_count
        .min(u16::MAX as usize)
        .saturating_sub(SEAL_OVERHEAD)
}

fn embed_stats(before: &[u8], after: &PixelGrid, chain_len: usize) -> EmbedStats {
    let (pixels_modified, channels_modified) = before
        .par_chunks_exact(4)
        .zip(after.as_bytes().par_chunks_exact(4))
        .map(|(a, b)| {
            let changed = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count();
            ((changed > 0) as usize, changed)
        })
        .reduce(|| (0, 0), |x, y| (x.0 + y.0, x.1 + y.1));

    let total_pixels = after.pixel_count();
    EmbedStats {
        total_pixels,
        chain_len,
        pixels_modified,
        channels_modified,
        percent_modified: 100.0 * pixels_modified as f64 / total_pixels as f64,
    }
}
