//! Perceptual hash representation.
//!
//! A hash is only comparable with hashes produced at the same tier, with the
//! same grid and the same hash version. [`PerceptualHash::hamming`] refuses
//! any other pairing instead of silently returning a meaningless distance.

use raster::Tier;
use serde::{Deserialize, Serialize};

use crate::config::PerceptualError;

/// Packed bit signature of one raster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerceptualHash {
    /// Signature bits, least significant bit first within each word.
    words: Vec<u64>,
    /// Number of meaningful bits in `words`.
    bit_len: usize,
    /// Tier of the raster the hash was computed from.
    tier: Tier,
    /// Grid side used by the signature.
    grid: usize,
    /// Hash algorithm version; see [`crate::HASH_VERSION`].
    version: u16,
}

impl PerceptualHash {
    pub(crate) fn from_bits(bits: &[bool], tier: Tier, grid: usize, version: u16) -> Self {
        let mut words = vec![0u64; bits.len().div_ceil(64)];
        for (i, _) in bits.iter().enumerate().filter(|(_, bit)| **bit) {
            words[i / 64] |= 1u64 << (i % 64);
        }
        Self {
            words,
            bit_len: bits.len(),
            tier,
            grid,
            version,
        }
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn grid(&self) -> usize {
        self.grid
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    /// Value of bit `index`; bits past `bit_len` read as unset.
    pub fn bit(&self, index: usize) -> bool {
        if index >= self.bit_len {
            return false;
        }
        (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Number of set bits.
    pub fn ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// True when `other` was produced by the same tier, grid and version.
    pub fn is_compatible(&self, other: &PerceptualHash) -> bool {
        self.tier == other.tier
            && self.grid == other.grid
            && self.bit_len == other.bit_len
            && self.version == other.version
    }

    /// Count of differing bits between two compatible hashes.
    pub fn hamming(&self, other: &PerceptualHash) -> Result<u32, PerceptualError> {
        if !self.is_compatible(other) {
            return Err(PerceptualError::IncompatibleHashes {
                left_bits: self.bit_len,
                left_tier: self.tier,
                right_bits: other.bit_len,
                right_tier: other.tier,
            });
        }
        Ok(self
            .words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum())
    }
}
