//! # Glyph Perceptual Hashing and Scoring
//!
//! This crate turns glyph rasters into compact, similarity-preserving bit
//! signatures and provides the fine-grained structural distance used to rank
//! the candidates those signatures pre-select.
//!
//! ## Contract
//!
//! - Both [`hash_raster`] and [`score`] are pure functions of
//!   `(raster, config)` with no I/O and no global state.
//! - Hashes and scores are only defined between rasters of the same
//!   [`raster::Tier`]. Mixing tiers is an error, never a silent result.
//!
//! Invariant: for the same raster and the same [`HashConfig`], the hash is
//! bit identical across runs, threads and platforms.
//!
//! ## Hash Pipeline
//!
//! 1.  **Summed-area table**: the raster's coverage values are accumulated
//!     into an exact integer integral image.
//! 2.  **Average signature**: the raster is reduced to a `grid x grid` grid of
//!     cell means; each bit records whether its cell holds more ink than the
//!     grid mean.
//! 3.  **Gradient signatures**: two offset grids record, per cell, whether
//!     ink increases to the right and downwards. These carry stroke direction
//!     that the average signature alone cannot distinguish.
//!
//! The three signatures are concatenated into one `3 * grid * grid` bit
//! string so that Hamming distance acts as a cheap, monotonic proxy for visual
//! dissimilarity.
//!
//! ## Example Usage
//!
//! ```
//! use perceptual::{hash_raster, score, HashConfig, SimilarityConfig};
//! use raster::{RasterImage, Tier};
//!
//! let pixels = (0..128 * 128)
//!     .map(|i| if (i % 128) < 64 { 255 } else { 0 })
//!     .collect();
//! let image = RasterImage::from_pixels(Tier::T128, pixels).unwrap();
//!
//! let hash = hash_raster(&image, &HashConfig::default()).unwrap();
//! assert_eq!(hash.bit_len(), 768);
//! assert_eq!(hash.hamming(&hash).unwrap(), 0);
//!
//! let distance = score(&image, &image, &SimilarityConfig::default()).unwrap();
//! assert_eq!(distance, 0.0);
//! ```
pub mod config;
pub mod fingerprint;
mod integral;
mod signature;
pub mod similarity;

use rayon::prelude::*;

use raster::RasterImage;

pub use crate::config::{HashConfig, PerceptualError, SimilarityConfig};
pub use crate::fingerprint::PerceptualHash;
pub use crate::similarity::score;
use crate::signature::signature_bits;

/// Current hash algorithm version for this crate.
pub const HASH_VERSION: u16 = 1;

/// Human-readable algorithm identifier.
pub const HASH_ALGORITHM: &str = "avg+grad_integral_v1";

/// Compute the perceptual hash of one raster.
pub fn hash_raster(
    image: &RasterImage,
    cfg: &HashConfig,
) -> Result<PerceptualHash, PerceptualError> {
    cfg.validate_for(image.tier())?;
    let bits = signature_bits(image, cfg.grid);
    Ok(PerceptualHash::from_bits(
        &bits,
        image.tier(),
        cfg.grid,
        HASH_VERSION,
    ))
}

/// Hash a batch of rasters, in input order.
///
/// With [`HashConfig::use_parallel`] set, rasters are hashed on the current
/// rayon pool. Output order and content are identical either way.
pub fn hash_batch(
    images: &[RasterImage],
    cfg: &HashConfig,
) -> Result<Vec<PerceptualHash>, PerceptualError> {
    cfg.validate()?;
    if cfg.use_parallel {
        images.par_iter().map(|img| hash_raster(img, cfg)).collect()
    } else {
        images.iter().map(|img| hash_raster(img, cfg)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster::Tier;

    fn image_with(side: u32, ink: impl Fn(usize, usize) -> u8) -> RasterImage {
        let s = side as usize;
        let pixels = (0..s * s).map(|i| ink(i % s, i / s)).collect();
        RasterImage::from_pixels(Tier::new(side).unwrap(), pixels).unwrap()
    }

    fn ring(side: u32) -> RasterImage {
        let c = side as f64 / 2.0;
        image_with(side, |x, y| {
            let d = ((x as f64 - c).powi(2) + (y as f64 - c).powi(2)).sqrt();
            if d > c * 0.5 && d < c * 0.8 {
                255
            } else {
                0
            }
        })
    }

    fn bar(side: u32) -> RasterImage {
        let s = side as usize;
        image_with(side, |x, _| if x > s * 2 / 5 && x < s * 3 / 5 { 255 } else { 0 })
    }

    #[test]
    fn hash_is_deterministic() {
        let image = ring(128);
        let cfg = HashConfig::default();
        assert_eq!(hash_raster(&image, &cfg).unwrap(), hash_raster(&image, &cfg).unwrap());
    }

    #[test]
    fn hash_carries_tier_and_grid() {
        let hash = hash_raster(&ring(256), &HashConfig::new().with_grid(8)).unwrap();
        assert_eq!(hash.tier(), Tier::T256);
        assert_eq!(hash.grid(), 8);
        assert_eq!(hash.bit_len(), 192);
        assert_eq!(hash.version(), HASH_VERSION);
    }

    #[test]
    fn near_identical_shapes_hash_close_distinct_shapes_far() {
        let cfg = HashConfig::default();
        let a = hash_raster(&bar(128), &cfg).unwrap();
        let shifted = image_with(128, |x, _| if x > 52 && x < 77 { 255 } else { 0 });
        let b = hash_raster(&shifted, &cfg).unwrap();
        let c = hash_raster(&ring(128), &cfg).unwrap();
        let near = a.hamming(&b).unwrap();
        let far = a.hamming(&c).unwrap();
        assert!(near < far, "near {near} should be below far {far}");
    }

    #[test]
    fn hashes_from_different_tiers_are_incomparable() {
        let cfg = HashConfig::default();
        let a = hash_raster(&ring(128), &cfg).unwrap();
        let b = hash_raster(&ring(256), &cfg).unwrap();
        assert!(matches!(
            a.hamming(&b),
            Err(PerceptualError::IncompatibleHashes { .. })
        ));
    }

    #[test]
    fn batch_parallel_matches_sequential() {
        let images = vec![ring(128), bar(128), ring(64), bar(256)];
        let seq = hash_batch(&images, &HashConfig::default()).unwrap();
        let par = hash_batch(&images, &HashConfig::default().with_parallel(true)).unwrap();
        assert_eq!(seq, par);
        assert_eq!(seq.len(), 4);
    }

    #[test]
    fn invalid_grid_is_rejected() {
        let err = hash_raster(&ring(128), &HashConfig::new().with_grid(1)).unwrap_err();
        assert!(matches!(err, PerceptualError::InvalidConfigGrid { grid: 1 }));
    }
}
