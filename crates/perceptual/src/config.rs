//! Configuration and error types for glyph perceptual hashing and scoring.
//!
//! This module is free of I/O and environment-dependent behavior so that
//! both the hash and the similarity score are pure functions of
//! `(raster, config)`.

use raster::Tier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest grid that still discriminates glyph shapes at catalog scale.
pub const MIN_GRID: usize = 4;

/// Configuration for the combined average + gradient hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashConfig {
    /// Configuration schema version.
    ///
    /// Any change that can alter hash bits must bump this value; cached
    /// catalog hashes are keyed by it.
    pub version: u32,
    /// Side of the coarse grid. The hash carries `3 * grid * grid` bits:
    /// one average signature and two directional gradient signatures.
    pub grid: usize,
    /// Hash batches of rasters on the rayon pool.
    pub use_parallel: bool,
}

impl HashConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grid side. Typical values: 8-16.
    /// Larger grids keep more shape detail but make distances noisier.
    pub fn with_grid(mut self, grid: usize) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_parallel(mut self, use_parallel: bool) -> Self {
        self.use_parallel = use_parallel;
        self
    }

    /// Total number of bits in hashes produced with this config.
    pub fn bit_len(&self) -> usize {
        3 * self.grid * self.grid
    }

    pub fn validate(&self) -> Result<(), PerceptualError> {
        if self.version < 1 {
            return Err(PerceptualError::InvalidConfigVersion {
                version: self.version,
            });
        }
        if self.grid < MIN_GRID {
            return Err(PerceptualError::InvalidConfigGrid { grid: self.grid });
        }
        Ok(())
    }

    /// Check that rasters of `tier` can be reduced to this grid.
    pub fn validate_for(&self, tier: Tier) -> Result<(), PerceptualError> {
        self.validate()?;
        // The gradient signatures sample `grid + 1` cells along one axis.
        if (tier.side() as usize) < self.grid + 1 {
            return Err(PerceptualError::GridTooLarge {
                grid: self.grid,
                side: tier.side(),
            });
        }
        Ok(())
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            version: 1,
            grid: 16,
            use_parallel: false,
        }
    }
}

/// Configuration for the windowed structural-similarity scorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityConfig {
    /// Side of the square comparison window, in pixels.
    pub window: usize,
    /// Step between consecutive windows, in pixels.
    pub stride: usize,
    /// Luminance stabilizer, as a fraction of the 255 dynamic range.
    pub k1: f64,
    /// Contrast stabilizer, as a fraction of the 255 dynamic range.
    pub k2: f64,
    /// Distance added per em unit of placement difference beyond
    /// `placement_tolerance`. `0.0` compares shapes only.
    #[serde(default = "default_placement_weight")]
    pub placement_weight: f64,
    /// Placement difference, in em units, that costs nothing.
    #[serde(default = "default_placement_tolerance")]
    pub placement_tolerance: f64,
}

fn default_placement_weight() -> f64 {
    1.0
}

fn default_placement_tolerance() -> f64 {
    0.05
}

impl SimilarityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_placement(mut self, weight: f64, tolerance: f64) -> Self {
        self.placement_weight = weight;
        self.placement_tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<(), PerceptualError> {
        if self.window < 2 {
            return Err(PerceptualError::InvalidConfigWindow {
                window: self.window,
            });
        }
        if self.stride == 0 || self.stride > self.window {
            return Err(PerceptualError::InvalidConfigStride {
                stride: self.stride,
                window: self.window,
            });
        }
        if !(self.k1 > 0.0 && self.k2 > 0.0) {
            return Err(PerceptualError::InvalidConfigStabilizer);
        }
        let finite_non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !(finite_non_negative(self.placement_weight)
            && finite_non_negative(self.placement_tolerance))
        {
            return Err(PerceptualError::InvalidConfigPlacement {
                weight: self.placement_weight,
                tolerance: self.placement_tolerance,
            });
        }
        Ok(())
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            window: 8,
            stride: 4,
            k1: 0.01,
            k2: 0.03,
            placement_weight: default_placement_weight(),
            placement_tolerance: default_placement_tolerance(),
        }
    }
}

/// Errors returned by the hash engine and the scorer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PerceptualError {
    #[error("invalid config version {version}; expected >= 1")]
    InvalidConfigVersion { version: u32 },

    #[error("invalid config: grid must be >= {MIN_GRID} (got {grid})")]
    InvalidConfigGrid { grid: usize },

    #[error("invalid config: grid {grid} does not fit a {side}px raster")]
    GridTooLarge { grid: usize, side: u32 },

    #[error("invalid config: window must be >= 2 (got {window})")]
    InvalidConfigWindow { window: usize },

    #[error("invalid config: stride must be in 1..={window} (got {stride})")]
    InvalidConfigStride { stride: usize, window: usize },

    #[error("invalid config: stabilizers k1 and k2 must be > 0")]
    InvalidConfigStabilizer,

    #[error("invalid config: placement weight {weight} and tolerance {tolerance} must be finite and >= 0")]
    InvalidConfigPlacement { weight: f64, tolerance: f64 },

    #[error("tier mismatch: {left} vs {right}")]
    TierMismatch { left: Tier, right: Tier },

    #[error("incompatible hashes: {left_bits} bits at {left_tier} vs {right_bits} bits at {right_tier}")]
    IncompatibleHashes {
        left_bits: usize,
        left_tier: Tier,
        right_bits: usize,
        right_tier: Tier,
    },

    #[error("window {window}px does not fit a {side}px raster")]
    WindowTooLarge { window: usize, side: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_config_defaults() {
        let cfg = HashConfig::default();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.grid, 16);
        assert_eq!(cfg.bit_len(), 768);
        assert!(!cfg.use_parallel);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn hash_config_builder_chain() {
        let cfg = HashConfig::new().with_grid(8).with_parallel(true);
        assert_eq!(cfg.grid, 8);
        assert!(cfg.use_parallel);
        assert_eq!(cfg.bit_len(), 192);
    }

    #[test]
    fn hash_config_rejects_small_grid() {
        assert!(matches!(
            HashConfig::new().with_grid(2).validate(),
            Err(PerceptualError::InvalidConfigGrid { grid: 2 })
        ));
    }

    #[test]
    fn hash_config_rejects_version_zero() {
        let cfg = HashConfig {
            version: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(PerceptualError::InvalidConfigVersion { version: 0 })
        ));
    }

    #[test]
    fn grid_must_fit_tier() {
        let cfg = HashConfig::new().with_grid(40);
        assert!(matches!(
            cfg.validate_for(Tier::new(32).unwrap()),
            Err(PerceptualError::GridTooLarge { grid: 40, side: 32 })
        ));
        assert!(cfg.validate_for(Tier::T128).is_ok());
    }

    #[test]
    fn similarity_config_validation() {
        assert!(SimilarityConfig::default().validate().is_ok());
        assert!(SimilarityConfig::new().with_window(1).validate().is_err());
        assert!(SimilarityConfig::new().with_stride(0).validate().is_err());
        assert!(SimilarityConfig::new().with_stride(9).validate().is_err());
        assert!(SimilarityConfig::new().with_placement(-1.0, 0.05).validate().is_err());
        assert!(SimilarityConfig::new().with_placement(1.0, f64::NAN).validate().is_err());
        assert!(SimilarityConfig::new().with_placement(0.0, 0.0).validate().is_ok());
        let cfg = SimilarityConfig {
            k1: 0.0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(PerceptualError::InvalidConfigStabilizer));
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = HashConfig::new().with_grid(12);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: HashConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn error_display_mentions_values() {
        let err = PerceptualError::TierMismatch {
            left: Tier::T128,
            right: Tier::T256,
        };
        assert_eq!(err.to_string(), "tier mismatch: 128px vs 256px");
    }
}
