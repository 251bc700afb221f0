//! Rasterizer configuration.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Normalization and fill settings shared by unknown and reference glyphs.
///
/// Two rasters are only comparable when they were produced with equal
/// configs; the catalog cache key includes these values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RasterConfig {
    /// Empty margin on each edge, as a fraction of the tier side.
    pub padding: f32,
    /// Anti-aliased edge coverage instead of hard 0/255 pixels.
    pub anti_alias: bool,
}

impl RasterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_anti_alias(mut self, anti_alias: bool) -> Self {
        self.anti_alias = anti_alias;
        self
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if !self.padding.is_finite() || !(0.0..0.45).contains(&self.padding) {
            return Err(RenderError::InvalidConfig(format!(
                "padding must be in [0.0, 0.45) (got {})",
                self.padding
            )));
        }
        Ok(())
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            padding: 0.0625,
            anti_alias: true,
        }
    }
}
