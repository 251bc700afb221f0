//! Error types produced by the raster crate.
//!
//! Every variant describes a terminal condition for the glyph that produced
//! it: callers record the glyph as unresolved instead of retrying it at a
//! different tier.

use thiserror::Error;

use crate::types::Tier;

/// Errors returned while building or rasterizing glyph outlines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("glyph {id}: outline is empty")]
    EmptyOutline { id: String },

    #[error("glyph {id}: invalid path data: {message}")]
    InvalidPathData { id: String, message: String },

    #[error("glyph {id}: outline has non-finite coordinates")]
    NonFiniteCoordinates { id: String },

    #[error("glyph {id}: outline bounds are degenerate ({width}x{height})")]
    DegenerateBounds { id: String, width: f64, height: f64 },

    #[error("glyph {id}: path could not be filled")]
    UnfillablePath { id: String },

    #[error("glyph {id}: outline filled no pixels at {tier}")]
    NothingFilled { id: String, tier: Tier },

    #[error("invalid tier side {side}px; expected >= {min}")]
    InvalidTier { side: u32, min: u32 },

    #[error("raster buffer holds {actual} bytes; a {side}px tier needs {expected}")]
    BufferSize {
        side: u32,
        expected: usize,
        actual: usize,
    },

    #[error("invalid raster config: {0}")]
    InvalidConfig(String),
}

impl RenderError {
    /// True when the failure comes from the outline itself rather than from
    /// the caller's configuration.
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            RenderError::InvalidTier { .. }
                | RenderError::BufferSize { .. }
                | RenderError::InvalidConfig(_)
        )
    }
}
