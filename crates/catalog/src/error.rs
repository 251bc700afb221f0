use std::path::PathBuf;

use bincode::error::{DecodeError, EncodeError};
use perceptual::PerceptualError;
use raster::{RenderError, Tier};
use thiserror::Error;

use crate::style::Style;

/// Failure to obtain one style's reference font.
///
/// A single style failing never aborts a catalog build; the style is
/// recorded as missing and the remaining styles are used.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FontLoadError {
    #[error("{path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("{path}: not a usable font: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("family {family}: no font file for style {style}")]
    MissingStyle { family: String, style: Style },

    #[error("font {font}: invalid outline for {character:?}: {message}")]
    InvalidOutline {
        font: String,
        character: char,
        message: String,
    },
}

/// Errors raised while building, caching or querying a reference catalog.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("family {family}: no usable style could be loaded")]
    NoUsableStyle { family: String },

    #[error("family {family}: catalog has no entries at {tier}")]
    EmptyCatalog { family: String, tier: Tier },

    #[error("no font families found in {dir}")]
    NoFamilies { dir: PathBuf },

    #[error("family {family} not found in {dir}")]
    FamilyNotFound { family: String, dir: PathBuf },

    #[error("invalid catalog config: {0}")]
    InvalidConfig(String),

    #[error("tier {0} is not part of this catalog")]
    UnknownTier(Tier),

    #[error(transparent)]
    Font(#[from] FontLoadError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Hash(#[from] PerceptualError),

    #[error("catalog cache I/O error at {path}: {message}")]
    CacheIo { path: PathBuf, message: String },

    #[error("catalog cache encode error: {0}")]
    Encode(String),

    #[error("catalog cache decode error: {0}")]
    Decode(String),

    #[error("catalog cache is stale: {0}")]
    StaleCache(String),
}

impl From<EncodeError> for CatalogError {
    fn from(e: EncodeError) -> Self {
        CatalogError::Encode(e.to_string())
    }
}

impl From<DecodeError> for CatalogError {
    fn from(e: DecodeError) -> Self {
        CatalogError::Decode(e.to_string())
    }
}

impl CatalogError {
    pub(crate) fn cache_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
