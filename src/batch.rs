//! Glyph batch input.
//!
//! A book directory holds `batch_*` subdirectories, each with one or more
//! `glyphs*.json` files:
//!
//! ```json
//! {
//!   "font_family": "Bookerly",
//!   "units_per_em": 1000,
//!   "ascender": 800,
//!   "glyphs": [
//!     { "id": 17, "path": "M 0 0 L 10 0 L 10 10 Z", "advance_width": 512.0 }
//!   ]
//! }
//! ```
//!
//! `units_per_em` and `ascender` place the outlines in their em square and
//! may be overridden per glyph. With an ascender, path coordinates have
//! their origin on the baseline; without one, at the top of the em.
//!
//! Records whose path data cannot be parsed are kept aside as rejected so
//! they still show up as unresolved in the mapping.

use std::fs;
use std::path::{Path, PathBuf};

use raster::{Bounds, EmBox, GlyphId, GlyphMetrics, GlyphOutline, RenderError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse glyph batch {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no glyph batches found under {0}")]
    NoBatches(PathBuf),
}

/// One glyph as delivered by the content source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRecord {
    pub id: GlyphId,
    /// SVG path data.
    pub path: String,
    #[serde(default)]
    pub advance_width: f32,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default)]
    pub units_per_em: Option<f32>,
    #[serde(default)]
    pub ascender: Option<f32>,
}

/// Em square settings shared by a batch; records may override either field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmDefaults {
    pub units_per_em: Option<f32>,
    pub ascender: Option<f32>,
}

impl EmDefaults {
    fn resolve(&self, record: &GlyphRecord) -> Result<Option<EmBox>, RenderError> {
        let units = record.units_per_em.or(self.units_per_em);
        let ascender = record.ascender.or(self.ascender);
        let upem = units.unwrap_or(EmBox::default().units_per_em);
        match (units, ascender) {
            (None, None) => Ok(None),
            (_, Some(ascender)) => EmBox::from_ascender(upem, ascender).map(Some),
            (Some(_), None) => EmBox::new(upem, 0.0).map(Some),
        }
    }
}

impl GlyphRecord {
    pub fn to_outline(&self, flip_y: bool, em: &EmDefaults) -> Result<GlyphOutline, RenderError> {
        let metrics = GlyphMetrics {
            advance_width: self.advance_width,
            bounds: self.bounds,
            em: em.resolve(self)?,
        };
        let outline = GlyphOutline::from_svg(self.id.clone(), &self.path, metrics)?;
        Ok(if flip_y { outline.flipped_y() } else { outline })
    }
}

/// One `glyphs*.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlyphBatch {
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub units_per_em: Option<f32>,
    #[serde(default)]
    pub ascender: Option<f32>,
    #[serde(default)]
    pub glyphs: Vec<GlyphRecord>,
}

impl GlyphBatch {
    pub fn from_file(path: &Path) -> Result<Self, BatchError> {
        let data = fs::read_to_string(path).map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| BatchError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Every glyph of a book, ready for matching.
#[derive(Debug, Clone, Default)]
pub struct BookGlyphs {
    /// First font family hint found across batches.
    pub font_family: Option<String>,
    pub outlines: Vec<GlyphOutline>,
    /// Records whose path data could not be parsed.
    pub rejected: Vec<(GlyphId, RenderError)>,
    pub files: usize,
}

impl BookGlyphs {
    /// Append a batch, converting its records into outlines.
    pub fn extend(&mut self, batch: GlyphBatch, flip_y: bool) {
        if self.font_family.is_none() {
            self.font_family = batch.font_family.filter(|f| !f.trim().is_empty());
        }
        let em = EmDefaults {
            units_per_em: batch.units_per_em,
            ascender: batch.ascender,
        };
        for record in &batch.glyphs {
            match record.to_outline(flip_y, &em) {
                Ok(outline) => self.outlines.push(outline),
                Err(err) => {
                    warn!(glyph_id = %record.id, error = %err, "glyph_rejected");
                    self.rejected.push((record.id.clone(), err));
                }
            }
        }
        self.files += 1;
    }
}

/// Load every `batch_*/glyphs*.json` file under `dir`, in name order.
pub fn load_book_dir(dir: &Path, flip_y: bool) -> Result<BookGlyphs, BatchError> {
    let mut book = BookGlyphs::default();
    for batch_dir in sorted_entries(dir, |p| p.is_dir() && has_prefix(p, "batch_"))? {
        for file in sorted_entries(&batch_dir, |p| {
            p.is_file()
                && has_prefix(p, "glyphs")
                && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })? {
            let batch = GlyphBatch::from_file(&file)?;
            debug!(file = %file.display(), glyphs = batch.glyphs.len(), "glyph_batch_loaded");
            book.extend(batch, flip_y);
        }
    }
    if book.files == 0 {
        return Err(BatchError::NoBatches(dir.to_path_buf()));
    }
    Ok(book)
}

fn has_prefix(path: &Path, prefix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(prefix))
}

fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>, BatchError> {
    let io_err = |source: std::io::Error| BatchError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
