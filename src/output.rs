//! Mapping file and unresolved-glyph image dumps.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use catalog::Catalog;
use image::GrayImage;
use matcher::Mapping;
use raster::{rasterize, GlyphId, GlyphOutline, RasterImage};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode mapping: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write image {path}: {message}")]
    Image { path: PathBuf, message: String },
}

/// Write the document mapping as pretty JSON, creating parent directories.
pub fn write_mapping(path: &Path, mapping: &Mapping) -> Result<(), OutputError> {
    let document = mapping.to_document();
    let json = serde_json::to_vec_pretty(&document)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| OutputError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, json).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        glyphs = document.glyphs.len(),
        unresolved = document.unresolved.len(),
        "mapping_written"
    );
    Ok(())
}

/// Save each unresolved glyph as a PNG at the tier it was last tried at.
///
/// Glyphs that never rendered (invalid outlines) are skipped. Returns the
/// number of files written.
pub fn dump_unresolved(
    dir: &Path,
    mapping: &Mapping,
    outlines: &[GlyphOutline],
    catalog: &Catalog,
) -> Result<usize, OutputError> {
    let by_id: HashMap<&GlyphId, &GlyphOutline> =
        outlines.iter().map(|outline| (outline.id(), outline)).collect();
    let mut written = 0;
    for result in mapping.unresolved() {
        let (Some(outline), Some(tier)) = (by_id.get(&result.glyph_id), result.tier) else {
            continue;
        };
        let image = match rasterize(outline, tier, catalog.raster_config()) {
            Ok(image) => image,
            Err(err) => {
                debug!(glyph_id = %result.glyph_id, error = %err, "glyph_dump_skipped");
                continue;
            }
        };
        if written == 0 {
            fs::create_dir_all(dir).map_err(|source| OutputError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let path = dir.join(format!(
            "{}_{}.png",
            file_stem(&result.glyph_id),
            tier.side()
        ));
        save_png(&path, &image)?;
        written += 1;
    }
    if written > 0 {
        info!(dir = %dir.display(), images = written, "unresolved_images_written");
    }
    Ok(written)
}

/// Dark ink on a white background.
fn save_png(path: &Path, image: &RasterImage) -> Result<(), OutputError> {
    let side = image.tier().side();
    let pixels = image.pixels().iter().map(|&p| 255 - p).collect();
    let Some(gray) = GrayImage::from_raw(side, side, pixels) else {
        return Err(OutputError::Image {
            path: path.to_path_buf(),
            message: "raster buffer does not match its tier".to_string(),
        });
    };
    gray.save(path).map_err(|err| {
        warn!(path = %path.display(), error = %err, "image_write_failed");
        OutputError::Image {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    })
}

/// Glyph ids are opaque; keep only characters safe in file names.
fn file_stem(id: &GlyphId) -> String {
    id.as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
