//! Workspace umbrella crate for glyphmatch.
//!
//! Stitches the stage crates together: glyph batches are loaded, a reference
//! catalog is built (or read from cache) for the book's font family, every
//! distinct glyph is matched on a worker pool, and the resulting mapping is
//! written for document assembly.

pub mod batch;
pub mod config;
pub mod output;

pub use catalog::{
    Catalog, CatalogCache, CatalogConfig, CatalogError, CharacterSet, FontFamily, FontLoadError,
    OutlineFont, ReferenceFont, Style, TtfFont,
};
pub use matcher::{
    set_match_metrics, CancelToken, DispatchConfig, Dispatcher, DocumentMapping, GlyphMatcher,
    Mapping, MappingSummary, MatchError, MatchMetrics, MatchMode, MatchResult, MatchStatus,
    MatcherConfig, Thresholds, UnresolvedReason,
};
pub use perceptual::{HashConfig, PerceptualError, PerceptualHash};
pub use raster::{
    EmBox, GlyphId, GlyphMetrics, GlyphOutline, Placement, RasterConfig, RasterImage, RenderError,
    Tier,
};

pub use crate::batch::{
    load_book_dir, BatchError, BookGlyphs, EmDefaults, GlyphBatch, GlyphRecord,
};
pub use crate::config::{ConfigLoadError, GlyphmatchConfig};
pub use crate::output::{dump_unresolved, write_mapping, OutputError};

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn, Level};

/// Errors that abort a decoding run. Per-glyph failures never do; they end
/// up as unresolved entries in the mapping.
#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigLoadError),
    Batch(BatchError),
    Catalog(CatalogError),
    Match(MatchError),
    Output(OutputError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(err) => write!(f, "configuration failure: {err}"),
            PipelineError::Batch(err) => write!(f, "glyph batch failure: {err}"),
            PipelineError::Catalog(err) => write!(f, "reference catalog failure: {err}"),
            PipelineError::Match(err) => write!(f, "matching failure: {err}"),
            PipelineError::Output(err) => write!(f, "output failure: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Config(err) => Some(err),
            PipelineError::Batch(err) => Some(err),
            PipelineError::Catalog(err) => Some(err),
            PipelineError::Match(err) => Some(err),
            PipelineError::Output(err) => Some(err),
        }
    }
}

impl From<ConfigLoadError> for PipelineError {
    fn from(value: ConfigLoadError) -> Self {
        PipelineError::Config(value)
    }
}

impl From<BatchError> for PipelineError {
    fn from(value: BatchError) -> Self {
        PipelineError::Batch(value)
    }
}

impl From<CatalogError> for PipelineError {
    fn from(value: CatalogError) -> Self {
        PipelineError::Catalog(value)
    }
}

impl From<MatchError> for PipelineError {
    fn from(value: MatchError) -> Self {
        PipelineError::Match(value)
    }
}

impl From<OutputError> for PipelineError {
    fn from(value: OutputError) -> Self {
        PipelineError::Output(value)
    }
}

/// Outcome of a decoding run.
#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub mapping: Mapping,
    pub summary: MappingSummary,
    pub family: String,
    pub missing_styles: Vec<Style>,
    pub catalog_entries: BTreeMap<Tier, usize>,
    /// Glyph records whose path data could not be parsed.
    pub rejected: usize,
    pub elapsed: Duration,
    /// Where the mapping was written, if it was.
    pub mapping_path: Option<PathBuf>,
    pub images_written: usize,
}

impl DecodeReport {
    /// Record glyphs that never reached the matcher as unresolved.
    ///
    /// Ids already present in the mapping are left alone.
    pub fn record_rejected(&mut self, rejected: &[(GlyphId, RenderError)]) -> Result<(), MatchError> {
        for (id, err) in rejected {
            if self.mapping.get(id).is_some() {
                continue;
            }
            self.mapping.insert(MatchResult::unresolved(
                id.clone(),
                None,
                None,
                UnresolvedReason::InvalidOutline {
                    message: err.to_string(),
                },
            ))?;
            self.rejected += 1;
        }
        self.summary = self.mapping.summary();
        Ok(())
    }

    /// Emit the run report.
    pub fn log(&self) {
        let by_tier: Vec<String> = self
            .summary
            .accepted_by_tier
            .iter()
            .map(|(tier, count)| format!("{}={count}", tier.side()))
            .collect();
        info!(
            family = %self.family,
            glyphs = self.mapping.len(),
            accepted = self.summary.accepted,
            unresolved = self.summary.unresolved,
            rejected = self.rejected,
            accepted_by_tier = %by_tier.join(","),
            missing_styles = self.missing_styles.len(),
            images = self.images_written,
            elapsed_ms = self.elapsed.as_millis(),
            "decode_report"
        );
    }
}

/// Build the catalog for `family`, reading and writing the tier cache under
/// `cache_dir` when given.
pub fn build_catalog(
    family: &FontFamily,
    cfg: &CatalogConfig,
    cache_dir: Option<&Path>,
) -> Result<Arc<Catalog>, PipelineError> {
    let cache = cache_dir.map(CatalogCache::new);
    let catalog = Catalog::build(family, cfg, cache.as_ref())?;
    Ok(Arc::new(catalog))
}

/// Match `glyphs` against `catalog` and merge the results.
pub fn decode_glyphs(
    glyphs: &[GlyphOutline],
    catalog: Arc<Catalog>,
    matcher_cfg: MatcherConfig,
    dispatch_cfg: DispatchConfig,
    cancel: &CancelToken,
) -> Result<DecodeReport, PipelineError> {
    let start = Instant::now();
    let catalog_entries = catalog
        .ladder()
        .into_iter()
        .filter_map(|tier| catalog.tier(tier).ok().map(|t| (tier, t.len())))
        .collect();
    let family = catalog.family_name().to_string();
    let missing_styles = catalog.missing_styles().to_vec();

    let matcher = GlyphMatcher::new(catalog, matcher_cfg)?;
    let dispatcher = Dispatcher::new(dispatch_cfg)?;
    let mapping = dispatcher.run(&matcher, glyphs, cancel)?;
    let summary = mapping.summary();

    Ok(DecodeReport {
        mapping,
        summary,
        family,
        missing_styles,
        catalog_entries,
        rejected: 0,
        elapsed: start.elapsed(),
        mapping_path: None,
        images_written: 0,
    })
}

/// Decode one book directory end to end with `cfg`.
pub fn decode_book(
    cfg: &GlyphmatchConfig,
    book_dir: &Path,
    cancel: &CancelToken,
) -> Result<DecodeReport, PipelineError> {
    cfg.validate()?;
    let start = Instant::now();
    let span = tracing::span!(
        Level::INFO,
        "pipeline.decode_book",
        book = %book_dir.display(),
        mode = %cfg.matching.mode
    );
    let _guard = span.enter();

    let book = load_book_dir(book_dir, cfg.input.flip_y)?;
    info!(
        files = book.files,
        glyphs = book.outlines.len(),
        rejected = book.rejected.len(),
        "glyph_batches_loaded"
    );

    let family = discover_family(cfg, book.font_family.as_deref())?;
    let catalog_cfg = cfg.catalog.to_catalog_config()?;
    let catalog = build_catalog(&family, &catalog_cfg, cfg.catalog.cache_dir.as_deref())?;

    let mut report = decode_glyphs(
        &book.outlines,
        catalog.clone(),
        cfg.matching.to_matcher_config()?,
        cfg.dispatch.to_dispatch_config()?,
        cancel,
    )?;
    report.record_rejected(&book.rejected)?;

    let mapping_path = resolve_in(book_dir, &cfg.output.mapping_file);
    write_mapping(&mapping_path, &report.mapping)?;
    report.mapping_path = Some(mapping_path);

    if cfg.output.save_images {
        let images_dir = resolve_in(book_dir, &cfg.output.images_dir);
        report.images_written = dump_unresolved(&images_dir, &report.mapping, &book.outlines, &catalog)?;
    }

    report.elapsed = start.elapsed();
    report.log();
    Ok(report)
}

/// The configured family wins over the batch hint. A batch hint that names
/// no installed family falls back to the default family.
fn discover_family(cfg: &GlyphmatchConfig, batch_hint: Option<&str>) -> Result<FontFamily, PipelineError> {
    let fonts_dir = &cfg.catalog.fonts_dir;
    if let Some(family) = cfg.catalog.family.as_deref() {
        return Ok(FontFamily::discover(fonts_dir, Some(family))?);
    }
    match FontFamily::discover(fonts_dir, batch_hint) {
        Err(CatalogError::FamilyNotFound { family, .. }) => {
            warn!(hint = %family, fonts_dir = %fonts_dir.display(), "font_family_hint_unmatched");
            Ok(FontFamily::discover(fonts_dir, None)?)
        }
        other => Ok(other?),
    }
}

fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
