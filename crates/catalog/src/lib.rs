//! # Glyph Reference Catalog
//!
//! Builds, for a reference font family, the raster and perceptual hash of
//! every (character, style) pair at every resolution tier the matcher may
//! ask for.
//!
//! ## Contract
//!
//! - Reference characters go through exactly the same rasterizer and hash
//!   configuration as unknown glyphs; the [`Catalog`] carries both configs so
//!   callers cannot accidentally compare rasters built differently.
//! - A missing or unreadable style is not fatal: it is logged, listed in
//!   [`Catalog::missing_styles`], and simply absent from the candidates.
//!   Only a family with no usable style fails the build.
//! - Once built, a catalog is immutable and safe to share across threads.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use catalog::{Catalog, CatalogConfig, FontFamily, OutlineFont, ReferenceFont, Style};
//!
//! let font = OutlineFont::new("Demo")
//!     .with_glyph('L', "M 0 0 L 200 0 L 200 800 L 600 800 L 600 1000 L 0 1000 Z")
//!     .unwrap();
//! let family = FontFamily::from_fonts(
//!     "Demo",
//!     [(Style::Regular, Arc::new(font) as Arc<dyn ReferenceFont>)],
//! )
//! .unwrap();
//!
//! let catalog = Catalog::build(&family, &CatalogConfig::default(), None).unwrap();
//! assert_eq!(catalog.ladder().len(), 3);
//! assert_eq!(catalog.lowest_tier().map(|t| t.len()), Some(1));
//! ```
pub mod cache;
pub mod charset;
pub mod entry;
pub mod error;
pub mod font;
pub mod style;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use perceptual::{hash_raster, HashConfig};
use raster::{rasterize, GlyphId, GlyphMetrics, GlyphOutline, RasterConfig, Tier};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn, Level};

pub use crate::cache::{CacheKeyParts, CatalogCache, CATALOG_SCHEMA_VERSION};
pub use crate::charset::CharacterSet;
pub use crate::entry::{ReferenceEntry, ReferenceKey, TierCatalog};
pub use crate::error::{CatalogError, FontLoadError};
pub use crate::font::{FontFamily, FontPaths, OutlineFont, ReferenceFont, TtfFont};
pub use crate::style::Style;

/// What to build and how to render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub character_set: CharacterSet,
    /// Styles to include; styles the family lacks are reported as missing.
    pub styles: Vec<Style>,
    /// Tiers to build, ascending after validation.
    pub tiers: Vec<Tier>,
    pub raster: RasterConfig,
    pub hash: HashConfig,
    /// Render and hash reference glyphs on the rayon pool.
    pub use_parallel: bool,
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_character_set(mut self, character_set: CharacterSet) -> Self {
        self.character_set = character_set;
        self
    }

    pub fn with_styles(mut self, styles: Vec<Style>) -> Self {
        self.styles = styles;
        self
    }

    pub fn with_tiers(mut self, tiers: Vec<Tier>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_raster(mut self, raster: RasterConfig) -> Self {
        self.raster = raster;
        self
    }

    pub fn with_hash(mut self, hash: HashConfig) -> Self {
        self.hash = hash;
        self
    }

    pub fn with_parallel(mut self, use_parallel: bool) -> Self {
        self.use_parallel = use_parallel;
        self
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.tiers.is_empty() {
            return Err(CatalogError::InvalidConfig("at least one tier is required".into()));
        }
        if self.styles.is_empty() {
            return Err(CatalogError::InvalidConfig("at least one style is required".into()));
        }
        self.raster.validate()?;
        for tier in &self.tiers {
            self.hash.validate_for(*tier)?;
        }
        Ok(())
    }

    fn ordered_tiers(&self) -> Vec<Tier> {
        self.tiers.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    fn ordered_styles(&self) -> Vec<Style> {
        self.styles.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            character_set: CharacterSet::Curated,
            styles: Style::ALL.to_vec(),
            tiers: Tier::default_ladder(),
            raster: RasterConfig::default(),
            hash: HashConfig::default(),
            use_parallel: true,
        }
    }
}

/// Immutable reference data for one font family, per tier.
#[derive(Debug, Clone)]
pub struct Catalog {
    family_name: String,
    family_version: Option<String>,
    family_fingerprint: u64,
    character_set: CharacterSet,
    styles: Vec<Style>,
    missing_styles: Vec<Style>,
    raster: RasterConfig,
    hash: HashConfig,
    tiers: BTreeMap<Tier, TierCatalog>,
}

impl Catalog {
    /// Build every configured tier, reading and writing `cache` when given.
    pub fn build(
        family: &FontFamily,
        cfg: &CatalogConfig,
        cache: Option<&CatalogCache>,
    ) -> Result<Self, CatalogError> {
        cfg.validate()?;
        let start = Instant::now();
        let span = tracing::span!(
            Level::INFO,
            "catalog.build",
            family = %family.name(),
            character_set = cfg.character_set.as_str()
        );
        let _guard = span.enter();

        let (styles, missing_styles): (Vec<Style>, Vec<Style>) = cfg
            .ordered_styles()
            .into_iter()
            .partition(|style| family.has_style(*style));
        for style in &missing_styles {
            warn!(family = %family.name(), style = %style, "catalog_style_missing");
        }
        if styles.is_empty() {
            return Err(CatalogError::NoUsableStyle {
                family: family.name().to_string(),
            });
        }

        let sources = collect_outlines(family, &styles, cfg.character_set);
        let fingerprint = family.fingerprint();

        let mut tiers = BTreeMap::new();
        for tier in cfg.ordered_tiers() {
            let key = CacheKeyParts {
                family_fingerprint: fingerprint,
                character_set: cfg.character_set,
                styles: &styles,
                tier,
                raster: &cfg.raster,
                hash: &cfg.hash,
            }
            .digest()?;

            let cached = cache.and_then(|cache| match cache.load(family.name(), tier, key) {
                Ok(hit) => hit,
                Err(err) => {
                    warn!(tier = %tier, error = %err, "catalog_cache_rejected");
                    None
                }
            });

            let tier_catalog = match cached {
                Some(tier_catalog) => {
                    debug!(tier = %tier, entries = tier_catalog.len(), "catalog_cache_hit");
                    tier_catalog
                }
                None => {
                    let tier_catalog = build_tier(&sources, tier, cfg)?;
                    if let Some(cache) = cache {
                        if let Err(err) = cache.store(family.name(), key, &tier_catalog) {
                            warn!(tier = %tier, error = %err, "catalog_cache_write_failed");
                        }
                    }
                    tier_catalog
                }
            };

            if tier_catalog.is_empty() {
                return Err(CatalogError::EmptyCatalog {
                    family: family.name().to_string(),
                    tier,
                });
            }
            info!(tier = %tier, entries = tier_catalog.len(), "catalog_tier_built");
            tiers.insert(tier, tier_catalog);
        }

        info!(
            styles = styles.len(),
            missing_styles = missing_styles.len(),
            tiers = tiers.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "catalog_built"
        );

        Ok(Self {
            family_name: family.name().to_string(),
            family_version: family.version(),
            family_fingerprint: fingerprint,
            character_set: cfg.character_set,
            styles,
            missing_styles,
            raster: cfg.raster,
            hash: cfg.hash.clone(),
            tiers,
        })
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn family_version(&self) -> Option<&str> {
        self.family_version.as_deref()
    }

    pub fn family_fingerprint(&self) -> u64 {
        self.family_fingerprint
    }

    pub fn character_set(&self) -> CharacterSet {
        self.character_set
    }

    /// Styles present in the catalog, in priority order.
    pub fn styles(&self) -> &[Style] {
        &self.styles
    }

    /// Requested styles the family could not provide.
    pub fn missing_styles(&self) -> &[Style] {
        &self.missing_styles
    }

    pub fn raster_config(&self) -> &RasterConfig {
        &self.raster
    }

    pub fn hash_config(&self) -> &HashConfig {
        &self.hash
    }

    /// Built tiers, ascending.
    pub fn ladder(&self) -> Vec<Tier> {
        self.tiers.keys().copied().collect()
    }

    pub fn tier(&self, tier: Tier) -> Result<&TierCatalog, CatalogError> {
        self.tiers.get(&tier).ok_or(CatalogError::UnknownTier(tier))
    }

    pub fn lowest_tier(&self) -> Option<&TierCatalog> {
        self.tiers.values().next()
    }

    pub fn top_tier(&self) -> Option<&TierCatalog> {
        self.tiers.values().next_back()
    }

    /// Distinct characters available at the lowest tier.
    pub fn characters(&self) -> BTreeSet<char> {
        self.lowest_tier()
            .map(|t| t.entries().iter().map(|e| e.key.character).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &ReferenceKey) -> bool {
        self.lowest_tier().is_some_and(|t| t.get(key).is_some())
    }
}

/// Outlines of every selected character for every available style.
fn collect_outlines(
    family: &FontFamily,
    styles: &[Style],
    character_set: CharacterSet,
) -> Vec<(ReferenceKey, GlyphOutline)> {
    let mut sources = Vec::new();
    for &style in styles {
        let Some(font) = family.font(style) else {
            continue;
        };
        let characters = character_set.select(&font.characters());
        let em = font.em_box();
        let before = sources.len();
        for character in characters {
            let key = ReferenceKey::new(character, style);
            match font.outline(character) {
                Some(path) => {
                    let metrics = GlyphMetrics::default()
                        .with_em(em)
                        .with_advance(font.advance(character).unwrap_or(0.0));
                    sources.push((key, GlyphOutline::new(GlyphId::new(key.to_string()), path, metrics)));
                }
                None => trace!(key = %key, "reference_glyph_without_outline"),
            }
        }
        debug!(style = %style, font = %font.name(), outlines = sources.len() - before, "catalog_style_outlines");
    }
    sources.sort_by_key(|(key, _)| *key);
    sources
}

fn build_tier(
    sources: &[(ReferenceKey, GlyphOutline)],
    tier: Tier,
    cfg: &CatalogConfig,
) -> Result<TierCatalog, CatalogError> {
    let build_one = |(key, outline): &(ReferenceKey, GlyphOutline)| -> Result<Option<ReferenceEntry>, CatalogError> {
        match rasterize(outline, tier, &cfg.raster) {
            Ok(raster) => {
                let hash = hash_raster(&raster, &cfg.hash)?;
                Ok(Some(ReferenceEntry {
                    key: *key,
                    raster,
                    hash,
                }))
            }
            Err(err) if err.is_input_error() => {
                debug!(key = %key, tier = %tier, error = %err, "reference_glyph_skipped");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    };

    let built: Vec<Option<ReferenceEntry>> = if cfg.use_parallel {
        sources.par_iter().map(build_one).collect::<Result<_, _>>()?
    } else {
        sources.iter().map(build_one).collect::<Result<_, _>>()?
    };
    Ok(TierCatalog::new(tier, built.into_iter().flatten().collect()))
}
