//! # Glyph matcher (`matcher`)
//!
//! Turns unknown glyph outlines into `(character, style)` decisions against a
//! built [`catalog::Catalog`].
//!
//! ## Pipeline
//!
//! For one glyph at one tier:
//!
//! 1. rasterize the outline with the catalog's raster settings and hash it;
//! 2. **phase 1** keeps catalog entries within a Hamming threshold of the
//!    hash, relaxing the threshold in steps up to a cap when nothing
//!    survives ([`candidate::shortlist`]);
//! 3. **phase 2** scores survivors with the structural scorer and ranks them
//!    best first, breaking near-ties by code point then style
//!    ([`candidate::score_shortlist`]).
//!
//! ## Modes
//!
//! - [`MatchMode::Standard`]: one tier, accept the best candidate when its
//!   distance is within [`Thresholds::accept`].
//! - [`MatchMode::Fast`]: one tier, tighter phase-1 filter, stop scoring at
//!   the first candidate within [`Thresholds::fast_accept`].
//! - [`MatchMode::Full`]: standard policy over a catalog built from every
//!   character the font maps.
//! - [`MatchMode::Progressive`] (default): start at the lowest tier and let
//!   the [`ResolutionController`] escalate ambiguous glyphs up the ladder.
//!
//! Per-glyph failures never surface as errors; they are unresolved
//! [`MatchResult`]s carrying an [`UnresolvedReason`].
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use catalog::{Catalog, CatalogConfig, FontFamily, OutlineFont, ReferenceFont, Style};
//! use matcher::{CancelToken, DispatchConfig, Dispatcher, GlyphMatcher, MatchMode, MatcherConfig};
//! use raster::{GlyphMetrics, GlyphOutline, Tier};
//!
//! let square = "M 0 0 L 100 0 L 100 100 L 0 100 Z";
//! let bar = "M 0 0 L 20 0 L 20 100 L 0 100 Z";
//! let font = OutlineFont::new("Demo")
//!     .with_glyph('#', square)
//!     .unwrap()
//!     .with_glyph('|', bar)
//!     .unwrap();
//! let family = FontFamily::from_fonts(
//!     "Demo",
//!     [(Style::Regular, Arc::new(font) as Arc<dyn ReferenceFont>)],
//! )
//! .unwrap();
//! let catalog = Catalog::build(
//!     &family,
//!     &CatalogConfig::default().with_tiers(vec![Tier::T128]),
//!     None,
//! )
//! .unwrap();
//!
//! let matcher = GlyphMatcher::new(Arc::new(catalog), MatcherConfig::new(MatchMode::Standard)).unwrap();
//! let glyph = GlyphOutline::from_svg("g1".into(), bar, GlyphMetrics::default()).unwrap();
//!
//! let dispatcher = Dispatcher::new(DispatchConfig::default().with_workers(2)).unwrap();
//! let mapping = dispatcher.run(&matcher, &[glyph], &CancelToken::new()).unwrap();
//! assert_eq!(mapping.get(&"g1".into()).and_then(|r| r.mapped()), Some(('|', Style::Regular)));
//! ```
//!
//! ## Observability
//!
//! Install a [`MatchMetrics`] implementation via [`set_match_metrics`] to
//! receive per-glyph latency and outcome, tier escalations, and catalog
//! tier sizes.

pub mod candidate;
pub mod dispatch;
pub mod engine;
pub mod metrics;
pub mod progressive;
pub mod types;

pub use crate::dispatch::{
    CancelToken, DispatchConfig, Dispatcher, DocumentMapping, MappedGlyph, Mapping, MappingSummary,
    UnresolvedGlyph,
};
pub use crate::engine::GlyphMatcher;
pub use crate::metrics::{set_match_metrics, MatchMetrics};
pub use crate::progressive::{ControllerState, ResolutionController, TierEvaluator};
pub use crate::types::{
    Candidate, FilterConfig, MatchError, MatchMode, MatchResult, MatchStatus, MatcherConfig,
    Thresholds, UnresolvedReason,
};
