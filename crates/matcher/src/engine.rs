use std::sync::Arc;
use std::time::Instant;

use catalog::{Catalog, CharacterSet, TierCatalog};
use perceptual::hash_raster;
use raster::{rasterize, GlyphOutline, RenderError, Tier};
use tracing::debug;

use crate::candidate::{accept_fixed, runner_up, score_shortlist, shortlist, Shortlist};
use crate::metrics::metrics_recorder;
use crate::progressive::{ResolutionController, TierEvaluator};
use crate::types::{
    Candidate, MatchError, MatchMode, MatchResult, MatcherConfig, UnresolvedReason,
};


/// Resolves unknown glyph outlines against a built reference catalog.
///
/// The catalog is shared read-only; a `GlyphMatcher` is `Sync` and is used
/// from every dispatcher worker at once.
#[derive(Debug, Clone)]
pub struct GlyphMatcher {
    catalog: Arc<Catalog>,
    cfg: MatcherConfig,
    controller: ResolutionController,
    fixed_tier: Tier,
}

impl GlyphMatcher {
    /// Validate `cfg` against `catalog` and construct a matcher.
    pub fn new(catalog: Arc<Catalog>, cfg: MatcherConfig) -> Result<Self, MatchError> {
        cfg.validate()?;
        if cfg.mode == MatchMode::Full && catalog.character_set() != CharacterSet::Full {
            return Err(MatchError::InvalidConfig(
                "full mode needs a catalog built with the full character set".into(),
            ));
        }

        let fixed_tier = match cfg.fixed_tier {
            Some(tier) => catalog.tier(tier)?.tier(),
            None => catalog
                .lowest_tier()
                .map(TierCatalog::tier)
                .ok_or_else(|| MatchError::InvalidConfig("catalog has no tiers".into()))?,
        };
        let controller =
            ResolutionController::new(catalog.ladder(), cfg.thresholds, cfg.explain)?;

        if let Some(recorder) = metrics_recorder() {
            for tier in catalog.ladder() {
                if let Ok(tier_catalog) = catalog.tier(tier) {
                    recorder.record_catalog_tier(tier, tier_catalog.len());
                }
            }
        }

        Ok(Self {
            catalog,
            cfg,
            controller,
            fixed_tier,
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.cfg
    }

    /// Tier used by the non-progressive modes.
    pub fn fixed_tier(&self) -> Tier {
        self.fixed_tier
    }

    /// Resolve one glyph. Per-glyph failures come back as unresolved results.
    pub fn resolve(&self, outline: &GlyphOutline) -> MatchResult {
        let start = Instant::now();
        let evaluator = GlyphEvaluator {
            outline,
            catalog: &self.catalog,
            cfg: &self.cfg,
        };

        let result = if self.cfg.mode.is_progressive() {
            self.controller.resolve(outline.id(), &evaluator)
        } else {
            self.resolve_fixed(&evaluator)
        };

        let latency = start.elapsed();
        debug!(
            glyph_id = %result.glyph_id,
            status = ?result.status,
            tier = ?result.tier.map(Tier::side),
            character = ?result.mapped().map(|(c, _)| c),
            distance = ?result.best.map(|b| b.distance),
            elapsed_micros = latency.as_micros(),
            "glyph_resolved"
        );
        if let Some(recorder) = metrics_recorder() {
            recorder.record_glyph(latency, &result);
        }
        result
    }

    /// Resolve a slice of glyphs on the calling thread, in input order.
    pub fn resolve_all(&self, outlines: &[GlyphOutline]) -> Vec<MatchResult> {
        outlines.iter().map(|outline| self.resolve(outline)).collect()
    }

    fn resolve_fixed(&self, evaluator: &GlyphEvaluator<'_>) -> MatchResult {
        let tier = self.fixed_tier;
        let glyph_id = evaluator.outline.id().clone();

        let filtered = match evaluator.filter(tier) {
            Ok(filtered) => filtered,
            Err(reason) => return MatchResult::unresolved(glyph_id, Some(tier), None, reason),
        };
        if filtered.is_empty() {
            return MatchResult::unresolved(
                glyph_id,
                Some(tier),
                None,
                UnresolvedReason::NoCandidates,
            );
        }
        let ranked = match evaluator.score(tier, filtered) {
            Ok(ranked) => ranked,
            Err(reason) => return MatchResult::unresolved(glyph_id, Some(tier), None, reason),
        };

        match accept_fixed(&ranked, &self.cfg.thresholds, self.cfg.mode) {
            Ok(best) => MatchResult::accepted(
                glyph_id,
                tier,
                best,
                runner_up(&ranked, self.cfg.thresholds.tie_epsilon),
            ),
            Err(reason) => {
                MatchResult::unresolved(glyph_id, Some(tier), ranked.first().copied(), reason)
            }
        }
    }
}

/// Renders and matches one outline at whichever tier is asked for.
struct GlyphEvaluator<'a> {
    outline: &'a GlyphOutline,
    catalog: &'a Catalog,
    cfg: &'a MatcherConfig,
}

impl GlyphEvaluator<'_> {
    fn tier_catalog(&self, tier: Tier) -> Result<&TierCatalog, UnresolvedReason> {
        self.catalog
            .tier(tier)
            .map_err(|err| UnresolvedReason::ScoringFailed {
                message: err.to_string(),
            })
    }
}

impl TierEvaluator for GlyphEvaluator<'_> {
    type Filtered = Shortlist;

    fn filter(&self, tier: Tier) -> Result<Shortlist, UnresolvedReason> {
        let tier_catalog = self.tier_catalog(tier)?;
        let image = rasterize(self.outline, tier, self.catalog.raster_config())
            .map_err(render_reason)?;
        let hash = hash_raster(&image, self.catalog.hash_config()).map_err(|err| {
            UnresolvedReason::ScoringFailed {
                message: err.to_string(),
            }
        })?;
        shortlist(&hash, image, tier_catalog, &self.cfg.filter, self.cfg.mode)
    }

    fn score(&self, tier: Tier, filtered: Shortlist) -> Result<Vec<Candidate>, UnresolvedReason> {
        let tier_catalog = self.tier_catalog(tier)?;
        score_shortlist(
            &filtered,
            tier_catalog,
            &self.cfg.similarity,
            &self.cfg.thresholds,
            self.cfg.mode,
        )
    }
}

fn render_reason(err: RenderError) -> UnresolvedReason {
    if err.is_input_error() {
        UnresolvedReason::InvalidOutline {
            message: err.to_string(),
        }
    } else {
        UnresolvedReason::ScoringFailed {
            message: err.to_string(),
        }
    }
}
