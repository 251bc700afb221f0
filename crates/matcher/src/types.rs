use catalog::{CatalogError, Style};
use perceptual::SimilarityConfig;
use raster::{GlyphId, Tier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Matching strategy for a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Full ranking at one tier; accept the best candidate under the
    /// acceptance threshold.
    Standard,
    /// Score candidates in hash order and stop at the first one under the
    /// looser "good enough" threshold.
    Fast,
    /// Standard policy over a catalog built from every mapped character.
    Full,
    /// Start at the lowest tier and escalate ambiguous glyphs.
    #[default]
    Progressive,
}

impl MatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMode::Standard => "standard",
            MatchMode::Fast => "fast",
            MatchMode::Full => "full",
            MatchMode::Progressive => "progressive",
        }
    }

    pub fn is_progressive(self) -> bool {
        matches!(self, MatchMode::Progressive)
    }
}

impl std::str::FromStr for MatchMode {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(MatchMode::Standard),
            "fast" => Ok(MatchMode::Fast),
            "full" => Ok(MatchMode::Full),
            "progressive" => Ok(MatchMode::Progressive),
            other => Err(MatchError::InvalidConfig(format!("unknown match mode '{other}'"))),
        }
    }
}

/// Distance thresholds for the acceptance policy. Distances are structural
/// distances from the scorer: `0.0` is identical, larger is worse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// Maximum distance at which a candidate is accepted.
    pub accept: f64,
    /// Early-stop threshold for fast mode.
    pub fast_accept: f64,
    /// Above this, a progressive glyph is abandoned instead of escalated.
    pub plausible: f64,
    /// Required gap between best and runner-up before a non-top tier
    /// accepts.
    pub min_separation: f64,
    /// Distances closer than this are ties and fall to the tie-break rule.
    pub tie_epsilon: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            accept: 0.20,
            fast_accept: 0.25,
            plausible: 0.45,
            min_separation: 0.03,
            tie_epsilon: 1e-9,
        }
    }
}

impl Thresholds {
    pub fn with_accept(mut self, accept: f64) -> Self {
        self.accept = accept;
        self
    }

    pub fn with_fast_accept(mut self, fast_accept: f64) -> Self {
        self.fast_accept = fast_accept;
        self
    }

    pub fn with_plausible(mut self, plausible: f64) -> Self {
        self.plausible = plausible;
        self
    }

    pub fn with_min_separation(mut self, min_separation: f64) -> Self {
        self.min_separation = min_separation;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        let all = [
            ("accept", self.accept),
            ("fast_accept", self.fast_accept),
            ("plausible", self.plausible),
            ("min_separation", self.min_separation),
            ("tie_epsilon", self.tie_epsilon),
        ];
        if let Some((name, _)) = all.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(MatchError::InvalidConfig(format!(
                "{name} must be a finite, non-negative distance"
            )));
        }
        if self.accept > self.plausible {
            return Err(MatchError::InvalidConfig(
                "accept must not exceed plausible".into(),
            ));
        }
        if self.fast_accept < self.accept {
            return Err(MatchError::InvalidConfig(
                "fast_accept must be >= accept".into(),
            ));
        }
        Ok(())
    }
}

/// Phase-1 Hamming filter, as fractions of the hash length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    /// Initial fraction for standard, full and progressive modes.
    pub fraction: f64,
    /// Initial fraction for fast mode.
    pub fast_fraction: f64,
    /// Added to the fraction each time the filter comes back empty.
    pub relax_step: f64,
    /// Hard cap on relaxation.
    pub max_fraction: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            fraction: 0.25,
            fast_fraction: 0.18,
            relax_step: 0.05,
            max_fraction: 0.50,
        }
    }
}

impl FilterConfig {
    pub fn initial_fraction(&self, mode: MatchMode) -> f64 {
        match mode {
            MatchMode::Fast => self.fast_fraction,
            _ => self.fraction,
        }
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.fraction) || !in_unit(self.fast_fraction) || !in_unit(self.max_fraction) {
            return Err(MatchError::InvalidConfig(
                "filter fractions must be within [0.0, 1.0]".into(),
            ));
        }
        if !(self.relax_step.is_finite() && self.relax_step > 0.0) {
            return Err(MatchError::InvalidConfig(
                "relax_step must be greater than zero".into(),
            ));
        }
        if self.max_fraction < self.fraction || self.max_fraction < self.fast_fraction {
            return Err(MatchError::InvalidConfig(
                "max_fraction must be >= the initial fractions".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for [`crate::GlyphMatcher`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MatcherConfig {
    pub mode: MatchMode,
    pub thresholds: Thresholds,
    pub filter: FilterConfig,
    pub similarity: SimilarityConfig,
    /// Tier used by non-progressive modes; defaults to the catalog's lowest.
    pub fixed_tier: Option<Tier>,
    /// Keep superseded per-tier attempts in [`MatchResult::attempts`].
    pub explain: bool,
}

impl MatcherConfig {
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_fixed_tier(mut self, tier: Tier) -> Self {
        self.fixed_tier = Some(tier);
        self
    }

    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        self.thresholds.validate()?;
        self.filter.validate()?;
        self.similarity
            .validate()
            .map_err(|e| MatchError::InvalidConfig(e.to_string()))
    }
}

/// One scored reference candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub character: char,
    pub style: Style,
    /// Structural distance from the scorer.
    pub distance: f64,
    /// Hamming distance from phase 1.
    pub hash_distance: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Accepted,
    Unresolved,
    /// A superseded attempt at a lower tier; never a final status.
    AmbiguousEscalated,
}

/// Why a glyph ended without an accepted character.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The outline could not be rendered.
    InvalidOutline { message: String },
    /// Phase 1 found nothing even at the relaxation cap.
    NoCandidates,
    /// The best candidate was above the acceptance threshold.
    BelowAcceptance { best_distance: f64 },
    /// The best candidate was beyond the plausible floor; escalation was
    /// pointless.
    Implausible { best_distance: f64 },
    /// The top tier was reached without a confident match.
    Exhausted { best_distance: Option<f64> },
    /// Scoring failed for an internal reason.
    ScoringFailed { message: String },
}

/// Outcome for one glyph (or one superseded tier attempt).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub glyph_id: GlyphId,
    pub status: MatchStatus,
    /// Best candidate at `tier`, if any was scored.
    pub best: Option<Candidate>,
    /// First candidate beyond the tie epsilon of `best`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_up: Option<Candidate>,
    /// Tier of the decision; `None` when nothing could be attempted.
    pub tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnresolvedReason>,
    /// Superseded lower-tier attempts, only populated with `explain`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<MatchResult>,
}

impl MatchResult {
    pub fn accepted(glyph_id: GlyphId, tier: Tier, best: Candidate, runner_up: Option<Candidate>) -> Self {
        Self {
            glyph_id,
            status: MatchStatus::Accepted,
            best: Some(best),
            runner_up,
            tier: Some(tier),
            reason: None,
            attempts: Vec::new(),
        }
    }

    pub fn unresolved(
        glyph_id: GlyphId,
        tier: Option<Tier>,
        best: Option<Candidate>,
        reason: UnresolvedReason,
    ) -> Self {
        Self {
            glyph_id,
            status: MatchStatus::Unresolved,
            best,
            runner_up: None,
            tier,
            reason: Some(reason),
            attempts: Vec::new(),
        }
    }

    pub fn escalated(
        glyph_id: GlyphId,
        tier: Tier,
        best: Option<Candidate>,
        runner_up: Option<Candidate>,
    ) -> Self {
        Self {
            glyph_id,
            status: MatchStatus::AmbiguousEscalated,
            best,
            runner_up,
            tier: Some(tier),
            reason: None,
            attempts: Vec::new(),
        }
    }

    pub fn with_attempts(mut self, attempts: Vec<MatchResult>) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_accepted(&self) -> bool {
        self.status == MatchStatus::Accepted
    }

    /// Accepted character and style, if any.
    pub fn mapped(&self) -> Option<(char, Style)> {
        match (self.status, self.best) {
            (MatchStatus::Accepted, Some(best)) => Some((best.character, best.style)),
            _ => None,
        }
    }
}

/// Errors produced by the matching layer. Per-glyph problems are not
/// errors; they become unresolved [`MatchResult`]s.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("invalid match config: {0}")]
    InvalidConfig(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    #[error("glyph {0} already has a result")]
    DuplicateGlyph(GlyphId),

    #[error("matching run was cancelled")]
    Cancelled,
}
