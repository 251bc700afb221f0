//! Parallel dispatch of glyphs across a worker pool and the merged mapping.

use std::collections::{btree_map, BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use catalog::Style;
use raster::{GlyphId, GlyphOutline, Tier};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};

use crate::engine::GlyphMatcher;
use crate::types::{MatchError, MatchResult, MatchStatus, UnresolvedReason};

/// Worker pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Pool size; `None` uses every available core.
    pub workers: Option<usize>,
    /// Minimum number of glyphs a worker takes per task.
    pub batch_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: 8,
        }
    }
}

impl DispatchConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.workers == Some(0) {
            return Err(MatchError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(MatchError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Effective pool size.
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

/// Shared flag that aborts a matching run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Fans glyphs out over a dedicated rayon pool.
pub struct Dispatcher {
    pool: ThreadPool,
    cfg: DispatchConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("workers", &self.pool.current_num_threads())
            .field("batch_size", &self.cfg.batch_size)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(cfg: DispatchConfig) -> Result<Self, MatchError> {
        cfg.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(cfg.resolved_workers())
            .thread_name(|i| format!("glyph-worker-{i}"))
            .build()
            .map_err(|err| MatchError::WorkerPool(err.to_string()))?;
        Ok(Self { pool, cfg })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Resolve every distinct glyph and merge the results.
    ///
    /// Glyphs repeating an id already seen are dropped; the first occurrence
    /// wins. A cancelled run returns [`MatchError::Cancelled`] and no mapping.
    pub fn run(
        &self,
        matcher: &GlyphMatcher,
        glyphs: &[GlyphOutline],
        cancel: &CancelToken,
    ) -> Result<Mapping, MatchError> {
        let start = Instant::now();
        let span = tracing::span!(
            Level::INFO,
            "matcher.dispatch",
            glyphs = glyphs.len(),
            workers = self.workers(),
            mode = matcher.config().mode.as_str()
        );
        let _guard = span.enter();

        let unique = dedupe(glyphs);
        let min_len = self.cfg.batch_size;
        let results: Vec<Option<MatchResult>> = self.pool.install(|| {
            unique
                .par_iter()
                .with_min_len(min_len)
                .map(|outline| {
                    if cancel.is_cancelled() {
                        None
                    } else {
                        Some(matcher.resolve(outline))
                    }
                })
                .collect()
        });

        if cancel.is_cancelled() {
            warn!(glyphs = unique.len(), "dispatch_cancelled");
            return Err(MatchError::Cancelled);
        }

        let mut mapping = Mapping::new();
        for result in results.into_iter().flatten() {
            mapping.insert(result)?;
        }

        let summary = mapping.summary();
        info!(
            glyphs = mapping.len(),
            accepted = summary.accepted,
            unresolved = summary.unresolved,
            elapsed_micros = start.elapsed().as_micros(),
            "dispatch_complete"
        );
        Ok(mapping)
    }
}

fn dedupe(glyphs: &[GlyphOutline]) -> Vec<&GlyphOutline> {
    let mut seen: HashMap<&GlyphId, &GlyphOutline> = HashMap::with_capacity(glyphs.len());
    let mut unique = Vec::with_capacity(glyphs.len());
    for outline in glyphs {
        match seen.get(outline.id()) {
            Some(first) => {
                if first.path() != outline.path() {
                    warn!(glyph_id = %outline.id(), "glyph_duplicate_conflict");
                }
            }
            None => {
                seen.insert(outline.id(), outline);
                unique.push(outline);
            }
        }
    }
    unique
}

/// Final result per glyph id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    results: BTreeMap<GlyphId, MatchResult>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a final result. A second result for the same glyph is an error.
    pub fn insert(&mut self, result: MatchResult) -> Result<(), MatchError> {
        match self.results.entry(result.glyph_id.clone()) {
            btree_map::Entry::Occupied(entry) => Err(MatchError::DuplicateGlyph(entry.key().clone())),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(result);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &GlyphId) -> Option<&MatchResult> {
        self.results.get(id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results ordered by glyph id.
    pub fn iter(&self) -> impl Iterator<Item = &MatchResult> {
        self.results.values()
    }

    pub fn accepted(&self) -> impl Iterator<Item = &MatchResult> {
        self.iter().filter(|r| r.is_accepted())
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &MatchResult> {
        self.iter().filter(|r| !r.is_accepted())
    }

    pub fn unresolved_ids(&self) -> Vec<GlyphId> {
        self.unresolved().map(|r| r.glyph_id.clone()).collect()
    }

    /// Shape handed to document assembly.
    pub fn to_document(&self) -> DocumentMapping {
        let glyphs = self
            .iter()
            .filter_map(|r| {
                let (character, style) = r.mapped()?;
                let tier = r.tier?;
                Some((
                    r.glyph_id.clone(),
                    MappedGlyph {
                        character,
                        style,
                        tier,
                    },
                ))
            })
            .collect();
        let unresolved = self
            .unresolved()
            .map(|r| {
                (
                    r.glyph_id.clone(),
                    UnresolvedGlyph {
                        tier: r.tier,
                        reason: r.reason.clone(),
                        best: r.best.map(|b| (b.character, b.distance)),
                    },
                )
            })
            .collect();
        DocumentMapping { glyphs, unresolved }
    }

    /// Counts per status and per accepting tier.
    pub fn summary(&self) -> MappingSummary {
        let mut summary = MappingSummary::default();
        for result in self.iter() {
            match result.status {
                MatchStatus::Accepted => {
                    summary.accepted += 1;
                    if let Some(tier) = result.tier {
                        *summary.accepted_by_tier.entry(tier).or_default() += 1;
                    }
                }
                MatchStatus::Unresolved | MatchStatus::AmbiguousEscalated => {
                    summary.unresolved += 1;
                }
            }
            summary.escalations += result.attempts.len();
        }
        summary
    }
}

impl<'a> IntoIterator for &'a Mapping {
    type Item = &'a MatchResult;
    type IntoIter = btree_map::Values<'a, GlyphId, MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.values()
    }
}

/// One accepted glyph in the document mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedGlyph {
    pub character: char,
    pub style: Style,
    pub tier: Tier,
}

/// One glyph left unresolved, with what stopped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedGlyph {
    /// Last tier tried; absent when the outline never rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnresolvedReason>,
    /// Closest candidate character and its distance, if one was scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best: Option<(char, f64)>,
}

/// `{ glyph id -> (character, style, tier) }` plus the glyphs left
/// unresolved, keyed the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMapping {
    pub glyphs: BTreeMap<GlyphId, MappedGlyph>,
    pub unresolved: BTreeMap<GlyphId, UnresolvedGlyph>,
}

/// Aggregate counts over a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSummary {
    pub accepted: usize,
    pub unresolved: usize,
    pub accepted_by_tier: BTreeMap<Tier, usize>,
    /// Superseded attempts; only counted when results carry them.
    pub escalations: usize,
}
