//! Two-phase candidate search against one catalog tier.
//!
//! Phase 1 prunes the tier by Hamming distance between perceptual hashes.
//! Phase 2 scores the survivors with the structural scorer and ranks them.
//! Hash distance only ever prunes; acceptance is decided on scored distance.

use std::cmp::Ordering;

use catalog::{ReferenceEntry, TierCatalog};
use perceptual::{score, PerceptualHash, SimilarityConfig};
use raster::{RasterImage, Tier};

use crate::types::{Candidate, FilterConfig, MatchMode, Thresholds, UnresolvedReason};

/// Phase-1 survivors, as indices into the tier's entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Shortlist {
    pub tier: Tier,
    /// Unknown glyph raster at `tier`, kept for phase 2.
    pub raster: RasterImage,
    /// `(entry index, hash distance)` ordered by hash distance, then key.
    pub picks: Vec<(usize, u32)>,
    /// Hamming threshold that produced `picks`.
    pub threshold_bits: u32,
    /// Number of relaxation steps taken.
    pub relaxations: u32,
}

impl Shortlist {
    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }
}

/// Hamming threshold for a fraction of the hash length.
pub fn threshold_bits(fraction: f64, bit_len: usize) -> u32 {
    (fraction * bit_len as f64).ceil() as u32
}

/// Phase 1: keep entries within the mode's Hamming threshold, relaxing the
/// threshold in steps up to the cap while nothing survives.
pub fn shortlist(
    hash: &PerceptualHash,
    raster: RasterImage,
    tier_catalog: &TierCatalog,
    filter: &FilterConfig,
    mode: MatchMode,
) -> Result<Shortlist, UnresolvedReason> {
    let mut distances = Vec::with_capacity(tier_catalog.len());
    for (idx, entry) in tier_catalog.entries().iter().enumerate() {
        let d = hash
            .hamming(&entry.hash)
            .map_err(|err| UnresolvedReason::ScoringFailed {
                message: err.to_string(),
            })?;
        distances.push((idx, d));
    }

    let initial = filter.initial_fraction(mode);
    let mut relaxations = 0u32;
    let (picks, threshold) = loop {
        let fraction =
            (initial + f64::from(relaxations) * filter.relax_step).min(filter.max_fraction);
        let threshold = threshold_bits(fraction, hash.bit_len());
        let picks: Vec<(usize, u32)> = distances
            .iter()
            .copied()
            .filter(|(_, d)| *d <= threshold)
            .collect();
        if !picks.is_empty() || fraction >= filter.max_fraction {
            break (picks, threshold);
        }
        relaxations += 1;
    };

    let mut picks = picks;
    let entries = tier_catalog.entries();
    picks.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| entries[a.0].key.cmp(&entries[b.0].key)));

    Ok(Shortlist {
        tier: tier_catalog.tier(),
        raster,
        picks,
        threshold_bits: threshold,
        relaxations,
    })
}

/// Ranking order: ascending distance; ties (within `tie_epsilon` of the
/// best) by code point then style priority.
pub fn rank(candidates: &mut [Candidate], tie_epsilon: f64) {
    candidates.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.character.cmp(&b.character))
            .then_with(|| a.style.cmp(&b.style))
    });
    let Some(best) = candidates.first().map(|c| c.distance) else {
        return;
    };
    let tied = candidates
        .iter()
        .take_while(|c| c.distance - best <= tie_epsilon)
        .count();
    candidates[..tied].sort_by(|a, b| {
        a.character
            .cmp(&b.character)
            .then_with(|| a.style.cmp(&b.style))
            .then_with(|| a.distance.total_cmp(&b.distance))
    });
}

/// First candidate strictly beyond the tie group of the best one.
pub fn runner_up(ranked: &[Candidate], tie_epsilon: f64) -> Option<Candidate> {
    let best = ranked.first()?;
    ranked
        .iter()
        .skip(1)
        .find(|c| c.distance - best.distance > tie_epsilon)
        .copied()
}

fn scored(
    entry: &ReferenceEntry,
    hash_distance: u32,
    raster: &RasterImage,
    similarity: &SimilarityConfig,
) -> Result<Candidate, UnresolvedReason> {
    let distance = score(raster, &entry.raster, similarity).map_err(|err| {
        UnresolvedReason::ScoringFailed {
            message: err.to_string(),
        }
    })?;
    Ok(Candidate {
        character: entry.key.character,
        style: entry.key.style,
        distance,
        hash_distance,
    })
}

/// Phase 2: score shortlisted entries and return them ranked best first.
///
/// In fast mode candidates are scored in shortlist order and scoring stops
/// at the first one within `fast_accept`; the returned ranking then only
/// covers what was scored.
pub fn score_shortlist(
    shortlist: &Shortlist,
    tier_catalog: &TierCatalog,
    similarity: &SimilarityConfig,
    thresholds: &Thresholds,
    mode: MatchMode,
) -> Result<Vec<Candidate>, UnresolvedReason> {
    let entries = tier_catalog.entries();
    let mut candidates = Vec::with_capacity(shortlist.picks.len());
    for &(idx, hash_distance) in &shortlist.picks {
        let candidate = scored(&entries[idx], hash_distance, &shortlist.raster, similarity)?;
        let good_enough = candidate.distance <= thresholds.fast_accept;
        candidates.push(candidate);
        if mode == MatchMode::Fast && good_enough {
            break;
        }
    }
    rank(&mut candidates, thresholds.tie_epsilon);
    Ok(candidates)
}

/// Single-tier acceptance for standard, full and fast modes.
pub fn accept_fixed(
    ranked: &[Candidate],
    thresholds: &Thresholds,
    mode: MatchMode,
) -> Result<Candidate, UnresolvedReason> {
    let Some(best) = ranked.first() else {
        return Err(UnresolvedReason::NoCandidates);
    };
    let limit = match mode {
        MatchMode::Fast => thresholds.fast_accept,
        _ => thresholds.accept,
    };
    match best.distance.partial_cmp(&limit) {
        Some(Ordering::Less | Ordering::Equal) => Ok(*best),
        _ => Err(UnresolvedReason::BelowAcceptance {
            best_distance: best.distance,
        }),
    }
}
