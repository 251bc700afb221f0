//! Per-glyph resolution state machine for progressive mode.
//!
//! ```text
//! Unresolved -> Filtered -> Scored -> Accepted
//!                                  -> Escalate  (next tier, back to Unresolved)
//!                                  -> Exhausted (top tier reached, final Unresolved)
//! ```
//!
//! The controller never looks at pixels itself. A [`TierEvaluator`] performs
//! the filter and score steps for one glyph, so the transitions can be
//! driven by scripted outcomes in tests.

use std::fmt;

use raster::{GlyphId, Tier};
use tracing::trace;

use crate::candidate::runner_up;
use crate::metrics::metrics_recorder;
use crate::types::{Candidate, MatchError, MatchResult, Thresholds, UnresolvedReason};

/// States a glyph passes through at each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Unresolved,
    Filtered,
    Scored,
    Accepted,
    Escalate,
    Exhausted,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Unresolved => "unresolved",
            ControllerState::Filtered => "filtered",
            ControllerState::Scored => "scored",
            ControllerState::Accepted => "accepted",
            ControllerState::Escalate => "escalate",
            ControllerState::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// Filter and score steps for one glyph at a given tier.
pub trait TierEvaluator {
    /// Phase-1 output carried into scoring.
    type Filtered;

    /// Render the glyph at `tier` and shortlist candidates.
    fn filter(&self, tier: Tier) -> Result<Self::Filtered, UnresolvedReason>;

    /// Score the shortlist, best first. An empty ranking means no candidates.
    fn score(
        &self,
        tier: Tier,
        filtered: Self::Filtered,
    ) -> Result<Vec<Candidate>, UnresolvedReason>;
}

/// Decision taken in the `Scored` state.
#[derive(Debug, Clone, PartialEq)]
enum Decision {
    Accept(Candidate),
    Escalate,
    Stop(UnresolvedReason),
}

/// Drives a glyph up the tier ladder until it is accepted or abandoned.
#[derive(Debug, Clone)]
pub struct ResolutionController {
    ladder: Vec<Tier>,
    thresholds: Thresholds,
    explain: bool,
}

impl ResolutionController {
    pub fn new(
        mut ladder: Vec<Tier>,
        thresholds: Thresholds,
        explain: bool,
    ) -> Result<Self, MatchError> {
        ladder.sort();
        ladder.dedup();
        if ladder.is_empty() {
            return Err(MatchError::InvalidConfig(
                "progressive mode needs at least one tier".into(),
            ));
        }
        thresholds.validate()?;
        Ok(Self {
            ladder,
            thresholds,
            explain,
        })
    }

    pub fn ladder(&self) -> &[Tier] {
        &self.ladder
    }

    /// Run the state machine for one glyph.
    pub fn resolve<E: TierEvaluator>(&self, glyph_id: &GlyphId, evaluator: &E) -> MatchResult {
        let mut attempts = Vec::new();
        let mut last_best: Option<Candidate> = None;

        for (idx, &tier) in self.ladder.iter().enumerate() {
            let is_top = idx + 1 == self.ladder.len();
            let mut state = ControllerState::Unresolved;
            trace!(glyph_id = %glyph_id, tier = %tier, state = %state, "glyph_state");

            let filtered = match evaluator.filter(tier) {
                Ok(filtered) => filtered,
                Err(reason) => {
                    return self.finish(
                        MatchResult::unresolved(glyph_id.clone(), Some(tier), last_best, reason),
                        attempts,
                    )
                }
            };
            state = ControllerState::Filtered;
            trace!(glyph_id = %glyph_id, tier = %tier, state = %state, "glyph_state");

            let ranked = match evaluator.score(tier, filtered) {
                Ok(ranked) => ranked,
                Err(reason) => {
                    return self.finish(
                        MatchResult::unresolved(glyph_id.clone(), Some(tier), last_best, reason),
                        attempts,
                    )
                }
            };
            state = ControllerState::Scored;
            trace!(
                glyph_id = %glyph_id,
                tier = %tier,
                candidates = ranked.len(),
                state = %state,
                "glyph_state"
            );

            let best = ranked.first().copied();
            let second = runner_up(&ranked, self.thresholds.tie_epsilon);
            if best.is_some() {
                last_best = best;
            }

            match self.decide(&ranked, second, is_top) {
                Decision::Accept(candidate) => {
                    state = ControllerState::Accepted;
                    trace!(glyph_id = %glyph_id, tier = %tier, state = %state, "glyph_state");
                    return self.finish(
                        MatchResult::accepted(glyph_id.clone(), tier, candidate, second),
                        attempts,
                    );
                }
                Decision::Escalate => {
                    state = ControllerState::Escalate;
                    let next = self.ladder[idx + 1];
                    trace!(
                        glyph_id = %glyph_id,
                        tier = %tier,
                        next = %next,
                        state = %state,
                        "glyph_state"
                    );
                    if let Some(recorder) = metrics_recorder() {
                        recorder.record_escalation(tier, next);
                    }
                    attempts.push(MatchResult::escalated(glyph_id.clone(), tier, best, second));
                }
                Decision::Stop(reason) => {
                    if is_top && matches!(reason, UnresolvedReason::Exhausted { .. }) {
                        state = ControllerState::Exhausted;
                        trace!(glyph_id = %glyph_id, tier = %tier, state = %state, "glyph_state");
                    }
                    return self.finish(
                        MatchResult::unresolved(glyph_id.clone(), Some(tier), best, reason),
                        attempts,
                    );
                }
            }
        }

        // Every path through the top tier returns above.
        let top = self.ladder.last().copied();
        MatchResult::unresolved(
            glyph_id.clone(),
            top,
            last_best,
            UnresolvedReason::Exhausted {
                best_distance: last_best.map(|c| c.distance),
            },
        )
    }

    fn decide(&self, ranked: &[Candidate], second: Option<Candidate>, is_top: bool) -> Decision {
        let t = &self.thresholds;
        let Some(best) = ranked.first().copied() else {
            return if is_top {
                Decision::Stop(UnresolvedReason::Exhausted { best_distance: None })
            } else {
                Decision::Escalate
            };
        };

        if is_top {
            return if best.distance <= t.accept {
                Decision::Accept(best)
            } else {
                Decision::Stop(UnresolvedReason::Exhausted {
                    best_distance: Some(best.distance),
                })
            };
        }

        if best.distance <= t.accept {
            let separated =
                second.map_or(true, |s| s.distance - best.distance >= t.min_separation);
            if separated {
                Decision::Accept(best)
            } else {
                Decision::Escalate
            }
        } else if best.distance <= t.plausible {
            Decision::Escalate
        } else {
            Decision::Stop(UnresolvedReason::Implausible {
                best_distance: best.distance,
            })
        }
    }

    fn finish(&self, result: MatchResult, attempts: Vec<MatchResult>) -> MatchResult {
        if self.explain {
            result.with_attempts(attempts)
        } else {
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::Style;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use crate::types::MatchStatus;

    fn cand(character: char, distance: f64) -> Candidate {
        Candidate {
            character,
            style: Style::Regular,
            distance,
            hash_distance: 0,
        }
    }

    /// Evaluator returning fixed rankings per tier and recording the calls.
    #[derive(Default)]
    struct Scripted {
        rankings: BTreeMap<Tier, Result<Vec<Candidate>, UnresolvedReason>>,
        calls: RefCell<Vec<(Tier, &'static str)>>,
    }

    impl Scripted {
        fn at(mut self, tier: Tier, ranking: Vec<Candidate>) -> Self {
            self.rankings.insert(tier, Ok(ranking));
            self
        }

        fn failing(mut self, tier: Tier, reason: UnresolvedReason) -> Self {
            self.rankings.insert(tier, Err(reason));
            self
        }

        fn tiers_visited(&self) -> Vec<Tier> {
            self.calls
                .borrow()
                .iter()
                .filter(|(_, step)| *step == "filter")
                .map(|(tier, _)| *tier)
                .collect()
        }
    }

    impl TierEvaluator for Scripted {
        type Filtered = Vec<Candidate>;

        fn filter(&self, tier: Tier) -> Result<Vec<Candidate>, UnresolvedReason> {
            self.calls.borrow_mut().push((tier, "filter"));
            self.rankings.get(&tier).cloned().unwrap_or(Ok(Vec::new()))
        }

        fn score(&self, tier: Tier, filtered: Vec<Candidate>) -> Result<Vec<Candidate>, UnresolvedReason> {
            self.calls.borrow_mut().push((tier, "score"));
            Ok(filtered)
        }
    }

    fn controller(explain: bool) -> ResolutionController {
        ResolutionController::new(Tier::default_ladder(), Thresholds::default(), explain).unwrap()
    }

    #[test]
    fn confident_low_tier_match_is_accepted_immediately() {
        let script = Scripted::default().at(Tier::T128, vec![cand('A', 0.01), cand('B', 0.4)]);
        let result = controller(false).resolve(&"g".into(), &script);
        assert_eq!(result.status, MatchStatus::Accepted);
        assert_eq!(result.tier, Some(Tier::T128));
        assert_eq!(result.runner_up.map(|c| c.character), Some('B'));
        assert_eq!(script.tiers_visited(), vec![Tier::T128]);
    }

    #[test]
    fn ambiguous_match_escalates_until_separated() {
        let script = Scripted::default()
            .at(Tier::T128, vec![cand('I', 0.05), cand('l', 0.06)])
            .at(Tier::T256, vec![cand('I', 0.04), cand('l', 0.10)]);
        let result = controller(true).resolve(&"g".into(), &script);
        assert_eq!(result.status, MatchStatus::Accepted);
        assert_eq!(result.tier, Some(Tier::T256));
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].status, MatchStatus::AmbiguousEscalated);
        assert_eq!(result.attempts[0].tier, Some(Tier::T128));
    }

    #[test]
    fn attempts_are_dropped_without_explain() {
        let script = Scripted::default()
            .at(Tier::T128, vec![cand('I', 0.05), cand('l', 0.06)])
            .at(Tier::T256, vec![cand('I', 0.04), cand('l', 0.10)]);
        let result = controller(false).resolve(&"g".into(), &script);
        assert!(result.attempts.is_empty());
    }

    #[test]
    fn plausible_but_unaccepted_escalates() {
        let script = Scripted::default()
            .at(Tier::T128, vec![cand('A', 0.30)])
            .at(Tier::T256, vec![cand('A', 0.15)]);
        let result = controller(false).resolve(&"g".into(), &script);
        assert_eq!(result.status, MatchStatus::Accepted);
        assert_eq!(result.tier, Some(Tier::T256));
    }

    #[test]
    fn implausible_stops_without_escalating() {
        let script = Scripted::default().at(Tier::T128, vec![cand('A', 0.8)]);
        let result = controller(false).resolve(&"g".into(), &script);
        assert_eq!(result.status, MatchStatus::Unresolved);
        assert!(matches!(result.reason, Some(UnresolvedReason::Implausible { .. })));
        assert_eq!(script.tiers_visited(), vec![Tier::T128]);
    }

    #[test]
    fn top_tier_without_acceptance_is_exhausted() {
        let script = Scripted::default()
            .at(Tier::T128, vec![cand('A', 0.3)])
            .at(Tier::T256, vec![cand('A', 0.3)])
            .at(Tier::T512, vec![cand('A', 0.25)]);
        let result = controller(false).resolve(&"g".into(), &script);
        assert_eq!(result.status, MatchStatus::Unresolved);
        assert_eq!(result.tier, Some(Tier::T512));
        assert_eq!(
            result.reason,
            Some(UnresolvedReason::Exhausted {
                best_distance: Some(0.25)
            })
        );
    }

    #[test]
    fn top_tier_accepts_ties_without_separation() {
        let script = Scripted::default()
            .at(Tier::T128, vec![cand('I', 0.05), cand('l', 0.06)])
            .at(Tier::T256, vec![cand('I', 0.05), cand('l', 0.06)])
            .at(Tier::T512, vec![cand('I', 0.05), cand('l', 0.06)]);
        let result = controller(false).resolve(&"g".into(), &script);
        assert_eq!(result.status, MatchStatus::Accepted);
        assert_eq!(result.tier, Some(Tier::T512));
        assert_eq!(result.mapped().map(|m| m.0), Some('I'));
    }

    #[test]
    fn empty_shortlist_escalates_then_exhausts() {
        let script = Scripted::default();
        let result = controller(false).resolve(&"g".into(), &script);
        assert_eq!(script.tiers_visited(), Tier::default_ladder());
        assert_eq!(
            result.reason,
            Some(UnresolvedReason::Exhausted { best_distance: None })
        );
    }

    #[test]
    fn render_failure_is_terminal() {
        let script = Scripted::default().failing(
            Tier::T128,
            UnresolvedReason::InvalidOutline {
                message: "empty".into(),
            },
        );
        let result = controller(false).resolve(&"g".into(), &script);
        assert!(matches!(result.reason, Some(UnresolvedReason::InvalidOutline { .. })));
        assert_eq!(script.tiers_visited(), vec![Tier::T128]);
    }

    #[test]
    fn single_tier_ladder_behaves_as_top() {
        let ctl = ResolutionController::new(vec![Tier::T256], Thresholds::default(), false).unwrap();
        let script = Scripted::default().at(Tier::T256, vec![cand('A', 0.1), cand('B', 0.11)]);
        let result = ctl.resolve(&"g".into(), &script);
        assert_eq!(result.status, MatchStatus::Accepted);
    }

    #[test]
    fn empty_ladder_is_rejected() {
        assert!(ResolutionController::new(vec![], Thresholds::default(), false).is_err());
    }
}
