// src/canonicalization/decision.rs
//! Conservative accept/reject policy for prefix removal.
//!
//! Candidate -> Matched -> Scored -> {Accepted | AcceptedWithReview | Rejected}.
//! Records that fail a precondition never enter the state machine and are `Skipped`.

use serde::Serialize;

use crate::models::matching::{MatchKind, MatchResult, MatchScope, PrefixCandidate};

pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_REVIEW_BAND_FLOOR: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    pub accept_threshold: f64,
    /// A rejected best match scoring in `[review_band_floor, accept_threshold)` is flagged.
    pub review_band_floor: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            review_band_floor: DEFAULT_REVIEW_BAND_FLOOR,
        }
    }
}

/// A candidate that matched an administrative name, with what stripping it would leave.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: PrefixCandidate,
    pub match_result: MatchResult,
    pub remainder: String,
}

impl ScoredCandidate {
    pub fn new(candidate: PrefixCandidate, match_result: MatchResult, name: &str) -> Self {
        let remainder = name
            .strip_prefix(candidate.text.as_str())
            .unwrap_or(name)
            .to_string();
        Self {
            candidate,
            match_result,
            remainder,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.match_result.raw_confidence
    }

    fn conflicts_with(&self, other: &ScoredCandidate) -> bool {
        self.match_result.matched_admin_name != other.match_result.matched_admin_name
            && self.remainder != other.remainder
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyName,
    EmptyAdminName,
    /// Short names bypass prefix removal but remain valid.
    BelowLengthGuard,
}

impl SkipReason {
    pub fn is_precondition_failure(&self) -> bool {
        matches!(self, SkipReason::EmptyName | SkipReason::EmptyAdminName)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PrefixDecision {
    Skipped { reason: SkipReason },
    Rejected {
        nearest: Option<ScoredCandidate>,
        borderline: bool,
    },
    Accepted { removal: ScoredCandidate },
    AcceptedWithReview {
        removal: ScoredCandidate,
        competing: ScoredCandidate,
    },
}

impl PrefixDecision {
    pub fn label(&self) -> &'static str {
        match self {
            PrefixDecision::Skipped { reason } if reason.is_precondition_failure() => "invalid",
            PrefixDecision::Skipped { .. } => "bypassed",
            PrefixDecision::Rejected { borderline: true, .. } => "rejected_review",
            PrefixDecision::Rejected { .. } => "rejected",
            PrefixDecision::Accepted { .. } => "accepted",
            PrefixDecision::AcceptedWithReview { .. } => "accepted_review",
        }
    }

    pub fn removal(&self) -> Option<&ScoredCandidate> {
        match self {
            PrefixDecision::Accepted { removal } | PrefixDecision::AcceptedWithReview { removal, .. } => {
                Some(removal)
            }
            _ => None,
        }
    }

    /// The match worth reporting: the applied removal, or a rejected borderline one.
    pub fn reported_match(&self) -> Option<&ScoredCandidate> {
        match self {
            PrefixDecision::Rejected {
                nearest,
                borderline: true,
            } => nearest.as_ref(),
            _ => self.removal(),
        }
    }

    pub fn needs_review(&self) -> bool {
        match self {
            PrefixDecision::Skipped { reason } => reason.is_precondition_failure(),
            PrefixDecision::Rejected { borderline, .. } => *borderline,
            PrefixDecision::Accepted { .. } => false,
            PrefixDecision::AcceptedWithReview { .. } => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, PrefixDecision::Skipped { reason } if reason.is_precondition_failure())
    }
}

/// Chooses among scored candidates, which must be in generation order so that
/// ties go to the earlier (more reliable) candidate.
pub fn decide(policy: &DecisionPolicy, scored: Vec<ScoredCandidate>) -> PrefixDecision {
    let mut viable: Vec<ScoredCandidate> = Vec::new();
    let mut nearest: Option<ScoredCandidate> = None;

    for candidate in scored {
        if candidate.remainder.is_empty() {
            continue;
        }
        if candidate.confidence() >= policy.accept_threshold {
            viable.push(candidate);
        } else if nearest
            .as_ref()
            .map_or(true, |best| candidate.confidence() > best.confidence())
        {
            nearest = Some(candidate);
        }
    }

    let chosen_idx = match best_index(&viable) {
        Some(idx) => idx,
        None => {
            let borderline = nearest
                .as_ref()
                .map_or(false, |n| n.confidence() >= policy.review_band_floor);
            return PrefixDecision::Rejected {
                nearest,
                borderline,
            };
        }
    };

    let removal = viable.remove(chosen_idx);
    let competing = viable
        .into_iter()
        .filter(|other| other.conflicts_with(&removal))
        .fold(None::<ScoredCandidate>, |best, other| match best {
            Some(b) if b.confidence() >= other.confidence() => Some(b),
            _ => Some(other),
        });

    match competing {
        Some(competing) => PrefixDecision::AcceptedWithReview { removal, competing },
        None => PrefixDecision::Accepted { removal },
    }
}

fn best_index(scored: &[ScoredCandidate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, candidate) in scored.iter().enumerate() {
        match best {
            Some(b) if scored[b].confidence() >= candidate.confidence() => {}
            _ => best = Some(idx),
        }
    }
    best
}

/// Final per-record result. Created once per batch pass and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalizationOutcome {
    pub canonical_name: String,
    pub decision: PrefixDecision,
}

impl CanonicalizationOutcome {
    pub fn unchanged(name: impl Into<String>, decision: PrefixDecision) -> Self {
        Self {
            canonical_name: name.into(),
            decision,
        }
    }

    pub fn from_decision(name: &str, decision: PrefixDecision) -> Self {
        let canonical_name = match decision.removal() {
            Some(removal) => removal.remainder.clone(),
            None => name.to_string(),
        };
        Self {
            canonical_name,
            decision,
        }
    }

    pub fn prefix_removed(&self) -> bool {
        self.decision.removal().is_some()
    }

    pub fn removed_prefix_text(&self) -> Option<&str> {
        self.decision.removal().map(|r| r.candidate.text.as_str())
    }

    pub fn match_source(&self) -> Option<MatchScope> {
        self.decision.reported_match().map(|r| r.match_result.match_scope)
    }

    pub fn match_kind(&self) -> Option<MatchKind> {
        self.decision.reported_match().map(|r| r.match_result.match_kind)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.decision.reported_match().map(ScoredCandidate::confidence)
    }

    pub fn needs_review(&self) -> bool {
        self.decision.needs_review()
    }

    pub fn is_valid(&self) -> bool {
        self.decision.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(prefix: &str, name: &str, admin: &str, kind: MatchKind, scope: MatchScope, confidence: f64) -> ScoredCandidate {
        ScoredCandidate::new(
            PrefixCandidate::length_based(prefix),
            MatchResult {
                matched_admin_name: admin.to_string(),
                match_scope: scope,
                match_kind: kind,
                raw_confidence: confidence,
            },
            name,
        )
    }

    #[test]
    fn test_highest_confidence_wins_without_review_for_same_admin() {
        let name = "霞露村尾厝";
        let decision = decide(
            &DecisionPolicy::default(),
            vec![
                scored("霞露村", name, "霞露村", MatchKind::Exact, MatchScope::Row, 1.0),
                scored("霞露", name, "霞露村", MatchKind::Normalized, MatchScope::Row, 0.95),
            ],
        );
        let outcome = CanonicalizationOutcome::from_decision(name, decision);
        assert_eq!(outcome.canonical_name, "尾厝");
        assert!(outcome.prefix_removed());
        assert!(!outcome.needs_review());
        assert_eq!(outcome.removed_prefix_text(), Some("霞露村"));
        assert_eq!(outcome.match_source(), Some(MatchScope::Row));
        assert_eq!(outcome.confidence(), Some(1.0));
    }

    #[test]
    fn test_ties_resolve_to_earlier_candidate() {
        let name = "湖厦村祠堂前片";
        let decision = decide(
            &DecisionPolicy::default(),
            vec![
                scored("湖厦村", name, "湖下村", MatchKind::Partial, MatchScope::Row, 0.75),
                scored("湖厦", name, "湖下村", MatchKind::Partial, MatchScope::Row, 0.75),
            ],
        );
        assert_eq!(decision.label(), "accepted");
        assert_eq!(decision.removal().unwrap().remainder, "祠堂前片");
    }

    #[test]
    fn test_conflicting_admin_names_flag_review() {
        let name = "新田村岭背";
        let decision = decide(
            &DecisionPolicy::default(),
            vec![
                scored("新田村", name, "新田村", MatchKind::Exact, MatchScope::Township, 0.85),
                scored("新田", name, "田村", MatchKind::ModifierAdjusted, MatchScope::Row, 0.95),
            ],
        );
        match &decision {
            PrefixDecision::AcceptedWithReview { removal, competing } => {
                assert_eq!(removal.candidate.text, "新田");
                assert_eq!(competing.candidate.text, "新田村");
            }
            other => panic!("expected review, got {:?}", other),
        }
        let outcome = CanonicalizationOutcome::from_decision(name, decision);
        assert!(outcome.needs_review());
        assert!(outcome.prefix_removed());
        assert_eq!(outcome.canonical_name, "村岭背");
    }

    #[test]
    fn test_below_threshold_rejected_and_borderline_flagged() {
        let name = "湖厦村祠堂前片";
        let borderline = decide(
            &DecisionPolicy::default(),
            vec![scored("湖厦村", name, "湖下村", MatchKind::Partial, MatchScope::Township, 0.65)],
        );
        let outcome = CanonicalizationOutcome::from_decision(name, borderline);
        assert!(!outcome.prefix_removed());
        assert!(outcome.needs_review());
        assert_eq!(outcome.canonical_name, name);
        assert_eq!(outcome.confidence(), Some(0.65));
        assert_eq!(outcome.removed_prefix_text(), None);

        let low = decide(
            &DecisionPolicy::default(),
            vec![scored("湖厦村", name, "湖下村", MatchKind::Partial, MatchScope::County, 0.55)],
        );
        assert_eq!(low.label(), "rejected");
        assert!(!low.needs_review());
        assert!(low.reported_match().is_none());
    }

    #[test]
    fn test_no_candidates_rejected() {
        let decision = decide(&DecisionPolicy::default(), Vec::new());
        assert_eq!(
            decision,
            PrefixDecision::Rejected {
                nearest: None,
                borderline: false
            }
        );
        let outcome = CanonicalizationOutcome::from_decision("路头村", decision);
        assert_eq!(outcome.canonical_name, "路头村");
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_empty_remainder_never_accepted() {
        let name = "霞露村";
        let decision = decide(
            &DecisionPolicy::default(),
            vec![scored("霞露村", name, "霞露村", MatchKind::Exact, MatchScope::Row, 1.0)],
        );
        assert!(decision.removal().is_none());
    }

    #[test]
    fn test_skip_reasons() {
        let invalid = PrefixDecision::Skipped {
            reason: SkipReason::EmptyAdminName,
        };
        assert!(!invalid.is_valid());
        assert!(invalid.needs_review());
        assert_eq!(invalid.label(), "invalid");

        let bypassed = PrefixDecision::Skipped {
            reason: SkipReason::BelowLengthGuard,
        };
        assert!(bypassed.is_valid());
        assert!(!bypassed.needs_review());
        assert_eq!(bypassed.label(), "bypassed");
    }
}
