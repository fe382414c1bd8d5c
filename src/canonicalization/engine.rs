// src/canonicalization/engine.rs
use log::debug;

use crate::canonicalization::candidates::generate_candidates;
use crate::canonicalization::confidence::ConfidenceScorer;
use crate::canonicalization::decision::{
    decide, CanonicalizationOutcome, DecisionPolicy, PrefixDecision, ScoredCandidate, SkipReason,
};
use crate::canonicalization::hierarchy::AdministrativeHierarchy;
use crate::canonicalization::matcher::{HierarchicalMatcher, HomophoneTable};
use crate::canonicalization::numbered::{annotate_numbered_village, NumberedVillageAnnotation};
use crate::models::village::VillageRecord;
use crate::text_normalizer::normalize_raw_name;
use crate::utils::canon_config::CanonConfig;

/// Per-record pipeline: candidates, matching, scoring, decision. Pure with
/// respect to the record and the prebuilt hierarchy.
pub struct Canonicalizer {
    matcher: HierarchicalMatcher,
    policy: DecisionPolicy,
    min_name_chars: usize,
}

impl Canonicalizer {
    pub fn new(config: &CanonConfig) -> Self {
        let scorer = ConfidenceScorer::new(config.confidence_table.clone(), config.confidence_floor);
        let homophones = HomophoneTable::from_pairs(&config.homophone_pairs);
        Self {
            matcher: HierarchicalMatcher::new(homophones, scorer),
            policy: config.decision_policy(),
            min_name_chars: config.min_name_chars,
        }
    }

    pub fn canonicalize(&self, record: &VillageRecord, hierarchy: &AdministrativeHierarchy) -> CanonicalizationOutcome {
        let name = resolve_name(record);
        if name.is_empty() {
            return CanonicalizationOutcome::unchanged(
                record.raw_name.trim(),
                PrefixDecision::Skipped {
                    reason: SkipReason::EmptyName,
                },
            );
        }
        let admin_name = record.admin_village.trim();
        if admin_name.is_empty() {
            return CanonicalizationOutcome::unchanged(
                name,
                PrefixDecision::Skipped {
                    reason: SkipReason::EmptyAdminName,
                },
            );
        }
        if name.chars().count() < self.min_name_chars {
            return CanonicalizationOutcome::unchanged(
                name,
                PrefixDecision::Skipped {
                    reason: SkipReason::BelowLengthGuard,
                },
            );
        }

        let scored: Vec<ScoredCandidate> = generate_candidates(&name, admin_name)
            .into_iter()
            .filter_map(|candidate| {
                let match_result = self.matcher.find_match(&candidate, record, hierarchy)?;
                Some(ScoredCandidate::new(candidate, match_result, &name))
            })
            .collect();

        let decision = decide(&self.policy, scored);
        if decision.needs_review() {
            debug!("Review flagged for '{}' ({}): {:?}", name, decision.label(), decision);
        }
        CanonicalizationOutcome::from_decision(&name, decision)
    }

    /// Canonicalizes and derives the numbered-village grouping key from the result.
    pub fn process(
        &self,
        record: &VillageRecord,
        hierarchy: &AdministrativeHierarchy,
    ) -> (CanonicalizationOutcome, NumberedVillageAnnotation) {
        let outcome = self.canonicalize(record, hierarchy);
        let annotation = annotate_numbered_village(&outcome.canonical_name);
        (outcome, annotation)
    }
}

/// The upstream-normalized name, or the same scrub applied locally when it is missing.
fn resolve_name(record: &VillageRecord) -> String {
    let normalized = record.normalized_raw_name.trim();
    if normalized.is_empty() {
        normalize_raw_name(&record.raw_name)
    } else {
        normalized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::{MatchKind, MatchScope};

    fn record(township: &str, admin: &str, raw: &str) -> VillageRecord {
        VillageRecord::new("潮州市", "饶平县", township, admin, raw, raw)
    }

    fn run(records: &[VillageRecord], idx: usize) -> CanonicalizationOutcome {
        let hierarchy = AdministrativeHierarchy::build(records);
        Canonicalizer::new(&CanonConfig::default()).canonicalize(&records[idx], &hierarchy)
    }

    #[test]
    fn test_exact_row_delimiter_match() {
        let outcome = run(&[record("黄冈镇", "霞露村", "霞露村尾厝")], 0);
        assert_eq!(outcome.canonical_name, "尾厝");
        assert!(outcome.prefix_removed());
        assert_eq!(outcome.match_source(), Some(MatchScope::Row));
        assert_eq!(outcome.match_kind(), Some(MatchKind::Exact));
        assert_eq!(outcome.confidence(), Some(1.0));
        assert!(!outcome.needs_review());
    }

    #[test]
    fn test_suffix_tolerant_match() {
        let outcome = run(&[record("钱东镇", "凤北村", "凤北超苟村")], 0);
        assert_eq!(outcome.canonical_name, "超苟村");
        assert_eq!(outcome.match_kind(), Some(MatchKind::Normalized));
        assert_eq!(outcome.confidence(), Some(0.95));
        assert_eq!(outcome.removed_prefix_text(), Some("凤北"));
    }

    #[test]
    fn test_homophone_match() {
        let outcome = run(&[record("黄冈镇", "湖下村", "湖厦村祠堂前片")], 0);
        assert_eq!(outcome.canonical_name, "祠堂前片");
        assert_eq!(outcome.match_kind(), Some(MatchKind::Partial));
        let confidence = outcome.confidence().unwrap();
        assert!((0.5..0.8).contains(&confidence));
        assert!(confidence >= 0.7);
    }

    #[test]
    fn test_modifier_adjusted_match() {
        let outcome = run(&[record("黄冈镇", "松水村", "大松水路头")], 0);
        assert_eq!(outcome.canonical_name, "路头");
        assert_eq!(outcome.match_kind(), Some(MatchKind::ModifierAdjusted));
        assert_eq!(outcome.removed_prefix_text(), Some("大松水"));
    }

    #[test]
    fn test_short_name_bypasses_removal() {
        let outcome = run(&[record("黄冈镇", "上村村", "上村")], 0);
        assert_eq!(outcome.canonical_name, "上村");
        assert!(outcome.is_valid());
        assert!(!outcome.prefix_removed());
        assert_eq!(outcome.decision.label(), "bypassed");
    }

    #[test]
    fn test_precondition_failures_are_data() {
        let no_admin = run(&[record("黄冈镇", " ", "霞露村尾厝")], 0);
        assert!(!no_admin.is_valid());
        assert!(no_admin.needs_review());
        assert_eq!(no_admin.canonical_name, "霞露村尾厝");

        let blank = VillageRecord::new("潮州市", "饶平县", "黄冈镇", "霞露村", "（空）", "");
        let outcome = run(&[blank], 0);
        assert!(!outcome.is_valid());
        assert_eq!(outcome.canonical_name, "（空）");

        // nothing to fall back on: the only row allowed an empty canonical name
        let whitespace = VillageRecord::new("潮州市", "饶平县", "黄冈镇", "霞露村", " \t", "");
        let outcome = run(&[whitespace], 0);
        assert!(!outcome.is_valid());
        assert!(outcome.needs_review());
        assert!(outcome.canonical_name.is_empty());
    }

    #[test]
    fn test_missing_normalized_name_uses_local_scrub() {
        let record = VillageRecord::new("潮州市", "饶平县", "黄冈镇", "霞露村", "霞露村尾厝（旧）", "");
        let outcome = run(&[record], 0);
        assert_eq!(outcome.canonical_name, "尾厝");
    }

    #[test]
    fn test_township_scope_confidence_lower_than_row() {
        let records = vec![
            record("黄冈镇", "湖下村", "霞露村后山脚"),
            record("黄冈镇", "霞露村", "霞露村尾厝"),
        ];
        let outcome = run(&records, 0);
        assert_eq!(outcome.canonical_name, "后山脚");
        assert_eq!(outcome.match_source(), Some(MatchScope::Township));
        assert_eq!(outcome.confidence(), Some(0.85));
    }

    #[test]
    fn test_county_match_against_township_less_admin() {
        let records = vec![
            record("", "石马村", "石马村新屋"),
            record("黄冈镇", "湖下村", "石马村后山"),
        ];
        let outcome = run(&records, 1);
        assert_eq!(outcome.canonical_name, "后山");
        assert_eq!(outcome.match_source(), Some(MatchScope::County));
        assert_eq!(outcome.match_kind(), Some(MatchKind::Exact));
        assert_eq!(outcome.confidence(), Some(0.75));
        assert!(!outcome.needs_review());
    }

    #[test]
    fn test_unrelated_name_left_unchanged() {
        let outcome = run(&[record("黄冈镇", "霞露村", "石马龙头新屋")], 0);
        assert_eq!(outcome.canonical_name, "石马龙头新屋");
        assert!(!outcome.prefix_removed());
        assert_eq!(outcome.decision.label(), "rejected");
    }

    #[test]
    fn test_numbered_annotation_does_not_touch_canonical() {
        let hierarchy = AdministrativeHierarchy::build(&[]);
        let canonicalizer = Canonicalizer::new(&CanonConfig::default());
        let rec = record("黄冈镇", "西湖村", "东村一村");
        let (outcome, annotation) = canonicalizer.process(&rec, &hierarchy);
        assert_eq!(outcome.canonical_name, "东村一村");
        assert_eq!(annotation.statistical_base_name, "东村");
        assert!(annotation.has_number_suffix);
    }
}
