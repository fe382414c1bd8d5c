// src/models/stats_models.rs
use serde::Serialize;
use std::collections::BTreeMap;

use crate::canonicalization::decision::{CanonicalizationOutcome, PrefixDecision};
use crate::canonicalization::numbered::NumberedVillageAnnotation;

/// Counters for one canonicalization run. Workers keep their own and the
/// manager merges them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalizationStats {
    pub total_records: usize,
    pub invalid_records: usize,
    pub bypassed_records: usize,
    pub accepted: usize,
    pub accepted_with_review: usize,
    pub rejected: usize,
    pub rejected_with_review: usize,
    pub numbered_villages: usize,
    pub accepted_by_scope: BTreeMap<String, usize>,
    pub accepted_by_kind: BTreeMap<String, usize>,
    pub accepted_confidence_sum: f64,
}

impl CanonicalizationStats {
    pub fn record(&mut self, outcome: &CanonicalizationOutcome, annotation: &NumberedVillageAnnotation) {
        self.total_records += 1;
        if annotation.has_number_suffix {
            self.numbered_villages += 1;
        }

        match &outcome.decision {
            PrefixDecision::Skipped { reason } if reason.is_precondition_failure() => self.invalid_records += 1,
            PrefixDecision::Skipped { .. } => self.bypassed_records += 1,
            PrefixDecision::Rejected { borderline: true, .. } => self.rejected_with_review += 1,
            PrefixDecision::Rejected { .. } => self.rejected += 1,
            PrefixDecision::Accepted { .. } => self.accepted += 1,
            PrefixDecision::AcceptedWithReview { .. } => self.accepted_with_review += 1,
        }

        if let Some(removal) = outcome.decision.removal() {
            *self
                .accepted_by_scope
                .entry(removal.match_result.match_scope.as_str().to_string())
                .or_insert(0) += 1;
            *self
                .accepted_by_kind
                .entry(removal.match_result.match_kind.as_str().to_string())
                .or_insert(0) += 1;
            self.accepted_confidence_sum += removal.confidence();
        }
    }

    pub fn merge(&mut self, other: CanonicalizationStats) {
        self.total_records += other.total_records;
        self.invalid_records += other.invalid_records;
        self.bypassed_records += other.bypassed_records;
        self.accepted += other.accepted;
        self.accepted_with_review += other.accepted_with_review;
        self.rejected += other.rejected;
        self.rejected_with_review += other.rejected_with_review;
        self.numbered_villages += other.numbered_villages;
        for (scope, count) in other.accepted_by_scope {
            *self.accepted_by_scope.entry(scope).or_insert(0) += count;
        }
        for (kind, count) in other.accepted_by_kind {
            *self.accepted_by_kind.entry(kind).or_insert(0) += count;
        }
        self.accepted_confidence_sum += other.accepted_confidence_sum;
    }

    pub fn prefixes_removed(&self) -> usize {
        self.accepted + self.accepted_with_review
    }

    pub fn flagged_for_review(&self) -> usize {
        self.accepted_with_review + self.rejected_with_review + self.invalid_records
    }

    pub fn avg_accepted_confidence(&self) -> f64 {
        let removed = self.prefixes_removed();
        if removed == 0 {
            0.0
        } else {
            self.accepted_confidence_sum / removed as f64
        }
    }
}
