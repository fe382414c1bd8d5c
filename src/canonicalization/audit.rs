// src/canonicalization/audit.rs
//! Append-only decision trail, one entry per input row.

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

use crate::canonicalization::decision::CanonicalizationOutcome;
use crate::models::matching::MatchScope;
use crate::models::village::VillageRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub run_id: String,
    pub city: String,
    pub county: String,
    pub township: String,
    pub admin_village: String,
    pub raw_name: String,
    pub canonical_name: String,
    pub removed_prefix_text: Option<String>,
    pub match_source: Option<MatchScope>,
    pub confidence: Option<f64>,
    pub decision: &'static str,
    pub needs_review: bool,
    pub recorded_at: NaiveDateTime,
}

impl AuditEntry {
    pub fn from_outcome(
        run_id: &str,
        record: &VillageRecord,
        outcome: &CanonicalizationOutcome,
        recorded_at: NaiveDateTime,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            city: record.city.clone(),
            county: record.county.clone(),
            township: record.township.clone(),
            admin_village: record.admin_village.clone(),
            raw_name: record.raw_name.clone(),
            canonical_name: outcome.canonical_name.clone(),
            removed_prefix_text: outcome.removed_prefix_text().map(str::to_string),
            match_source: outcome.match_source(),
            confidence: outcome.confidence(),
            decision: outcome.decision.label(),
            needs_review: outcome.needs_review(),
            recorded_at,
        }
    }
}

/// Sink for audit entries. Implementations must tolerate concurrent appends.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry);
}

/// In-memory audit log. Each worker keeps its own and the batch manager
/// absorbs them in input order once all workers finish.
#[derive(Debug, Default)]
pub struct AuditLog {
    run_id: String,
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capacity(run_id: impl Into<String>, capacity: usize) -> Self {
        Self {
            run_id: run_id.into(),
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Stamps the decision with the current time and appends it.
    pub fn record(&self, record: &VillageRecord, outcome: &CanonicalizationOutcome) {
        let entry = AuditEntry::from_outcome(&self.run_id, record, outcome, Utc::now().naive_utc());
        self.append(entry);
    }

    pub fn absorb(&self, other: AuditLog) {
        let mut theirs = other.into_entries();
        self.lock().append(&mut theirs);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn review_count(&self) -> usize {
        self.lock().iter().filter(|e| e.needs_review).count()
    }

    pub fn into_entries(self) -> Vec<AuditEntry> {
        self.entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AuditSink for AuditLog {
    fn append(&self, entry: AuditEntry) {
        self.lock().push(entry);
    }
}
