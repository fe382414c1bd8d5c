// src/utils/progress_bars/logging.rs - Logging helpers for the canonicalization run
use log::{debug, info, warn};
use std::time::Instant;

use crate::canonicalization::hierarchy::AdministrativeHierarchy;
use crate::models::stats_models::CanonicalizationStats;

#[derive(Clone)]
pub struct CanonicalizationLogger {
    tag: &'static str,
    start_time: Instant,
}

impl Default for CanonicalizationLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl CanonicalizationLogger {
    pub fn new() -> Self {
        Self {
            tag: "CANON",
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, pipeline_run_id: &str, record_count: usize) {
        info!(
            "[{}] 🚀 Starting prefix canonicalization for {} records (run ID: {})",
            self.tag, record_count, pipeline_run_id
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[{}] 🔄 Phase: {} - {} [+{:.1}s]",
                self.tag, phase, details, elapsed.as_secs_f32()
            ),
            None => info!("[{}] 🔄 Phase: {} [+{:.1}s]", self.tag, phase, elapsed.as_secs_f32()),
        }
    }

    pub fn log_hierarchy(&self, hierarchy: &AdministrativeHierarchy) {
        info!(
            "[{}] 🗺️  Hierarchy ready: {} townships, {} counties",
            self.tag,
            hierarchy.township_count(),
            hierarchy.county_count()
        );
        if hierarchy.row_only_records() > 0 {
            warn!(
                "[{}] ⚠️  {} records lack a township/county key and will only match their own admin name",
                self.tag,
                hierarchy.row_only_records()
            );
        }
    }

    pub fn log_batch_processing_start(&self, total_records: usize, chunk_size: usize, workers: usize) {
        let chunk_count = total_records.div_ceil(chunk_size);
        info!(
            "[{}] ⚙️  Processing {} records in {} chunks (chunk size: {}, workers: {})",
            self.tag, total_records, chunk_count, chunk_size, workers
        );
    }

    pub fn log_chunk_progress(&self, chunk_num: usize, total_chunks: usize, records_in_chunk: usize) {
        if chunk_num % 10 == 0 || chunk_num == 1 || chunk_num == total_chunks {
            info!(
                "[{}] 📦 Chunk {}/{} merged ({} records)",
                self.tag, chunk_num, total_chunks, records_in_chunk
            );
        }
    }

    pub fn log_completion(&self, stats: &CanonicalizationStats) {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] 🎉 COMPLETED: {} records canonicalized in {:.2?}",
            self.tag, stats.total_records, duration
        );
        info!(
            "[{}] 📊 Prefixes removed: {} (avg confidence {:.3}), rejected: {}, bypassed: {}, invalid: {}",
            self.tag,
            stats.prefixes_removed(),
            stats.avg_accepted_confidence(),
            stats.rejected + stats.rejected_with_review,
            stats.bypassed_records,
            stats.invalid_records
        );
        info!(
            "[{}] 🔢 Numbered villages: {}, by scope: {:?}, by kind: {:?}",
            self.tag, stats.numbered_villages, stats.accepted_by_scope, stats.accepted_by_kind
        );
        match serde_json::to_string(stats) {
            Ok(json) => debug!("[{}] Run stats: {}", self.tag, json),
            Err(e) => debug!("[{}] Could not serialize run stats: {}", self.tag, e),
        }
        if stats.flagged_for_review() > 0 {
            warn!(
                "[{}] 🔍 {} records flagged for review ({} ambiguous removals, {} borderline rejections, {} invalid)",
                self.tag,
                stats.flagged_for_review(),
                stats.accepted_with_review,
                stats.rejected_with_review,
                stats.invalid_records
            );
        }
    }
}
