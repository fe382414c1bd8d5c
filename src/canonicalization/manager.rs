// src/canonicalization/manager.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use futures::future::join_all;
use indicatif::MultiProgress;
use log::{debug, info};
use tokio::sync::Semaphore;

use crate::canonicalization::audit::{AuditEntry, AuditLog};
use crate::canonicalization::decision::CanonicalizationOutcome;
use crate::canonicalization::engine::Canonicalizer;
use crate::canonicalization::hierarchy::AdministrativeHierarchy;
use crate::canonicalization::numbered::NumberedVillageAnnotation;
use crate::models::stats_models::CanonicalizationStats;
use crate::models::village::{CanonicalRecord, VillageRecord};
use crate::utils::canon_config::CanonConfig;
use crate::utils::progress_bars::logging::CanonicalizationLogger;
use crate::utils::progress_bars::progress_config::add_record_bar;

/// Everything one batch pass produces, in input order.
#[derive(Debug)]
pub struct BatchOutput {
    pub records: Vec<CanonicalRecord>,
    pub audit_entries: Vec<AuditEntry>,
    pub stats: CanonicalizationStats,
}

struct ChunkOutput {
    records: Vec<CanonicalRecord>,
    audit: AuditLog,
    stats: CanonicalizationStats,
}

pub fn build_canonical_record(
    run_id: &str,
    record: &VillageRecord,
    outcome: &CanonicalizationOutcome,
    annotation: &NumberedVillageAnnotation,
    created_at: NaiveDateTime,
) -> CanonicalRecord {
    CanonicalRecord {
        run_id: run_id.to_string(),
        city: record.city.clone(),
        county: record.county.clone(),
        township: record.township.clone(),
        admin_village: record.admin_village.clone(),
        raw_name: record.raw_name.clone(),
        canonical_name: outcome.canonical_name.clone(),
        prefix_removed: outcome.prefix_removed(),
        removed_prefix_text: outcome.removed_prefix_text().map(str::to_string),
        match_source: outcome.match_source(),
        match_kind: outcome.match_kind(),
        confidence: outcome.confidence(),
        needs_review: outcome.needs_review(),
        statistical_base_name: annotation.statistical_base_name.clone(),
        has_number_suffix: annotation.has_number_suffix,
        number_pattern_kind: annotation.number_pattern_kind,
        is_valid: outcome.is_valid(),
        created_at,
    }
}

fn process_chunk(
    canonicalizer: &Canonicalizer,
    hierarchy: &AdministrativeHierarchy,
    chunk: &[VillageRecord],
    run_id: &str,
    run_timestamp: NaiveDateTime,
) -> ChunkOutput {
    let audit = AuditLog::with_capacity(run_id, chunk.len());
    let mut stats = CanonicalizationStats::default();
    let mut records = Vec::with_capacity(chunk.len());

    for record in chunk {
        let (outcome, annotation) = canonicalizer.process(record, hierarchy);
        stats.record(&outcome, &annotation);
        audit.record(record, &outcome);
        records.push(build_canonical_record(run_id, record, &outcome, &annotation, run_timestamp));
    }

    ChunkOutput { records, audit, stats }
}

/// Runs one full batch pass. The hierarchy is built before any worker starts;
/// workers then shard the records and share it read-only. Each worker fills a
/// private audit log, and the logs are merged in chunk order afterwards.
pub async fn canonicalize_batch(
    records: Vec<VillageRecord>,
    config: &CanonConfig,
    pipeline_run_id: &str,
    multi_progress: Option<MultiProgress>,
) -> Result<BatchOutput> {
    let logger = CanonicalizationLogger::new();
    logger.log_start(pipeline_run_id, records.len());
    let run_timestamp = Utc::now().naive_utc();

    logger.log_phase("Building hierarchy", Some("indexing admin names by township and county"));
    let hierarchy = Arc::new(AdministrativeHierarchy::build(&records));
    logger.log_hierarchy(&hierarchy);

    let canonicalizer = Arc::new(Canonicalizer::new(config));
    let chunk_size = config.chunk_size.max(1);
    let workers = config.max_workers.max(1);
    let total_records = records.len();
    logger.log_batch_processing_start(total_records, chunk_size, workers);

    let pb = add_record_bar(multi_progress.as_ref(), total_records as u64, "Canonicalizing village names...");

    let records = Arc::new(records);
    let chunk_count = total_records.div_ceil(chunk_size);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut handles = Vec::with_capacity(chunk_count);

    for chunk_idx in 0..chunk_count {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .context("Canonicalization worker semaphore closed")?;
        let records = Arc::clone(&records);
        let hierarchy = Arc::clone(&hierarchy);
        let canonicalizer = Arc::clone(&canonicalizer);
        let run_id = pipeline_run_id.to_string();
        let pb = pb.clone();

        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let start = chunk_idx * chunk_size;
            let end = start.saturating_add(chunk_size).min(records.len());
            let output = process_chunk(&canonicalizer, &hierarchy, &records[start..end], &run_id, run_timestamp);
            if let Some(pb) = &pb {
                pb.inc(output.records.len() as u64);
            }
            output
        }));
    }

    let results = join_all(handles).await;

    logger.log_phase("Merging worker output", None);
    let audit = AuditLog::with_capacity(pipeline_run_id, total_records);
    let mut stats = CanonicalizationStats::default();
    let mut canonical_records = Vec::with_capacity(total_records);

    for (chunk_idx, result) in results.into_iter().enumerate() {
        let output = result.with_context(|| format!("Canonicalization worker for chunk {} failed", chunk_idx + 1))?;
        debug!("Chunk {} produced {} records", chunk_idx + 1, output.records.len());
        logger.log_chunk_progress(chunk_idx + 1, chunk_count, output.records.len());
        canonical_records.extend(output.records);
        audit.absorb(output.audit);
        stats.merge(output.stats);
    }

    if let Some(pb) = &pb {
        pb.finish_with_message("Canonicalization complete.");
    }

    let audit_entries = audit.into_entries();
    info!(
        "Canonicalization produced {} output rows and {} audit entries",
        canonical_records.len(),
        audit_entries.len()
    );
    logger.log_completion(&stats);

    Ok(BatchOutput {
        records: canonical_records,
        audit_entries,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::MatchScope;

    fn sample_records() -> Vec<VillageRecord> {
        let rows = [
            ("黄冈镇", "霞露村", "霞露村尾厝"),
            ("钱东镇", "凤北村", "凤北超苟村"),
            ("黄冈镇", "湖下村", "湖厦村祠堂前片"),
            ("黄冈镇", "松水村", "大松水路头"),
            ("黄冈镇", "东村村", "东村一村"),
            ("黄冈镇", "上村村", "上村"),
            ("黄冈镇", "", "无主村落名"),
            ("黄冈镇", "湖下村", "霞露村后山脚"),
            ("", "石马村", "石马村新屋"),
        ];
        rows.iter()
            .map(|(township, admin, raw)| VillageRecord::new("潮州市", "饶平县", *township, *admin, *raw, *raw))
            .collect()
    }

    fn small_chunk_config() -> CanonConfig {
        CanonConfig {
            chunk_size: 2,
            max_workers: 3,
            ..CanonConfig::default()
        }
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_counts() {
        let records = sample_records();
        let output = canonicalize_batch(records.clone(), &small_chunk_config(), "run-1", None)
            .await
            .unwrap();

        assert_eq!(output.records.len(), records.len());
        assert_eq!(output.audit_entries.len(), records.len());
        for ((input, row), entry) in records.iter().zip(&output.records).zip(&output.audit_entries) {
            assert_eq!(input.raw_name, row.raw_name);
            assert_eq!(input.raw_name, entry.raw_name);
            assert_eq!(row.canonical_name, entry.canonical_name);
        }

        let canonical: Vec<&str> = output.records.iter().map(|r| r.canonical_name.as_str()).collect();
        assert_eq!(
            canonical,
            vec!["尾厝", "超苟村", "祠堂前片", "路头", "东村一村", "上村", "无主村落名", "后山脚", "新屋"]
        );

        assert_eq!(output.records[4].statistical_base_name, "东村");
        assert!(output.records[4].has_number_suffix);
        assert!(!output.records[6].is_valid);
        assert_eq!(output.records[7].match_source, Some(MatchScope::Township));
        assert_eq!(output.records[8].match_source, Some(MatchScope::Row));

        assert_eq!(output.stats.total_records, 9);
        assert_eq!(output.stats.invalid_records, 1);
        assert_eq!(output.stats.bypassed_records, 1);
        assert_eq!(output.stats.prefixes_removed(), 6);
        assert_eq!(output.stats.numbered_villages, 1);
    }

    #[tokio::test]
    async fn test_batch_is_idempotent() {
        let config = small_chunk_config();
        let first = canonicalize_batch(sample_records(), &config, "run-1", None).await.unwrap();
        let second = canonicalize_batch(sample_records(), &config, "run-1", None).await.unwrap();

        let strip = |rows: &[CanonicalRecord]| {
            rows.iter()
                .map(|r| {
                    (
                        r.canonical_name.clone(),
                        r.prefix_removed,
                        r.removed_prefix_text.clone(),
                        r.match_source,
                        r.confidence.map(|c| (c * 1000.0).round() as i64),
                        r.needs_review,
                        r.statistical_base_name.clone(),
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&first.records), strip(&second.records));
        assert_eq!(first.stats, second.stats);
    }

    #[tokio::test]
    async fn test_batch_invariants_hold() {
        let mut records = sample_records();
        records.push(VillageRecord::new("潮州市", "饶平县", "黄冈镇", "霞露村", "   ", ""));
        let output = canonicalize_batch(records, &CanonConfig::default(), "run-1", None)
            .await
            .unwrap();
        assert_eq!(output.records.len(), 10);
        for row in &output.records {
            if row.prefix_removed {
                assert!(row.confidence.unwrap() >= 0.7, "{} removed below threshold", row.raw_name);
                assert!(row.removed_prefix_text.is_some());
            }
            if row.canonical_name.is_empty() {
                assert!(!row.is_valid && row.needs_review, "empty canonical name for valid row");
                assert!(row.raw_name.trim().is_empty());
            }
            if row.statistical_base_name != row.canonical_name {
                assert!(row.has_number_suffix);
            }
        }
    }

    #[tokio::test]
    async fn test_oversized_chunk_runs_as_single_chunk() {
        let config = CanonConfig {
            chunk_size: usize::MAX,
            max_workers: 2,
            ..CanonConfig::default()
        };
        let output = canonicalize_batch(sample_records(), &config, "run-1", None).await.unwrap();
        assert_eq!(output.records.len(), 9);
        assert_eq!(output.stats.prefixes_removed(), 6);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let output = canonicalize_batch(Vec::new(), &CanonConfig::default(), "run-empty", None)
            .await
            .unwrap();
        assert!(output.records.is_empty());
        assert!(output.audit_entries.is_empty());
        assert_eq!(output.stats.total_records, 0);
    }
}
