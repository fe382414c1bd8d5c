use anyhow::{Context, Result};
use canon_lib::canonicalization::db::{
    append_audit_entries, ensure_output_tables, load_village_records, replace_canonical_records,
};
use canon_lib::canonicalization::manager::canonicalize_batch;
use canon_lib::utils::canon_config::CanonConfig;
use canon_lib::utils::db_connect::{connect, get_pool_status};
use canon_lib::utils::env::load_env;
use canon_lib::utils::get_memory_usage;
use canon_lib::utils::progress_bars::progress_config::ProgressConfig;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting village name canonicalization run");
    load_env();

    let config = CanonConfig::from_env();
    config.validate().context("Invalid canonicalization configuration")?;
    config.log_config();

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );
    let multi_progress = progress_config.create_multi_progress();

    let main_pb = multi_progress.as_ref().map(|mp| {
        let pb = mp.add(ProgressBar::new(3));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message("Initializing run...");
        pb
    });

    let pool = connect().await.context("Failed to connect to database")?;
    info!("Successfully connected to the database");

    let run_id = Uuid::new_v4().to_string();
    let mut phase_times = BTreeMap::new();
    let total_start = Instant::now();

    // Phase 1: load
    if let Some(pb) = &main_pb {
        pb.set_message("Phase 1: Loading village records");
    }
    let phase1_start = Instant::now();
    ensure_output_tables(&pool, &config)
        .await
        .context("Failed to prepare output tables")?;
    let records = load_village_records(&pool, &config.source_table)
        .await
        .context("Failed to load village records")?;
    phase_times.insert("load", phase1_start.elapsed());
    if let Some(pb) = &main_pb {
        pb.inc(1);
    }

    if records.is_empty() {
        warn!("Source table {} is empty, nothing to canonicalize", config.source_table);
    }

    // Phase 2: canonicalize
    if let Some(pb) = &main_pb {
        pb.set_message("Phase 2: Canonicalizing names");
    }
    let phase2_start = Instant::now();
    let worker_progress = if progress_config.should_show_detailed() {
        multi_progress.clone()
    } else {
        None
    };
    let output = canonicalize_batch(records, &config, &run_id, worker_progress)
        .await
        .context("Canonicalization batch failed")?;
    phase_times.insert("canonicalize", phase2_start.elapsed());
    if let Some(pb) = &main_pb {
        pb.inc(1);
    }

    // Phase 3: persist
    if let Some(pb) = &main_pb {
        pb.set_message("Phase 3: Writing results");
    }
    let phase3_start = Instant::now();
    let written = replace_canonical_records(&pool, &config.output_table, &output.records)
        .await
        .context("Failed to write canonical records")?;
    let audited = append_audit_entries(&pool, &config.audit_table, &output.audit_entries)
        .await
        .context("Failed to write audit entries")?;
    phase_times.insert("persist", phase3_start.elapsed());
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.finish_with_message("Canonicalization run complete");
    }

    info!("Run {} finished in {:.2?}", run_id, total_start.elapsed());
    for (phase, duration) in &phase_times {
        info!("  {:<14} {:.2?}", phase, duration);
    }
    info!(
        "Wrote {} canonical rows to {} and {} audit entries to {}",
        written, config.output_table, audited, config.audit_table
    );
    info!(
        "Removed {} prefixes, {} records flagged for review",
        output.stats.prefixes_removed(),
        output.stats.flagged_for_review()
    );

    if progress_config.should_show_memory() {
        info!("Memory usage: {} MB", get_memory_usage().await);
    }
    if progress_config.should_show_db_connection_stats() {
        let (connections, idle) = get_pool_status(&pool);
        info!("DB pool status: {} connections ({} idle)", connections, idle);
    }

    Ok(())
}
