// src/canonicalization/db.rs
use anyhow::{bail, Context, Result};
use log::{debug, info};
use once_cell::sync::Lazy;
use postgres_types::ToSql;
use regex::Regex;

use crate::canonicalization::audit::AuditEntry;
use crate::models::village::{CanonicalRecord, VillageRecord};
use crate::utils::canon_config::CanonConfig;
use crate::utils::db_connect::PgPool;

const BATCH_DB_OPS_SIZE: usize = 1000;

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("table name pattern must compile")
});

const CANONICAL_COLUMNS: [&str; 18] = [
    "run_id",
    "city",
    "county",
    "township",
    "admin_village",
    "raw_name",
    "canonical_name",
    "prefix_removed",
    "removed_prefix_text",
    "match_source",
    "match_kind",
    "confidence",
    "needs_review",
    "statistical_base_name",
    "has_number_suffix",
    "number_pattern_kind",
    "is_valid",
    "created_at",
];

const AUDIT_COLUMNS: [&str; 13] = [
    "run_id",
    "city",
    "county",
    "township",
    "admin_village",
    "raw_name",
    "canonical_name",
    "removed_prefix_text",
    "match_source",
    "confidence",
    "decision",
    "needs_review",
    "recorded_at",
];

type SqlParams = Vec<Box<dyn ToSql + Sync + Send>>;

/// Table names are interpolated into SQL, so only plain (optionally schema
/// qualified) identifiers are accepted.
pub fn validate_table_name(name: &str) -> Result<&str> {
    if TABLE_NAME.is_match(name) {
        Ok(name)
    } else {
        bail!("Invalid table name '{}'", name)
    }
}

/// `($1, $2), ($3, $4)` style placeholders for a multi-row insert.
pub fn build_values_clause(row_count: usize, column_count: usize) -> String {
    (0..row_count)
        .map(|row| {
            let placeholders: Vec<String> = (1..=column_count)
                .map(|col| format!("${}", row * column_count + col))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_sql(table: &str, columns: &[&str], row_count: usize) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        build_values_clause(row_count, columns.len())
    )
}

pub async fn ensure_output_tables(pool: &PgPool, config: &CanonConfig) -> Result<()> {
    let output_table = validate_table_name(&config.output_table)?;
    let audit_table = validate_table_name(&config.audit_table)?;
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for ensure_output_tables")?;

    let create_output = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            run_id TEXT NOT NULL,
            city TEXT NOT NULL,
            county TEXT NOT NULL,
            township TEXT NOT NULL,
            admin_village TEXT NOT NULL,
            raw_name TEXT NOT NULL,
            canonical_name TEXT NOT NULL,
            prefix_removed BOOLEAN NOT NULL,
            removed_prefix_text TEXT,
            match_source TEXT,
            match_kind TEXT,
            confidence DOUBLE PRECISION,
            needs_review BOOLEAN NOT NULL,
            statistical_base_name TEXT NOT NULL,
            has_number_suffix BOOLEAN NOT NULL,
            number_pattern_kind TEXT,
            is_valid BOOLEAN NOT NULL,
            created_at TIMESTAMP NOT NULL
        )",
        output_table
    );
    let create_audit = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            run_id TEXT NOT NULL,
            city TEXT NOT NULL,
            county TEXT NOT NULL,
            township TEXT NOT NULL,
            admin_village TEXT NOT NULL,
            raw_name TEXT NOT NULL,
            canonical_name TEXT NOT NULL,
            removed_prefix_text TEXT,
            match_source TEXT,
            confidence DOUBLE PRECISION,
            decision TEXT NOT NULL,
            needs_review BOOLEAN NOT NULL,
            recorded_at TIMESTAMP NOT NULL
        )",
        audit_table
    );

    conn.batch_execute(&create_output)
        .await
        .with_context(|| format!("Failed to create output table {}", output_table))?;
    conn.batch_execute(&create_audit)
        .await
        .with_context(|| format!("Failed to create audit table {}", audit_table))?;
    debug!("Ensured output tables {} and {}", output_table, audit_table);
    Ok(())
}

pub async fn load_village_records(pool: &PgPool, source_table: &str) -> Result<Vec<VillageRecord>> {
    let source_table = validate_table_name(source_table)?;
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for load_village_records")?;

    let query = format!(
        "SELECT COALESCE(city, '') AS city, COALESCE(county, '') AS county,
                COALESCE(township, '') AS township, COALESCE(admin_village, '') AS admin_village,
                COALESCE(raw_name, '') AS raw_name, COALESCE(normalized_raw_name, '') AS normalized_raw_name
         FROM {}
         ORDER BY city, county, township, admin_village, raw_name",
        source_table
    );
    let rows = conn
        .query(query.as_str(), &[])
        .await
        .with_context(|| format!("Failed to load village records from {}", source_table))?;

    let records: Vec<VillageRecord> = rows
        .iter()
        .map(|row| VillageRecord {
            city: row.get("city"),
            county: row.get("county"),
            township: row.get("township"),
            admin_village: row.get("admin_village"),
            raw_name: row.get("raw_name"),
            normalized_raw_name: row.get("normalized_raw_name"),
        })
        .collect();
    info!("Loaded {} village records from {}", records.len(), source_table);
    Ok(records)
}

fn canonical_record_params(record: &CanonicalRecord, params: &mut SqlParams) {
    params.push(Box::new(record.run_id.clone()));
    params.push(Box::new(record.city.clone()));
    params.push(Box::new(record.county.clone()));
    params.push(Box::new(record.township.clone()));
    params.push(Box::new(record.admin_village.clone()));
    params.push(Box::new(record.raw_name.clone()));
    params.push(Box::new(record.canonical_name.clone()));
    params.push(Box::new(record.prefix_removed));
    params.push(Box::new(record.removed_prefix_text.clone()));
    params.push(Box::new(record.match_source.map(|s| s.as_str().to_string())));
    params.push(Box::new(record.match_kind.map(|k| k.as_str().to_string())));
    params.push(Box::new(record.confidence));
    params.push(Box::new(record.needs_review));
    params.push(Box::new(record.statistical_base_name.clone()));
    params.push(Box::new(record.has_number_suffix));
    params.push(Box::new(record.number_pattern_kind.map(|k| k.as_str().to_string())));
    params.push(Box::new(record.is_valid));
    params.push(Box::new(record.created_at));
}

fn audit_entry_params(entry: &AuditEntry, params: &mut SqlParams) {
    params.push(Box::new(entry.run_id.clone()));
    params.push(Box::new(entry.city.clone()));
    params.push(Box::new(entry.county.clone()));
    params.push(Box::new(entry.township.clone()));
    params.push(Box::new(entry.admin_village.clone()));
    params.push(Box::new(entry.raw_name.clone()));
    params.push(Box::new(entry.canonical_name.clone()));
    params.push(Box::new(entry.removed_prefix_text.clone()));
    params.push(Box::new(entry.match_source.map(|s| s.as_str().to_string())));
    params.push(Box::new(entry.confidence));
    params.push(Box::new(entry.decision.to_string()));
    params.push(Box::new(entry.needs_review));
    params.push(Box::new(entry.recorded_at));
}

/// Replaces the whole canonicalization relation with this run's rows in a
/// single transaction. Outcomes are never updated in place.
pub async fn replace_canonical_records(pool: &PgPool, table: &str, records: &[CanonicalRecord]) -> Result<u64> {
    let table = validate_table_name(table)?;
    let mut conn = pool
        .get()
        .await
        .context("Failed to get DB connection for replace_canonical_records")?;
    let transaction = conn
        .transaction()
        .await
        .context("Failed to start transaction for canonical record replacement")?;

    let deleted = transaction
        .execute(format!("DELETE FROM {}", table).as_str(), &[])
        .await
        .with_context(|| format!("Failed to clear previous rows from {}", table))?;
    debug!("Cleared {} previous rows from {}", deleted, table);

    let mut inserted = 0;
    for batch in records.chunks(BATCH_DB_OPS_SIZE) {
        let mut params: SqlParams = Vec::with_capacity(batch.len() * CANONICAL_COLUMNS.len());
        for record in batch {
            canonical_record_params(record, &mut params);
        }
        let params_slice: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        inserted += transaction
            .execute(insert_sql(table, &CANONICAL_COLUMNS, batch.len()).as_str(), &params_slice)
            .await
            .with_context(|| format!("Failed to insert canonical record batch into {}", table))?;
    }

    transaction
        .commit()
        .await
        .context("Failed to commit canonical record replacement")?;
    info!("Wrote {} canonical records to {}", inserted, table);
    Ok(inserted)
}

/// Appends audit entries. The audit relation is never updated or pruned here.
pub async fn append_audit_entries(pool: &PgPool, table: &str, entries: &[AuditEntry]) -> Result<u64> {
    let table = validate_table_name(table)?;
    if entries.is_empty() {
        info!("No audit entries to append.");
        return Ok(0);
    }
    let mut conn = pool
        .get()
        .await
        .context("Failed to get DB connection for append_audit_entries")?;
    let transaction = conn
        .transaction()
        .await
        .context("Failed to start transaction for audit append")?;

    let mut inserted = 0;
    for batch in entries.chunks(BATCH_DB_OPS_SIZE) {
        let mut params: SqlParams = Vec::with_capacity(batch.len() * AUDIT_COLUMNS.len());
        for entry in batch {
            audit_entry_params(entry, &mut params);
        }
        let params_slice: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        inserted += transaction
            .execute(insert_sql(table, &AUDIT_COLUMNS, batch.len()).as_str(), &params_slice)
            .await
            .with_context(|| format!("Failed to append audit batch to {}", table))?;
    }

    transaction
        .commit()
        .await
        .context("Failed to commit audit append")?;
    info!("Appended {} audit entries to {}", inserted, table);
    Ok(inserted)
}
