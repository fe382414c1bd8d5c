// src/utils/canon_config.rs
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::env;

use crate::canonicalization::confidence::{ConfidenceTable, DEFAULT_CONFIDENCE_FLOOR};
use crate::canonicalization::decision::{DecisionPolicy, DEFAULT_ACCEPT_THRESHOLD, DEFAULT_REVIEW_BAND_FLOOR};
use crate::canonicalization::matcher::DEFAULT_HOMOPHONE_PAIRS;

pub const DEFAULT_MIN_NAME_CHARS: usize = 4;
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Tunable policy and batch settings for canonicalization.
#[derive(Debug, Clone)]
pub struct CanonConfig {
    pub accept_threshold: f64,
    pub confidence_floor: f64,
    pub review_band_floor: f64,
    /// Names with fewer characters than this bypass prefix removal.
    pub min_name_chars: usize,
    pub confidence_table: ConfidenceTable,
    pub homophone_pairs: Vec<(char, char)>,
    pub chunk_size: usize,
    pub max_workers: usize,
    pub source_table: String,
    pub output_table: String,
    pub audit_table: String,
}

impl Default for CanonConfig {
    fn default() -> Self {
        Self {
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            review_band_floor: DEFAULT_REVIEW_BAND_FLOOR,
            min_name_chars: DEFAULT_MIN_NAME_CHARS,
            confidence_table: ConfidenceTable::default(),
            homophone_pairs: DEFAULT_HOMOPHONE_PAIRS.to_vec(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_workers: num_cpus::get(),
            source_table: "village_raw".to_string(),
            output_table: "village_canonical".to_string(),
            audit_table: "village_canonical_audit".to_string(),
        }
    }
}

impl CanonConfig {
    /// Create configuration from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut confidence_table = defaults.confidence_table.clone();
        if let Ok(overrides) = env::var("CANON_CONFIDENCE_TABLE") {
            let mut candidate = confidence_table.clone();
            match candidate.apply_overrides(&overrides) {
                Ok(applied) => {
                    debug!("Applied {} confidence overrides", applied);
                    confidence_table = candidate;
                }
                Err(e) => warn!("Ignoring CANON_CONFIDENCE_TABLE: {:#}", e),
            }
        }

        let homophone_pairs = match env::var("CANON_HOMOPHONE_PAIRS") {
            Ok(raw) => match parse_homophone_pairs(&raw) {
                Ok(pairs) => pairs,
                Err(e) => {
                    warn!("Ignoring CANON_HOMOPHONE_PAIRS: {:#}", e);
                    defaults.homophone_pairs.clone()
                }
            },
            Err(_) => defaults.homophone_pairs.clone(),
        };

        Self {
            accept_threshold: env_parse("CANON_ACCEPT_THRESHOLD", defaults.accept_threshold),
            confidence_floor: env_parse("CANON_CONFIDENCE_FLOOR", defaults.confidence_floor),
            review_band_floor: env_parse("CANON_REVIEW_BAND_FLOOR", defaults.review_band_floor),
            min_name_chars: env_parse("CANON_MIN_NAME_CHARS", defaults.min_name_chars),
            confidence_table,
            homophone_pairs,
            chunk_size: env_parse("CANON_CHUNK_SIZE", defaults.chunk_size),
            max_workers: env_parse("CANON_MAX_WORKERS", defaults.max_workers),
            source_table: env::var("CANON_SOURCE_TABLE").unwrap_or(defaults.source_table),
            output_table: env::var("CANON_OUTPUT_TABLE").unwrap_or(defaults.output_table),
            audit_table: env::var("CANON_AUDIT_TABLE").unwrap_or(defaults.audit_table),
        }
    }

    pub fn decision_policy(&self) -> DecisionPolicy {
        DecisionPolicy {
            accept_threshold: self.accept_threshold,
            review_band_floor: self.review_band_floor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            bail!("Confidence floor {:.3} must lie in [0, 1]", self.confidence_floor);
        }
        if self.accept_threshold < self.confidence_floor || self.accept_threshold > 1.0 {
            bail!(
                "Accept threshold {:.3} must lie in [{:.3}, 1]",
                self.accept_threshold,
                self.confidence_floor
            );
        }
        if self.review_band_floor > self.accept_threshold {
            bail!(
                "Review band floor {:.3} must not exceed the accept threshold {:.3}",
                self.review_band_floor,
                self.accept_threshold
            );
        }
        if self.chunk_size == 0 || self.max_workers == 0 {
            bail!("Chunk size and worker count must be positive");
        }
        self.confidence_table
            .validate(self.confidence_floor)
            .context("Invalid confidence table")?;
        Ok(())
    }

    pub fn log_config(&self) {
        info!("🏷️  Canonicalization policy:");
        info!(
            "   accept >= {:.2}, review band >= {:.2}, floor {:.2}, length guard {} chars",
            self.accept_threshold, self.review_band_floor, self.confidence_floor, self.min_name_chars
        );
        info!("   {} homophone pairs configured", self.homophone_pairs.len());
        info!(
            "   batch: chunk size {}, max workers {}",
            self.chunk_size, self.max_workers
        );
        info!(
            "   tables: source={}, output={}, audit={}",
            self.source_table, self.output_table, self.audit_table
        );
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `厦:下,冈:岗` into character pairs.
pub fn parse_homophone_pairs(raw: &str) -> Result<Vec<(char, char)>> {
    let mut pairs = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (a, b) = entry
            .split_once(':')
            .with_context(|| format!("Homophone pair '{}' must be a:b", entry))?;
        pairs.push((single_char(a, entry)?, single_char(b, entry)?));
    }
    Ok(pairs)
}

fn single_char(side: &str, entry: &str) -> Result<char> {
    let mut chars = side.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => bail!("Homophone pair '{}' must join single characters", entry),
    }
}
