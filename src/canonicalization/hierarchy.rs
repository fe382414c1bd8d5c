// src/canonicalization/hierarchy.rs
//! Read-only administrative-name index shared by every worker of a batch.

use log::{debug, info};
use std::collections::{BTreeSet, HashMap};

use crate::models::matching::MatchScope;
use crate::models::village::VillageRecord;

type CountyKey = (String, String);
type TownshipKey = (String, String, String);

#[derive(Debug, Default)]
pub struct AdministrativeHierarchy {
    township_admins: HashMap<TownshipKey, BTreeSet<String>>,
    county_admins: HashMap<CountyKey, BTreeSet<String>>,
    row_only_records: usize,
}

impl AdministrativeHierarchy {
    /// Builds the township and county indexes in one pass. Records without a
    /// complete geographic key fall back to row-level matching themselves.
    pub fn build(records: &[VillageRecord]) -> Self {
        let mut hierarchy = Self::default();

        for record in records {
            let admin_name = record.admin_village.trim();
            let township_key = record.township_key();
            if township_key.is_none() {
                hierarchy.row_only_records += 1;
            }
            if admin_name.is_empty() {
                continue;
            }

            // A row without a township still contributes to its county's set,
            // even though it never searches beyond its own admin name.
            if let Some(county_key) = record.county_key() {
                hierarchy
                    .county_admins
                    .entry(county_key)
                    .or_default()
                    .insert(admin_name.to_string());
            }
            if let Some(township_key) = township_key {
                hierarchy
                    .township_admins
                    .entry(township_key)
                    .or_default()
                    .insert(admin_name.to_string());
            }
        }

        info!(
            "Built administrative hierarchy: {} townships, {} counties, {} records limited to row-level matching",
            hierarchy.township_admins.len(),
            hierarchy.county_admins.len(),
            hierarchy.row_only_records
        );
        hierarchy
    }

    pub fn township_count(&self) -> usize {
        self.township_admins.len()
    }

    pub fn county_count(&self) -> usize {
        self.county_admins.len()
    }

    pub fn row_only_records(&self) -> usize {
        self.row_only_records
    }

    pub fn township_admin_names(&self, record: &VillageRecord) -> Option<&BTreeSet<String>> {
        record
            .township_key()
            .and_then(|key| self.township_admins.get(&key))
    }

    pub fn county_admin_names(&self, record: &VillageRecord) -> Option<&BTreeSet<String>> {
        if !record.supports_scope_widening() {
            return None;
        }
        record
            .county_key()
            .and_then(|key| self.county_admins.get(&key))
    }

    /// Administrative names visible to `record` at `scope`, in a stable order.
    pub fn names_for_scope<'a>(&'a self, record: &'a VillageRecord, scope: MatchScope) -> Vec<&'a str> {
        let names: Vec<&str> = match scope {
            MatchScope::Row => {
                let own = record.admin_village.trim();
                if own.is_empty() {
                    Vec::new()
                } else {
                    vec![own]
                }
            }
            MatchScope::Township => self
                .township_admin_names(record)
                .map(|set| set.iter().map(String::as_str).collect())
                .unwrap_or_default(),
            MatchScope::County => self
                .county_admin_names(record)
                .map(|set| set.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        };
        if names.is_empty() && scope != MatchScope::Row {
            debug!(
                "No {} scope names for '{}' ({}/{}/{})",
                scope, record.raw_name, record.city, record.county, record.township
            );
        }
        names
    }
}
