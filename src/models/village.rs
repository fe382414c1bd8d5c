// src/models/village.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::canonicalization::numbered::NumberPatternKind;
use crate::models::matching::{MatchKind, MatchScope};

/// One natural-village row as delivered by the upstream text normalizer.
/// Never mutated by the canonicalization pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillageRecord {
    pub city: String,
    pub county: String,
    pub township: String,
    /// Name of the enclosing village-committee-level unit.
    pub admin_village: String,
    pub raw_name: String,
    pub normalized_raw_name: String,
}

impl VillageRecord {
    pub fn new(
        city: impl Into<String>,
        county: impl Into<String>,
        township: impl Into<String>,
        admin_village: impl Into<String>,
        raw_name: impl Into<String>,
        normalized_raw_name: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            county: county.into(),
            township: township.into(),
            admin_village: admin_village.into(),
            raw_name: raw_name.into(),
            normalized_raw_name: normalized_raw_name.into(),
        }
    }

    pub fn county_key(&self) -> Option<(String, String)> {
        let county = self.county.trim();
        if county.is_empty() {
            return None;
        }
        Some((self.city.trim().to_string(), county.to_string()))
    }

    pub fn township_key(&self) -> Option<(String, String, String)> {
        let township = self.township.trim();
        if township.is_empty() {
            return None;
        }
        let (city, county) = self.county_key()?;
        Some((city, county, township.to_string()))
    }

    /// Records lacking either geographic key can only be matched against their own admin name.
    pub fn supports_scope_widening(&self) -> bool {
        self.township_key().is_some()
    }
}

/// A row of the canonicalization relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub run_id: String,
    pub city: String,
    pub county: String,
    pub township: String,
    pub admin_village: String,
    pub raw_name: String,
    pub canonical_name: String,
    pub prefix_removed: bool,
    pub removed_prefix_text: Option<String>,
    pub match_source: Option<MatchScope>,
    pub match_kind: Option<MatchKind>,
    pub confidence: Option<f64>,
    pub needs_review: bool,
    pub statistical_base_name: String,
    pub has_number_suffix: bool,
    pub number_pattern_kind: Option<NumberPatternKind>,
    pub is_valid: bool,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_require_non_empty_components() {
        let full = VillageRecord::new("潮州市", "饶平县", "黄冈镇", "霞露村", "霞露村尾厝", "霞露村尾厝");
        assert_eq!(full.county_key(), Some(("潮州市".to_string(), "饶平县".to_string())));
        assert!(full.supports_scope_widening());

        let no_township = VillageRecord::new("潮州市", "饶平县", " ", "霞露村", "霞露村尾厝", "霞露村尾厝");
        assert!(no_township.township_key().is_none());
        assert!(no_township.county_key().is_some());
        assert!(!no_township.supports_scope_widening());

        let no_county = VillageRecord::new("潮州市", "", "黄冈镇", "霞露村", "霞露村尾厝", "霞露村尾厝");
        assert!(no_county.township_key().is_none());
    }
}
