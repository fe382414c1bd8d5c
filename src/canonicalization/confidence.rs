// src/canonicalization/confidence.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::matching::{MatchKind, MatchScope};

pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.5;
const CONFIDENCE_CEILING: f64 = 1.0;

/// Confidence per match kind (rows, in `MatchKind::index` order) and
/// scope (columns, in `MatchScope::index` order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceTable {
    values: [[f64; 3]; 4],
}

impl Default for ConfidenceTable {
    fn default() -> Self {
        Self {
            values: [
                // row, township, county
                [1.00, 0.85, 0.75], // exact
                [0.95, 0.80, 0.70], // normalized
                [0.95, 0.80, 0.70], // modifier-adjusted
                [0.75, 0.65, 0.55], // partial (homophone)
            ],
        }
    }
}

impl ConfidenceTable {
    pub fn get(&self, kind: MatchKind, scope: MatchScope) -> f64 {
        self.values[kind.index()][scope.index()]
    }

    pub fn set(&mut self, kind: MatchKind, scope: MatchScope, value: f64) {
        self.values[kind.index()][scope.index()] = value;
    }

    /// Applies overrides of the form `exact:row=1.0,partial:county=0.5`.
    /// Returns how many cells were changed.
    pub fn apply_overrides(&mut self, overrides: &str) -> Result<usize> {
        let mut applied = 0;
        for entry in overrides.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (cell, value) = entry
                .split_once('=')
                .with_context(|| format!("Confidence override '{}' is missing '='", entry))?;
            let (kind, scope) = cell
                .split_once(':')
                .with_context(|| format!("Confidence override '{}' must be kind:scope=value", entry))?;
            let kind = MatchKind::parse(kind)
                .with_context(|| format!("Unknown match kind in confidence override '{}'", entry))?;
            let scope = MatchScope::parse(scope)
                .with_context(|| format!("Unknown match scope in confidence override '{}'", entry))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid confidence value in override '{}'", entry))?;
            self.set(kind, scope, value);
            applied += 1;
        }
        Ok(applied)
    }

    /// Every value must sit in `[floor, 1.0]` and, for each kind, a narrower
    /// scope must never score below a wider one.
    pub fn validate(&self, floor: f64) -> Result<()> {
        for kind in MatchKind::ALL {
            for scope in MatchScope::ALL {
                let value = self.get(kind, scope);
                if !(floor..=CONFIDENCE_CEILING).contains(&value) {
                    bail!(
                        "Confidence for {}:{} is {:.3}, outside [{:.2}, {:.2}]",
                        kind, scope, value, floor, CONFIDENCE_CEILING
                    );
                }
            }
            for pair in MatchScope::ALL.windows(2) {
                let (narrow, wide) = (pair[0], pair[1]);
                if self.get(kind, narrow) < self.get(kind, wide) {
                    bail!(
                        "Confidence for {} must not increase from {} ({:.3}) to {} ({:.3})",
                        kind,
                        narrow,
                        self.get(kind, narrow),
                        wide,
                        self.get(kind, wide)
                    );
                }
            }
        }
        Ok(())
    }
}

/// Deterministic `kind x scope -> confidence` mapping.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    table: ConfidenceTable,
    floor: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ConfidenceTable::default(), DEFAULT_CONFIDENCE_FLOOR)
    }
}

impl ConfidenceScorer {
    pub fn new(table: ConfidenceTable, floor: f64) -> Self {
        Self { table, floor }
    }

    pub fn score(&self, kind: MatchKind, scope: MatchScope) -> f64 {
        self.table
            .get(kind, scope)
            .clamp(self.floor, CONFIDENCE_CEILING)
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bands() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(scorer.score(MatchKind::Exact, MatchScope::Row), 1.0);
        assert_eq!(scorer.score(MatchKind::Normalized, MatchScope::Row), 0.95);
        assert_eq!(scorer.score(MatchKind::ModifierAdjusted, MatchScope::Row), 0.95);

        for kind in MatchKind::ALL {
            let township = scorer.score(kind, MatchScope::Township);
            assert!(township < 0.9, "{} township scored {}", kind, township);
            let county = scorer.score(kind, MatchScope::County);
            assert!((0.5..0.8).contains(&county), "{} county scored {}", kind, county);
        }
        for scope in MatchScope::ALL {
            let partial = scorer.score(MatchKind::Partial, scope);
            assert!((0.5..0.8).contains(&partial));
        }
    }

    #[test]
    fn test_narrower_scope_never_scores_lower() {
        let scorer = ConfidenceScorer::default();
        for kind in MatchKind::ALL {
            assert!(scorer.score(kind, MatchScope::Row) >= scorer.score(kind, MatchScope::Township));
            assert!(scorer.score(kind, MatchScope::Township) >= scorer.score(kind, MatchScope::County));
        }
        assert!(ConfidenceTable::default().validate(DEFAULT_CONFIDENCE_FLOOR).is_ok());
    }

    #[test]
    fn test_overrides_and_validation() {
        let mut table = ConfidenceTable::default();
        let applied = table
            .apply_overrides("partial:row=0.78, homophone:township=0.6")
            .unwrap();
        assert_eq!(applied, 2);
        assert_eq!(table.get(MatchKind::Partial, MatchScope::Row), 0.78);
        assert_eq!(table.get(MatchKind::Partial, MatchScope::Township), 0.6);
        assert!(table.validate(DEFAULT_CONFIDENCE_FLOOR).is_ok());

        table.apply_overrides("exact:county=0.99").unwrap();
        assert!(table.validate(DEFAULT_CONFIDENCE_FLOOR).is_err());

        assert!(table.apply_overrides("exact=0.9").is_err());
        assert!(table.apply_overrides("fuzzy:row=0.9").is_err());
        assert!(table.apply_overrides("exact:row=high").is_err());
    }

    #[test]
    fn test_scores_clamped_to_floor() {
        let mut table = ConfidenceTable::default();
        table.set(MatchKind::Partial, MatchScope::County, 0.2);
        let scorer = ConfidenceScorer::new(table, 0.5);
        assert_eq!(scorer.score(MatchKind::Partial, MatchScope::County), 0.5);
    }
}
