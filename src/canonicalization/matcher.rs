// src/canonicalization/matcher.rs
//! Validates prefix candidates against administrative names at widening scopes.
//!
//! Each tolerance path is a `MatchStrategy`; the matcher walks scopes outermost,
//! then strategies, then the scope's admin names, and returns the first hit.

use std::collections::HashMap;

use crate::canonicalization::confidence::ConfidenceScorer;
use crate::canonicalization::hierarchy::AdministrativeHierarchy;
use crate::models::matching::{MatchKind, MatchResult, MatchScope, PrefixCandidate};
use crate::models::village::VillageRecord;

/// Type suffixes an administrative-unit name may or may not carry. Longest first.
pub const ADMIN_TYPE_SUFFIXES: [&str; 5] = ["村民委员会", "村委会", "居委会", "社区", "村"];

/// Size, age, direction and position modifiers that often lead a natural-village name.
pub const LEADING_MODIFIERS: [char; 10] = ['大', '小', '新', '老', '东', '西', '南', '北', '上', '下'];

pub const DEFAULT_HOMOPHONE_PAIRS: [(char, char); 9] = [
    ('厦', '下'),
    ('岗', '冈'),
    ('洲', '州'),
    ('沥', '坜'),
    ('塘', '堂'),
    ('埔', '浦'),
    ('墟', '圩'),
    ('涌', '冲'),
    ('岭', '领'),
];

const MIN_CORE_CHARS: usize = 2;

/// Removes one administrative type suffix, keeping the name intact when the
/// suffix is all there is.
pub fn strip_admin_suffix(name: &str) -> &str {
    for suffix in ADMIN_TYPE_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped;
            }
        }
    }
    name
}

fn strip_leading_modifier(name: &str) -> Option<&str> {
    let mut chars = name.chars();
    let first = chars.next()?;
    if !LEADING_MODIFIERS.contains(&first) {
        return None;
    }
    let rest = chars.as_str();
    (rest.chars().count() >= MIN_CORE_CHARS).then_some(rest)
}

/// Suffix-tolerant equality on names whose cores are long enough to be meaningful.
fn cores_equal(candidate: &str, admin_name: &str) -> bool {
    let candidate_core = strip_admin_suffix(candidate);
    let admin_core = strip_admin_suffix(admin_name);
    candidate_core.chars().count() >= MIN_CORE_CHARS && candidate_core == admin_core
}

/// Maps commonly confused characters onto one representative.
#[derive(Debug, Clone, Default)]
pub struct HomophoneTable {
    representatives: HashMap<char, char>,
}

impl HomophoneTable {
    pub fn from_pairs(pairs: &[(char, char)]) -> Self {
        let mut representatives: HashMap<char, char> = HashMap::new();
        for &(a, b) in pairs {
            let rep = representatives
                .get(&a)
                .or_else(|| representatives.get(&b))
                .copied()
                .unwrap_or(a);
            representatives.insert(a, rep);
            representatives.insert(b, rep);
        }
        Self { representatives }
    }

    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty()
    }

    pub fn canonicalize(&self, text: &str) -> String {
        text.chars()
            .map(|c| *self.representatives.get(&c).unwrap_or(&c))
            .collect()
    }
}

pub trait MatchStrategy: Send + Sync {
    fn kind(&self) -> MatchKind;
    fn matches(&self, candidate: &str, admin_name: &str) -> bool;
}

pub struct ExactStrategy;

impl MatchStrategy for ExactStrategy {
    fn kind(&self) -> MatchKind {
        MatchKind::Exact
    }

    fn matches(&self, candidate: &str, admin_name: &str) -> bool {
        candidate == admin_name
    }
}

pub struct ModifierAdjustedStrategy;

impl MatchStrategy for ModifierAdjustedStrategy {
    fn kind(&self) -> MatchKind {
        MatchKind::ModifierAdjusted
    }

    fn matches(&self, candidate: &str, admin_name: &str) -> bool {
        match strip_leading_modifier(candidate) {
            Some(rest) => rest == admin_name || cores_equal(rest, admin_name),
            None => false,
        }
    }
}

pub struct NormalizedSuffixStrategy;

impl MatchStrategy for NormalizedSuffixStrategy {
    fn kind(&self) -> MatchKind {
        MatchKind::Normalized
    }

    fn matches(&self, candidate: &str, admin_name: &str) -> bool {
        candidate != admin_name && cores_equal(candidate, admin_name)
    }
}

pub struct HomophoneStrategy {
    table: HomophoneTable,
}

impl HomophoneStrategy {
    pub fn new(table: HomophoneTable) -> Self {
        Self { table }
    }
}

impl MatchStrategy for HomophoneStrategy {
    fn kind(&self) -> MatchKind {
        MatchKind::Partial
    }

    fn matches(&self, candidate: &str, admin_name: &str) -> bool {
        if self.table.is_empty() {
            return false;
        }
        let admin_core = self.table.canonicalize(strip_admin_suffix(admin_name));
        if admin_core.chars().count() < MIN_CORE_CHARS {
            return false;
        }
        let direct = Some(candidate);
        let without_modifier = strip_leading_modifier(candidate);
        [direct, without_modifier]
            .into_iter()
            .flatten()
            .any(|form| self.table.canonicalize(strip_admin_suffix(form)) == admin_core)
    }
}

pub struct HierarchicalMatcher {
    strategies: Vec<Box<dyn MatchStrategy>>,
    scorer: ConfidenceScorer,
}

impl HierarchicalMatcher {
    /// Strategies are tried exact, modifier-adjusted, suffix-normalized, homophone.
    pub fn new(homophones: HomophoneTable, scorer: ConfidenceScorer) -> Self {
        Self::with_strategies(
            vec![
                Box::new(ExactStrategy),
                Box::new(ModifierAdjustedStrategy),
                Box::new(NormalizedSuffixStrategy),
                Box::new(HomophoneStrategy::new(homophones)),
            ],
            scorer,
        )
    }

    pub fn with_strategies(strategies: Vec<Box<dyn MatchStrategy>>, scorer: ConfidenceScorer) -> Self {
        Self { strategies, scorer }
    }

    pub fn find_match(
        &self,
        candidate: &PrefixCandidate,
        record: &VillageRecord,
        hierarchy: &AdministrativeHierarchy,
    ) -> Option<MatchResult> {
        for scope in MatchScope::ALL {
            let admin_names = hierarchy.names_for_scope(record, scope);
            if admin_names.is_empty() {
                continue;
            }
            for strategy in &self.strategies {
                if let Some(admin_name) = admin_names
                    .iter()
                    .find(|admin_name| strategy.matches(&candidate.text, admin_name))
                {
                    let kind = strategy.kind();
                    return Some(MatchResult {
                        matched_admin_name: admin_name.to_string(),
                        match_scope: scope,
                        match_kind: kind,
                        raw_confidence: self.scorer.score(kind, scope),
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> HierarchicalMatcher {
        HierarchicalMatcher::new(
            HomophoneTable::from_pairs(&DEFAULT_HOMOPHONE_PAIRS),
            ConfidenceScorer::default(),
        )
    }

    fn record(township: &str, admin: &str, raw: &str) -> VillageRecord {
        VillageRecord::new("潮州市", "饶平县", township, admin, raw, raw)
    }

    #[test]
    fn test_strip_admin_suffix() {
        assert_eq!(strip_admin_suffix("凤北村"), "凤北");
        assert_eq!(strip_admin_suffix("城东社区"), "城东");
        assert_eq!(strip_admin_suffix("石马村委会"), "石马");
        assert_eq!(strip_admin_suffix("凤北"), "凤北");
        assert_eq!(strip_admin_suffix("村"), "村");
    }

    #[test]
    fn test_individual_strategies() {
        assert!(ExactStrategy.matches("霞露村", "霞露村"));
        assert!(!ExactStrategy.matches("霞露", "霞露村"));

        assert!(NormalizedSuffixStrategy.matches("凤北", "凤北村"));
        assert!(NormalizedSuffixStrategy.matches("凤北村", "凤北"));
        assert!(!NormalizedSuffixStrategy.matches("凤北村", "凤北村"));
        assert!(!NormalizedSuffixStrategy.matches("东社", "东村"));

        assert!(ModifierAdjustedStrategy.matches("大松水", "松水村"));
        assert!(ModifierAdjustedStrategy.matches("新松水村", "松水村"));
        assert!(!ModifierAdjustedStrategy.matches("大松", "松村"));
        assert!(!ModifierAdjustedStrategy.matches("凤北超", "北超村"));

        let homophone = HomophoneStrategy::new(HomophoneTable::from_pairs(&DEFAULT_HOMOPHONE_PAIRS));
        assert!(homophone.matches("湖厦村", "湖下村"));
        assert!(homophone.matches("湖厦", "湖下村"));
        assert!(homophone.matches("老湖厦", "湖下村"));
        assert!(!homophone.matches("湖上", "湖下村"));

        let disabled = HomophoneStrategy::new(HomophoneTable::default());
        assert!(!disabled.matches("湖厦村", "湖下村"));
    }

    #[test]
    fn test_homophone_table_merges_chains() {
        let table = HomophoneTable::from_pairs(&[('厦', '下'), ('夏', '厦')]);
        assert_eq!(table.canonicalize("夏"), table.canonicalize("下"));
        assert_eq!(table.canonicalize("湖水"), "湖水");
    }

    #[test]
    fn test_row_match_wins_over_wider_scopes() {
        let records = vec![
            record("黄冈镇", "霞露村", "霞露村尾厝"),
            record("黄冈镇", "霞露", "霞露新屋"),
        ];
        let hierarchy = AdministrativeHierarchy::build(&records);
        let candidate = PrefixCandidate::delimiter_based("霞露村", '村');

        let result = matcher().find_match(&candidate, &records[0], &hierarchy).unwrap();
        assert_eq!(result.match_scope, MatchScope::Row);
        assert_eq!(result.match_kind, MatchKind::Exact);
        assert_eq!(result.matched_admin_name, "霞露村");
        assert_eq!(result.raw_confidence, 1.0);
    }

    #[test]
    fn test_falls_back_to_township_then_county() {
        let records = vec![
            record("黄冈镇", "湖下村", "霞露村后山"),
            record("黄冈镇", "霞露村", "霞露村尾厝"),
            record("钱东镇", "凤北村", "凤北超苟村"),
        ];
        let hierarchy = AdministrativeHierarchy::build(&records);

        let township_hit = matcher()
            .find_match(&PrefixCandidate::delimiter_based("霞露村", '村'), &records[0], &hierarchy)
            .unwrap();
        assert_eq!(township_hit.match_scope, MatchScope::Township);
        assert_eq!(township_hit.match_kind, MatchKind::Exact);
        assert_eq!(township_hit.raw_confidence, 0.85);

        let county_hit = matcher()
            .find_match(&PrefixCandidate::length_based("凤北"), &records[0], &hierarchy)
            .unwrap();
        assert_eq!(county_hit.match_scope, MatchScope::County);
        assert_eq!(county_hit.match_kind, MatchKind::Normalized);
        assert_eq!(county_hit.matched_admin_name, "凤北村");

        assert!(matcher()
            .find_match(&PrefixCandidate::length_based("石马"), &records[0], &hierarchy)
            .is_none());
    }

    #[test]
    fn test_row_only_record_never_widens() {
        let records = vec![
            record("", "湖下村", "霞露村后山"),
            record("黄冈镇", "霞露村", "霞露村尾厝"),
        ];
        let hierarchy = AdministrativeHierarchy::build(&records);
        assert!(matcher()
            .find_match(&PrefixCandidate::delimiter_based("霞露村", '村'), &records[0], &hierarchy)
            .is_none());
    }
}
