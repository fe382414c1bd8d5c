// src/canonicalization/numbered.rs
//! Statistical grouping key for numbered villages ("东村一村", "东村二村").
//! Never touches the canonical name itself.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static NAME_DIGIT_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<base>.*[^0-9０-９一二三四五六七八九十百零〇第])第?(?P<num>[0-9０-９一二三四五六七八九十百零〇]+)(?P<unit>[村组队社庄屯寨])$",
    )
    .expect("numbered village pattern must compile")
});

static NAME_DIGIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<base>.*[^0-9０-９一二三四五六七八九十百零〇第])第?(?P<num>[0-9０-９一二三四五六七八九十百零〇]+)$",
    )
    .expect("numbered village pattern must compile")
});

/// Either pattern needs at least this much base to count; shorter bases are
/// ordinary names like "统一村" or "合一".
const MIN_BASE_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberPatternKind {
    /// base + numeral + settlement unit, e.g. "东村一村"
    NameDigitUnitSuffix,
    /// base + trailing numeral, e.g. "塘尾二"
    NameDigit,
}

impl NumberPatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberPatternKind::NameDigitUnitSuffix => "name_digit_unit_suffix",
            NumberPatternKind::NameDigit => "name_digit",
        }
    }
}

impl fmt::Display for NumberPatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberedVillageAnnotation {
    pub statistical_base_name: String,
    pub has_number_suffix: bool,
    pub number_pattern_kind: Option<NumberPatternKind>,
}

impl NumberedVillageAnnotation {
    fn plain(canonical_name: &str) -> Self {
        Self {
            statistical_base_name: canonical_name.to_string(),
            has_number_suffix: false,
            number_pattern_kind: None,
        }
    }
}

pub fn annotate_numbered_village(canonical_name: &str) -> NumberedVillageAnnotation {
    if let Some(caps) = NAME_DIGIT_UNIT
        .captures(canonical_name)
        .filter(|caps| caps["base"].chars().count() >= MIN_BASE_CHARS)
    {
        let base = &caps["base"];
        let unit = &caps["unit"];
        // "东村一村" -> "东村"; "塘尾2组" -> "塘尾组"
        let statistical_base_name = if base.ends_with(unit) {
            base.to_string()
        } else {
            format!("{}{}", base, unit)
        };
        return NumberedVillageAnnotation {
            statistical_base_name,
            has_number_suffix: true,
            number_pattern_kind: Some(NumberPatternKind::NameDigitUnitSuffix),
        };
    }

    if let Some(caps) = NAME_DIGIT.captures(canonical_name) {
        let base = &caps["base"];
        if base.chars().count() >= MIN_BASE_CHARS {
            return NumberedVillageAnnotation {
                statistical_base_name: base.to_string(),
                has_number_suffix: true,
                number_pattern_kind: Some(NumberPatternKind::NameDigit),
            };
        }
    }

    NumberedVillageAnnotation::plain(canonical_name)
}
