// src/models/matching.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a prefix candidate was proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    LengthBased,
    DelimiterBased,
}

impl CandidateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateOrigin::LengthBased => "length_based",
            CandidateOrigin::DelimiterBased => "delimiter_based",
        }
    }
}

/// A leading substring of a village name that may be a redundant administrative prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixCandidate {
    pub text: String,
    pub origin: CandidateOrigin,
    pub delimiter_used: Option<char>,
}

impl PrefixCandidate {
    pub fn length_based(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: CandidateOrigin::LengthBased,
            delimiter_used: None,
        }
    }

    pub fn delimiter_based(text: impl Into<String>, delimiter: char) -> Self {
        Self {
            text: text.into(),
            origin: CandidateOrigin::DelimiterBased,
            delimiter_used: Some(delimiter),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Breadth of the administrative-name search that validated a candidate.
/// Ordered from narrowest to widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchScope {
    Row,
    Township,
    County,
}

impl MatchScope {
    pub const ALL: [MatchScope; 3] = [MatchScope::Row, MatchScope::Township, MatchScope::County];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchScope::Row => "row",
            MatchScope::Township => "township",
            MatchScope::County => "county",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            MatchScope::Row => 0,
            MatchScope::Township => 1,
            MatchScope::County => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "row" => Some(MatchScope::Row),
            "township" => Some(MatchScope::Township),
            "county" => Some(MatchScope::County),
            _ => None,
        }
    }
}

impl fmt::Display for MatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tolerance path produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    /// Equal once the administrative type suffix is ignored on either side.
    Normalized,
    /// Equal after dropping a leading size/age/direction modifier from the candidate.
    ModifierAdjusted,
    /// Equal only through the homophone table.
    Partial,
}

impl MatchKind {
    pub const ALL: [MatchKind; 4] = [
        MatchKind::Exact,
        MatchKind::Normalized,
        MatchKind::ModifierAdjusted,
        MatchKind::Partial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Normalized => "normalized",
            MatchKind::ModifierAdjusted => "modifier_adjusted",
            MatchKind::Partial => "partial",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            MatchKind::Exact => 0,
            MatchKind::Normalized => 1,
            MatchKind::ModifierAdjusted => 2,
            MatchKind::Partial => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "exact" => Some(MatchKind::Exact),
            "normalized" => Some(MatchKind::Normalized),
            "modifier_adjusted" | "modifier" => Some(MatchKind::ModifierAdjusted),
            "partial" | "homophone" => Some(MatchKind::Partial),
            _ => None,
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched_admin_name: String,
    pub match_scope: MatchScope,
    pub match_kind: MatchKind,
    pub raw_confidence: f64,
}
