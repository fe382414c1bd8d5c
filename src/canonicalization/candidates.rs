// src/canonicalization/candidates.rs
//! Proposes leading substrings of a village name that may repeat its
//! administrative-unit name.

use std::collections::HashSet;

use crate::canonicalization::matcher::strip_admin_suffix;
use crate::models::matching::PrefixCandidate;

/// Settlement-type characters that commonly close an embedded place name
/// (village, community, group, hamlet, stockade, garrison, manor, enclosure).
pub const PLACE_NAME_DELIMITERS: [char; 8] = ['村', '社', '组', '里', '寨', '屯', '庄', '围'];

pub const FIXED_PREFIX_LENGTHS: [usize; 2] = [3, 2];

const MIN_CANDIDATE_CHARS: usize = 2;

/// Returns candidates ordered delimiter-bounded first (longest first), then
/// fixed-length (longest first). A candidate that would consume the whole
/// name is never emitted.
pub fn generate_candidates(raw_name: &str, admin_name: &str) -> Vec<PrefixCandidate> {
    let chars: Vec<char> = raw_name.chars().collect();
    let total = chars.len();
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();

    let mut delimiter_positions: Vec<(usize, char)> = chars
        .iter()
        .enumerate()
        .filter(|(idx, c)| *idx + 1 >= MIN_CANDIDATE_CHARS && PLACE_NAME_DELIMITERS.contains(c))
        .map(|(idx, c)| (idx, *c))
        .collect();
    delimiter_positions.sort_by(|a, b| b.0.cmp(&a.0));

    for (idx, delimiter) in delimiter_positions {
        let len = idx + 1;
        if len >= total {
            continue;
        }
        let text: String = chars[..len].iter().collect();
        if seen.insert(text.clone()) {
            candidates.push(PrefixCandidate::delimiter_based(text, delimiter));
        }
    }

    for len in fixed_lengths(admin_name) {
        if len >= total {
            continue;
        }
        let text: String = chars[..len].iter().collect();
        if seen.insert(text.clone()) {
            candidates.push(PrefixCandidate::length_based(text));
        }
    }

    candidates
}

/// The standard 3/2 prefix lengths, plus the admin name's own length (with and
/// without its type suffix) when that is longer, so four-character unit names
/// can still be found.
fn fixed_lengths(admin_name: &str) -> Vec<usize> {
    let mut lengths: Vec<usize> = FIXED_PREFIX_LENGTHS.to_vec();
    let admin_name = admin_name.trim();
    for len in [
        admin_name.chars().count(),
        strip_admin_suffix(admin_name).chars().count(),
    ] {
        if len > FIXED_PREFIX_LENGTHS[0] && !lengths.contains(&len) {
            lengths.push(len);
        }
    }
    lengths.sort_unstable_by(|a, b| b.cmp(a));
    lengths
}
