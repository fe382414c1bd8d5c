// src/text_normalizer.rs
//! Noise scrub applied upstream to raw village names. Used here only when a
//! source row arrives without its normalized name.

use once_cell::sync::Lazy;
use regex::Regex;

static BRACKETED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*\)|（[^（）]*）|\[[^\[\]]*\]|【[^【】]*】|〔[^〔〕]*〕|<[^<>]*>|《[^《》]*》")
        .expect("bracket pattern must compile")
});

static UNBALANCED_BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[()（）\[\]【】〔〕<>《》]").expect("bracket pattern must compile"));

pub fn normalize_raw_name(raw_name: &str) -> String {
    let without_annotations = BRACKETED.replace_all(raw_name, "");
    let without_strays = UNBALANCED_BRACKETS.replace_all(&without_annotations, "");
    without_strays
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace() && *c != '\u{feff}')
        .collect()
}
