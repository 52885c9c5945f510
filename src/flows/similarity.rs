//! Parameter-name similarity for fuzzy flow matching.

use std::sync::OnceLock;

use regex::Regex;
use similar::TextDiff;

use crate::graph::ParameterPath;

/// Fuzzy scores never reach the 1.0 reserved for exact matches.
pub const FUZZY_CONFIDENCE_CEILING: f64 = 0.95;

fn camel_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("Invalid regex pattern"))
}

fn acronym_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("Invalid regex pattern"))
}

/// Split a name into lowercase words on `_`, `-`, whitespace and camelCase
/// boundaries: `waybillNumber` and `waybill_number` both give `[waybill, number]`.
pub fn name_words(name: &str) -> Vec<String> {
    let spaced = camel_boundary().replace_all(name, "$1 $2");
    let spaced = acronym_boundary().replace_all(&spaced, "$1 $2");
    spaced
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Separator- and case-insensitive form of a path's final segment.
pub fn normalized_leaf(path: &ParameterPath) -> String {
    name_words(path.leaf_name()).concat()
}

/// Similarity of two already-normalized names in `[0, FUZZY_CONFIDENCE_CEILING]`.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let ratio = TextDiff::from_chars(a, b).ratio() as f64;
    ratio.clamp(0.0, FUZZY_CONFIDENCE_CEILING)
}

/// Compare the final segments of two paths.
pub fn similarity(output: &ParameterPath, input: &ParameterPath) -> f64 {
    normalized_similarity(&normalized_leaf(output), &normalized_leaf(input))
}
