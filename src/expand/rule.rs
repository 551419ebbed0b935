//! Truncation-affordance matching rules.

use serde::{Deserialize, Serialize};

/// Configuration for recognizing "expand" affordances.
///
/// Loadable from a JSON rules file via `--rules`; defaults cover the mixed
/// Chinese/English ad-library feeds the tool was built against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionRule {
    /// Keyword fragments whose presence marks an affordance.
    pub keywords: Vec<String>,
    /// Pure ellipsis glyphs that are affordances on exact match, at any length cap.
    pub bare_symbols: Vec<String>,
    /// Candidates longer than this are never affordances (keyword substrings
    /// inside article bodies must not trigger clicks).
    pub max_affordance_len: usize,
}

impl Default for ExpansionRule {
    fn default() -> Self {
        Self {
            keywords: [
                "查看更多",
                "顯示更多",
                "See more",
                "Read more",
                "展開",
                "更多",
                "See details",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            bare_symbols: vec!["...".to_string(), "…".to_string()],
            max_affordance_len: 50,
        }
    }
}

/// Decide whether `text` is an expand affordance under `rule`.
///
/// Pure and allocation-free; evaluated against every clickable-shaped
/// element on every discovery cycle. Length is counted in characters, not
/// bytes, so CJK keywords compare the way they render.
pub fn is_expandable(text: &str, rule: &ExpansionRule) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    // Bare symbols carry no semantic content, so an exact match is safe
    // regardless of the length cap.
    if rule.bare_symbols.iter().any(|s| s == text) {
        return true;
    }
    if text.chars().count() > rule.max_affordance_len {
        return false;
    }
    rule.keywords.iter().any(|k| text.contains(k.as_str()))
}
