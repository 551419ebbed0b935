//! Deterministic archive entry names derived from target addresses.

/// Longest sanitized address kept in an entry name; the ordinal prefix
/// guarantees uniqueness, the address part is for humans.
const MAX_STEM_LEN: usize = 80;

/// Reduce a URL to a filesystem-safe stem: scheme stripped, every run of
/// non-alphanumeric characters collapsed to a single underscore.
pub fn sanitize(url: &str) -> String {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);

    let mut stem = String::with_capacity(without_scheme.len());
    let mut last_was_sep = true;
    for ch in without_scheme.chars() {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            stem.push('_');
            last_was_sep = true;
        }
        if stem.len() >= MAX_STEM_LEN {
            break;
        }
    }
    let stem = stem.trim_end_matches('_');
    if stem.is_empty() {
        "target".to_string()
    } else {
        stem.to_string()
    }
}

/// Archive entry name for one target: `{ordinal:02}_{sanitized}.pdf`.
///
/// The ordinal is the target's 1-based input position, so entries sort back
/// into original input order and stay unique even for duplicate addresses.
pub fn entry_name(url: &str, ordinal: usize) -> String {
    format!("{ordinal:02}_{}.pdf", sanitize(url))
}
