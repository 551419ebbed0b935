//! URL extraction from free-form pasted text.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Absolute http(s) URLs; stops at whitespace and common delimiters.
        Regex::new(r#"https?://[^\s<>"'`]+"#).unwrap()
    })
}

/// Pull every absolute http(s) URL out of `text`, in order of first
/// appearance, with duplicates removed and invalid candidates dropped.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for m in url_pattern().find_iter(text) {
        // Prose punctuation commonly clings to pasted links.
        let candidate = m.as_str().trim_end_matches([',', '.', ';', ')', ']', '!', '?']);
        if url::Url::parse(candidate).is_err() {
            continue;
        }
        if seen.insert(candidate.to_string()) {
            urls.push(candidate.to_string());
        }
    }
    urls
}
