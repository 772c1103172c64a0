//! Minimal, deterministic text normalization helpers.

/// Collapse every whitespace run to a single space and trim.
pub fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `s`, plus whether anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    if max_chars == 0 {
        return (String::new(), !s.is_empty());
    }
    let mut out = String::new();
    for (n, ch) in s.chars().enumerate() {
        if n >= max_chars {
            return (out, true);
        }
        out.push(ch);
    }
    (out, false)
}

/// Matching key for overlap scoring.
///
/// Lower-case, then anything outside ASCII `[a-z0-9]` and whitespace becomes a space.
/// Tokens shorter than 3 characters are dropped.
pub fn tokenize(s: &str) -> Vec<String> {
    let scrubbed: String = s
        .to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch.is_whitespace() {
                ch
            } else {
                ' '
            }
        })
        .collect();
    scrubbed
        .split_whitespace()
        .filter(|t| t.len() >= 3)
        .map(str::to_string)
        .collect()
}
