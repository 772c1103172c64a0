use crate::textprep::{tokenize, truncate_chars};
use std::collections::HashSet;
use webprobe_core::Passage;

/// Paragraphs shorter than this (in chars, after trimming) are never ranked.
pub const MIN_PARAGRAPH_CHARS: usize = 60;
pub const MAX_SNIPPET_CHARS: usize = 600;

/// Split on runs of two or more newlines. Returned slices are untrimmed.
fn paragraphs(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i + 1 < bytes.len() {
        if bytes[i] == b'\n' && bytes[i + 1] == b'\n' {
            if i > start {
                out.push(&text[start..i]);
            }
            while i < bytes.len() && bytes[i] == b'\n' {
                i += 1;
            }
            start = i;
            continue;
        }
        i += 1;
    }
    if start < bytes.len() {
        out.push(&text[start..]);
    }
    out
}

/// Rank paragraphs of `main_text` by token overlap with `query`.
///
/// Score is the number of paragraph tokens (with repetition) found in the query's token
/// set. Zero-score paragraphs are dropped; equal scores keep document order.
pub fn rank(main_text: &str, query: &str, max_results: usize) -> Vec<Passage> {
    let q: HashSet<String> = tokenize(query).into_iter().collect();
    if q.is_empty() || max_results == 0 {
        return Vec::new();
    }

    let mut scored: Vec<Passage> = Vec::new();
    for p in paragraphs(main_text) {
        let p = p.trim();
        if p.chars().count() < MIN_PARAGRAPH_CHARS {
            continue;
        }
        let score = tokenize(p).iter().filter(|t| q.contains(*t)).count() as u64;
        if score == 0 {
            continue;
        }
        scored.push(Passage {
            snippet: truncate_chars(p, MAX_SNIPPET_CHARS).0,
            score,
        });
    }

    // Stable: ties stay in paragraph order.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(max_results);
    scored
}
