//! Text chunking and keyword scoring shared by the store backends

use std::collections::HashSet;

/// Number of hits returned when a caller asks for zero
pub const DEFAULT_TOP_K: usize = 5;

/// Splits text into overlapping chunks of at most `size` characters
///
/// Chunk ends are moved back to the last whitespace in the window when one
/// exists in its second half, so words are rarely cut. Consecutive chunks
/// share up to `overlap` characters. Chunks are trimmed; empty chunks are
/// dropped.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let overlap = overlap.min(size - 1);
    let chars: Vec<char> = text.chars().collect();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let floor = start + size / 2;
            if let Some(ws) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

/// Lower-cased alphanumeric terms of a text
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of the query terms that occur in `text`, in `[0, 1]`
pub fn keyword_score(query_terms: &HashSet<String>, text: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let terms = tokenize(text);
    let hits = query_terms.iter().filter(|t| terms.contains(*t)).count();
    hits as f64 / query_terms.len() as f64
}

/// Normalizes a requested hit count
pub fn effective_top_k(top_k: usize) -> usize {
    if top_k == 0 {
        DEFAULT_TOP_K
    } else {
        top_k
    }
}

/// Sorts hits by descending score and keeps the first `top_k`
///
/// Zero scores never rank; with `min_score`, neither do scores below it.
pub fn rank<T>(mut scored: Vec<(f64, T)>, top_k: usize, min_score: Option<f64>) -> Vec<(f64, T)> {
    let floor = min_score.unwrap_or(0.0);
    scored.retain(|(score, _)| *score > 0.0 && *score >= floor);
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(effective_top_k(top_k));
    scored
}
