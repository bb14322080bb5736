//! Sentence-boundary splitting with fragment quality gates.
//!
//! The splitter is a plain punctuation heuristic: abbreviations and decimal
//! numbers followed by whitespace produce false boundaries.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use pdfkb_shared::SegmentConfig;

/// Accepted fragments plus the number of candidates the gates dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub fragments: Vec<String>,
    pub rejected: usize,
}

/// Split sanitized text into fragments that pass both quality gates.
pub fn segment(text: &str, config: &SegmentConfig) -> Vec<String> {
    split_fragments(text, config).fragments
}

/// Like [`segment`], but also reports how many candidates were rejected.
pub fn split_fragments(text: &str, config: &SegmentConfig) -> Segments {
    let mut segments = Segments::default();

    for candidate in sentence_candidates(text) {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        if passes_quality_gates(candidate, config) {
            segments.fragments.push(candidate.to_string());
        } else {
            segments.rejected += 1;
        }
    }

    debug!(
        accepted = segments.fragments.len(),
        rejected = segments.rejected,
        "segmented text"
    );

    segments
}

/// Whether a trimmed candidate is long enough and wordy enough to keep.
pub fn passes_quality_gates(candidate: &str, config: &SegmentConfig) -> bool {
    candidate.chars().count() >= config.min_chars
        && real_word_count(candidate, config.min_word_len) >= config.min_words
}

/// Count runs of ASCII letters at least `min_len` long.
pub fn real_word_count(text: &str, min_len: usize) -> usize {
    static LETTERS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("valid regex"));

    LETTERS_RE
        .find_iter(text)
        .filter(|m| m.len() >= min_len)
        .count()
}

/// Cut after every `.`, `!` or `?` that is followed by whitespace.
fn sentence_candidates(text: &str) -> Vec<&str> {
    static BOUNDARY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid regex"));

    let mut candidates = Vec::new();
    let mut start = 0;

    for m in BOUNDARY_RE.find_iter(text) {
        // Keep the punctuation with its sentence.
        candidates.push(&text[start..m.start() + 1]);
        start = m.end();
    }

    if start < text.len() {
        candidates.push(&text[start..]);
    }

    candidates
}
