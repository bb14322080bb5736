//! Cleanup passes for raw extracted PDF text.
//!
//! Each pass is a function `&str -> String` applied in sequence. The whole
//! sequence is repeated until the text stops changing, since a later pass can
//! expose a fresh match for an earlier one (`Fig- ure 2` only becomes a
//! caption after de-hyphenation).

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

/// Ligature glyphs and their ASCII expansions.
const LIGATURES: [(char, &str); 5] = [
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Normalize raw extracted text.
///
/// Returns an empty string when nothing alphanumeric survives cleanup; that
/// is the "no usable content" signal, not an error.
pub fn sanitize(raw: &str) -> String {
    // Only the first round can grow the text (ligatures).
    let mut current = run_passes(raw);
    let mut round = 1;

    loop {
        let next = run_passes(&current);
        if next == current {
            break;
        }
        round += 1;
        trace!(round, "cleanup pass exposed new matches");
        current = next;
    }

    if !current.bytes().any(|b| b.is_ascii_alphanumeric()) {
        return String::new();
    }

    current
}

fn run_passes(text: &str) -> String {
    let mut result = strip_artifacts(text);

    result = strip_table_noise(&result);
    result = collapse_leader_dots(&result);
    result = dehyphenate(&result);
    result = expand_ligatures(&result);
    result = collapse_whitespace(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: OCR markers and figure captions
// ---------------------------------------------------------------------------

fn strip_artifacts(text: &str) -> String {
    static ARTIFACT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)-+\s*(?:start|end) of picture text\s*-+|\bfigure\s+\d+\.?")
            .expect("valid regex")
    });

    ARTIFACT_RE.replace_all(text, "").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 2: Table and ASCII-art noise
// ---------------------------------------------------------------------------

/// Replace `|`/`+`/`-` runs of 3+ and pipe-delimited rows with a space.
fn strip_table_noise(text: &str) -> String {
    static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"[|+\-]{3,}|\|(?:\s+\|)+").expect("valid regex")
    });

    TABLE_RE.replace_all(text, " ").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 3: Table-of-contents leader dots
// ---------------------------------------------------------------------------

fn collapse_leader_dots(text: &str) -> String {
    static LEADER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\.{3,}").expect("valid regex"));

    LEADER_RE.replace_all(text, " ").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 4: De-hyphenation
// ---------------------------------------------------------------------------

/// Rejoin words split as `word-<whitespace>word`.
///
/// Only the hyphen and whitespace are inspected, so `a- b- c` joins fully in
/// one pass even though the middle word borders two breaks.
fn dehyphenate(text: &str) -> String {
    static BREAK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"-\s+").expect("valid regex"));

    let mut result = String::with_capacity(text.len());
    let mut last = 0;

    for m in BREAK_RE.find_iter(text) {
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();

        if before.is_some_and(is_word_char) && after.is_some_and(is_word_char) {
            result.push_str(&text[last..m.start()]);
            last = m.end();
        }
    }

    result.push_str(&text[last..]);
    result
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// ---------------------------------------------------------------------------
// Pass 5: Ligatures
// ---------------------------------------------------------------------------

fn expand_ligatures(text: &str) -> String {
    if !text.chars().any(|c| ('\u{FB00}'..='\u{FB04}').contains(&c)) {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match LIGATURES.iter().find(|(glyph, _)| *glyph == c) {
            Some((_, expansion)) => result.push_str(expansion),
            None => result.push(c),
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Pass 6: Whitespace
// ---------------------------------------------------------------------------

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
