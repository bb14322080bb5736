//! Text cleanup and fragment segmentation for extracted PDF text.
//!
//! [`sanitize`] strips extraction noise (OCR markers, table art, leader dots,
//! hyphenation breaks, ligatures) and flattens whitespace. [`segment`] splits
//! the result at sentence boundaries and keeps only spans that pass the
//! length and real-word quality gates.

mod sanitize;
mod segment;

pub use sanitize::sanitize;
pub use segment::{Segments, passes_quality_gates, real_word_count, segment, split_fragments};
