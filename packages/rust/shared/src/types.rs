//! Core domain types for pdfkb knowledge bases.

use serde::{Deserialize, Serialize};

/// A fixed-length, L2-normalized embedding.
///
/// Stored as `f64` so vectors read from externally produced files survive a
/// merge untouched.
pub type EmbeddingVector = Vec<f64>;

// ---------------------------------------------------------------------------
// RawText
// ---------------------------------------------------------------------------

/// Text as handed over by the extraction step, before any cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawText {
    /// The whole document as a single blob.
    Whole(String),
    /// One entry per page, in page order.
    Pages(Vec<String>),
}

impl RawText {
    /// Number of pages (a whole-document blob counts as one).
    pub fn page_count(&self) -> usize {
        match self {
            Self::Whole(_) => 1,
            Self::Pages(pages) => pages.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// A sanitized, quality-filtered span of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Trimmed, whitespace-collapsed text.
    pub text: String,
    /// Zero-based position within the source document.
    pub source_ordinal: usize,
}

/// Build the record id for the fragment at `ordinal` of `document_label`.
pub fn record_id(document_label: &str, ordinal: usize) -> String {
    format!("{document_label}_{ordinal}")
}

// ---------------------------------------------------------------------------
// KbRecord / KnowledgeBase
// ---------------------------------------------------------------------------

/// One entry in a knowledge-base file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbRecord {
    /// `<source_filename>_<ordinal>`; unique within one document only.
    pub id: String,
    /// Fragment text.
    pub text: String,
    /// Embedding of `text`.
    pub vector: EmbeddingVector,
}

impl KbRecord {
    /// Pair a fragment with its embedding under `document_label`.
    pub fn from_fragment(document_label: &str, fragment: Fragment, vector: EmbeddingVector) -> Self {
        Self {
            id: record_id(document_label, fragment.source_ordinal),
            text: fragment.text,
            vector,
        }
    }

    /// Vector length.
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// An ordered sequence of records, serialized as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeBase {
    pub records: Vec<KbRecord>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: KbRecord) {
        self.records.push(record);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KbRecord> {
        self.records.iter()
    }
}

impl From<Vec<KbRecord>> for KnowledgeBase {
    fn from(records: Vec<KbRecord>) -> Self {
        Self { records }
    }
}

impl IntoIterator for KnowledgeBase {
    type Item = KbRecord;
    type IntoIter = std::vec::IntoIter<KbRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
