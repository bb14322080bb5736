//! Error types for pdfkb.
//!
//! Library crates use [`PdfKbError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! "No usable content" is deliberately absent here: a document that yields no
//! fragments is an expected outcome and is reported through the builder's
//! outcome type instead.

use std::path::PathBuf;

/// Top-level error type for all pdfkb operations.
#[derive(Debug, thiserror::Error)]
pub enum PdfKbError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The embedding model could not be resolved or initialized.
    #[error("failed to load model '{model}': {message}")]
    ModelLoad { model: String, message: String },

    /// The extraction collaborator could not read text from a document.
    #[error("failed to extract text from {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// A knowledge-base file is neither valid UTF-8 nor valid UTF-16.
    #[error("{path:?} is neither valid UTF-8 nor UTF-16")]
    Encoding { path: PathBuf },

    /// Merge was asked to combine nothing.
    #[error("no knowledge-base records to merge")]
    EmptyMergeInput,

    /// Merged records disagree on vector length (strict merge only).
    #[error("record '{id}' has a {found}-dimensional vector, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    /// The embedding backend failed or returned malformed output.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed KB file, bad option, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PdfKbError>;

impl PdfKbError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a model-load error for the named model.
    pub fn model_load(model: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ModelLoad {
            model: model.into(),
            message: msg.into(),
        }
    }

    /// Create an extraction error for a document path.
    pub fn extraction(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
