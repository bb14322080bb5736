//! Shared types, error model, and configuration for pdfkb.
//!
//! This crate is the foundation depended on by all other pdfkb crates.
//! It provides:
//! - [`PdfKbError`]: the unified error type
//! - Domain types ([`KbRecord`], [`KnowledgeBase`], [`Fragment`], [`RawText`])
//! - Configuration ([`AppConfig`], [`SegmentConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EmbeddingConfig, ExtractConfig, ExtractMode, MergeConfig, SearchConfig,
    SegmentConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PdfKbError, Result};
pub use types::{EmbeddingVector, Fragment, KbRecord, KnowledgeBase, RawText, record_id};
