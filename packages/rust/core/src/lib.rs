//! Core pipeline orchestration for pdfkb.
//!
//! This crate ties together extraction, sanitization, segmentation, and
//! embedding into the knowledge-base build, plus the operations that work on
//! finished knowledge bases (merge and search).

pub mod merge;
pub mod pipeline;
pub mod search;
