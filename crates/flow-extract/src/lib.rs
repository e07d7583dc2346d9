//! Python structural extraction for flow.
//!
//! - [`extractor`] — single-pass tree-sitter visitor producing `FileExtraction`
//! - [`resolver`] — phase A (file-local) call-site resolution
//! - [`walker`] — gitignore-aware directory walk

pub mod extractor;
pub mod resolver;
pub mod walker;
