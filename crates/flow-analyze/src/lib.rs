//! Whole-program exception-flow analysis: resolves call sites, propagates
//! raised exception types across the call graph to a fixpoint, and
//! classifies what escapes each entrypoint versus what's caught locally,
//! by a global handler, or by a framework integration.
//!
//! `builder` merges per-file `FileExtraction`s into one `ProgramModel`.
//! `propagate` builds the call graph and runs the fixpoint. `queries` and
//! `integration_queries` are the read-only query layer run after
//! propagation completes. `integrations` holds the framework-specific
//! entrypoint/handler detectors layered on top of the bare extractor.

pub mod builder;
pub mod context;
pub mod integration_queries;
pub mod integrations;
pub mod propagate;
pub mod queries;
pub mod types;
