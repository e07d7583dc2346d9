//! Explicit per-run analysis context.
//!
//! The original implementation kept two module-level dicts —
//! `_propagation_cache` and `_fallback_cache` — that lived for the life of
//! the process and had to be cleared by hand between unrelated analyses
//! (tests, the LSP, and back-to-back CLI commands in the same process all
//! stepped on each other through it). spec.md §9 calls this out as a
//! redesign: thread an explicit context instead of reaching for statics.

use std::collections::HashMap;

use flow_core::types::FunctionKey;

use crate::types::PropagationResult;

/// Memoization key for the scoped name-fallback lookup: a callee's simple
/// name, whether the call site was a method call, and the file the call
/// was made from (fallback tiers are scoped to the caller's file).
pub type FallbackKey = (String, bool, String);

/// Owns every cache a single analysis run accumulates. Create one per
/// `ProgramModel`; never share across models with different content.
#[derive(Default)]
pub struct AnalysisContext {
    fallback_cache: HashMap<FallbackKey, Vec<FunctionKey>>,
    propagation_cache: Option<PropagationResult>,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback_lookup(&self, key: &FallbackKey) -> Option<&[FunctionKey]> {
        self.fallback_cache.get(key).map(|v| v.as_slice())
    }

    pub fn cache_fallback(&mut self, key: FallbackKey, candidates: Vec<FunctionKey>) {
        self.fallback_cache.insert(key, candidates);
    }

    pub fn cached_propagation(&self) -> Option<&PropagationResult> {
        self.propagation_cache.as_ref()
    }

    pub fn cache_propagation(&mut self, result: PropagationResult) {
        self.propagation_cache = Some(result);
    }

    /// Drop every cached value. Call between runs over unrelated models —
    /// a long-lived server process does this on every file-change
    /// invalidation rather than restarting.
    pub fn clear(&mut self) {
        self.fallback_cache.clear();
        self.propagation_cache = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_cache_roundtrip() {
        let mut ctx = AnalysisContext::new();
        let key: FallbackKey = ("process".into(), true, "a.py".into());
        assert!(ctx.fallback_lookup(&key).is_none());
        ctx.cache_fallback(key.clone(), vec!["a.py::Worker.process".into()]);
        assert_eq!(ctx.fallback_lookup(&key).unwrap(), &["a.py::Worker.process".to_string()]);
    }

    #[test]
    fn clear_drops_everything() {
        let mut ctx = AnalysisContext::new();
        let key: FallbackKey = ("f".into(), false, "a.py".into());
        ctx.cache_fallback(key.clone(), vec!["a.py::f".into()]);
        ctx.cache_propagation(PropagationResult::default());
        ctx.clear();
        assert!(ctx.fallback_lookup(&key).is_none());
        assert!(ctx.cached_propagation().is_none());
    }
}
