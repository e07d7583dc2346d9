//! Types produced by the propagator: evidence paths, per-function flow
//! classification, and the whole-propagation result. Carried out of
//! `flow-core` because they depend on the fixpoint, not on extraction
//! (spec.md §3).

use std::collections::HashMap;

use serde::Serialize;

use flow_core::types::{CatchSite, Confidence, FunctionKey, RaiseSite, ResolutionKind};

/// One hop in a propagated-exception's call path, from the raise site
/// outward toward the function currently being asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionEdge {
    pub caller: FunctionKey,
    pub callee: FunctionKey,
    pub file: String,
    pub line: u32,
    pub resolution_kind: ResolutionKind,
    /// True when this edge was produced by a fallback tier (name-fallback,
    /// polymorphic expansion, stub lookup) rather than an exact binding.
    pub is_heuristic: bool,
    /// How many candidate callees the fallback considered before picking
    /// this one — 1 for an exact match, >1 when a name-fallback tier had
    /// to choose among several same-named functions.
    pub match_count: usize,
}

/// Derive confidence from a full evidence path, per spec.md §4.5: any
/// heuristic hop drags confidence down, and a path built entirely from
/// exact bindings is High.
pub fn compute_confidence(path: &[ResolutionEdge]) -> Confidence {
    if path.is_empty() {
        return Confidence::High;
    }
    if path
        .iter()
        .any(|e| e.is_heuristic && e.match_count > 1)
    {
        return Confidence::Low;
    }
    if path.iter().all(|e| e.resolution_kind.is_exact()) {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

/// A single exception type propagated to a function, with the call path
/// that carried it there.
#[derive(Debug, Clone, Serialize)]
pub struct PropagatedRaise {
    pub exception_type: String,
    pub raise_site: RaiseSite,
    pub path: Vec<ResolutionEdge>,
}

/// Key identifying one propagated occurrence: the same exception type can
/// reach a function via more than one raise site, so the exception type
/// alone isn't unique.
pub type PropagatedKey = (String, String, u32);

#[derive(Debug, Clone, Serialize)]
pub struct ExceptionEvidence {
    pub raise_site: RaiseSite,
    pub call_path: Vec<ResolutionEdge>,
    pub confidence: Confidence,
}

/// Output of one fixpoint run over the whole call graph.
#[derive(Debug, Clone, Default)]
pub struct PropagationResult {
    pub direct_raises: HashMap<FunctionKey, std::collections::HashSet<String>>,
    pub propagated_raises: HashMap<FunctionKey, std::collections::HashSet<String>>,
    pub catches_by_function: HashMap<FunctionKey, Vec<CatchSite>>,
    pub propagated_with_evidence: HashMap<FunctionKey, HashMap<PropagatedKey, PropagatedRaise>>,
}

/// Per-function classification of where each propagated exception ends
/// up: caught locally, caught by a handler, converted by a framework, or
/// left to escape. Built by `compute_exception_flow`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExceptionFlow {
    pub caught_locally: HashMap<String, Vec<RaiseSite>>,
    pub caught_by_global: HashMap<String, Vec<RaiseSite>>,
    pub caught_by_generic: HashMap<String, Vec<RaiseSite>>,
    pub caught_by_remote_global: HashMap<String, Vec<RaiseSite>>,
    pub framework_handled: HashMap<String, Vec<(RaiseSite, String)>>,
    pub uncaught: HashMap<String, Vec<RaiseSite>>,
    pub evidence: HashMap<String, Vec<ExceptionEvidence>>,
}

impl ExceptionFlow {
    pub fn is_empty(&self) -> bool {
        self.caught_locally.is_empty()
            && self.caught_by_global.is_empty()
            && self.caught_by_generic.is_empty()
            && self.caught_by_remote_global.is_empty()
            && self.framework_handled.is_empty()
            && self.uncaught.is_empty()
    }
}
