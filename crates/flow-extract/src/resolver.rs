//! Phase A resolution: purely syntactic call-site binding performed while
//! a single file is in view (no cross-file data). Phase B — scoped
//! name-fallback across the whole program — lives in
//! `flow_analyze::propagate` because it needs the merged `ProgramModel`.
//!
//! This phase does no extra work beyond what `extractor::Visitor::visit_call`
//! already assigns: `CallSite::resolution_kind` is set at extraction time.
//! This module exists as the seam spec.md §4.4 names, and hosts the
//! `return-type` enhancement pass, which *does* need nothing but the current
//! file's own `return_types` map and so belongs to Phase A.

use flow_core::types::{CallSite, FunctionDef, ResolutionKind};
use std::collections::HashMap;

/// Upgrade `Unresolved`/`SelfMethod` call sites whose callee is a local
/// variable holding the return value of a known-return-type call, per
/// spec.md §3 `ResolutionKind::ReturnType`. Runs after extraction, still
/// scoped to one file's own functions.
pub fn apply_return_type_resolution(
    call_sites: &mut [CallSite],
    local_functions: &[FunctionDef],
) {
    let return_types: HashMap<&str, &str> = local_functions
        .iter()
        .filter_map(|f| f.return_type.as_deref().map(|rt| (f.qualified_name.as_str(), rt)))
        .collect();

    for site in call_sites {
        if site.resolution_kind != ResolutionKind::Unresolved {
            continue;
        }
        if let Some(rt) = return_types.get(site.caller_qualified.as_str()) {
            if *rt == site.callee_simple {
                site.resolution_kind = ResolutionKind::ReturnType;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrades_unresolved_matching_return_type() {
        let funcs = vec![FunctionDef {
            name: "make".into(),
            qualified_name: "make".into(),
            file: "a.py".into(),
            line: 1,
            is_method: false,
            is_async: false,
            containing_class: None,
            return_type: Some("Widget".into()),
        }];
        let mut calls = vec![CallSite {
            file: "a.py".into(),
            line: 2,
            caller_simple: "make".into(),
            caller_qualified: "make".into(),
            callee_simple: "Widget".into(),
            callee_qualified: String::new(),
            is_method_call: false,
            resolution_kind: ResolutionKind::Unresolved,
        }];
        apply_return_type_resolution(&mut calls, &funcs);
        assert_eq!(calls[0].resolution_kind, ResolutionKind::ReturnType);
    }

    #[test]
    fn leaves_already_resolved_alone() {
        let mut calls = vec![CallSite {
            file: "a.py".into(),
            line: 2,
            caller_simple: "f".into(),
            caller_qualified: "f".into(),
            callee_simple: "g".into(),
            callee_qualified: "g".into(),
            is_method_call: false,
            resolution_kind: ResolutionKind::Import,
        }];
        apply_return_type_resolution(&mut calls, &[]);
        assert_eq!(calls[0].resolution_kind, ResolutionKind::Import);
    }
}
