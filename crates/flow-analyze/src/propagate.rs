//! The fixpoint exception propagator.
//!
//! Ported field-for-field from `propagation.py`, the single most
//! load-bearing module this analyser has: given a resolved call graph, a
//! raise-site map, and a catch-site map, compute — per function — which
//! exception types can reach it, directly or transitively, and whether a
//! catch site along the way would stop them.
//!
//! The one structural change from the original is the call graph
//! representation. The Python version carried two parallel graphs (a
//! "qualified" graph keyed by exact function identity and a "name" graph
//! keyed by bare simple name, with callers falling back from one to the
//! other at every lookup) because resolution happened lazily, per query.
//! Here resolution happens once, up front, through the same scoped
//! fallback tiers the original used (same-file, direct-import,
//! same-package, project-wide) — producing a single call graph over
//! `FunctionKey`s with the fallback's heuristic-ness and match count
//! carried on the edge instead of re-derived by every caller.

use std::collections::{HashMap, HashSet};

use flow_core::config::ResolutionMode;
use flow_core::hierarchy::ClassHierarchy;
use flow_core::stubs::StubLibrary;
use flow_core::types::{
    function_key, simple_name, CallSite, CatchSite, FunctionKey, ProgramModel, RaiseSite,
    ResolutionKind,
};

use crate::context::AnalysisContext;
use crate::types::{
    compute_confidence, ExceptionEvidence, ExceptionFlow, PropagatedRaise, PropagationResult,
    ResolutionEdge,
};

const MAX_FIXPOINT_ITERATIONS: usize = 100;

/// Index from a function's qualified name (and its simple name) to every
/// `FunctionKey` that could answer to it — built once per propagation run.
struct FunctionIndex<'a> {
    by_qualified: HashMap<&'a str, Vec<FunctionKey>>,
    by_simple: HashMap<&'a str, Vec<FunctionKey>>,
}

impl<'a> FunctionIndex<'a> {
    fn build(model: &'a ProgramModel) -> Self {
        let mut by_qualified: HashMap<&str, Vec<FunctionKey>> = HashMap::new();
        let mut by_simple: HashMap<&str, Vec<FunctionKey>> = HashMap::new();
        for f in model.functions.values() {
            by_qualified
                .entry(f.qualified_name.as_str())
                .or_default()
                .push(f.key());
            by_simple
                .entry(simple_name(&f.qualified_name))
                .or_default()
                .push(f.key());
        }
        Self { by_qualified, by_simple }
    }
}

struct ResolvedEdge {
    callee: FunctionKey,
    resolution_kind: ResolutionKind,
    is_heuristic: bool,
    match_count: usize,
}

/// Scoped name-fallback lookup, in the order spec.md §4.4 fixes:
/// same-file, then direct-import target files, then same top-level
/// package, then the whole project. Memoized in `AnalysisContext` by
/// `(simple_name, is_method, caller_file)`.
fn scoped_fallback<'a>(
    callee_simple: &str,
    is_method_call: bool,
    caller_file: &str,
    model: &'a ProgramModel,
    index: &FunctionIndex<'a>,
    ctx: &mut AnalysisContext,
) -> Vec<FunctionKey> {
    let cache_key = (callee_simple.to_string(), is_method_call, caller_file.to_string());
    if let Some(cached) = ctx.fallback_lookup(&cache_key) {
        return cached.to_vec();
    }

    let candidates = index.by_simple.get(callee_simple).cloned().unwrap_or_default();

    let same_file: Vec<FunctionKey> =
        candidates.iter().filter(|k| k.starts_with(&format!("{caller_file}::"))).cloned().collect();
    if !same_file.is_empty() {
        ctx.cache_fallback(cache_key, same_file.clone());
        return same_file;
    }

    let import_map = model.import_maps.get(caller_file);
    let direct_import_files: HashSet<&str> = import_map
        .map(|m| m.values().map(|target| target.split("::").next().unwrap_or(target)).collect())
        .unwrap_or_default();
    let direct_import: Vec<FunctionKey> = candidates
        .iter()
        .filter(|k| {
            k.split("::").next().map(|f| direct_import_files.contains(f)).unwrap_or(false)
        })
        .cloned()
        .collect();
    if !direct_import.is_empty() {
        ctx.cache_fallback(cache_key, direct_import.clone());
        return direct_import;
    }

    let caller_package = caller_file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let same_package: Vec<FunctionKey> = candidates
        .iter()
        .filter(|k| {
            let file = k.split("::").next().unwrap_or("");
            file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("") == caller_package
        })
        .cloned()
        .collect();
    if !same_package.is_empty() {
        ctx.cache_fallback(cache_key, same_package.clone());
        return same_package;
    }

    ctx.cache_fallback(cache_key, candidates.clone());
    candidates
}

/// Expand an abstract-method callee into its concrete implementations
/// (spec.md §3 polymorphic dispatch), when the callee actually names an
/// abstract method. Otherwise a no-op single-element passthrough.
fn expand_polymorphic(
    callee: &FunctionKey,
    model: &ProgramModel,
    index: &FunctionIndex,
    hierarchy: &ClassHierarchy,
) -> Vec<(FunctionKey, bool)> {
    let Some(func) = model.functions.get(callee) else {
        return vec![(callee.clone(), false)];
    };
    let Some(class_name) = func.containing_class.as_deref() else {
        return vec![(callee.clone(), false)];
    };

    if !hierarchy.is_abstract_method(simple_name(class_name), &func.name) {
        return vec![(callee.clone(), false)];
    }
    let impls = hierarchy.get_concrete_implementations(simple_name(class_name), &func.name);
    if impls.is_empty() {
        return vec![(callee.clone(), false)];
    }

    let mut out = Vec::new();
    for (impl_class, _) in impls {
        let qualified = format!("{impl_class}.{}", func.name);
        if let Some(keys) = index.by_qualified.get(qualified.as_str()) {
            for k in keys {
                out.push((k.clone(), true));
            }
        }
    }
    if out.is_empty() {
        vec![(callee.clone(), false)]
    } else {
        out
    }
}

pub fn build_hierarchy(model: &ProgramModel) -> ClassHierarchy {
    let mut h = ClassHierarchy::new();
    for class in model.classes.values() {
        h.add_class(class);
    }
    h
}

/// Resolve one call site to the set of function keys it could invoke.
/// Returns one edge per candidate — more than one only for polymorphic
/// expansion or an ambiguous name-fallback match.
fn resolve_call<'a>(
    call: &CallSite,
    model: &'a ProgramModel,
    index: &FunctionIndex<'a>,
    hierarchy: &ClassHierarchy,
    ctx: &mut AnalysisContext,
    stub_library: Option<&StubLibrary>,
) -> (Vec<ResolvedEdge>, Vec<String>) {
    let mut direct_exceptions = Vec::new();

    let exact = match call.resolution_kind {
        ResolutionKind::Import
        | ResolutionKind::SelfMethod
        | ResolutionKind::Constructor
        | ResolutionKind::ModuleAttribute
        | ResolutionKind::ReturnType
        | ResolutionKind::ImplicitDispatch
        | ResolutionKind::FastApiDepends => {
            let mut matches = index
                .by_qualified
                .get(call.callee_qualified.as_str())
                .cloned()
                .unwrap_or_default();
            if matches.is_empty() {
                matches = index.by_simple.get(call.callee_simple.as_str()).cloned().unwrap_or_default();
            }
            let same_file: Vec<FunctionKey> = matches
                .iter()
                .filter(|k| k.starts_with(&format!("{}::", call.file)))
                .cloned()
                .collect();
            if !same_file.is_empty() {
                same_file
            } else {
                matches
            }
        }
        ResolutionKind::Polymorphic | ResolutionKind::NameFallback | ResolutionKind::Stub => {
            Vec::new()
        }
        ResolutionKind::Unresolved => Vec::new(),
    };

    let (candidates, is_heuristic) = if !exact.is_empty() {
        (exact, false)
    } else {
        let fallback = scoped_fallback(
            &call.callee_simple,
            call.is_method_call,
            &call.file,
            model,
            index,
            ctx,
        );
        if fallback.is_empty() {
            if let Some(stubs) = stub_library {
                if let Some((module, func)) = split_module_function(&call.callee_qualified)
                    .or_else(|| split_module_function(&call.callee_simple))
                {
                    if let Some(types) = stubs.get(&module, &func) {
                        direct_exceptions.extend(types.iter().cloned());
                    }
                }
            }
            (Vec::new(), true)
        } else {
            (fallback, true)
        }
    };

    let match_count = candidates.len();
    let mut edges = Vec::new();
    for callee in candidates {
        for (expanded, is_poly) in expand_polymorphic(&callee, model, index, hierarchy) {
            edges.push(ResolvedEdge {
                callee: expanded,
                resolution_kind: if is_poly {
                    ResolutionKind::Polymorphic
                } else if is_heuristic {
                    ResolutionKind::NameFallback
                } else {
                    call.resolution_kind
                },
                is_heuristic: is_heuristic || is_poly,
                match_count,
            });
        }
    }
    (edges, direct_exceptions)
}

fn split_module_function(qualified: &str) -> Option<(String, String)> {
    let (module, func) = qualified.rsplit_once('.')?;
    Some((module.to_string(), func.to_string()))
}

/// caller key -> resolved outgoing edges, built once per run.
fn build_resolved_call_graph(
    model: &ProgramModel,
    ctx: &mut AnalysisContext,
    stub_library: Option<&StubLibrary>,
) -> (HashMap<FunctionKey, Vec<ResolvedEdge>>, HashMap<FunctionKey, Vec<String>>) {
    let index = FunctionIndex::build(model);
    let hierarchy = build_hierarchy(model);
    let mut graph: HashMap<FunctionKey, Vec<ResolvedEdge>> = HashMap::new();
    let mut stub_raises: HashMap<FunctionKey, Vec<String>> = HashMap::new();

    for call in &model.call_sites {
        let caller_key = function_key(&call.file, &call.caller_qualified);
        let (edges, direct) = resolve_call(call, model, &index, &hierarchy, ctx, stub_library);
        if !edges.is_empty() {
            graph.entry(caller_key.clone()).or_default().extend(edges);
        }
        if !direct.is_empty() {
            stub_raises.entry(caller_key).or_default().extend(direct);
        }
    }

    (graph, stub_raises)
}

/// Public forward call graph: caller key -> set of callee keys. Used by
/// the query layer for reachability and trace building, where edge
/// metadata isn't needed.
pub fn build_forward_call_graph(model: &ProgramModel) -> HashMap<FunctionKey, HashSet<FunctionKey>> {
    let mut ctx = AnalysisContext::new();
    let (graph, _) = build_resolved_call_graph(model, &mut ctx, None);
    graph
        .into_iter()
        .map(|(k, edges)| (k, edges.into_iter().map(|e| e.callee).collect()))
        .collect()
}

/// Reverse call graph, split the way the original did into a qualified
/// graph (exact callee key) and a name graph (callee's bare simple name)
/// so callers that only know a bare name can still find their callers.
pub fn build_reverse_call_graph(
    model: &ProgramModel,
) -> (HashMap<FunctionKey, HashSet<FunctionKey>>, HashMap<String, HashSet<FunctionKey>>) {
    let forward = build_forward_call_graph(model);
    let mut qualified_graph: HashMap<FunctionKey, HashSet<FunctionKey>> = HashMap::new();
    let mut name_graph: HashMap<String, HashSet<FunctionKey>> = HashMap::new();

    for (caller, callees) in &forward {
        for callee in callees {
            qualified_graph.entry(callee.clone()).or_default().insert(caller.clone());
            let simple = callee.split("::").last().map(|q| simple_name(q).to_string()).unwrap_or_default();
            name_graph.entry(simple).or_default().insert(caller.clone());
        }
    }
    (qualified_graph, name_graph)
}

/// function key -> simple names reachable by falling back through both
/// call-graph representations (mirrors `build_name_to_qualified`).
pub fn build_name_to_qualified(propagation: &PropagationResult) -> HashMap<String, Vec<FunctionKey>> {
    let mut out: HashMap<String, Vec<FunctionKey>> = HashMap::new();
    for key in propagation.propagated_raises.keys().chain(propagation.direct_raises.keys()) {
        let simple = key.split("::").last().map(|q| simple_name(q).to_string()).unwrap_or_default();
        out.entry(simple).or_default().push(key.clone());
    }
    out
}

/// Direct raises per function, each function's own `raise` statements
/// plus any stub-contributed exceptions from unresolved external calls.
pub fn compute_direct_raises(
    model: &ProgramModel,
    stub_raises: &HashMap<FunctionKey, Vec<String>>,
) -> (HashMap<FunctionKey, HashSet<String>>, HashMap<FunctionKey, Vec<RaiseSite>>) {
    let mut direct: HashMap<FunctionKey, HashSet<String>> = HashMap::new();
    let mut sites: HashMap<FunctionKey, Vec<RaiseSite>> = HashMap::new();

    for raise in &model.raise_sites {
        let key = function_key(&raise.file, &raise.function);
        direct.entry(key.clone()).or_default().insert(raise.exception_type.clone());
        sites.entry(key).or_default().push(raise.clone());
    }

    for (key, types) in stub_raises {
        direct.entry(key.clone()).or_default().extend(types.iter().cloned());
    }

    (direct, sites)
}

pub fn compute_catches_by_function(model: &ProgramModel) -> HashMap<FunctionKey, Vec<CatchSite>> {
    let mut out: HashMap<FunctionKey, Vec<CatchSite>> = HashMap::new();
    for catch in &model.catch_sites {
        let key = function_key(&catch.file, &catch.function);
        out.entry(key).or_default().push(catch.clone());
    }
    out
}

/// Whether any catch site in `catches` would stop `exception_type`,
/// honoring the precedence order in spec.md §4.5: bare-except, then
/// exact/simple-name match, then generic (`Exception`/`BaseException`),
/// then hierarchy subclass match. A catch site that re-raises inside its
/// body does not count as a catch.
pub fn exception_is_caught(
    exception_type: &str,
    catches: &[CatchSite],
    hierarchy: &ClassHierarchy,
) -> bool {
    let exc_simple = simple_name(exception_type);
    for catch in catches {
        if catch.reraises {
            continue;
        }
        if catch.is_bare_except {
            return true;
        }
        if catch.names_directly(exception_type) {
            return true;
        }
        for caught in &catch.caught_types {
            let caught_simple = simple_name(caught);
            if flow_core::types::GENERIC_EXCEPTION_TYPES.contains(&caught_simple) {
                return true;
            }
            if hierarchy.is_subclass_of(exc_simple, caught_simple) {
                return true;
            }
        }
    }
    false
}

/// Run the fixpoint propagation over the whole program, or over a scope
/// restricted subset of function keys (used by `find_escapes`, which only
/// cares about what's reachable from one function).
pub fn propagate_exceptions(
    model: &ProgramModel,
    ctx: &mut AnalysisContext,
    resolution_mode: ResolutionMode,
    skip_evidence: bool,
    scope: Option<&HashSet<FunctionKey>>,
    stub_library: Option<&StubLibrary>,
) -> PropagationResult {
    let hierarchy = build_hierarchy(model);
    let (call_graph, stub_raises) = build_resolved_call_graph(model, ctx, stub_library);
    let (direct_raises, raise_sites_by_fn) = compute_direct_raises(model, &stub_raises);
    let catches_by_function = compute_catches_by_function(model);

    let mut propagated: HashMap<FunctionKey, HashSet<String>> = direct_raises.clone();
    let mut evidence: HashMap<FunctionKey, HashMap<(String, String, u32), PropagatedRaise>> =
        HashMap::new();

    if !skip_evidence {
        for (func_key, sites) in &raise_sites_by_fn {
            for site in sites {
                evidence.entry(func_key.clone()).or_default().insert(
                    (site.exception_type.clone(), site.file.clone(), site.line),
                    PropagatedRaise {
                        exception_type: site.exception_type.clone(),
                        raise_site: site.clone(),
                        path: Vec::new(),
                    },
                );
            }
        }
    }

    let mode_allows = |kind: ResolutionKind, is_heuristic: bool| match resolution_mode {
        ResolutionMode::Strict => !is_heuristic || kind == ResolutionKind::Polymorphic,
        ResolutionMode::Default => true,
        ResolutionMode::Aggressive => true,
    };

    let mut iteration = 0;
    loop {
        iteration += 1;
        let mut changed = false;

        for (caller, edges) in &call_graph {
            if let Some(scope) = scope {
                if !scope.contains(caller) {
                    continue;
                }
            }

            for edge in edges {
                if !mode_allows(edge.resolution_kind, edge.is_heuristic) {
                    continue;
                }

                let callee_catches = catches_by_function.get(&edge.callee);
                let callee_types: Vec<String> = propagated
                    .get(&edge.callee)
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default();

                for exc_type in callee_types {
                    if let Some(catches) = callee_catches {
                        if exception_is_caught(&exc_type, catches, &hierarchy) {
                            continue;
                        }
                    }

                    let entry = propagated.entry(caller.clone()).or_default();
                    if entry.insert(exc_type.clone()) {
                        changed = true;
                    }

                    if !skip_evidence {
                        if let Some(callee_paths) = evidence.get(&edge.callee).cloned() {
                            for (key, prop_raise) in callee_paths {
                                if key.0 != exc_type {
                                    continue;
                                }
                                let mut path = prop_raise.path.clone();
                                path.push(ResolutionEdge {
                                    caller: caller.clone(),
                                    callee: edge.callee.clone(),
                                    file: prop_raise.raise_site.file.clone(),
                                    line: prop_raise.raise_site.line,
                                    resolution_kind: edge.resolution_kind,
                                    is_heuristic: edge.is_heuristic,
                                    match_count: edge.match_count,
                                });
                                let slot = evidence.entry(caller.clone()).or_default();
                                if !slot.contains_key(&key) {
                                    slot.insert(
                                        key,
                                        PropagatedRaise {
                                            exception_type: exc_type.clone(),
                                            raise_site: prop_raise.raise_site.clone(),
                                            path,
                                        },
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }

        if !changed || iteration >= MAX_FIXPOINT_ITERATIONS {
            if iteration >= MAX_FIXPOINT_ITERATIONS {
                eprintln!(
                    "flow: warning: exception propagation hit the {MAX_FIXPOINT_ITERATIONS}-iteration cap without converging"
                );
            }
            break;
        }
    }

    PropagationResult {
        direct_raises,
        propagated_raises: propagated,
        catches_by_function,
        propagated_with_evidence: evidence,
    }
}

/// Forward BFS from `function_key` over the resolved call graph.
pub fn compute_forward_reachability(
    function_key: &str,
    _model: &ProgramModel,
    forward_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
) -> HashSet<FunctionKey> {
    let mut reachable = HashSet::new();
    let mut worklist = vec![function_key.to_string()];
    while let Some(current) = worklist.pop() {
        if !reachable.insert(current.clone()) {
            continue;
        }
        if let Some(callees) = forward_graph.get(&current) {
            for callee in callees {
                if !reachable.contains(callee) {
                    worklist.push(callee.clone());
                }
            }
        }
    }
    reachable
}

/// Functions reachable from `func_key`, used to scope which raise sites
/// count toward one entrypoint's exception flow.
pub fn compute_reachable_functions(
    func_key: &str,
    model: &ProgramModel,
    _propagation: &PropagationResult,
    forward_graph: Option<&HashMap<FunctionKey, HashSet<FunctionKey>>>,
    _name_to_qualified: Option<&HashMap<String, Vec<FunctionKey>>>,
) -> HashSet<FunctionKey> {
    match forward_graph {
        Some(graph) => compute_forward_reachability(func_key, model, graph),
        None => {
            let graph = build_forward_call_graph(model);
            compute_forward_reachability(func_key, model, &graph)
        }
    }
}

fn find_func_key(function_name: &str, propagation: &PropagationResult, model: &ProgramModel) -> Option<FunctionKey> {
    if propagation.propagated_raises.contains_key(function_name) {
        return Some(function_name.to_string());
    }
    for key in propagation.propagated_raises.keys() {
        let simple = key.split("::").last().map(simple_name).unwrap_or(key);
        if simple == function_name {
            return Some(key.clone());
        }
    }
    model
        .functions
        .values()
        .find(|f| f.name == function_name || f.qualified_name == function_name)
        .map(|f| f.key())
}

/// Classify a function's propagated exceptions against its own catch
/// sites plus the global/generic handlers, producing the base (non
/// framework-aware) flow. Framework-specific classification lives in
/// `crate::integration_queries`.
pub fn compute_exception_flow(
    function_name: &str,
    model: &ProgramModel,
    propagation: &PropagationResult,
) -> ExceptionFlow {
    let mut flow = ExceptionFlow::default();
    let hierarchy = build_hierarchy(model);

    let Some(func_key) = find_func_key(function_name, propagation, model) else {
        return flow;
    };

    let Some(escaping) = propagation.propagated_raises.get(&func_key) else {
        return flow;
    };
    let own_catches = propagation.catches_by_function.get(&func_key);
    let global_handlers = &model.global_handlers;

    for exc_type in escaping {
        let raise_sites: Vec<RaiseSite> = model
            .raise_sites
            .iter()
            .filter(|r| &r.exception_type == exc_type)
            .cloned()
            .collect();

        if let Some(catches) = own_catches {
            if exception_is_caught(exc_type, catches, &hierarchy) {
                flow.caught_locally.entry(exc_type.clone()).or_default().extend(raise_sites);
                continue;
            }
        }

        let handler = global_handlers.iter().find(|h| {
            simple_name(exc_type) == simple_name(&h.handled_type)
                || hierarchy.is_subclass_of(exc_type, &h.handled_type)
        });

        if let Some(handler) = handler {
            if handler.is_generic() {
                flow.caught_by_generic.entry(exc_type.clone()).or_default().extend(raise_sites);
            } else {
                flow.caught_by_global.entry(exc_type.clone()).or_default().extend(raise_sites);
            }
            continue;
        }

        flow.uncaught.entry(exc_type.clone()).or_default().extend(raise_sites);
    }

    if let Some(evidence_map) = propagation.propagated_with_evidence.get(&func_key) {
        for ((exc_type, _, _), prop_raise) in evidence_map {
            flow.evidence.entry(exc_type.clone()).or_default().push(ExceptionEvidence {
                raise_site: prop_raise.raise_site.clone(),
                call_path: prop_raise.path.clone(),
                confidence: compute_confidence(&prop_raise.path),
            });
        }
    }

    flow
}

pub fn get_exceptions_for_entrypoint(
    entrypoint_function: &str,
    model: &ProgramModel,
    propagation: &PropagationResult,
) -> HashSet<String> {
    find_func_key(entrypoint_function, propagation, model)
        .and_then(|key| propagation.propagated_raises.get(&key).cloned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::types::*;

    fn model_with_chain() -> ProgramModel {
        let mut model = ProgramModel::default();
        let f1 = FunctionDef {
            name: "inner".into(),
            qualified_name: "inner".into(),
            file: "a.py".into(),
            line: 1,
            is_method: false,
            is_async: false,
            containing_class: None,
            return_type: None,
        };
        let f2 = FunctionDef {
            name: "outer".into(),
            qualified_name: "outer".into(),
            file: "a.py".into(),
            line: 5,
            is_method: false,
            is_async: false,
            containing_class: None,
            return_type: None,
        };
        model.functions.insert(f1.key(), f1);
        model.functions.insert(f2.key(), f2);

        model.raise_sites.push(RaiseSite {
            file: "a.py".into(),
            line: 2,
            function: "inner".into(),
            exception_type: "ValueError".into(),
            is_bare_raise: false,
            snippet: "raise ValueError()".into(),
            message_expr: None,
        });

        model.call_sites.push(CallSite {
            file: "a.py".into(),
            line: 6,
            caller_simple: "outer".into(),
            caller_qualified: "outer".into(),
            callee_simple: "inner".into(),
            callee_qualified: "inner".into(),
            is_method_call: false,
            resolution_kind: ResolutionKind::Import,
        });

        model
    }

    #[test]
    fn propagates_through_direct_call() {
        let model = model_with_chain();
        let mut ctx = AnalysisContext::new();
        let result = propagate_exceptions(&model, &mut ctx, ResolutionMode::Default, true, None, None);
        let outer = result.propagated_raises.get("a.py::outer").unwrap();
        assert!(outer.contains("ValueError"));
    }

    #[test]
    fn catch_site_stops_propagation() {
        let mut model = model_with_chain();
        model.catch_sites.push(CatchSite {
            file: "a.py".into(),
            line: 7,
            function: "outer".into(),
            caught_types: vec!["ValueError".into()],
            is_bare_except: false,
            reraises: false,
        });
        let mut ctx = AnalysisContext::new();
        let result = propagate_exceptions(&model, &mut ctx, ResolutionMode::Default, true, None, None);
        assert!(result.propagated_raises.get("a.py::outer").is_none());
    }

    #[test]
    fn reraise_disables_catch() {
        let mut model = model_with_chain();
        model.catch_sites.push(CatchSite {
            file: "a.py".into(),
            line: 7,
            function: "outer".into(),
            caught_types: vec!["ValueError".into()],
            is_bare_except: false,
            reraises: true,
        });
        let mut ctx = AnalysisContext::new();
        let result = propagate_exceptions(&model, &mut ctx, ResolutionMode::Default, true, None, None);
        assert!(result.propagated_raises.get("a.py::outer").unwrap().contains("ValueError"));
    }

    #[test]
    fn bare_except_catches_everything() {
        let hierarchy = ClassHierarchy::new();
        let catches = vec![CatchSite {
            file: "a.py".into(),
            line: 1,
            function: "f".into(),
            caught_types: vec![],
            is_bare_except: true,
            reraises: false,
        }];
        assert!(exception_is_caught("AnythingError", &catches, &hierarchy));
    }

    #[test]
    fn generic_exception_type_catches_subclass() {
        let hierarchy = ClassHierarchy::new();
        let catches = vec![CatchSite {
            file: "a.py".into(),
            line: 1,
            function: "f".into(),
            caught_types: vec!["Exception".into()],
            is_bare_except: false,
            reraises: false,
        }];
        assert!(exception_is_caught("ValueError", &catches, &hierarchy));
    }

    #[test]
    fn stub_contributes_direct_raise_for_unresolved_external_call() {
        let mut model = ProgramModel::default();
        let f = FunctionDef {
            name: "fetch".into(),
            qualified_name: "fetch".into(),
            file: "a.py".into(),
            line: 1,
            is_method: false,
            is_async: false,
            containing_class: None,
            return_type: None,
        };
        model.functions.insert(f.key(), f);
        model.call_sites.push(CallSite {
            file: "a.py".into(),
            line: 2,
            caller_simple: "fetch".into(),
            caller_qualified: "fetch".into(),
            callee_simple: "get".into(),
            callee_qualified: "requests.get".into(),
            is_method_call: false,
            resolution_kind: ResolutionKind::ModuleAttribute,
        });

        let mut lib = StubLibrary::new();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("stubs")).unwrap();
        std::fs::write(
            tmp.path().join("stubs/requests.yaml"),
            "module: requests\nfunctions:\n  get: [ConnectionError, Timeout]\n",
        )
        .unwrap();
        lib.load_dir(&tmp.path().join("stubs"));

        let mut ctx = AnalysisContext::new();
        let result =
            propagate_exceptions(&model, &mut ctx, ResolutionMode::Default, true, None, Some(&lib));
        let raises = result.propagated_raises.get("a.py::fetch").unwrap();
        assert!(raises.contains("ConnectionError"));
    }
}
