//! Query layer: read-only questions over a `ProgramModel` plus a
//! `PropagationResult`. Each function returns a typed result struct and
//! does no formatting — that's flow-output's job.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use flow_core::config::ResolutionMode;
use flow_core::hierarchy::ClassHierarchy;
use flow_core::types::{
    simple_name, CatchSite, Entrypoint, EntrypointKind, FunctionKey, GlobalHandler, ProgramModel,
    RaiseSite,
};

use crate::context::AnalysisContext;
use crate::propagate::{
    build_forward_call_graph, build_hierarchy, build_reverse_call_graph,
    compute_exception_flow, compute_forward_reachability, exception_is_caught,
    propagate_exceptions,
};
use crate::types::{ExceptionFlow, PropagationResult};

/// Cheap substring/prefix closeness scorer standing in for `difflib`'s
/// `get_close_matches`: no external fuzzy-matching crate in the stack, so
/// this ranks by longest common substring length relative to name length.
fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 0.0;
    }
    let mut best = 0usize;
    let ab = a.as_bytes();
    let bb = b.as_bytes();
    for i in 0..ab.len() {
        for j in 0..bb.len() {
            let mut k = 0;
            while i + k < ab.len() && j + k < bb.len() && ab[i + k] == bb[j + k] {
                k += 1;
            }
            best = best.max(k);
        }
    }
    best as f64 / longer as f64
}

pub fn find_similar_names(target: &str, candidates: &[String], n: usize) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> =
        candidates.iter().map(|c| (similarity(target, c), c)).filter(|(score, _)| *score >= 0.5).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    scored.into_iter().take(n).map(|(_, c)| c.clone()).collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RaisesResult {
    pub exception_type: String,
    pub include_subclasses: bool,
    pub types_searched: HashSet<String>,
    pub matches: Vec<RaiseSite>,
}

pub fn find_raises(model: &ProgramModel, exception_type: &str, include_subclasses: bool) -> RaisesResult {
    let mut types_to_find: HashSet<String> = [exception_type.to_string()].into_iter().collect();
    if include_subclasses {
        let hierarchy = build_hierarchy(model);
        types_to_find.extend(hierarchy.get_all_subclasses(exception_type));
    }

    let mut matches: Vec<RaiseSite> = model
        .raise_sites
        .iter()
        .filter(|r| {
            types_to_find.contains(&r.exception_type)
                || types_to_find.iter().any(|t| r.exception_type.ends_with(&format!(".{t}")))
        })
        .cloned()
        .collect();

    for t in &types_to_find {
        for r in &model.raise_sites {
            if simple_name(&r.exception_type) == t && !matches.iter().any(|m| m == r) {
                matches.push(r.clone());
            }
        }
    }

    RaisesResult {
        exception_type: exception_type.to_string(),
        include_subclasses,
        types_searched: types_to_find,
        matches,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExceptionClass {
    pub name: String,
    pub bases: Vec<String>,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExceptionsResult {
    pub classes: HashMap<String, ExceptionClass>,
    pub roots: HashSet<String>,
}

pub fn find_exceptions(model: &ProgramModel) -> ExceptionsResult {
    let mut exception_bases: HashSet<String> = ["Exception".to_string(), "BaseException".to_string()].into_iter().collect();
    let mut classes: HashMap<String, ExceptionClass> = HashMap::new();

    for cls in model.classes.values() {
        for base in &cls.base_names {
            let base_simple = simple_name(base);
            if exception_bases.contains(base_simple)
                || classes.contains_key(base_simple)
                || base.contains("Exception")
                || base.contains("Error")
            {
                classes.insert(
                    cls.name.clone(),
                    ExceptionClass { name: cls.name.clone(), bases: cls.base_names.clone(), file: cls.file.clone(), line: cls.line },
                );
                exception_bases.insert(cls.name.clone());
                break;
            }
        }
    }

    let mut roots = HashSet::new();
    for (name, exc_class) in &classes {
        let has_parent = exc_class.bases.iter().any(|b| classes.contains_key(simple_name(b)));
        if !has_parent {
            roots.insert(name.clone());
        }
    }

    ExceptionsResult { classes, roots }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsResult {
    pub functions: usize,
    pub classes: usize,
    pub raise_sites: usize,
    pub catch_sites: usize,
    pub call_sites: usize,
    pub entrypoints: usize,
    pub http_routes: usize,
    pub cli_scripts: usize,
    pub global_handlers: usize,
}

pub fn get_stats(model: &ProgramModel) -> StatsResult {
    StatsResult {
        functions: model.functions.len(),
        classes: model.classes.len(),
        raise_sites: model.raise_sites.len(),
        catch_sites: model.catch_sites.len(),
        call_sites: model.call_sites.len(),
        entrypoints: model.entrypoints.len(),
        http_routes: model.entrypoints.iter().filter(|e| e.kind == EntrypointKind::HttpRoute).count(),
        cli_scripts: model.entrypoints.iter().filter(|e| e.kind == EntrypointKind::CliScript).count(),
        global_handlers: model.global_handlers.len(),
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CallersResult {
    pub function_name: String,
    pub callers: HashSet<FunctionKey>,
    pub suggestions: Vec<String>,
}

fn get_callers_from_graphs(
    function_name: &str,
    qualified_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
    name_graph: &HashMap<String, HashSet<FunctionKey>>,
) -> HashSet<FunctionKey> {
    let direct = qualified_graph.get(function_name);
    if let Some(direct) = direct {
        if !direct.is_empty() {
            return direct.clone();
        }
    }
    let simple = function_name.split("::").last().map(simple_name).unwrap_or(function_name);
    name_graph.get(simple).cloned().unwrap_or_default()
}

pub fn find_callers(model: &ProgramModel, function_name: &str) -> CallersResult {
    let (qualified_graph, name_graph) = build_reverse_call_graph(model);
    let callers = get_callers_from_graphs(function_name, &qualified_graph, &name_graph);

    let suggestions = if callers.is_empty() {
        let mut names: Vec<String> = model.functions.values().map(|f| f.name.clone()).collect();
        names.extend(model.entrypoints.iter().map(|e| e.function.clone()));
        names.sort();
        names.dedup();
        find_similar_names(function_name, &names, 3)
    } else {
        Vec::new()
    };

    CallersResult { function_name: function_name.to_string(), callers, suggestions }
}

fn trace_to_entrypoints(
    function_name: &str,
    qualified_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
    name_graph: &HashMap<String, HashSet<FunctionKey>>,
    entrypoint_functions: &HashSet<String>,
    max_depth: usize,
) -> Vec<Vec<String>> {
    let mut paths = Vec::new();

    fn dfs(
        current: &str,
        path: &[String],
        visited: &HashSet<String>,
        qualified_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
        name_graph: &HashMap<String, HashSet<FunctionKey>>,
        entrypoint_functions: &HashSet<String>,
        max_depth: usize,
        paths: &mut Vec<Vec<String>>,
    ) {
        if path.len() > max_depth || visited.contains(current) {
            return;
        }
        let mut visited = visited.clone();
        visited.insert(current.to_string());

        let current_simple = current.split("::").last().map(simple_name).unwrap_or(current);
        if entrypoint_functions.contains(current) || entrypoint_functions.contains(current_simple) {
            paths.push(path.to_vec());
            return;
        }

        for caller in get_callers_from_graphs(current, qualified_graph, name_graph) {
            let mut next_path = path.to_vec();
            next_path.push(caller.clone());
            dfs(&caller, &next_path, &visited, qualified_graph, name_graph, entrypoint_functions, max_depth, paths);
        }
    }

    dfs(function_name, &[function_name.to_string()], &HashSet::new(), qualified_graph, name_graph, entrypoint_functions, max_depth, &mut paths);
    paths
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrypointTrace {
    pub raise_site: RaiseSite,
    pub paths: Vec<Vec<String>>,
    pub entrypoints: Vec<Entrypoint>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EntrypointsToResult {
    pub exception_type: String,
    pub include_subclasses: bool,
    pub traces: Vec<EntrypointTrace>,
}

pub fn trace_entrypoints_to(model: &ProgramModel, exception_type: &str, include_subclasses: bool) -> EntrypointsToResult {
    let raises_result = find_raises(model, exception_type, include_subclasses);
    let (qualified_graph, name_graph) = build_reverse_call_graph(model);
    let entrypoint_functions: HashSet<String> = model.entrypoints.iter().map(|e| e.function.clone()).collect();

    let mut traces = Vec::new();
    for raise_site in &raises_result.matches {
        let paths = trace_to_entrypoints(&raise_site.function, &qualified_graph, &name_graph, &entrypoint_functions, 20);

        let mut entrypoints_reached: HashSet<String> = HashSet::new();
        for path in &paths {
            if let Some(endpoint) = path.last() {
                entrypoints_reached.insert(endpoint.clone());
                if endpoint.contains("::") {
                    entrypoints_reached.insert(simple_name(endpoint.split("::").last().unwrap()).to_string());
                }
            }
        }

        let matching: Vec<Entrypoint> =
            model.entrypoints.iter().filter(|e| entrypoints_reached.contains(&e.function)).cloned().collect();

        traces.push(EntrypointTrace { raise_site: raise_site.clone(), paths, entrypoints: matching });
    }

    EntrypointsToResult { exception_type: exception_type.to_string(), include_subclasses, traces }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EntrypointsResult {
    pub http_routes: Vec<Entrypoint>,
    pub cli_scripts: Vec<Entrypoint>,
    pub other: HashMap<EntrypointKind, Vec<Entrypoint>>,
}

pub fn list_entrypoints(model: &ProgramModel) -> EntrypointsResult {
    let mut result = EntrypointsResult::default();
    for e in &model.entrypoints {
        match e.kind {
            EntrypointKind::HttpRoute => result.http_routes.push(e.clone()),
            EntrypointKind::CliScript => result.cli_scripts.push(e.clone()),
            other => result.other.entry(other).or_default().push(e.clone()),
        }
    }
    result
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditIssue {
    pub entrypoint: Entrypoint,
    pub uncaught: HashMap<String, Vec<RaiseSite>>,
    pub caught: HashMap<String, Vec<RaiseSite>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditResult {
    pub total_entrypoints: usize,
    pub issues: Vec<AuditIssue>,
    pub clean_count: usize,
}

pub fn audit_entrypoints(model: &ProgramModel) -> AuditResult {
    if model.entrypoints.is_empty() {
        return AuditResult::default();
    }

    let mut ctx = AnalysisContext::new();
    let propagation = propagate_exceptions(model, &mut ctx, ResolutionMode::Default, false, None, None);

    let mut issues = Vec::new();
    let mut clean_count = 0;

    for entrypoint in &model.entrypoints {
        let flow = compute_exception_flow(&entrypoint.function, model, &propagation);

        if !flow.uncaught.is_empty() {
            let real_uncaught: HashMap<String, Vec<RaiseSite>> = flow
                .uncaught
                .iter()
                .filter(|(k, _)| !flow_core::types::RERAISE_IDENTIFIERS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            if !real_uncaught.is_empty() {
                issues.push(AuditIssue { entrypoint: entrypoint.clone(), uncaught: real_uncaught, caught: flow.caught_by_global.clone() });
            } else {
                clean_count += 1;
            }
        } else {
            clean_count += 1;
        }
    }

    AuditResult { total_entrypoints: model.entrypoints.len(), issues, clean_count }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EscapesResult {
    pub function_name: String,
    pub entrypoint: Option<Entrypoint>,
    pub flow: ExceptionFlow,
    pub global_handlers: Vec<GlobalHandler>,
}

pub fn find_escapes(model: &ProgramModel, function_name: &str, resolution_mode: ResolutionMode) -> EscapesResult {
    let entrypoint = model.entrypoints.iter().find(|e| e.function == function_name).cloned();

    let forward_graph = build_forward_call_graph(model);
    let scope = compute_forward_reachability(function_name, model, &forward_graph);

    let mut ctx = AnalysisContext::new();
    let propagation = propagate_exceptions(model, &mut ctx, resolution_mode, true, Some(&scope), None);
    let flow = compute_exception_flow(function_name, model, &propagation);

    EscapesResult { function_name: function_name.to_string(), entrypoint, flow, global_handlers: model.global_handlers.clone() }
}

fn compute_reverse_reachability(
    raise_sites: &[RaiseSite],
    qualified_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
    name_graph: &HashMap<String, HashSet<FunctionKey>>,
) -> HashSet<String> {
    let mut reachable = HashSet::new();

    for raise_site in raise_sites {
        let func_key = format!("{}::{}", raise_site.file, raise_site.function);
        let mut worklist = vec![func_key];
        let mut visited: HashSet<String> = HashSet::new();

        while let Some(current) = worklist.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            reachable.insert(current.clone());
            let simple = current.split("::").last().map(simple_name).unwrap_or(&current).to_string();
            reachable.insert(simple.clone());

            if let Some(callers) = qualified_graph.get(&current) {
                for caller in callers {
                    if !visited.contains(caller) {
                        worklist.push(caller.clone());
                    }
                }
            }
            if let Some(callers) = name_graph.get(&simple) {
                for caller in callers {
                    if !visited.contains(caller) {
                        worklist.push(caller.clone());
                    }
                }
            }
        }
    }

    reachable
}

fn catch_site_catches_exception(catch_site: &CatchSite, types_to_find: &HashSet<String>, hierarchy: &ClassHierarchy) -> bool {
    if catch_site.is_bare_except {
        return true;
    }
    for caught_type in &catch_site.caught_types {
        let caught_simple = simple_name(caught_type);
        if types_to_find.contains(caught_type) || types_to_find.contains(caught_simple) {
            return true;
        }
        if flow_core::types::GENERIC_EXCEPTION_TYPES.contains(&caught_simple) {
            return true;
        }
        for t in types_to_find {
            if hierarchy.is_subclass_of(simple_name(t), caught_simple) {
                return true;
            }
        }
    }
    false
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CatchesResult {
    pub exception_type: String,
    pub include_subclasses: bool,
    pub local_catches: Vec<CatchSite>,
    pub global_handlers: Vec<GlobalHandler>,
    pub raise_site_count: usize,
}

pub fn find_catches(model: &ProgramModel, exception_type: &str, include_subclasses: bool) -> CatchesResult {
    let mut types_to_find: HashSet<String> = [exception_type.to_string()].into_iter().collect();
    if include_subclasses {
        let hierarchy = build_hierarchy(model);
        types_to_find.extend(hierarchy.get_all_subclasses(exception_type));
    }

    let raises_result = find_raises(model, exception_type, include_subclasses);
    if raises_result.matches.is_empty() {
        return CatchesResult { exception_type: exception_type.to_string(), include_subclasses, ..Default::default() };
    }

    let (qualified_graph, name_graph) = build_reverse_call_graph(model);
    let reachable = compute_reverse_reachability(&raises_result.matches, &qualified_graph, &name_graph);
    let hierarchy = build_hierarchy(model);

    let local_catches: Vec<CatchSite> = model
        .catch_sites
        .iter()
        .filter(|c| {
            let key = format!("{}::{}", c.file, c.function);
            let simple = simple_name(&c.function);
            (reachable.contains(&key) || reachable.contains(simple))
                && catch_site_catches_exception(c, &types_to_find, &hierarchy)
        })
        .cloned()
        .collect();

    let global_handlers: Vec<GlobalHandler> = model
        .global_handlers
        .iter()
        .filter(|h| {
            types_to_find.contains(&h.handled_type)
                || types_to_find.contains(simple_name(&h.handled_type))
                || types_to_find.iter().any(|t| hierarchy.is_subclass_of(t, &h.handled_type))
        })
        .cloned()
        .collect();

    CatchesResult {
        exception_type: exception_type.to_string(),
        include_subclasses,
        local_catches,
        global_handlers,
        raise_site_count: raises_result.matches.len(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum TraceChild {
    Direct(TraceNode),
    Polymorphic { function: FunctionKey, implementations: Vec<TraceNode>, raises: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceNode {
    pub function: String,
    pub qualified: FunctionKey,
    pub direct_raises: Vec<String>,
    pub propagated_raises: Vec<String>,
    pub calls: Vec<TraceChild>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceResult {
    pub function_name: String,
    pub entrypoint: Option<Entrypoint>,
    pub root: Option<TraceNode>,
    pub escaping_exceptions: HashSet<String>,
}

fn find_function_key(function_name: &str, propagated_raises: &HashMap<FunctionKey, HashSet<String>>, model: &ProgramModel) -> Option<FunctionKey> {
    for key in propagated_raises.keys() {
        if key.ends_with(&format!("::{function_name}")) || key.ends_with(&format!(".{function_name}")) {
            return Some(key.clone());
        }
        if key.contains("::") && simple_name(key.split("::").last().unwrap()) == function_name {
            return Some(key.clone());
        }
    }
    model.call_sites.iter().find(|c| c.caller_simple == function_name).map(|c| {
        if c.caller_qualified.is_empty() {
            format!("{}::{}", c.file, c.caller_simple)
        } else {
            c.caller_qualified.clone()
        }
    })
}

fn get_direct_raises_for_key(func_key: &str, direct_raises: &HashMap<FunctionKey, HashSet<String>>) -> HashSet<String> {
    if let Some(r) = direct_raises.get(func_key) {
        return r.clone();
    }
    let simple = func_key.split("::").last().map(simple_name).unwrap_or(func_key);
    for (key, raises) in direct_raises {
        let key_simple = key.split("::").last().map(simple_name).unwrap_or(key);
        if key_simple == simple {
            return raises.clone();
        }
    }
    HashSet::new()
}

/// Expand a callee to its concrete implementations when it names an
/// abstract method; otherwise returns the callee unchanged.
fn expand_callee(callee: &str, model: &ProgramModel) -> Vec<String> {
    let Some((class_name, method_name)) = callee.rsplit_once('.') else { return vec![callee.to_string()] };
    let hierarchy = build_hierarchy(model);
    let class_simple = simple_name(class_name);
    if !hierarchy.is_abstract_method(class_simple, method_name) {
        return vec![callee.to_string()];
    }
    let implementations = hierarchy.get_concrete_implementations(class_simple, method_name);
    if implementations.is_empty() {
        return vec![callee.to_string()];
    }

    implementations
        .into_iter()
        .map(|(impl_class, _)| {
            model
                .functions
                .values()
                .find(|f| f.name == method_name && f.qualified_name.contains(impl_class.as_str()))
                .map(|f| f.qualified_name.clone())
                .unwrap_or_else(|| format!("{impl_class}.{method_name}"))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn build_trace_node(
    func_key: &str,
    forward_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
    direct_raises: &HashMap<FunctionKey, HashSet<String>>,
    propagated_raises: &HashMap<FunctionKey, HashSet<String>>,
    model: &ProgramModel,
    max_depth: usize,
    show_all: bool,
    visited: &HashSet<String>,
    current_depth: usize,
) -> Option<TraceNode> {
    if current_depth >= max_depth || visited.contains(func_key) {
        return None;
    }
    let mut visited = visited.clone();
    visited.insert(func_key.to_string());

    let simple = func_key.split("::").last().map(simple_name).unwrap_or(func_key).to_string();
    let this_direct = get_direct_raises_for_key(func_key, direct_raises);
    let this_propagated = propagated_raises.get(func_key).cloned().unwrap_or_default();

    let mut callees = forward_graph.get(func_key).cloned().unwrap_or_default();
    if callees.is_empty() {
        for (key, v) in forward_graph {
            let key_simple = key.split("::").last().map(simple_name).unwrap_or(key);
            if key_simple == simple {
                callees = v.clone();
                break;
            }
        }
    }

    let mut sorted_callees: Vec<FunctionKey> = callees.into_iter().collect();
    sorted_callees.sort();

    let mut children = Vec::new();
    for callee in sorted_callees {
        let implementations = expand_callee(&callee, model);
        let mut callee_propagated: HashSet<String> = HashSet::new();
        for impl_key in &implementations {
            callee_propagated.extend(propagated_raises.get(impl_key).cloned().unwrap_or_default());
        }

        if !show_all && callee_propagated.is_empty() {
            continue;
        }

        if implementations.len() > 1 {
            let impl_nodes: Vec<TraceNode> = implementations
                .iter()
                .filter_map(|impl_key| {
                    build_trace_node(impl_key, forward_graph, direct_raises, propagated_raises, model, max_depth, show_all, &visited, current_depth + 1)
                })
                .collect();
            if !impl_nodes.is_empty() {
                let mut raises: Vec<String> = callee_propagated.into_iter().collect();
                raises.sort();
                children.push(TraceChild::Polymorphic { function: callee.clone(), implementations: impl_nodes, raises });
            }
        } else {
            let target = implementations.into_iter().next().unwrap_or_else(|| callee.clone());
            if let Some(node) =
                build_trace_node(&target, forward_graph, direct_raises, propagated_raises, model, max_depth, show_all, &visited, current_depth + 1)
            {
                children.push(TraceChild::Direct(node));
            }
        }
    }

    let mut direct_sorted: Vec<String> = this_direct.into_iter().collect();
    direct_sorted.sort();
    let mut propagated_sorted: Vec<String> = this_propagated.into_iter().collect();
    propagated_sorted.sort();

    Some(TraceNode { function: simple, qualified: func_key.to_string(), direct_raises: direct_sorted, propagated_raises: propagated_sorted, calls: children })
}

pub fn trace_function(model: &ProgramModel, function_name: &str, max_depth: usize, show_all: bool) -> TraceResult {
    let entrypoint = model.entrypoints.iter().find(|e| e.function == function_name).cloned();

    let mut ctx = AnalysisContext::new();
    let propagation = propagate_exceptions(model, &mut ctx, ResolutionMode::Default, false, None, None);
    let forward_graph = build_forward_call_graph(model);

    let func_key = find_function_key(function_name, &propagation.propagated_raises, model);
    let escaping = func_key.as_ref().and_then(|k| propagation.propagated_raises.get(k)).cloned().unwrap_or_default();

    let root = func_key.as_ref().and_then(|key| {
        build_trace_node(key, &forward_graph, &propagation.direct_raises, &propagation.propagated_raises, model, max_depth, show_all, &HashSet::new(), 0)
    });

    TraceResult { function_name: function_name.to_string(), entrypoint, root, escaping_exceptions: escaping }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubclassInfo {
    pub name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub is_abstract: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubclassesResult {
    pub class_name: String,
    pub base_class_file: Option<String>,
    pub base_class_line: Option<u32>,
    pub is_abstract: bool,
    pub abstract_methods: HashSet<String>,
    pub subclasses: Vec<SubclassInfo>,
}

pub fn find_subclasses(model: &ProgramModel, class_name: &str) -> SubclassesResult {
    let hierarchy = build_hierarchy(model);

    let mut resolved_name = class_name.to_string();
    let mut base_class = hierarchy.get_class(class_name).cloned();
    if base_class.is_none() {
        for name in hierarchy.all_class_names() {
            if name.ends_with(class_name) {
                if let Some(cls) = hierarchy.get_class(&name) {
                    base_class = Some(cls.clone());
                    resolved_name = name.to_string();
                    break;
                }
            }
        }
    }

    let mut subclasses = Vec::new();
    if base_class.is_some() {
        let mut names: Vec<String> = hierarchy.get_all_subclasses(&resolved_name).into_iter().collect();
        names.sort();
        for name in names {
            let cls = hierarchy.get_class(&name);
            subclasses.push(SubclassInfo {
                name: name.clone(),
                file: cls.map(|c| c.file.clone()),
                line: cls.map(|c| c.line),
                is_abstract: cls.map(|c| c.is_abstract).unwrap_or(false),
            });
        }
    }

    SubclassesResult {
        class_name: resolved_name,
        base_class_file: base_class.as_ref().map(|c| c.file.clone()),
        base_class_line: base_class.as_ref().map(|c| c.line),
        is_abstract: base_class.as_ref().map(|c| c.is_abstract).unwrap_or(false),
        abstract_methods: base_class.map(|c| c.abstract_methods.into_iter().collect()).unwrap_or_default(),
        subclasses,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InitResult {
    pub functions_count: usize,
    pub http_routes_count: usize,
    pub cli_scripts_count: usize,
    pub exception_classes_count: usize,
    pub global_handlers_count: usize,
    pub frameworks_detected: Vec<String>,
}

pub fn get_init_info(model: &ProgramModel) -> InitResult {
    let http_routes: Vec<&Entrypoint> = model.entrypoints.iter().filter(|e| e.kind == EntrypointKind::HttpRoute).collect();
    let cli_scripts: Vec<&Entrypoint> = model.entrypoints.iter().filter(|e| e.kind == EntrypointKind::CliScript).collect();

    let mut frameworks = Vec::new();
    if http_routes.iter().any(|e| e.metadata.get("framework").map(|f| f == "flask").unwrap_or(false)) {
        frameworks.push("Flask".to_string());
    }
    if http_routes.iter().any(|e| e.metadata.get("framework").map(|f| f == "fastapi").unwrap_or(false)) {
        frameworks.push("FastAPI".to_string());
    }
    if http_routes.iter().any(|e| e.metadata.get("framework").map(|f| f == "django").unwrap_or(false)) {
        frameworks.push("Django".to_string());
    }
    if !cli_scripts.is_empty() {
        frameworks.push("CLI scripts".to_string());
    }

    InitResult {
        functions_count: model.functions.len(),
        http_routes_count: http_routes.len(),
        cli_scripts_count: cli_scripts.len(),
        exception_classes_count: find_exceptions(model).classes.len(),
        global_handlers_count: model.global_handlers.len(),
        frameworks_detected: frameworks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::types::*;

    fn model_with_raise() -> ProgramModel {
        let mut model = ProgramModel::default();
        let f = FunctionDef {
            name: "inner".into(),
            qualified_name: "inner".into(),
            file: "a.py".into(),
            line: 1,
            is_method: false,
            is_async: false,
            containing_class: None,
            return_type: None,
        };
        model.functions.insert(f.key(), f);
        model.raise_sites.push(RaiseSite {
            file: "a.py".into(),
            line: 2,
            function: "inner".into(),
            exception_type: "ValueError".into(),
            is_bare_raise: false,
            snippet: "raise ValueError()".into(),
            message_expr: None,
        });
        model.entrypoints.push(Entrypoint {
            file: "a.py".into(),
            function: "inner".into(),
            line: 1,
            kind: EntrypointKind::CliScript,
            metadata: HashMap::new(),
        });
        model
    }

    #[test]
    fn find_raises_matches_exact_type() {
        let model = model_with_raise();
        let result = find_raises(&model, "ValueError", false);
        assert_eq!(result.matches.len(), 1);
    }

    #[test]
    fn get_stats_counts_everything() {
        let model = model_with_raise();
        let stats = get_stats(&model);
        assert_eq!(stats.functions, 1);
        assert_eq!(stats.raise_sites, 1);
        assert_eq!(stats.cli_scripts, 1);
    }

    #[test]
    fn audit_flags_uncaught_entrypoint() {
        let model = model_with_raise();
        let audit = audit_entrypoints(&model);
        assert_eq!(audit.issues.len(), 1);
        assert!(audit.issues[0].uncaught.contains_key("ValueError"));
    }

    #[test]
    fn find_similar_names_ranks_close_matches() {
        let candidates = vec!["process_item".to_string(), "unrelated".to_string()];
        let matches = find_similar_names("process_items", &candidates, 3);
        assert_eq!(matches[0], "process_item");
    }
}
