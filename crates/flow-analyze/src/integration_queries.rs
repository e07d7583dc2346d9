//! Integration-aware audit and routing queries: the same propagation
//! result as `queries.rs`, but classified against one framework's
//! `handled_exceptions()` and `FlowConfig::handled_base_classes`, and
//! scoped to that framework's own entrypoint set.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use flow_core::config::FlowConfig;
use flow_core::hierarchy::ClassHierarchy;
use flow_core::types::{simple_name, Entrypoint, FunctionKey, GlobalHandler, ProgramModel, RaiseSite};

use crate::context::AnalysisContext;
use crate::integrations::Integration;
use crate::propagate::{
    build_forward_call_graph, build_hierarchy, build_name_to_qualified, build_reverse_call_graph,
    compute_reachable_functions, propagate_exceptions,
};
use crate::queries::find_raises;
use crate::types::{compute_confidence, ExceptionEvidence, ExceptionFlow, PropagationResult};

/// Drop callees matching an async-boundary glob (Celery's `.delay()`,
/// `.apply_async()`) from the forward call graph — exceptions raised in a
/// spawned background task don't propagate back to the caller.
fn filter_async_boundaries(
    forward_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
    config: &FlowConfig,
) -> HashMap<FunctionKey, HashSet<FunctionKey>> {
    forward_graph
        .iter()
        .filter_map(|(caller, callees)| {
            let filtered: HashSet<FunctionKey> =
                callees.iter().filter(|c| !config.is_async_boundary(c.as_str())).cloned().collect();
            if filtered.is_empty() {
                None
            } else {
                Some((caller.clone(), filtered))
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn compute_exception_flow_for_integration(
    function_name: &str,
    model: &ProgramModel,
    propagation: &PropagationResult,
    integration: &dyn Integration,
    global_handlers: &[GlobalHandler],
    forward_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
    hierarchy: &ClassHierarchy,
    config: Option<&FlowConfig>,
    entrypoint_file: Option<&str>,
) -> ExceptionFlow {

    let mut flow = ExceptionFlow::default();
    let handled_base_classes: &[String] =
        config.map(|c| c.handled_base_classes.as_slice()).unwrap_or(&[]);

    let func_key = if propagation.propagated_raises.contains_key(function_name) {
        Some(function_name.to_string())
    } else {
        propagation
            .propagated_raises
            .keys()
            .find(|key| {
                key.contains("::")
                    && (key.split("::").last() == Some(function_name)
                        || key.split("::").last().map(simple_name) == Some(function_name))
            })
            .cloned()
    };

    let Some(func_key) = func_key else { return flow };

    let reachable = compute_reachable_functions(&func_key, model, propagation, Some(forward_graph), None);

    let escaping = propagation.propagated_raises.get(&func_key).cloned().unwrap_or_default();
    let evidence_map = propagation.propagated_with_evidence.get(&func_key);

    for exc_type in escaping {
        let exc_simple = simple_name(&exc_type);

        let raise_sites: Vec<RaiseSite> = model
            .raise_sites
            .iter()
            .filter(|r| {
                (r.exception_type == exc_type || simple_name(&r.exception_type) == exc_simple)
                    && (reachable.contains(&r.function)
                        || reachable.contains(&format!("{}::{}", r.file, r.function)))
            })
            .cloned()
            .collect();

        if let Some(evidence_map) = evidence_map {
            for ((etype, _, _), prop_raise) in evidence_map {
                if etype == &exc_type {
                    flow.evidence.entry(exc_type.clone()).or_default().push(ExceptionEvidence {
                        raise_site: prop_raise.raise_site.clone(),
                        call_path: prop_raise.path.clone(),
                        confidence: compute_confidence(&prop_raise.path),
                    });
                }
            }
        }

        let handler = global_handlers.iter().find(|h| {
            simple_name(&h.handled_type) == exc_simple
                || hierarchy.is_subclass_of(exc_simple, &h.handled_type)
        });

        if let Some(handler) = handler {
            if handler.is_generic() {
                flow.caught_by_generic.entry(exc_type.clone()).or_default().extend(raise_sites);
            } else {
                let same_file = entrypoint_file.map(|f| f == handler.file).unwrap_or(false);
                if same_file {
                    flow.caught_by_global.entry(exc_type.clone()).or_default().extend(raise_sites);
                } else {
                    flow.caught_by_remote_global.entry(exc_type.clone()).or_default().extend(raise_sites);
                }
            }
            continue;
        }

        if integration.handled_exceptions().iter().any(|h| simple_name(h) == exc_simple || exc_type == *h) {
            let response = integration
                .get_exception_response(&exc_type)
                .or_else(|| integration.get_exception_response(exc_simple))
                .unwrap_or_else(|| integration.name().to_string());
            flow.framework_handled
                .entry(exc_type.clone())
                .or_default()
                .extend(raise_sites.iter().cloned().map(|rs| (rs, response.clone())));
            continue;
        }

        let handled_by_config = handled_base_classes.iter().any(|base| {
            let base_simple = simple_name(base);
            exc_simple == base_simple
                || &exc_type == base
                || hierarchy.is_subclass_of(exc_simple, base_simple)
                || hierarchy.is_subclass_of(&exc_type, base)
        });

        if handled_by_config {
            flow.framework_handled.entry(exc_type.clone()).or_default().extend(
                raise_sites.iter().cloned().map(|rs| (rs, "handled by config".to_string())),
            );
            continue;
        }

        flow.uncaught.entry(exc_type.clone()).or_default().extend(raise_sites);
    }

    flow
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationAuditIssue {
    pub entrypoint: Entrypoint,
    pub uncaught: HashMap<String, Vec<RaiseSite>>,
    pub caught_by_generic: HashMap<String, Vec<RaiseSite>>,
    pub caught_by_remote: HashMap<String, Vec<RaiseSite>>,
    pub caught: HashMap<String, Vec<RaiseSite>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrationAuditResult {
    pub integration_name: String,
    pub total_entrypoints: usize,
    pub issues: Vec<IntegrationAuditIssue>,
    pub clean_count: usize,
}

pub fn audit_integration(
    model: &ProgramModel,
    integration: &dyn Integration,
    entrypoints: &[Entrypoint],
    global_handlers: &[GlobalHandler],
    config: Option<&FlowConfig>,
) -> IntegrationAuditResult {
    if entrypoints.is_empty() {
        return IntegrationAuditResult { integration_name: integration.name().to_string(), ..Default::default() };
    }

    let mut ctx = AnalysisContext::new();
    let propagation = propagate_exceptions(
        model,
        &mut ctx,
        flow_core::config::ResolutionMode::Default,
        true,
        None,
        None,
    );
    let hierarchy = build_hierarchy(model);

    let mut forward_graph = build_forward_call_graph(model);
    if let Some(cfg) = config {
        if !cfg.async_boundaries.is_empty() {
            forward_graph = filter_async_boundaries(&forward_graph, cfg);
        }
    }
    let _name_to_qualified = build_name_to_qualified(&propagation);

    let mut issues = Vec::new();
    let mut clean_count = 0;

    for entrypoint in entrypoints {
        let flow = compute_exception_flow_for_integration(
            &entrypoint.function,
            model,
            &propagation,
            integration,
            global_handlers,
            &forward_graph,
            &hierarchy,
            config,
            Some(entrypoint.file.as_str()),
        );

        let real_uncaught: HashMap<String, Vec<RaiseSite>> = flow
            .uncaught
            .iter()
            .filter(|(k, _)| !flow_core::types::RERAISE_IDENTIFIERS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let real_generic: HashMap<String, Vec<RaiseSite>> = flow
            .caught_by_generic
            .iter()
            .filter(|(k, _)| !flow_core::types::RERAISE_IDENTIFIERS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let real_remote: HashMap<String, Vec<RaiseSite>> = flow
            .caught_by_remote_global
            .iter()
            .filter(|(k, _)| !flow_core::types::RERAISE_IDENTIFIERS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if !real_uncaught.is_empty() || !real_generic.is_empty() {
            issues.push(IntegrationAuditIssue {
                entrypoint: entrypoint.clone(),
                uncaught: real_uncaught,
                caught_by_generic: real_generic,
                caught_by_remote: real_remote,
                caught: flow.caught_by_global.clone(),
            });
        } else {
            clean_count += 1;
        }
    }

    IntegrationAuditResult {
        integration_name: integration.name().to_string(),
        total_entrypoints: entrypoints.len(),
        issues,
        clean_count,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrationEntrypointsResult {
    pub integration_name: String,
    pub entrypoints: Vec<Entrypoint>,
}

pub fn list_integration_entrypoints(
    integration: &dyn Integration,
    entrypoints: &[Entrypoint],
) -> IntegrationEntrypointsResult {
    IntegrationEntrypointsResult {
        integration_name: integration.name().to_string(),
        entrypoints: entrypoints.to_vec(),
    }
}

const MAX_REACHABILITY_ITERATIONS: usize = 10_000;

/// Forward BFS outward from every entrypoint, pruning the search space
/// `_trace_to_entrypoints` walks backward over. Bounded at
/// `MAX_REACHABILITY_ITERATIONS` worklist pops as a defensive cap against
/// pathological call graphs.
fn compute_entrypoint_reachability(
    qualified_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
    name_graph: &HashMap<String, HashSet<FunctionKey>>,
    entrypoint_functions: &HashSet<String>,
) -> HashSet<String> {

    let mut reachable: HashSet<String> = entrypoint_functions.clone();

    let mut forward_graph: HashMap<String, HashSet<String>> = HashMap::new();
    for (callee, callers) in qualified_graph {
        for caller in callers {
            forward_graph.entry(caller.clone()).or_default().insert(callee.clone());
        }
    }
    for (callee, callers) in name_graph {
        for caller in callers {
            forward_graph.entry(caller.clone()).or_default().insert(callee.clone());
        }
    }

    let mut simple_to_qualified: HashMap<&str, Vec<&String>> = HashMap::new();
    for key in forward_graph.keys() {
        simple_to_qualified.entry(simple_name(key)).or_default().push(key);
    }

    let mut worklist: Vec<String> = entrypoint_functions.iter().cloned().collect();
    let mut iterations = 0;

    while let Some(func) = worklist.pop() {
        iterations += 1;
        if iterations >= MAX_REACHABILITY_ITERATIONS {
            break;
        }

        let func_simple = simple_name(&func).to_string();
        let mut callees: HashSet<String> = forward_graph.get(&func).cloned().unwrap_or_default();
        if let Some(keys) = simple_to_qualified.get(func_simple.as_str()) {
            for key in keys {
                callees.extend(forward_graph.get(*key).cloned().unwrap_or_default());
            }
        }

        for callee in callees {
            let callee_simple = simple_name(&callee).to_string();
            if !reachable.contains(&callee) {
                reachable.insert(callee.clone());
                reachable.insert(callee_simple.clone());
                worklist.push(callee);
            }
            if !reachable.contains(&callee_simple) {
                reachable.insert(callee_simple.clone());
                worklist.push(callee_simple);
            }
        }
    }

    reachable
}

pub const DEFAULT_MAX_TRACE_DEPTH: usize = 20;
pub const DEFAULT_MAX_TRACE_PATHS: usize = 150;

fn get_callers_from_graphs(
    function_name: &str,
    qualified_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
    name_graph: &HashMap<String, HashSet<FunctionKey>>,
) -> HashSet<FunctionKey> {
    let direct = qualified_graph.get(function_name).cloned().unwrap_or_default();
    if !direct.is_empty() {
        return direct;
    }
    let simple = if function_name.contains("::") {
        simple_name(function_name.split("::").last().unwrap())
    } else {
        function_name
    };
    name_graph.get(simple).cloned().unwrap_or_default()
}

/// Bounded backward DFS with reachability pruning: a caller not reachable
/// from any entrypoint can never lead to one, so it's skipped without
/// recursing into it.
#[allow(clippy::too_many_arguments)]
fn trace_to_entrypoints(
    function_name: &str,
    qualified_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
    name_graph: &HashMap<String, HashSet<FunctionKey>>,
    entrypoint_functions: &HashSet<String>,
    reachable_from_entrypoints: &HashSet<String>,
    max_depth: usize,
    max_paths: usize,
) -> Vec<Vec<String>> {

    let mut paths = Vec::new();

    #[allow(clippy::too_many_arguments)]
    fn dfs(
        current: &str,
        path: &[String],
        visited: &HashSet<String>,
        qualified_graph: &HashMap<FunctionKey, HashSet<FunctionKey>>,
        name_graph: &HashMap<String, HashSet<FunctionKey>>,
        entrypoint_functions: &HashSet<String>,
        reachable: &HashSet<String>,
        max_depth: usize,
        max_paths: usize,
        paths: &mut Vec<Vec<String>>,
    ) {
        if paths.len() >= max_paths || path.len() > max_depth || visited.contains(current) {
            return;
        }
        let mut visited = visited.clone();
        visited.insert(current.to_string());

        let current_qualified = if current.contains("::") { current.split("::").last().unwrap() } else { current };
        let current_simple = simple_name(current_qualified);

        if entrypoint_functions.contains(current)
            || entrypoint_functions.contains(current_qualified)
            || entrypoint_functions.contains(current_simple)
        {
            paths.push(path.to_vec());
            return;
        }

        for caller in get_callers_from_graphs(current, qualified_graph, name_graph) {
            if paths.len() >= max_paths {
                return;
            }
            let caller_qualified = if caller.contains("::") { caller.split("::").last().unwrap() } else { caller.as_str() };
            let caller_simple = simple_name(caller_qualified);
            if !reachable.contains(&caller) && !reachable.contains(caller_qualified) && !reachable.contains(caller_simple) {
                continue;
            }
            let mut next_path = path.to_vec();
            next_path.push(caller.clone());
            dfs(&caller, &next_path, &visited, qualified_graph, name_graph, entrypoint_functions, reachable, max_depth, max_paths, paths);
        }
    }

    dfs(
        function_name,
        &[function_name.to_string()],
        &HashSet::new(),
        qualified_graph,
        name_graph,
        entrypoint_functions,
        reachable_from_entrypoints,
        max_depth,
        max_paths,
        &mut paths,
    );
    paths
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationEntrypointTrace {
    pub raise_site: RaiseSite,
    pub paths: Vec<Vec<String>>,
    pub entrypoints: Vec<Entrypoint>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutesToResult {
    pub integration_name: String,
    pub exception_type: String,
    pub include_subclasses: bool,
    pub types_searched: HashSet<String>,
    pub traces: Vec<IntegrationEntrypointTrace>,
}

pub fn trace_routes_to_exception(
    model: &ProgramModel,
    integration: &dyn Integration,
    entrypoints: &[Entrypoint],
    exception_type: &str,
    include_subclasses: bool,
) -> RoutesToResult {
    trace_routes_to_exception_bounded(
        model,
        integration,
        entrypoints,
        exception_type,
        include_subclasses,
        DEFAULT_MAX_TRACE_DEPTH,
        DEFAULT_MAX_TRACE_PATHS,
    )
}

/// As [`trace_routes_to_exception`], with the backward-trace depth/path
/// caps overridable (CLI's `--max-depth`/`--max-paths`).
#[allow(clippy::too_many_arguments)]
pub fn trace_routes_to_exception_bounded(
    model: &ProgramModel,
    integration: &dyn Integration,
    entrypoints: &[Entrypoint],
    exception_type: &str,
    include_subclasses: bool,
    max_depth: usize,
    max_paths: usize,
) -> RoutesToResult {

    let raises_result = find_raises(model, exception_type, include_subclasses);
    let (qualified_graph, name_graph) = build_reverse_call_graph(model);
    let entrypoint_functions: HashSet<String> = entrypoints.iter().map(|e| e.function.clone()).collect();

    let reachable = compute_entrypoint_reachability(&qualified_graph, &name_graph, &entrypoint_functions);

    let mut traces = Vec::new();
    for raise_site in &raises_result.matches {
        let qualified_function = format!("{}::{}", raise_site.file, raise_site.function);
        let paths = trace_to_entrypoints(
            &qualified_function,
            &qualified_graph,
            &name_graph,
            &entrypoint_functions,
            &reachable,
            max_depth,
            max_paths,
        );

        let mut entrypoints_reached: HashSet<String> = HashSet::new();
        for path in &paths {
            if let Some(endpoint) = path.last() {
                entrypoints_reached.insert(endpoint.clone());
                if endpoint.contains("::") {
                    let part = endpoint.split("::").last().unwrap();
                    entrypoints_reached.insert(part.to_string());
                    entrypoints_reached.insert(simple_name(part).to_string());
                }
            }
        }

        let matching: Vec<Entrypoint> =
            entrypoints.iter().filter(|e| entrypoints_reached.contains(&e.function)).cloned().collect();

        traces.push(IntegrationEntrypointTrace { raise_site: raise_site.clone(), paths, entrypoints: matching });
    }

    RoutesToResult {
        integration_name: integration.name().to_string(),
        exception_type: exception_type.to_string(),
        include_subclasses,
        types_searched: raises_result.types_searched,
        traces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::types::*;

    struct StubIntegration;
    impl Integration for StubIntegration {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn detect(&self, _source: &str, _file_path: &str) -> crate::integrations::IntegrationData {
            crate::integrations::IntegrationData::default()
        }
        fn handled_exceptions(&self) -> &[&str] {
            &["HTTPException"]
        }
    }

    fn model_with_raise() -> ProgramModel {
        let mut model = ProgramModel::default();
        let f = FunctionDef {
            name: "view".into(),
            qualified_name: "view".into(),
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
            function: "view".into(),
            exception_type: "HTTPException".into(),
            is_bare_raise: false,
            snippet: "raise HTTPException()".into(),
            message_expr: None,
        });
        model
    }

    #[test]
    fn framework_handled_exception_is_not_an_issue() {
        let model = model_with_raise();
        let entrypoint = Entrypoint {
            file: "a.py".into(),
            function: "view".into(),
            line: 1,
            kind: EntrypointKind::HttpRoute,
            metadata: HashMap::new(),
        };
        let audit = audit_integration(&model, &StubIntegration, &[entrypoint], &[], None);
        assert_eq!(audit.clean_count, 1);
        assert!(audit.issues.is_empty());
    }

    #[test]
    fn empty_entrypoints_short_circuits() {
        let model = model_with_raise();
        let audit = audit_integration(&model, &StubIntegration, &[], &[], None);
        assert_eq!(audit.total_entrypoints, 0);
    }
}
