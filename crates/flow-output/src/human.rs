use flow_analyze::integration_queries::{IntegrationAuditResult, RoutesToResult};
use flow_analyze::queries::{
    AuditResult, CatchesResult, EntrypointsResult, EscapesResult, ExceptionsResult, InitResult,
    RaisesResult, StatsResult, SubclassesResult, TraceResult,
};
use flow_analyze::types::ExceptionFlow;
use flow_core::types::RaiseSite;

use crate::OutputFormatter;

pub struct HumanFormatter;

fn format_raise_sites(label: &str, sites: &[RaiseSite], out: &mut String) {
    out.push_str(&format!("  {label} ({}):\n", sites.len()));
    for s in sites {
        out.push_str(&format!("    {}:{} in {}\n", s.file, s.line, s.function));
    }
}

fn format_flow(flow: &ExceptionFlow, out: &mut String) {
    if flow.is_empty() {
        out.push_str("  nothing escapes\n");
        return;
    }
    for (exc, sites) in &flow.uncaught {
        format_raise_sites(&format!("UNCAUGHT {exc}"), sites, out);
    }
    for (exc, sites) in &flow.caught_by_generic {
        format_raise_sites(&format!("caught only by generic handler: {exc}"), sites, out);
    }
    for (exc, sites) in &flow.caught_locally {
        format_raise_sites(&format!("caught locally: {exc}"), sites, out);
    }
    for (exc, sites) in &flow.caught_by_global {
        format_raise_sites(&format!("caught by global handler: {exc}"), sites, out);
    }
    for (exc, sites) in &flow.caught_by_remote_global {
        format_raise_sites(&format!("caught by a handler in another file: {exc}"), sites, out);
    }
    for (exc, pairs) in &flow.framework_handled {
        out.push_str(&format!("  framework-handled ({}): {exc}\n", pairs.len()));
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_init(&self, result: &InitResult) -> String {
        let mut out = format!(
            "{} function(s), {} HTTP route(s), {} CLI script(s), {} exception class(es), {} global handler(s)\n",
            result.functions_count,
            result.http_routes_count,
            result.cli_scripts_count,
            result.exception_classes_count,
            result.global_handlers_count,
        );
        if !result.frameworks_detected.is_empty() {
            out.push_str(&format!("frameworks: {}\n", result.frameworks_detected.join(", ")));
        }
        out
    }

    fn format_audit(&self, result: &AuditResult) -> String {
        if result.issues.is_empty() {
            return format!("{} entrypoint(s), all clean\n", result.total_entrypoints);
        }
        let mut out = format!(
            "{} entrypoint(s), {} clean, {} with uncaught exceptions\n",
            result.total_entrypoints,
            result.clean_count,
            result.issues.len(),
        );
        for issue in &result.issues {
            out.push_str(&format!(
                "\n{} [{}:{}]\n",
                issue.entrypoint.function, issue.entrypoint.file, issue.entrypoint.line,
            ));
            for (exc, sites) in &issue.uncaught {
                format_raise_sites(&format!("uncaught: {exc}"), sites, &mut out);
            }
        }
        out
    }

    fn format_integration_audit(&self, result: &IntegrationAuditResult) -> String {
        if result.issues.is_empty() {
            return format!(
                "[{}] {} entrypoint(s), all clean\n",
                result.integration_name, result.total_entrypoints,
            );
        }
        let mut out = format!(
            "[{}] {} entrypoint(s), {} clean, {} with uncaught exceptions\n",
            result.integration_name, result.total_entrypoints, result.clean_count, result.issues.len(),
        );
        for issue in &result.issues {
            out.push_str(&format!(
                "\n{} [{}:{}]\n",
                issue.entrypoint.function, issue.entrypoint.file, issue.entrypoint.line,
            ));
            for (exc, sites) in &issue.uncaught {
                format_raise_sites(&format!("uncaught: {exc}"), sites, &mut out);
            }
            for (exc, sites) in &issue.caught_by_generic {
                format_raise_sites(&format!("caught only by generic handler: {exc}"), sites, &mut out);
            }
        }
        out
    }

    fn format_raises(&self, result: &RaisesResult) -> String {
        let mut out = format!(
            "{} raise site(s) of {} ({} type(s) searched)\n",
            result.matches.len(),
            result.exception_type,
            result.types_searched.len(),
        );
        for m in &result.matches {
            out.push_str(&format!("  {}:{} in {} — {}\n", m.file, m.line, m.function, m.snippet));
        }
        out
    }

    fn format_catches(&self, result: &CatchesResult) -> String {
        let mut out = format!(
            "{} local catch site(s), {} global handler(s) for {} ({} raise site(s) matched)\n",
            result.local_catches.len(),
            result.global_handlers.len(),
            result.exception_type,
            result.raise_site_count,
        );
        for c in &result.local_catches {
            out.push_str(&format!("  {}:{} in {}\n", c.file, c.line, c.function));
        }
        for h in &result.global_handlers {
            out.push_str(&format!("  global: {}:{} in {} ({})\n", h.file, h.line, h.function, h.handled_type));
        }
        out
    }

    fn format_escapes(&self, result: &EscapesResult) -> String {
        let mut out = format!("escapes from {}\n", result.function_name);
        if let Some(ep) = &result.entrypoint {
            out.push_str(&format!("  entrypoint: {}:{}\n", ep.file, ep.line));
        }
        format_flow(&result.flow, &mut out);
        out
    }

    fn format_routes_to(&self, result: &RoutesToResult) -> String {
        let mut out = format!(
            "[{}] {} route(s) to {} ({} type(s) searched)\n",
            result.integration_name,
            result.traces.len(),
            result.exception_type,
            result.types_searched.len(),
        );
        for trace in &result.traces {
            out.push_str(&format!(
                "\n{}:{} in {} — {} path(s), {} entrypoint(s) reached\n",
                trace.raise_site.file, trace.raise_site.line, trace.raise_site.function,
                trace.paths.len(), trace.entrypoints.len(),
            ));
            for path in &trace.paths {
                out.push_str(&format!("    {}\n", path.join(" <- ")));
            }
        }
        out
    }

    fn format_trace(&self, result: &TraceResult) -> String {
        let mut out = format!("trace of {}\n", result.function_name);
        if let Some(ep) = &result.entrypoint {
            out.push_str(&format!("  entrypoint: {}:{}\n", ep.file, ep.line));
        }
        if !result.escaping_exceptions.is_empty() {
            let mut types: Vec<&String> = result.escaping_exceptions.iter().collect();
            types.sort();
            out.push_str(&format!(
                "  escaping: {}\n",
                types.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
            ));
        }
        out
    }

    fn format_subclasses(&self, result: &SubclassesResult) -> String {
        let mut out = format!("{} ({} subclass(es))\n", result.class_name, result.subclasses.len());
        for s in &result.subclasses {
            let loc = match (&s.file, s.line) {
                (Some(f), Some(l)) => format!(" at {f}:{l}"),
                _ => String::new(),
            };
            out.push_str(&format!("  {}{}{}\n", s.name, loc, if s.is_abstract { " (abstract)" } else { "" }));
        }
        out
    }

    fn format_exceptions(&self, result: &ExceptionsResult) -> String {
        let mut out = format!("{} exception class(es), {} root(s)\n", result.classes.len(), result.roots.len());
        let mut names: Vec<&String> = result.classes.keys().collect();
        names.sort();
        for name in names {
            let cls = &result.classes[name];
            out.push_str(&format!("  {} [{}:{}] bases: {}\n", cls.name, cls.file, cls.line, cls.bases.join(", ")));
        }
        out
    }

    fn format_entrypoints(&self, result: &EntrypointsResult) -> String {
        let mut out = format!(
            "{} HTTP route(s), {} CLI script(s)\n",
            result.http_routes.len(),
            result.cli_scripts.len(),
        );
        for e in result.http_routes.iter().chain(result.cli_scripts.iter()) {
            out.push_str(&format!("  {}:{} — {}\n", e.file, e.line, e.function));
        }
        out
    }

    fn format_stats(&self, result: &StatsResult) -> String {
        format!(
            "{} function(s), {} class(es), {} raise site(s), {} catch site(s), {} call site(s)\n{} entrypoint(s) ({} HTTP route(s), {} CLI script(s)), {} global handler(s)\n",
            result.functions, result.classes, result.raise_sites, result.catch_sites, result.call_sites,
            result.entrypoints, result.http_routes, result.cli_scripts, result.global_handlers,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_analyze::queries::get_stats;
    use flow_core::types::ProgramModel;

    #[test]
    fn stats_on_empty_model_reports_zeros() {
        let model = ProgramModel::default();
        let out = HumanFormatter.format_stats(&get_stats(&model));
        assert!(out.contains("0 function(s)"));
    }

    #[test]
    fn init_lists_detected_frameworks() {
        let result = InitResult {
            functions_count: 1,
            http_routes_count: 1,
            cli_scripts_count: 0,
            exception_classes_count: 0,
            global_handlers_count: 0,
            frameworks_detected: vec!["FastAPI".into()],
        };
        let out = HumanFormatter.format_init(&result);
        assert!(out.contains("frameworks: FastAPI"));
    }
}
