//! `flow routes-to <exception-type> [--subclasses] [--max-depth N] [--max-paths N]`
//! — trace raise sites forward to the entrypoints they can reach, across
//! the whole project rather than one framework's entrypoint set.

use flow_analyze::integration_queries::trace_routes_to_exception_bounded;
use flow_analyze::integrations::{Integration, IntegrationData};
use flow_output::OutputFormatter;

use crate::project::Project;

/// Stand-in `Integration` spanning every detected entrypoint, used only to
/// satisfy `trace_routes_to_exception`'s signature when the caller didn't
/// scope the trace to one framework.
struct WholeProjectIntegration;

impl Integration for WholeProjectIntegration {
    fn name(&self) -> &'static str {
        "project"
    }
    fn detect(&self, _source: &str, _file_path: &str) -> IntegrationData {
        IntegrationData::default()
    }
}

pub fn run(
    formatter: &dyn OutputFormatter,
    _verbose: bool,
    exception_type: String,
    subclasses: bool,
    max_depth: usize,
    max_paths: usize,
) -> i32 {
    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow routes-to: {e}");
            return 2;
        }
    };
    let model = project.build_model();
    let entrypoints = model.entrypoints.clone();
    let result = trace_routes_to_exception_bounded(
        &model,
        &WholeProjectIntegration,
        &entrypoints,
        &exception_type,
        subclasses,
        max_depth,
        max_paths,
    );
    let found = !result.traces.is_empty();
    println!("{}", formatter.format_routes_to(&result));
    if found { 0 } else { 1 }
}
