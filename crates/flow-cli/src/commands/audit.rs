//! `flow audit [--framework <name>]` — list every entrypoint (or every
//! entrypoint for one framework) and what escapes it uncaught.

use flow_analyze::{integration_queries, integrations, queries};
use flow_output::OutputFormatter;

use crate::project::Project;

pub fn run(formatter: &dyn OutputFormatter, _verbose: bool, framework: Option<String>) -> i32 {
    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow audit: {e}");
            return 2;
        }
    };
    let model = project.build_model();

    let Some(framework) = framework else {
        let result = queries::audit_entrypoints(&model);
        let has_issues = !result.issues.is_empty();
        println!("{}", formatter.format_audit(&result));
        return if has_issues { 1 } else { 0 };
    };

    let all_integrations = integrations::load_integrations(&project.flow_dir);
    let Some(integration) = all_integrations.iter().find(|i| i.name() == framework) else {
        let mut known: Vec<&str> = all_integrations.iter().map(|i| i.name()).collect();
        known.dedup();
        eprintln!("flow audit: unknown framework '{framework}' (known: {})", known.join(", "));
        return 2;
    };

    let entrypoints: Vec<_> =
        model.entrypoints.iter().filter(|e| e.metadata.get("framework").map(String::as_str) == Some(framework.as_str())).cloned().collect();

    let result = integration_queries::audit_integration(&model, integration.as_ref(), &entrypoints, &model.global_handlers, Some(&project.config));
    let has_issues = !result.issues.is_empty();
    println!("{}", formatter.format_integration_audit(&result));
    if has_issues { 1 } else { 0 }
}
