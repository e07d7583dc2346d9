//! `flow escapes <function>`.

use flow_analyze::queries::find_escapes;
use flow_output::OutputFormatter;

use crate::project::Project;

pub fn run(formatter: &dyn OutputFormatter, _verbose: bool, function: String) -> i32 {
    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow escapes: {e}");
            return 2;
        }
    };
    let model = project.build_model();
    let result = find_escapes(&model, &function, project.config.resolution_mode);
    let has_uncaught = !result.flow.uncaught.is_empty();
    println!("{}", formatter.format_escapes(&result));
    if has_uncaught { 1 } else { 0 }
}
