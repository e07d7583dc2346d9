//! `flow exceptions` — list every exception class detected in the project.

use flow_analyze::queries::find_exceptions;
use flow_output::OutputFormatter;

use crate::project::Project;

pub fn run(formatter: &dyn OutputFormatter, _verbose: bool) -> i32 {
    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow exceptions: {e}");
            return 2;
        }
    };
    let model = project.build_model();
    let result = find_exceptions(&model);
    println!("{}", formatter.format_exceptions(&result));
    0
}
