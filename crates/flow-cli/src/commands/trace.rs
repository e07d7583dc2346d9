//! `flow trace <function> [--max-depth N] [--show-all]`.

use flow_analyze::queries::trace_function;
use flow_output::OutputFormatter;

use crate::project::Project;

pub fn run(formatter: &dyn OutputFormatter, _verbose: bool, function: String, max_depth: usize, show_all: bool) -> i32 {
    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow trace: {e}");
            return 2;
        }
    };
    let model = project.build_model();
    let result = trace_function(&model, &function, max_depth, show_all);
    let found = result.root.is_some();
    println!("{}", formatter.format_trace(&result));
    if found { 0 } else { 1 }
}
