//! `flow raises <exception-type> [--subclasses]`.

use flow_analyze::queries::find_raises;
use flow_output::OutputFormatter;

use crate::project::Project;

pub fn run(formatter: &dyn OutputFormatter, _verbose: bool, exception_type: String, subclasses: bool) -> i32 {
    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow raises: {e}");
            return 2;
        }
    };
    let model = project.build_model();
    let result = find_raises(&model, &exception_type, subclasses);
    let found = !result.matches.is_empty();
    println!("{}", formatter.format_raises(&result));
    if found { 0 } else { 1 }
}
