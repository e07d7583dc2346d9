//! `flow catches <exception-type> [--subclasses]`.

use flow_analyze::queries::find_catches;
use flow_output::OutputFormatter;

use crate::project::Project;

pub fn run(formatter: &dyn OutputFormatter, _verbose: bool, exception_type: String, subclasses: bool) -> i32 {
    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow catches: {e}");
            return 2;
        }
    };
    let model = project.build_model();
    let result = find_catches(&model, &exception_type, subclasses);
    println!("{}", formatter.format_catches(&result));
    0
}
