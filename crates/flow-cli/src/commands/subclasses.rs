//! `flow subclasses <class>`.

use flow_analyze::queries::find_subclasses;
use flow_output::OutputFormatter;

use crate::project::Project;

pub fn run(formatter: &dyn OutputFormatter, _verbose: bool, class: String) -> i32 {
    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow subclasses: {e}");
            return 2;
        }
    };
    let model = project.build_model();
    let result = find_subclasses(&model, &class);
    println!("{}", formatter.format_subclasses(&result));
    0
}
