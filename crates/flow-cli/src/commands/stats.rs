//! `flow stats` — whole-program counts.

use flow_analyze::queries::get_stats;
use flow_output::OutputFormatter;

use crate::project::Project;

pub fn run(formatter: &dyn OutputFormatter, _verbose: bool) -> i32 {
    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow stats: {e}");
            return 2;
        }
    };
    let model = project.build_model();
    let result = get_stats(&model);
    println!("{}", formatter.format_stats(&result));
    0
}
