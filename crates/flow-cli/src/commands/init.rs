//! `flow init` — create `.flow/` (config, stub overrides, extraction cache)
//! and run the first whole-program build to report what was found.

use std::fs;

use flow_core::config::FlowConfig;
use flow_output::OutputFormatter;

use crate::project::Project;

pub fn run(formatter: &dyn OutputFormatter, verbose: bool, merge: bool) -> i32 {
    let root = match std::env::current_dir() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow init: failed to get current directory: {e}");
            return 2;
        }
    };

    let flow_dir = root.join(".flow");
    if flow_dir.exists() && !merge {
        eprintln!("flow init: .flow/ already exists (use --merge to re-initialize)");
        return 2;
    }

    if let Err(e) = fs::create_dir_all(flow_dir.join("stubs")) {
        eprintln!("flow init: failed to create .flow/stubs: {e}");
        return 2;
    }
    if let Err(e) = fs::create_dir_all(flow_dir.join("detectors")) {
        eprintln!("flow init: failed to create .flow/detectors: {e}");
        return 2;
    }

    let config_path = flow_dir.join("config.yaml");
    if !config_path.exists() || !merge {
        let config = FlowConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap_or_default();
        if let Err(e) = fs::write(&config_path, yaml) {
            eprintln!("flow init: failed to write .flow/config.yaml: {e}");
            return 2;
        }
    }

    if let Err(e) = flow_core::cache::FileCache::open(&flow_dir.join("cache.db")) {
        eprintln!("flow init: failed to create .flow/cache.db: {e}");
        return 2;
    }

    let project = match Project::discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("flow init: {e}");
            return 2;
        }
    };
    let model = project.build_model();
    let result = flow_analyze::queries::get_init_info(&model);

    println!("{}", formatter.format_init(&result));
    if verbose {
        eprintln!("flow init: root={}", project.root.display());
        eprintln!("flow init: config={}", config_path.display());
        eprintln!("flow init: cache={}", flow_dir.join("cache.db").display());
    }

    0
}
