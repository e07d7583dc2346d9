use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// One stub file: `module: <name>` plus a `function -> [exception types]`
/// mapping. Schema per spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StubFile {
    module: String,
    #[serde(default)]
    functions: HashMap<String, Vec<String>>,
}

/// External "module.function -> raised types" mapping consumed by the
/// propagator when a callee cannot be resolved in-program (spec.md §4.5
/// point "If still empty and a stub library is provided, consult it").
#[derive(Debug, Clone, Default)]
pub struct StubLibrary {
    // (module, function) -> raised types
    entries: HashMap<(String, String), Vec<String>>,
}

impl StubLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, module: &str, function: &str) -> Option<&[String]> {
        self.entries
            .get(&(module.to_string(), function.to_string()))
            .map(|v| v.as_slice())
    }

    fn merge_file(&mut self, content: &str, source: &str) {
        match serde_yaml::from_str::<StubFile>(content) {
            Ok(stub) => {
                for (func, types) in stub.functions {
                    self.entries.insert((stub.module.clone(), func), types);
                }
            }
            Err(e) => {
                eprintln!("flow: warning: failed to parse stub {}: {}", source, e);
            }
        }
    }

    /// Merge a directory of `*.yaml` stub files into this library. Later
    /// calls (e.g. user stubs loaded after built-ins) win on conflict.
    pub fn load_dir(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(&path) {
                self.merge_file(&content, &path.display().to_string());
            }
        }
    }

    /// Built-in stubs embedded at compile time, plus any user stubs found
    /// under `<flow_dir>/stubs/`. User entries override built-ins for the
    /// same `(module, function)` key.
    pub fn load(flow_dir: &Path) -> Self {
        let mut lib = Self::new();
        for content in BUILTIN_STUBS {
            lib.merge_file(content, "<builtin>");
        }
        lib.load_dir(&flow_dir.join("stubs"));
        lib
    }
}

/// Built-in stubs for common standard-library/third-party callees, shipped
/// alongside the analyzer (spec.md §6: "Built-in stubs ship alongside the
/// analyser binary in a parallel directory").
const BUILTIN_STUBS: &[&str] = &[
    include_str!("../stubs/requests.yaml"),
    include_str!("../stubs/json.yaml"),
    include_str!("../stubs/os.yaml"),
];
