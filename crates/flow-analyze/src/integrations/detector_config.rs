//! Loads user-authored `.flow/detectors/*.toml` files into
//! `GenericIntegration`s, merged with the built-ins. Declarative patterns
//! only — no arbitrary code execution, unlike the original's
//! `importlib`-loaded `.py` detector plugins.

use std::path::Path;

use serde::Deserialize;

use super::generic::{ArgSource, ClassRoutePattern, DecoratorRoutePattern, FrameworkConfig, GenericIntegration, HandlerPattern, MethodSource};
use super::Integration;

#[derive(Debug, Deserialize)]
struct DetectorFile {
    name: String,
    #[serde(default, rename = "route")]
    routes: Vec<RouteEntry>,
    #[serde(default, rename = "class")]
    classes: Vec<ClassEntry>,
    #[serde(default, rename = "handler")]
    handlers: Vec<HandlerEntry>,
    #[serde(default)]
    handled_exceptions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    decorator: String,
    #[serde(default)]
    path_arg: usize,
    #[serde(default)]
    method_keyword: Option<String>,
    #[serde(default = "default_method")]
    default_method: String,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Deserialize)]
struct ClassEntry {
    base_classes: Vec<String>,
    #[serde(default)]
    method_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HandlerEntry {
    #[serde(default)]
    decorator: Option<String>,
    #[serde(default)]
    call: Option<String>,
}

/// Built-in `FrameworkConfig` patterns hold `&'static str` because they're
/// all string literals. A user's TOML file only exists at runtime, so its
/// strings are leaked once at load time to get the same `'static`
/// lifetime — one detector set is loaded per process, so this doesn't
/// grow unbounded.
fn leak(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}

fn build_config(file: DetectorFile) -> FrameworkConfig {
    let route_patterns = file
        .routes
        .into_iter()
        .map(|r| {
            let method_source = match r.method_keyword {
                Some(kw) => MethodSource::Keyword(leak(kw)),
                None => MethodSource::DecoratorName,
            };
            DecoratorRoutePattern {
                decorator_name: leak(r.decorator),
                path_source: ArgSource::PositionalArg(r.path_arg),
                method_source,
                default_method: leak(r.default_method),
            }
        })
        .collect();

    let class_patterns = file
        .classes
        .into_iter()
        .map(|c| {
            let base_classes = c.base_classes.into_iter().map(leak).collect();
            let mut pattern = ClassRoutePattern::new(base_classes);
            if !c.method_names.is_empty() {
                pattern.method_names = c.method_names.into_iter().map(leak).collect();
            }
            pattern
        })
        .collect();

    let handler_patterns = file
        .handlers
        .into_iter()
        .map(|h| HandlerPattern { decorator_pattern: h.decorator.map(leak), call_pattern: h.call.map(leak) })
        .collect();

    FrameworkConfig {
        name: leak(file.name),
        route_patterns,
        class_patterns,
        handler_patterns,
        handled_exceptions: file.handled_exceptions.into_iter().map(leak).collect(),
        exception_responses: Vec::new(),
    }
}

/// Load every `.flow/detectors/*.toml` file under `flow_dir` into a
/// `GenericIntegration`. A missing `detectors/` directory yields no
/// detectors. A file that fails to parse is skipped with a one-line
/// warning — the rest of the project is unaffected (spec.md §7).
pub fn load_user_detectors(flow_dir: &Path) -> Vec<Box<dyn Integration>> {
    let dir = flow_dir.join("detectors");
    let Ok(entries) = std::fs::read_dir(&dir) else { return Vec::new() };

    let mut detectors: Vec<Box<dyn Integration>> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("flow: warning: failed to read {}: {e}", path.display());
                continue;
            }
        };
        match toml::from_str::<DetectorFile>(&content) {
            Ok(file) => detectors.push(Box::new(GenericIntegration::new(build_config(file)))),
            Err(e) => eprintln!("flow: warning: failed to parse {}: {e}, skipping", path.display()),
        }
    }
    detectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_detectors_dir_yields_no_detectors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_user_detectors(dir.path()).is_empty());
    }

    #[test]
    fn loads_a_valid_toml_detector() {
        let dir = tempfile::tempdir().unwrap();
        let detectors_dir = dir.path().join("detectors");
        std::fs::create_dir_all(&detectors_dir).unwrap();
        std::fs::write(
            detectors_dir.join("bottle.toml"),
            r#"
name = "bottle"

[[route]]
decorator = "route"
method_keyword = "method"
default_method = "GET"

[[class]]
base_classes = ["ResourceView"]
"#,
        )
        .unwrap();

        let detectors = load_user_detectors(dir.path());
        assert_eq!(detectors.len(), 1);
        assert_eq!(detectors[0].name(), "bottle");

        let src = "@app.route(\"/x\", method=\"POST\")\ndef handler():\n    pass\n";
        let data = detectors[0].detect(src, "app.py");
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].metadata.get("http_method").unwrap(), "POST");
    }

    #[test]
    fn malformed_toml_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let detectors_dir = dir.path().join("detectors");
        std::fs::create_dir_all(&detectors_dir).unwrap();
        std::fs::write(detectors_dir.join("broken.toml"), "this is not valid toml [[[").unwrap();
        std::fs::write(detectors_dir.join("ok.toml"), "name = \"ok\"\n").unwrap();

        let detectors = load_user_detectors(dir.path());
        assert_eq!(detectors.len(), 1);
        assert_eq!(detectors[0].name(), "ok");
    }

    #[test]
    fn non_toml_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let detectors_dir = dir.path().join("detectors");
        std::fs::create_dir_all(&detectors_dir).unwrap();
        std::fs::write(detectors_dir.join("README.md"), "not a detector").unwrap();

        assert!(load_user_detectors(dir.path()).is_empty());
    }
}
