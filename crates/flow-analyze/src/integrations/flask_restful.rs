//! Flask-RESTful `Resource` class + `api.add_resource()` detection.
//!
//! A `Resource` subclass defines HTTP-verb methods like any other Flask
//! view, but its URL only appears wherever the app registers it with
//! `api.add_resource(ResourceClass, "/path", ...)` — which is frequently a
//! different file than the class definition. Per-file detection can only
//! see one half of that picture at a time, so this integration emits a
//! placeholder path for unregistered resource classes and leaves the
//! cross-file merge to `correlate_entrypoints`, run once after every file
//! has been detected.

use tree_sitter::{Node, Parser};

use flow_core::types::{Entrypoint, EntrypointKind};

use super::{Integration, IntegrationData};

const HTTP_METHODS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "options"];
const ADD_RESOURCE_METHODS: &[&str] = &["add_resource", "add_org_resource"];

pub struct FlaskRestfulIntegration;

impl Integration for FlaskRestfulIntegration {
    fn name(&self) -> &'static str {
        "flask"
    }

    fn detect(&self, source: &str, file_path: &str) -> IntegrationData {
        let mut data = IntegrationData::default();
        let Some(tree) = parse(source) else { return data };
        let root = tree.root_node();

        let mut resource_classes: Vec<(String, Vec<(String, u32)>)> = Vec::new();
        let mut registrations: Vec<(String, Vec<String>, u32)> = Vec::new();
        collect_resource_classes(root, source, &mut resource_classes);
        collect_registrations(root, source, &mut registrations);

        let mut registered: Vec<&str> = Vec::new();

        for (resource_name, urls, reg_line) in &registrations {
            registered.push(resource_name);
            let methods = resource_classes
                .iter()
                .find(|(name, _)| name == resource_name)
                .map(|(_, methods)| methods.clone())
                .unwrap_or_else(|| vec![("GET".to_string(), *reg_line)]);

            for url in urls {
                for (method, method_line) in &methods {
                    data.entrypoints.push(Entrypoint {
                        file: file_path.to_string(),
                        function: format!("{resource_name}.{}", method.to_lowercase()),
                        line: *method_line,
                        kind: EntrypointKind::HttpRoute,
                        metadata: [
                            ("http_method".to_string(), method.clone()),
                            ("http_path".to_string(), url.clone()),
                            ("framework".to_string(), "flask".to_string()),
                            ("flask_restful".to_string(), "true".to_string()),
                        ]
                        .into_iter()
                        .collect(),
                    });
                }
            }
        }

        for (class_name, methods) in &resource_classes {
            if registered.contains(&class_name.as_str()) {
                continue;
            }
            for (method, method_line) in methods {
                data.entrypoints.push(Entrypoint {
                    file: file_path.to_string(),
                    function: format!("{class_name}.{}", method.to_lowercase()),
                    line: *method_line,
                    kind: EntrypointKind::HttpRoute,
                    metadata: [
                        ("http_method".to_string(), method.clone()),
                        ("http_path".to_string(), format!("<flask-restful:{class_name}>")),
                        ("framework".to_string(), "flask".to_string()),
                        ("flask_restful".to_string(), "true".to_string()),
                    ]
                    .into_iter()
                    .collect(),
                });
            }
        }

        data
    }
}

/// Merge per-file Flask-RESTful entrypoints across the whole program:
/// placeholder entries (`<flask-restful:ClassName>`) from a file that only
/// saw the class definition get resolved against real-path entries from
/// whichever file registered that class with `add_resource()`. A class
/// registered in the same file it's defined in never produces a
/// placeholder in the first place, so it passes through untouched.
pub fn correlate_entrypoints(entrypoints: Vec<Entrypoint>) -> Vec<Entrypoint> {
    use std::collections::HashMap;

    let mut placeholder_classes: HashMap<String, Vec<Entrypoint>> = HashMap::new();
    let mut real_path_entries: HashMap<String, Vec<Entrypoint>> = HashMap::new();
    let mut result: Vec<Entrypoint> = Vec::new();

    for ep in entrypoints {
        if ep.metadata.get("flask_restful").map(String::as_str) != Some("true") {
            result.push(ep);
            continue;
        }

        let path = ep.metadata.get("http_path").cloned().unwrap_or_default();
        if let Some(class_name) = path.strip_prefix("<flask-restful:").and_then(|s| s.strip_suffix('>')) {
            placeholder_classes.entry(class_name.to_string()).or_default().push(ep);
        } else if let Some((class_name, _method)) = ep.function.rsplit_once('.') {
            real_path_entries.entry(class_name.to_string()).or_default().push(ep);
        } else {
            result.push(ep);
        }
    }

    for (class_name, class_eps) in placeholder_classes {
        if let Some(reg_eps) = real_path_entries.remove(&class_name) {
            let mut paths: Vec<String> =
                reg_eps.iter().filter_map(|ep| ep.metadata.get("http_path").cloned()).collect();
            paths.sort();
            paths.dedup();

            for class_ep in &class_eps {
                for path in &paths {
                    let mut metadata = class_ep.metadata.clone();
                    metadata.insert("http_path".to_string(), path.clone());
                    result.push(Entrypoint {
                        file: class_ep.file.clone(),
                        function: class_ep.function.clone(),
                        line: class_ep.line,
                        kind: class_ep.kind,
                        metadata,
                    });
                }
            }
        } else {
            result.extend(class_eps);
        }
    }

    for (_class_name, eps) in real_path_entries {
        result.extend(eps);
    }

    result
}

fn parse(source: &str) -> Option<tree_sitter::Tree> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into()).ok()?;
    parser.parse(source, None)
}

fn text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

fn name_from_expr(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(text(node, source).to_string()),
        "attribute" => node.child_by_field_name("attribute").map(|a| text(a, source).to_string()),
        _ => None,
    }
}

fn decorator_call(decorator: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = decorator.walk();
    decorator.named_children(&mut cursor).next()
}

fn decorator_name(dec: Node<'_>, source: &str) -> Option<String> {
    match dec.kind() {
        "call" => dec.child_by_field_name("function").and_then(|f| name_from_expr(f, source)),
        "attribute" => dec.child_by_field_name("attribute").map(|a| text(a, source).to_string()),
        "identifier" => Some(text(dec, source).to_string()),
        _ => None,
    }
}

fn has_route_decorator(func: Node<'_>, source: &str) -> bool {
    let mut cursor = func.walk();
    let Some(parent) = func.parent() else { return false };
    if parent.kind() != "decorated_definition" {
        return false;
    }
    parent.children(&mut cursor).filter(|c| c.kind() == "decorator").any(|dec| {
        decorator_call(dec)
            .and_then(|d| decorator_name(d, source))
            .map(|name| matches!(name.as_str(), "route" | "expose"))
            .unwrap_or(false)
    })
}

fn collect_resource_classes(node: Node<'_>, source: &str, out: &mut Vec<(String, Vec<(String, u32)>)>) {
    if node.kind() == "class_definition" {
        if let Some(name_node) = node.child_by_field_name("name") {
            let class_name = text(name_node, source).to_string();
            let mut methods: Vec<(String, u32)> = Vec::new();
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for item in body.named_children(&mut cursor) {
                    let func = if item.kind() == "function_definition" {
                        Some(item)
                    } else if item.kind() == "decorated_definition" {
                        let mut dc = item.walk();
                        item.children(&mut dc).find(|c| c.kind() == "function_definition")
                    } else {
                        None
                    };
                    if let Some(func) = func {
                        if let Some(fname) = func.child_by_field_name("name") {
                            let method_name = text(fname, source).to_lowercase();
                            if HTTP_METHODS.contains(&method_name.as_str()) && !has_route_decorator(func, source) {
                                methods.push((method_name.to_uppercase(), line(func)));
                            }
                        }
                    }
                }
            }
            if !methods.is_empty() {
                out.push((class_name, methods));
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_resource_classes(child, source, out);
    }
}

fn collect_registrations(node: Node<'_>, source: &str, out: &mut Vec<(String, Vec<String>, u32)>) {
    if node.kind() == "call" {
        if let Some(func) = node.child_by_field_name("function") {
            if func.kind() == "attribute" {
                let method_name = func.child_by_field_name("attribute").map(|a| text(a, source).to_string());
                if method_name.as_deref().map(|m| ADD_RESOURCE_METHODS.contains(&m)).unwrap_or(false) {
                    if let Some(args) = node.child_by_field_name("arguments") {
                        let mut cursor = args.walk();
                        let positional: Vec<Node<'_>> =
                            args.named_children(&mut cursor).filter(|n| n.kind() != "keyword_argument").collect();
                        if positional.len() >= 2 {
                            if let Some(resource_name) = name_from_expr(positional[0], source) {
                                let urls: Vec<String> = positional[1..]
                                    .iter()
                                    .filter_map(|n| string_value(*n, source))
                                    .collect();
                                if !urls.is_empty() {
                                    out.push((resource_name, urls, line(node)));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_registrations(child, source, out);
    }
}

fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    super::unquote(text(node, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_file_registration_resolves_directly() {
        let src = "class UserResource(Resource):\n    def get(self):\n        pass\n\n\napi.add_resource(UserResource, \"/users\")\n";
        let data = FlaskRestfulIntegration.detect(src, "app.py");
        assert_eq!(data.entrypoints.len(), 1);
        let ep = &data.entrypoints[0];
        assert_eq!(ep.function, "UserResource.get");
        assert_eq!(ep.metadata.get("http_path").unwrap(), "/users");
    }

    #[test]
    fn unregistered_class_gets_placeholder_path() {
        let src = "class UserResource(Resource):\n    def get(self):\n        pass\n";
        let data = FlaskRestfulIntegration.detect(src, "resources.py");
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].metadata.get("http_path").unwrap(), "<flask-restful:UserResource>");
    }

    #[test]
    fn method_with_route_decorator_is_excluded() {
        let src = "class UserResource(Resource):\n    @route(\"/x\")\n    def get(self):\n        pass\n";
        let data = FlaskRestfulIntegration.detect(src, "resources.py");
        assert!(data.entrypoints.is_empty());
    }

    #[test]
    fn unmatched_registration_falls_back_to_get() {
        let src = "api.add_resource(UnknownResource, \"/unknown\")\n";
        let data = FlaskRestfulIntegration.detect(src, "app.py");
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].function, "UnknownResource.get");
        assert_eq!(data.entrypoints[0].metadata.get("http_method").unwrap(), "GET");
    }

    #[test]
    fn cross_file_correlation_resolves_placeholder_to_registered_path() {
        let resource_file = FlaskRestfulIntegration.detect(
            "class UserResource(Resource):\n    def get(self):\n        pass\n    def post(self):\n        pass\n",
            "resources.py",
        );
        let api_file = FlaskRestfulIntegration.detect("api.add_resource(UserResource, \"/users\")\n", "api.py");

        let mut all = resource_file.entrypoints;
        all.extend(api_file.entrypoints);

        let resolved = correlate_entrypoints(all);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|e| e.metadata.get("http_path").unwrap() == "/users"));
        assert!(resolved.iter().any(|e| e.function == "UserResource.get"));
        assert!(resolved.iter().any(|e| e.function == "UserResource.post"));
    }

    #[test]
    fn placeholder_with_no_registration_passes_through_unresolved() {
        let data = FlaskRestfulIntegration.detect(
            "class OrphanResource(Resource):\n    def get(self):\n        pass\n",
            "resources.py",
        );
        let resolved = correlate_entrypoints(data.entrypoints);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].metadata.get("http_path").unwrap(), "<flask-restful:OrphanResource>");
    }
}
