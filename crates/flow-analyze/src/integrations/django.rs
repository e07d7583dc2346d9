//! Django and Django REST Framework view detection.
//!
//! DRF class-based views need one entrypoint per HTTP method rather than
//! one per class, and function-based `@api_view` views need their own
//! pass — different enough from the generic decorator-config detector
//! that Django gets a dedicated module, same as in the original.

use tree_sitter::{Node, Parser};

use flow_core::types::{simple_name, Entrypoint, EntrypointKind, GlobalHandler};

use super::{Integration, IntegrationData};

pub const DRF_BASE_CLASSES: &[&str] = &[
    "APIView",
    "ViewSet",
    "ModelViewSet",
    "ReadOnlyModelViewSet",
    "GenericAPIView",
    "GenericViewSet",
    "ListAPIView",
    "CreateAPIView",
    "RetrieveAPIView",
    "UpdateAPIView",
    "DestroyAPIView",
    "ListCreateAPIView",
    "RetrieveUpdateAPIView",
    "RetrieveDestroyAPIView",
    "RetrieveUpdateDestroyAPIView",
];

pub const DRF_HTTP_METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];
pub const DRF_ACTION_METHODS: &[&str] = &["list", "create", "retrieve", "update", "partial_update", "destroy"];

pub const DJANGO_VIEW_BASE_CLASSES: &[&str] =
    &["View", "TemplateView", "RedirectView", "FormView", "DetailView", "ListView"];

const DRF_GENERICS_QUALIFIERS: &[&str] = &["generics", "rest_framework.generics", "viewsets", "rest_framework.viewsets"];

fn drf_method_to_http(method: &str) -> &str {
    match method {
        "list" => "GET",
        "create" => "POST",
        "retrieve" => "GET",
        "update" => "PUT",
        "partial_update" => "PATCH",
        "destroy" => "DELETE",
        other => other,
    }
}

pub struct DjangoIntegration;

impl Integration for DjangoIntegration {
    fn name(&self) -> &'static str {
        "django"
    }

    fn detect(&self, source: &str, file_path: &str) -> IntegrationData {
        let mut data = IntegrationData::default();
        let Some(tree) = parse(source) else { return data };
        let root = tree.root_node();

        detect_class_views(root, source, file_path, &mut data);
        detect_function_views(root, source, file_path, &mut data);
        detect_exception_handlers(root, source, file_path, &mut data);
        data
    }

    fn handled_exceptions(&self) -> &[&str] {
        &["rest_framework.exceptions.APIException"]
    }

    fn class_view_base_classes(&self) -> &[&str] {
        DRF_BASE_CLASSES
    }
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
        "attribute" => {
            let object = node.child_by_field_name("object")?;
            let attr = node.child_by_field_name("attribute")?;
            Some(format!("{}.{}", name_from_expr(object, source)?, text(attr, source)))
        }
        _ => None,
    }
}

fn is_view_base(base: &str) -> bool {
    let simple = simple_name(base);
    if DRF_BASE_CLASSES.contains(&simple) || DJANGO_VIEW_BASE_CLASSES.contains(&simple) {
        return true;
    }
    DRF_GENERICS_QUALIFIERS.iter().any(|q| base.starts_with(&format!("{q}.")))
}

pub(crate) fn class_bases(node: Node<'_>, source: &str) -> Vec<String> {
    let Some(superclasses) = node.child_by_field_name("superclasses") else { return Vec::new() };
    let mut cursor = superclasses.walk();
    superclasses.named_children(&mut cursor).filter_map(|arg| name_from_expr(arg, source)).collect()
}

fn detect_class_views(node: Node<'_>, source: &str, file_path: &str, data: &mut IntegrationData) {
    if node.kind() == "class_definition" {
        let class_name = node.child_by_field_name("name").map(|n| text(n, source).to_string());
        if let Some(class_name) = class_name {
            let bases = class_bases(node, source);
            if bases.iter().any(|b| is_view_base(b)) {
                let mut methods: Vec<(String, u32)> = Vec::new();
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.named_children(&mut cursor) {
                        let func = if child.kind() == "function_definition" {
                            Some(child)
                        } else if child.kind() == "decorated_definition" {
                            let mut dc = child.walk();
                            child.children(&mut dc).find(|c| c.kind() == "function_definition")
                        } else {
                            None
                        };
                        if let Some(func) = func {
                            if let Some(name_node) = func.child_by_field_name("name") {
                                let method_name = text(name_node, source).to_lowercase();
                                if DRF_HTTP_METHODS.contains(&method_name.as_str())
                                    || DRF_ACTION_METHODS.contains(&method_name.as_str())
                                {
                                    methods.push((method_name, line(func)));
                                }
                            }
                        }
                    }
                }

                if methods.is_empty() {
                    data.entrypoints.push(Entrypoint {
                        file: file_path.to_string(),
                        function: class_name.clone(),
                        line: line(node),
                        kind: EntrypointKind::HttpRoute,
                        metadata: [
                            ("framework".to_string(), "django".to_string()),
                            ("view_type".to_string(), "class".to_string()),
                            ("http_method".to_string(), "ANY".to_string()),
                        ]
                        .into_iter()
                        .collect(),
                    });
                } else {
                    for (method_name, method_line) in methods {
                        data.entrypoints.push(Entrypoint {
                            file: file_path.to_string(),
                            function: format!("{class_name}.{method_name}"),
                            line: method_line,
                            kind: EntrypointKind::HttpRoute,
                            metadata: [
                                ("framework".to_string(), "django".to_string()),
                                ("view_type".to_string(), "class".to_string()),
                                ("http_method".to_string(), drf_method_to_http(&method_name).to_string()),
                            ]
                            .into_iter()
                            .collect(),
                        });
                    }
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        detect_class_views(child, source, file_path, data);
    }
}

fn decorator_call(decorator: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = decorator.walk();
    decorator.named_children(&mut cursor).next()
}

fn is_api_view_decorator(dec: Node<'_>, source: &str) -> bool {
    match dec.kind() {
        "call" => dec
            .child_by_field_name("function")
            .and_then(|f| name_from_expr(f, source))
            .map(|n| simple_name(&n) == "api_view")
            .unwrap_or(false),
        "identifier" => text(dec, source) == "api_view",
        _ => false,
    }
}

fn api_view_methods(dec: Node<'_>, source: &str) -> Vec<String> {
    if dec.kind() != "call" {
        return vec!["GET".to_string()];
    }
    let Some(args) = dec.child_by_field_name("arguments") else { return vec!["GET".to_string()] };
    let mut cursor = args.walk();
    let Some(first) = args.named_children(&mut cursor).next() else { return vec!["GET".to_string()] };
    if first.kind() != "list" {
        return vec!["GET".to_string()];
    }
    let mut lc = first.walk();
    let methods: Vec<String> = first
        .named_children(&mut lc)
        .filter(|n| n.kind() == "string")
        .filter_map(|n| super::unquote(text(n, source)))
        .collect();
    if methods.is_empty() {
        vec!["GET".to_string()]
    } else {
        methods
    }
}

fn detect_function_views(node: Node<'_>, source: &str, file_path: &str, data: &mut IntegrationData) {
    if node.kind() == "decorated_definition" {
        let func = {
            let mut dc = node.walk();
            node.children(&mut dc).find(|c| c.kind() == "function_definition")
        };
        if let Some(func) = func {
            let decorators: Vec<Node<'_>> = {
                let mut dc = node.walk();
                node.children(&mut dc).filter(|c| c.kind() == "decorator").collect()
            };
            for decorator in decorators {
                if let Some(dec) = decorator_call(decorator) {
                    if is_api_view_decorator(dec, source) {
                        if let Some(name_node) = func.child_by_field_name("name") {
                            let methods = api_view_methods(dec, source);
                            data.entrypoints.push(Entrypoint {
                                file: file_path.to_string(),
                                function: text(name_node, source).to_string(),
                                line: line(func),
                                kind: EntrypointKind::HttpRoute,
                                metadata: [
                                    ("framework".to_string(), "django".to_string()),
                                    ("view_type".to_string(), "function".to_string()),
                                    ("http_method".to_string(), methods[0].clone()),
                                ]
                                .into_iter()
                                .collect(),
                            });
                        }
                        break;
                    }
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        detect_function_views(child, source, file_path, data);
    }
}

fn detect_exception_handlers(node: Node<'_>, source: &str, file_path: &str, data: &mut IntegrationData) {
    if node.kind() == "decorated_definition" {
        let func = {
            let mut dc = node.walk();
            node.children(&mut dc).find(|c| c.kind() == "function_definition")
        };
        if let Some(func) = func {
            let decorators: Vec<Node<'_>> = {
                let mut dc = node.walk();
                node.children(&mut dc).filter(|c| c.kind() == "decorator").collect()
            };
            for decorator in decorators {
                if let Some(dec) = decorator_call(decorator) {
                    let handled = match dec.kind() {
                        "call" => dec.child_by_field_name("function").and_then(|f| name_from_expr(f, source)).and_then(
                            |name| {
                                if matches!(simple_name(&name), "exception_handler" | "api_exception_handler") {
                                    let args = dec.child_by_field_name("arguments")?;
                                    let mut ac = args.walk();
                                    let first = args.named_children(&mut ac).next();
                                    Some(first.and_then(|a| name_from_expr(a, source)).unwrap_or_else(|| "Exception".to_string()))
                                } else {
                                    None
                                }
                            },
                        ),
                        "identifier" if text(dec, source) == "exception_handler" => Some("Exception".to_string()),
                        _ => None,
                    };
                    if let Some(handled_type) = handled {
                        if let Some(name_node) = func.child_by_field_name("name") {
                            data.global_handlers.push(GlobalHandler {
                                file: file_path.to_string(),
                                line: line(func),
                                function: text(name_node, source).to_string(),
                                handled_type,
                            });
                        }
                    }
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        detect_exception_handlers(child, source, file_path, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_drf_class_view_methods() {
        let src = "class UserView(APIView):\n    def get(self, request):\n        pass\n    def post(self, request):\n        pass\n";
        let data = DjangoIntegration.detect(src, "views.py");
        assert_eq!(data.entrypoints.len(), 2);
        assert!(data.entrypoints.iter().any(|e| e.function == "UserView.get"));
        assert!(data.entrypoints.iter().any(|e| e.function == "UserView.post"));
    }

    #[test]
    fn empty_view_class_gets_one_any_entrypoint() {
        let src = "class PingView(APIView):\n    pass\n";
        let data = DjangoIntegration.detect(src, "views.py");
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].metadata.get("http_method").unwrap(), "ANY");
    }

    #[test]
    fn detects_function_based_api_view() {
        let src = "@api_view(['GET', 'POST'])\ndef user_list(request):\n    pass\n";
        let data = DjangoIntegration.detect(src, "views.py");
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].metadata.get("http_method").unwrap(), "GET");
    }

    #[test]
    fn detects_drf_exception_handler() {
        let src = "@exception_handler(ValidationError)\ndef handle_validation(exc, context):\n    pass\n";
        let data = DjangoIntegration.detect(src, "handlers.py");
        assert_eq!(data.global_handlers.len(), 1);
        assert_eq!(data.global_handlers[0].handled_type, "ValidationError");
    }

    #[test]
    fn non_view_class_is_ignored() {
        let src = "class Helper:\n    def get(self):\n        pass\n";
        let data = DjangoIntegration.detect(src, "util.py");
        assert!(data.entrypoints.is_empty());
    }
}
