//! Configuration-driven route and handler detection, covering Flask and
//! FastAPI. Django gets its own module since its class-based views need
//! per-HTTP-method entrypoints rather than one per decorated function.

use tree_sitter::{Node, Parser};

use flow_core::types::{simple_name, Entrypoint, EntrypointKind, GlobalHandler};

use super::django::class_bases;
use super::{unquote, Integration, IntegrationData};

const HTTP_METHOD_NAMES: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];

/// Where a decorator pattern's path argument lives on the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSource {
    PositionalArg(usize),
    KeywordArg(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodSource {
    DecoratorName,
    Keyword(&'static str),
    Default,
}

/// Pattern for decorator-based routes like `@app.route` or `@router.get`.
#[derive(Debug, Clone)]
pub struct DecoratorRoutePattern {
    pub decorator_name: &'static str,
    pub path_source: ArgSource,
    pub method_source: MethodSource,
    pub default_method: &'static str,
}

impl DecoratorRoutePattern {
    fn matches(&self, decorator_name: &str) -> bool {
        glob_match(self.decorator_name, decorator_name)
    }
}

/// Pattern for exception handlers such as `@app.errorhandler` or
/// `app.add_exception_handler(...)`.
#[derive(Debug, Clone)]
pub struct HandlerPattern {
    pub decorator_pattern: Option<&'static str>,
    pub call_pattern: Option<&'static str>,
}

impl HandlerPattern {
    fn matches_decorator(&self, name: &str) -> bool {
        self.decorator_pattern.map(|p| glob_match(p, name)).unwrap_or(false)
    }

    fn matches_call(&self, name: &str) -> bool {
        self.call_pattern.map(|p| glob_match(p, name)).unwrap_or(false)
    }
}

/// Pattern for class-based views like Flask's `MethodView` or DRF's
/// `APIView` family: one entrypoint per matching class, keyed by its base
/// classes rather than a decorator.
#[derive(Debug, Clone)]
pub struct ClassRoutePattern {
    pub base_classes: Vec<&'static str>,
    pub method_names: Vec<&'static str>,
}

impl ClassRoutePattern {
    pub fn new(base_classes: Vec<&'static str>) -> Self {
        Self { base_classes, method_names: HTTP_METHOD_NAMES.to_vec() }
    }
}

#[derive(Debug, Clone)]
pub struct FrameworkConfig {
    pub name: &'static str,
    pub route_patterns: Vec<DecoratorRoutePattern>,
    pub class_patterns: Vec<ClassRoutePattern>,
    pub handler_patterns: Vec<HandlerPattern>,
    pub handled_exceptions: Vec<&'static str>,
    /// Per-type HTTP response a framework converts an escaping exception
    /// into. Keyed by both the dotted and simple forms of the type name,
    /// matching how the original semantics tables list both.
    pub exception_responses: Vec<(&'static str, &'static str)>,
}

#[allow(non_snake_case)]
pub fn FLASK_CONFIG() -> FrameworkConfig {
    FrameworkConfig {
        name: "flask",
        route_patterns: vec![
            DecoratorRoutePattern {
                decorator_name: "route",
                path_source: ArgSource::PositionalArg(0),
                method_source: MethodSource::Keyword("methods"),
                default_method: "GET",
            },
            DecoratorRoutePattern {
                decorator_name: "expose",
                path_source: ArgSource::PositionalArg(0),
                method_source: MethodSource::Keyword("methods"),
                default_method: "GET",
            },
        ],
        class_patterns: vec![ClassRoutePattern::new(vec!["MethodView"])],
        handler_patterns: vec![HandlerPattern { decorator_pattern: Some("errorhandler"), call_pattern: None }],
        handled_exceptions: vec!["werkzeug.exceptions.HTTPException"],
        exception_responses: vec![
            ("werkzeug.exceptions.HTTPException", "HTTP {code}"),
            ("HTTPException", "HTTP {code}"),
            ("werkzeug.exceptions.NotFound", "HTTP 404"),
            ("NotFound", "HTTP 404"),
            ("werkzeug.exceptions.BadRequest", "HTTP 400"),
            ("BadRequest", "HTTP 400"),
            ("werkzeug.exceptions.Unauthorized", "HTTP 401"),
            ("Unauthorized", "HTTP 401"),
            ("werkzeug.exceptions.Forbidden", "HTTP 403"),
            ("Forbidden", "HTTP 403"),
            ("werkzeug.exceptions.InternalServerError", "HTTP 500"),
            ("InternalServerError", "HTTP 500"),
        ],
    }
}

#[allow(non_snake_case)]
pub fn FASTAPI_CONFIG() -> FrameworkConfig {
    FrameworkConfig {
        name: "fastapi",
        route_patterns: ["get", "post", "put", "delete", "patch", "options", "head"]
            .into_iter()
            .map(|m| DecoratorRoutePattern {
                decorator_name: m,
                path_source: ArgSource::PositionalArg(0),
                method_source: MethodSource::DecoratorName,
                default_method: "GET",
            })
            .collect(),
        class_patterns: Vec::new(),
        handler_patterns: vec![
            HandlerPattern { decorator_pattern: Some("exception_handler"), call_pattern: None },
            HandlerPattern { decorator_pattern: None, call_pattern: Some("*.add_exception_handler") },
        ],
        handled_exceptions: vec!["fastapi.HTTPException", "starlette.exceptions.HTTPException"],
        exception_responses: vec![
            ("fastapi.HTTPException", "HTTP {status_code}"),
            ("HTTPException", "HTTP {status_code}"),
            ("starlette.exceptions.HTTPException", "HTTP {status_code}"),
            ("pydantic.ValidationError", "HTTP 422"),
            ("pydantic_core.ValidationError", "HTTP 422"),
            ("ValidationError", "HTTP 422"),
            ("RequestValidationError", "HTTP 422"),
        ],
    }
}

/// Minimal `fnmatch`-style matcher: `*` matches any run of characters,
/// everything else is literal. Good enough for the handful of patterns
/// the built-in framework configs actually use.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn rec(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => rec(&p[1..], t) || (!t.is_empty() && rec(p, &t[1..])),
            Some(c) => t.first() == Some(c) && rec(&p[1..], &t[1..]),
        }
    }
    rec(pattern.as_bytes(), text.as_bytes())
}

pub struct GenericIntegration {
    config: FrameworkConfig,
    class_view_bases: Vec<&'static str>,
}

impl GenericIntegration {
    pub fn new(config: FrameworkConfig) -> Self {
        let class_view_bases =
            config.class_patterns.iter().flat_map(|p| p.base_classes.iter().copied()).collect();
        Self { config, class_view_bases }
    }
}

impl Integration for GenericIntegration {
    fn name(&self) -> &'static str {
        self.config.name
    }

    fn detect(&self, source: &str, file_path: &str) -> IntegrationData {
        detect(source, file_path, &self.config)
    }

    fn handled_exceptions(&self) -> &[&str] {
        &self.config.handled_exceptions
    }

    fn get_exception_response(&self, type_name: &str) -> Option<String> {
        let simple = simple_name(type_name);
        self.config
            .exception_responses
            .iter()
            .find(|(pattern, _)| *pattern == type_name || *pattern == simple)
            .map(|(_, response)| response.to_string())
    }

    fn class_view_base_classes(&self) -> &[&str] {
        &self.class_view_bases
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

/// `a.b` / `a` -> dotted name; `None` for anything else.
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

/// Last segment of a decorator's callee, e.g. `route` out of `app.route`.
fn decorator_method_name(func: Node<'_>, source: &str) -> Option<String> {
    match func.kind() {
        "attribute" => func.child_by_field_name("attribute").map(|a| text(a, source).to_string()),
        "identifier" => Some(text(func, source).to_string()),
        _ => None,
    }
}

fn positional_args<'a>(args: Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter(|n| n.kind() != "keyword_argument")
        .collect()
}

fn keyword_arg<'a>(args: Node<'a>, name: &str, source: &str) -> Option<Node<'a>> {
    let mut cursor = args.walk();
    args.named_children(&mut cursor).find(|n| {
        n.kind() == "keyword_argument"
            && n.child_by_field_name("name").map(|k| text(k, source) == name).unwrap_or(false)
    })
}

fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => unquote(text(node, source)),
        "concatenated_string" => {
            let mut cursor = node.walk();
            let mut out = String::new();
            for child in node.named_children(&mut cursor) {
                out.push_str(&unquote(text(child, source))?);
            }
            Some(out)
        }
        _ => None,
    }
}

fn list_of_strings(node: Node<'_>, source: &str) -> Vec<String> {
    if !matches!(node.kind(), "list" | "tuple") {
        return Vec::new();
    }
    let mut cursor = node.walk();
    node.named_children(&mut cursor).filter_map(|el| string_value(el, source)).collect()
}

fn extract_value(call_args: Node<'_>, source_kind: ArgSource, source: &str) -> Option<String> {
    match source_kind {
        ArgSource::PositionalArg(idx) => {
            let positional = positional_args(call_args);
            positional.get(idx).and_then(|n| string_value(*n, source))
        }
        ArgSource::KeywordArg(name) => {
            let kwarg = keyword_arg(call_args, name, source)?;
            let value = kwarg.child_by_field_name("value")?;
            string_value(value, source)
        }
    }
}

fn extract_method(call_args: Node<'_>, pattern: &DecoratorRoutePattern, decorator_name: &str, source: &str) -> String {
    match pattern.method_source {
        MethodSource::DecoratorName => decorator_name.to_uppercase(),
        MethodSource::Keyword(name) => keyword_arg(call_args, name, source)
            .and_then(|kw| kw.child_by_field_name("value"))
            .map(|v| list_of_strings(v, source))
            .and_then(|methods| methods.into_iter().next())
            .unwrap_or_else(|| pattern.default_method.to_string()),
        MethodSource::Default => pattern.default_method.to_string(),
    }
}

/// Walk every decorator attached to every function/class in the tree,
/// in source order, passing each one to `visit`.
fn walk_decorated(node: Node<'_>, source: &str, visit: &mut impl FnMut(Node<'_>, &[Node<'_>])) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "decorated_definition" => {
                let decorators: Vec<Node<'_>> = {
                    let mut dc = child.walk();
                    child.children(&mut dc).filter(|c| c.kind() == "decorator").collect()
                };
                if let Some(def) = {
                    let mut dc = child.walk();
                    child
                        .children(&mut dc)
                        .find(|c| matches!(c.kind(), "function_definition" | "class_definition"))
                } {
                    visit(def, &decorators);
                    if let Some(body) = def.child_by_field_name("body") {
                        walk_decorated(body, source, visit);
                    }
                }
            }
            "function_definition" | "class_definition" => {
                visit(child, &[]);
                if let Some(body) = child.child_by_field_name("body") {
                    walk_decorated(body, source, visit);
                }
            }
            _ if child.child_count() > 0 => walk_decorated(child, source, visit),
            _ => {}
        }
    }
}

fn decorator_call(decorator: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = decorator.walk();
    decorator.named_children(&mut cursor).next()
}

pub fn detect(source: &str, file_path: &str, config: &FrameworkConfig) -> IntegrationData {
    let mut data = IntegrationData::default();
    let Some(tree) = parse(source) else { return data };
    let root = tree.root_node();

    walk_decorated(root, source, &mut |def, decorators| {
        if def.kind() == "class_definition" {
            let Some(name_node) = def.child_by_field_name("name") else { return };
            let class_name = text(name_node, source).to_string();
            let bases = class_bases(def, source);
            let is_view = config
                .class_patterns
                .iter()
                .any(|pattern| bases.iter().any(|b| pattern.base_classes.contains(&simple_name(b))));
            if is_view {
                data.entrypoints.push(Entrypoint {
                    file: file_path.to_string(),
                    function: class_name,
                    line: line(def),
                    kind: EntrypointKind::HttpRoute,
                    metadata: [
                        ("framework".to_string(), config.name.to_string()),
                        ("view_type".to_string(), "class".to_string()),
                    ]
                    .into_iter()
                    .collect(),
                });
            }
            return;
        }

        if def.kind() != "function_definition" {
            return;
        }
        let Some(name_node) = def.child_by_field_name("name") else { return };
        let func_name = text(name_node, source).to_string();

        for &decorator in decorators {
            let Some(dec_expr) = decorator_call(decorator) else { continue };
            let (decorator_name, call_args) = match dec_expr.kind() {
                "call" => {
                    let Some(func) = dec_expr.child_by_field_name("function") else { continue };
                    let Some(name) = decorator_method_name(func, source) else { continue };
                    (name, dec_expr.child_by_field_name("arguments"))
                }
                "attribute" => (
                    dec_expr.child_by_field_name("attribute").map(|a| text(a, source).to_string()).unwrap_or_default(),
                    None,
                ),
                "identifier" => (text(dec_expr, source).to_string(), None),
                _ => continue,
            };

            if let Some(pattern) = config.route_patterns.iter().find(|p| p.matches(&decorator_name)) {
                let Some(args) = call_args else { continue };
                let Some(path) = extract_value(args, pattern.path_source, source) else { continue };
                let method = extract_method(args, pattern, &decorator_name, source);
                data.entrypoints.push(Entrypoint {
                    file: file_path.to_string(),
                    function: func_name.clone(),
                    line: line(def),
                    kind: EntrypointKind::HttpRoute,
                    metadata: [
                        ("framework".to_string(), config.name.to_string()),
                        ("http_method".to_string(), method),
                        ("http_path".to_string(), path),
                    ]
                    .into_iter()
                    .collect(),
                });
            }

            if let Some(pattern) = config.handler_patterns.iter().find(|p| p.matches_decorator(&decorator_name)) {
                let exc = call_args
                    .and_then(|args| positional_args(args).into_iter().next())
                    .and_then(|arg| name_from_expr(arg, source));
                if let Some(exc) = exc {
                    data.global_handlers.push(GlobalHandler {
                        file: file_path.to_string(),
                        line: line(def),
                        function: func_name.clone(),
                        handled_type: exc,
                    });
                }
            }
        }
    });

    detect_call_style_handlers(root, source, file_path, config, &mut data);
    data
}

/// `app.add_exception_handler(ExcType, handler)`-style registrations,
/// which aren't decorators at all.
fn detect_call_style_handlers(
    node: Node<'_>,
    source: &str,
    file_path: &str,
    config: &FrameworkConfig,
    data: &mut IntegrationData,
) {
    if node.kind() == "call" {
        if let Some(func) = node.child_by_field_name("function") {
            if let Some(call_name) = name_from_expr(func, source) {
                if let Some(pattern) = config.handler_patterns.iter().find(|p| p.matches_call(&call_name)) {
                    if let Some(args) = node.child_by_field_name("arguments") {
                        let positional = positional_args(args);
                        let exc = positional.first().and_then(|n| name_from_expr(*n, source));
                        let handler = positional.get(1).and_then(|n| name_from_expr(*n, source));
                        if let (Some(exc), Some(handler)) = (exc, handler) {
                            let _ = pattern;
                            data.global_handlers.push(GlobalHandler {
                                file: file_path.to_string(),
                                line: line(node),
                                function: handler,
                                handled_type: exc,
                            });
                        }
                    }
                }
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        detect_call_style_handlers(child, source, file_path, config, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_flask_route() {
        let src = "@app.route(\"/users\", methods=[\"POST\"])\ndef create_user():\n    pass\n";
        let data = detect(src, "app.py", &FLASK_CONFIG());
        assert_eq!(data.entrypoints.len(), 1);
        let ep = &data.entrypoints[0];
        assert_eq!(ep.function, "create_user");
        assert_eq!(ep.metadata.get("http_method").unwrap(), "POST");
        assert_eq!(ep.metadata.get("http_path").unwrap(), "/users");
    }

    #[test]
    fn detects_fastapi_get() {
        let src = "@router.get(\"/items/{id}\")\nasync def get_item(id: int):\n    pass\n";
        let data = detect(src, "app.py", &FASTAPI_CONFIG());
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].metadata.get("http_method").unwrap(), "GET");
    }

    #[test]
    fn detects_flask_errorhandler() {
        let src = "@app.errorhandler(ValueError)\ndef handle_value_error(e):\n    pass\n";
        let data = detect(src, "app.py", &FLASK_CONFIG());
        assert_eq!(data.global_handlers.len(), 1);
        assert_eq!(data.global_handlers[0].handled_type, "ValueError");
    }

    #[test]
    fn detects_fastapi_add_exception_handler_call() {
        let src = "app.add_exception_handler(ValueError, handle_value_error)\n";
        let data = detect(src, "app.py", &FASTAPI_CONFIG());
        assert_eq!(data.global_handlers.len(), 1);
        assert_eq!(data.global_handlers[0].handled_type, "ValueError");
        assert_eq!(data.global_handlers[0].function, "handle_value_error");
    }

    #[test]
    fn glob_match_handles_wildcard_suffix() {
        assert!(glob_match("*.add_exception_handler", "app.add_exception_handler"));
        assert!(!glob_match("*.add_exception_handler", "app.other"));
    }

    #[test]
    fn non_route_decorator_is_ignored() {
        let src = "@staticmethod\ndef helper():\n    pass\n";
        let data = detect(src, "app.py", &FLASK_CONFIG());
        assert!(data.entrypoints.is_empty());
    }

    #[test]
    fn detects_flask_method_view_class() {
        let src = "class UserView(MethodView):\n    def get(self):\n        pass\n    def post(self):\n        pass\n";
        let data = detect(src, "app.py", &FLASK_CONFIG());
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].function, "UserView");
        assert_eq!(data.entrypoints[0].metadata.get("view_type").unwrap(), "class");
        assert!(data.entrypoints[0].metadata.get("http_method").is_none());
    }

    #[test]
    fn non_method_view_class_is_ignored() {
        let src = "class Helper:\n    def get(self):\n        pass\n";
        let data = detect(src, "app.py", &FLASK_CONFIG());
        assert!(data.entrypoints.is_empty());
    }

    #[test]
    fn flask_exception_response_resolves_both_dotted_and_simple_names() {
        let integration = GenericIntegration::new(FLASK_CONFIG());
        assert_eq!(integration.get_exception_response("NotFound").as_deref(), Some("HTTP 404"));
        assert_eq!(
            integration.get_exception_response("werkzeug.exceptions.NotFound").as_deref(),
            Some("HTTP 404")
        );
        assert_eq!(integration.get_exception_response("ValueError"), None);
    }

    #[test]
    fn fastapi_validation_error_maps_to_422() {
        let integration = GenericIntegration::new(FASTAPI_CONFIG());
        assert_eq!(integration.get_exception_response("RequestValidationError").as_deref(), Some("HTTP 422"));
    }
}
