//! `if __name__ == "__main__":` entrypoint detection.

use tree_sitter::{Node, Parser};

use flow_core::types::{Entrypoint, EntrypointKind};

use super::{Integration, IntegrationData};

const IGNORED_FUNCTIONS: &[&str] = &[
    "print", "exit", "quit", "help", "input", "len", "str", "int", "float", "bool", "list", "dict", "set", "tuple",
    "open", "close", "read", "write", "format", "repr", "type", "isinstance", "hasattr", "getattr", "setattr",
];

pub struct CliIntegration;

impl Integration for CliIntegration {
    fn name(&self) -> &'static str {
        "cli"
    }

    fn detect(&self, source: &str, file_path: &str) -> IntegrationData {
        let mut data = IntegrationData::default();
        let Some(tree) = parse(source) else { return data };
        find_main_guard(tree.root_node(), source, file_path, &mut data);
        data
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

/// `if __name__ == "__main__":` — a comparison of the bare name
/// `__name__` against the literal string `"__main__"`.
fn is_main_guard(test: Node<'_>, source: &str) -> bool {
    if test.kind() != "comparison_operator" {
        return false;
    }
    let mut cursor = test.walk();
    let children: Vec<Node<'_>> = test.named_children(&mut cursor).collect();
    if children.len() != 2 {
        return false;
    }
    let (left, right) = (children[0], children[1]);
    if left.kind() != "identifier" || text(left, source) != "__name__" {
        return false;
    }
    right.kind() == "string" && super::unquote(text(right, source)).as_deref() == Some("__main__")
}

fn call_name(call: Node<'_>, source: &str) -> Option<String> {
    let func = call.child_by_field_name("function")?;
    match func.kind() {
        "identifier" => Some(text(func, source).to_string()),
        "attribute" => func.child_by_field_name("attribute").map(|a| text(a, source).to_string()),
        _ => None,
    }
}

fn called_functions(body: Node<'_>, source: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut cursor = body.walk();
    for stmt in body.named_children(&mut cursor) {
        let expr = if stmt.kind() == "expression_statement" {
            let mut ec = stmt.walk();
            stmt.named_children(&mut ec).next()
        } else {
            None
        };
        if let Some(expr) = expr {
            if expr.kind() == "call" {
                if let Some(name) = call_name(expr, source) {
                    if !IGNORED_FUNCTIONS.contains(&name.as_str()) && seen.insert(name.clone()) {
                        out.push(name);
                    }
                }
            }
        }
    }
    out
}

fn find_main_guard(node: Node<'_>, source: &str, file_path: &str, data: &mut IntegrationData) {
    if node.kind() == "if_statement" {
        if let Some(test) = node.child_by_field_name("condition") {
            if is_main_guard(test, source) {
                let guard_line = line(node);
                let functions = node.child_by_field_name("consequence").map(|b| called_functions(b, source)).unwrap_or_default();

                if functions.is_empty() {
                    data.entrypoints.push(Entrypoint {
                        file: file_path.to_string(),
                        function: "<main_block>".to_string(),
                        line: guard_line,
                        kind: EntrypointKind::CliScript,
                        metadata: [
                            ("guard_line".to_string(), guard_line.to_string()),
                            ("framework".to_string(), "cli".to_string()),
                            ("inline".to_string(), "true".to_string()),
                        ]
                        .into_iter()
                        .collect(),
                    });
                } else {
                    for func_name in functions {
                        data.entrypoints.push(Entrypoint {
                            file: file_path.to_string(),
                            function: func_name,
                            line: guard_line,
                            kind: EntrypointKind::CliScript,
                            metadata: [
                                ("guard_line".to_string(), guard_line.to_string()),
                                ("framework".to_string(), "cli".to_string()),
                            ]
                            .into_iter()
                            .collect(),
                        });
                    }
                }
                return;
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        find_main_guard(child, source, file_path, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_called_functions_in_main_guard() {
        let src = "def main():\n    pass\n\n\nif __name__ == \"__main__\":\n    main()\n";
        let data = CliIntegration.detect(src, "script.py");
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].function, "main");
    }

    #[test]
    fn falls_back_to_main_block_when_no_calls() {
        let src = "if __name__ == \"__main__\":\n    x = 1\n    print(x)\n";
        let data = CliIntegration.detect(src, "script.py");
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].function, "<main_block>");
    }

    #[test]
    fn ignores_builtin_calls_when_picking_functions() {
        let src = "def run():\n    pass\n\n\nif __name__ == \"__main__\":\n    print(\"start\")\n    run()\n";
        let data = CliIntegration.detect(src, "script.py");
        assert_eq!(data.entrypoints.len(), 1);
        assert_eq!(data.entrypoints[0].function, "run");
    }

    #[test]
    fn non_main_guard_if_is_ignored() {
        let src = "if x == 1:\n    run()\n";
        let data = CliIntegration.detect(src, "script.py");
        assert!(data.entrypoints.is_empty());
    }
}
