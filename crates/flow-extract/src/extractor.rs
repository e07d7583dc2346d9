//! Single-pass structural extraction from a Python source file.
//!
//! A stack-explicit tree-sitter walk mirroring the shape of
//! `TreeSitterParser`'s cursor-based traversal, but purpose-built for the
//! exception-flow data model rather than generic definitions/references.

use std::collections::{HashMap, HashSet};

use tree_sitter::{Node, Parser};

use flow_core::types::{
    function_key, CallSite, CatchSite, ClassDef, DependencyEdge, FileExtraction, FunctionDef,
    ImportInfo, RaiseSite, ResolutionKind,
};

const DRF_HTTP_METHODS: &[&str] = &[
    "get", "post", "put", "patch", "delete", "head", "options", "trace",
];
const DRF_ACTION_METHODS: &[&str] = &[
    "list",
    "create",
    "retrieve",
    "update",
    "partial_update",
    "destroy",
];

/// Extract structural information from one Python file. Total and
/// panic-free: a parse failure or unparsable root produces an empty
/// extraction rather than propagating an error.
pub fn extract(source: &[u8], file_path: &str, relative_path: &str) -> FileExtraction {
    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .is_err()
    {
        return FileExtraction::default();
    }
    let tree = match parser.parse(source, None) {
        Some(t) => t,
        None => return FileExtraction::default(),
    };
    if tree.root_node().has_error() {
        return FileExtraction::default();
    }

    let mut visitor = Visitor::new(file_path, relative_path, source);
    visitor.walk_block(tree.root_node());
    visitor.into_extraction()
}

struct Visitor<'a> {
    file_path: String,
    relative_path: String,
    source: &'a [u8],

    functions: Vec<FunctionDef>,
    classes: Vec<ClassDef>,
    raise_sites: Vec<RaiseSite>,
    catch_sites: Vec<CatchSite>,
    call_sites: Vec<CallSite>,
    dependency_edges: Vec<DependencyEdge>,
    imports: Vec<ImportInfo>,
    import_map: HashMap<String, String>,
    return_types: HashMap<String, String>,
    detected_frameworks: HashSet<String>,

    class_stack: Vec<String>,
    function_stack: Vec<String>,
    local_types: HashMap<String, String>,
    abstract_methods: HashMap<String, HashSet<String>>,
    class_bases: HashMap<String, Vec<String>>,
}

impl<'a> Visitor<'a> {
    fn new(file_path: &str, relative_path: &str, source: &'a [u8]) -> Self {
        Self {
            file_path: file_path.to_string(),
            relative_path: relative_path.to_string(),
            source,
            functions: Vec::new(),
            classes: Vec::new(),
            raise_sites: Vec::new(),
            catch_sites: Vec::new(),
            call_sites: Vec::new(),
            dependency_edges: Vec::new(),
            imports: Vec::new(),
            import_map: HashMap::new(),
            return_types: HashMap::new(),
            detected_frameworks: HashSet::new(),
            class_stack: Vec::new(),
            function_stack: Vec::new(),
            local_types: HashMap::new(),
            abstract_methods: HashMap::new(),
            class_bases: HashMap::new(),
        }
    }

    fn into_extraction(self) -> FileExtraction {
        FileExtraction {
            functions: self.functions,
            classes: self.classes,
            raise_sites: self.raise_sites,
            catch_sites: self.catch_sites,
            call_sites: self.call_sites,
            dependency_edges: self.dependency_edges,
            imports: self.imports,
            import_map: self.import_map,
            entrypoints: Vec::new(),
            global_handlers: Vec::new(),
            detected_frameworks: self.detected_frameworks.into_iter().collect(),
        }
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn line(&self, node: Node<'_>) -> u32 {
        node.start_position().row as u32 + 1
    }

    fn current_qualified_function(&self) -> String {
        if let Some(f) = self.function_stack.last() {
            if self.class_stack.is_empty() {
                f.clone()
            } else {
                format!("{}.{}", self.class_stack.join("."), f)
            }
        } else {
            "<module>".to_string()
        }
    }

    /// Walk every statement in a block (module body, class body, etc.),
    /// dispatching each to the matching visit_* handler.
    fn walk_block(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_stmt(child);
        }
    }

    fn visit_stmt(&mut self, node: Node<'a>) {
        match node.kind() {
            "import_statement" => self.visit_import(node),
            "import_from_statement" => self.visit_import_from(node),
            "class_definition" => self.visit_class(node),
            "function_definition" => self.visit_function(node),
            "decorated_definition" => self.visit_decorated(node),
            "raise_statement" => self.visit_raise(node),
            "try_statement" => self.visit_try(node),
            "expression_statement" => self.visit_expression_statement(node),
            "if_statement" | "with_statement" | "for_statement" | "while_statement" => {
                self.walk_compound(node)
            }
            "block" => self.walk_block(node),
            _ => self.walk_children_statements(node),
        }
    }

    /// Compound statements (if/for/while/with) nest a `block` per clause;
    /// walk each block child directly without treating the header as a stmt.
    fn walk_compound(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "block" {
                self.walk_block(child);
            } else {
                self.visit_expression_in(child);
            }
        }
    }

    /// Fallback: recurse into any node that might contain nested statements
    /// (e.g. else_clause, elif_clause) without double-counting the header.
    fn walk_children_statements(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "block" {
                self.walk_block(child);
            }
        }
    }

    fn visit_expression_in(&mut self, node: Node<'a>) {
        // Scan for call expressions inside a compound statement's header
        // (e.g. `for x in f():`) without treating it as a full statement.
        self.scan_calls(node);
    }

    fn visit_expression_statement(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "assignment" => self.visit_assignment(child),
                _ => self.scan_calls(child),
            }
        }
    }

    fn scan_calls(&mut self, node: Node<'a>) {
        if node.kind() == "call" {
            self.visit_call(node);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.scan_calls(child);
        }
    }

    fn visit_import(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    let module_name = self.text(child).to_string();
                    self.record_import(&module_name, &module_name, None, false, self.line(node));
                    let local = module_name.split('.').next().unwrap_or(&module_name).to_string();
                    self.import_map.insert(local, module_name.clone());
                    self.detect_framework(&module_name);
                }
                "aliased_import" => {
                    let name_node = child.child_by_field_name("name");
                    let alias_node = child.child_by_field_name("alias");
                    let module_name = name_node.map(|n| self.text(n).to_string()).unwrap_or_default();
                    let alias = alias_node.map(|n| self.text(n).to_string());
                    self.record_import(
                        &module_name,
                        &module_name,
                        alias.clone(),
                        false,
                        self.line(node),
                    );
                    let local = alias.unwrap_or_else(|| {
                        module_name.split('.').next().unwrap_or(&module_name).to_string()
                    });
                    self.import_map.insert(local, module_name.clone());
                    self.detect_framework(&module_name);
                }
                _ => {}
            }
        }
    }

    fn visit_import_from(&mut self, node: Node<'a>) {
        let module_node = node.child_by_field_name("module_name");
        let module_name = match module_node {
            Some(n) => self.text(n).to_string(),
            None => return,
        };
        self.detect_framework(&module_name);

        let mut cursor = node.walk();
        let mut saw_star = false;
        for child in node.children(&mut cursor) {
            match child.kind() {
                "wildcard_import" => {
                    saw_star = true;
                    self.record_import(&module_name, "*", None, true, self.line(node));
                }
                "dotted_name" if child != module_node.unwrap_or(child) => {
                    let name = self.text(child).to_string();
                    self.record_import(&module_name, &name, None, true, self.line(node));
                    self.import_map.insert(name.clone(), format!("{module_name}.{name}"));
                }
                "aliased_import" => {
                    let name_node = child.child_by_field_name("name");
                    let alias_node = child.child_by_field_name("alias");
                    let imported = name_node.map(|n| self.text(n).to_string()).unwrap_or_default();
                    let alias = alias_node.map(|n| self.text(n).to_string());
                    self.record_import(
                        &module_name,
                        &imported,
                        alias.clone(),
                        true,
                        self.line(node),
                    );
                    let local = alias.unwrap_or_else(|| imported.clone());
                    self.import_map.insert(local, format!("{module_name}.{imported}"));
                }
                _ => {}
            }
        }
        let _ = saw_star;
    }

    fn record_import(
        &mut self,
        module: &str,
        name: &str,
        alias: Option<String>,
        is_from_import: bool,
        line: u32,
    ) {
        self.imports.push(ImportInfo {
            file: self.file_path.clone(),
            module: module.to_string(),
            imported_name: name.to_string(),
            alias,
            is_from_import,
            line,
        });
    }

    fn detect_framework(&mut self, module_name: &str) {
        let lower = module_name.to_lowercase();
        if lower.contains("flask") {
            self.detected_frameworks.insert("flask".to_string());
        } else if lower.contains("fastapi") || lower.contains("starlette") {
            self.detected_frameworks.insert("fastapi".to_string());
        } else if lower.contains("django") || lower.contains("rest_framework") {
            self.detected_frameworks.insert("django".to_string());
        }
    }

    fn visit_decorated(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "function_definition" {
                self.visit_function_with_decorators(child, node);
            } else if child.kind() == "class_definition" {
                self.visit_class(child);
            }
        }
    }

    fn visit_class(&mut self, node: Node<'a>) {
        let name_node = match node.child_by_field_name("name") {
            Some(n) => n,
            None => return,
        };
        let class_name = self.text(name_node).to_string();

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for arg in superclasses.named_children(&mut cursor) {
                if let Some(base) = self.name_from_expr(arg) {
                    bases.push(base);
                }
            }
        }

        self.class_stack.push(class_name.clone());
        self.abstract_methods.insert(class_name.clone(), HashSet::new());
        self.class_bases.insert(class_name.clone(), bases.clone());

        if let Some(body) = node.child_by_field_name("body") {
            self.walk_block(body);
        }

        self.class_stack.pop();
        let abstract_methods = self
            .abstract_methods
            .remove(&class_name)
            .unwrap_or_default();
        let bases = self.class_bases.remove(&class_name).unwrap_or_default();
        let is_abstract = !abstract_methods.is_empty()
            || bases.iter().any(|b| b == "ABC" || b == "abc.ABC" || b == "Protocol");

        let qualified_name = if self.class_stack.is_empty() {
            class_name.clone()
        } else {
            format!("{}.{}", self.class_stack.join("."), class_name)
        };

        self.classes.push(ClassDef {
            name: class_name,
            qualified_name,
            file: self.relative_path.clone(),
            line: self.line(node),
            base_names: bases,
            is_abstract,
            abstract_methods: abstract_methods.into_iter().collect(),
        });
    }

    fn visit_function(&mut self, node: Node<'a>) {
        self.visit_function_impl(node, &[]);
    }

    fn visit_function_with_decorators(&mut self, node: Node<'a>, decorated: Node<'a>) {
        let mut decorators = Vec::new();
        let mut cursor = decorated.walk();
        for child in decorated.children(&mut cursor) {
            if child.kind() == "decorator" {
                decorators.push(self.text(child).to_string());
            }
        }
        self.visit_function_impl(node, &decorators);
    }

    fn visit_function_impl(&mut self, node: Node<'a>, decorators: &[String]) {
        let name_node = match node.child_by_field_name("name") {
            Some(n) => n,
            None => return,
        };
        let func_name = self.text(name_node).to_string();

        let is_method = !self.class_stack.is_empty();
        let class_name = self.class_stack.last().cloned();

        let qualified_name = if is_method {
            format!("{}.{}", self.class_stack.join("."), func_name)
        } else {
            func_name.clone()
        };

        let is_async = node
            .prev_sibling()
            .map(|s| self.text(s) == "async")
            .unwrap_or(false)
            || self.text(node).starts_with("async ");

        let mut return_type = None;
        if let Some(ret) = node.child_by_field_name("return_type") {
            let ty = self.text(ret).to_string();
            return_type = Some(ty.clone());
            let full_qualified = function_key(&self.relative_path, &qualified_name);
            self.return_types.insert(full_qualified, ty);
        }

        if is_method {
            if let Some(class_name) = &class_name {
                if self.is_abstract_method(node, decorators) {
                    self.abstract_methods
                        .entry(class_name.clone())
                        .or_default()
                        .insert(func_name.clone());
                }
            }
        }

        self.functions.push(FunctionDef {
            name: func_name.clone(),
            qualified_name: qualified_name.clone(),
            file: self.relative_path.clone(),
            line: self.line(node),
            is_method,
            is_async,
            containing_class: class_name,
            return_type,
        });

        let caller_qualified = function_key(&self.relative_path, &qualified_name);
        if let Some(params) = node.child_by_field_name("parameters") {
            self.extract_depends_calls(params, &func_name, &caller_qualified, self.line(node));
        }

        self.function_stack.push(func_name);
        let saved_locals = std::mem::take(&mut self.local_types);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk_block(body);
        }

        self.local_types = saved_locals;
        self.function_stack.pop();
    }

    fn is_abstract_method(&self, node: Node<'a>, decorators: &[String]) -> bool {
        if decorators
            .iter()
            .any(|d| d.contains("abstractmethod"))
        {
            return true;
        }
        let body = match node.child_by_field_name("body") {
            Some(b) => b,
            None => return false,
        };
        self.is_raise_not_implemented(body) || self.is_pass_or_ellipsis(body)
    }

    /// Allows a leading docstring before the terminal `raise NotImplementedError`.
    fn is_raise_not_implemented(&self, body: Node<'a>) -> bool {
        let stmts = self.non_trivial_statements(body);
        let Some(last) = stmts.last() else {
            return false;
        };
        if last.kind() != "raise_statement" {
            return false;
        }
        let mut cursor = last.walk();
        for child in last.named_children(&mut cursor) {
            let name = self.name_from_raise_expr(child);
            if name.as_deref() == Some("NotImplementedError") {
                return true;
            }
        }
        false
    }

    fn is_pass_or_ellipsis(&self, body: Node<'a>) -> bool {
        let stmts = self.non_trivial_statements(body);
        if stmts.len() != 1 {
            return false;
        }
        matches!(stmts[0].kind(), "pass_statement")
            || self.text(stmts[0]).trim() == "..."
    }

    fn non_trivial_statements<'b>(&self, body: Node<'b>) -> Vec<Node<'b>> {
        let mut cursor = body.walk();
        body.named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect()
    }

    fn name_from_raise_expr(&self, node: Node<'a>) -> Option<String> {
        match node.kind() {
            "identifier" => Some(self.text(node).to_string()),
            "call" => {
                let func = node.child_by_field_name("function")?;
                self.name_from_expr(func)
            }
            _ => None,
        }
    }

    fn visit_raise(&mut self, node: Node<'a>) {
        let qualified_function = self.current_qualified_function();
        let mut cursor = node.walk();
        let exc_node = node.named_children(&mut cursor).next();

        let is_bare_raise = exc_node.is_none();
        let mut exception_type = "Unknown".to_string();
        let mut message_expr = None;
        let mut snippet = String::new();

        if let Some(exc) = exc_node {
            snippet = self.text(node).to_string();
            match exc.kind() {
                "call" => {
                    if let Some(func) = exc.child_by_field_name("function") {
                        if let Some(name) = self.name_from_expr(func) {
                            exception_type = name;
                        }
                    }
                    if let Some(args) = exc.child_by_field_name("arguments") {
                        let mut ac = args.walk();
                        if let Some(first) = args.named_children(&mut ac).next() {
                            if matches!(first.kind(), "string" | "concatenated_string") {
                                message_expr = Some(self.text(first).to_string());
                            }
                        }
                    }
                }
                "identifier" => {
                    exception_type = self.text(exc).to_string();
                }
                _ => {}
            }
        }

        self.raise_sites.push(RaiseSite {
            file: self.relative_path.clone(),
            line: self.line(node),
            function: qualified_function,
            exception_type,
            is_bare_raise,
            snippet: snippet.trim().to_string(),
            message_expr,
        });
    }

    fn visit_try(&mut self, node: Node<'a>) {
        let qualified_function = self.current_qualified_function();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "block" {
                self.walk_block(child);
            } else if child.kind() == "except_clause" {
                self.visit_except_clause(child, &qualified_function);
            } else if child.kind() == "finally_clause" || child.kind() == "else_clause" {
                self.walk_children_statements(child);
            }
        }
    }

    fn visit_except_clause(&mut self, node: Node<'a>, qualified_function: &str) {
        let mut caught_types = Vec::new();
        let mut is_bare_except = true;
        let mut block = None;

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "block" => block = Some(child),
                "tuple" => {
                    is_bare_except = false;
                    let mut tc = child.walk();
                    for el in child.named_children(&mut tc) {
                        if let Some(name) = self.name_from_expr(el) {
                            caught_types.push(name);
                        }
                    }
                }
                "as_pattern" => {
                    is_bare_except = false;
                    if let Some(target) = child.named_child(0) {
                        if let Some(name) = self.name_from_expr(target) {
                            caught_types.push(name);
                        }
                    }
                }
                "identifier" | "attribute" => {
                    is_bare_except = false;
                    if let Some(name) = self.name_from_expr(child) {
                        caught_types.push(name);
                    }
                }
                _ => {}
            }
        }

        let reraises = block
            .map(|b| self.block_has_reraise(b))
            .unwrap_or(false);

        self.catch_sites.push(CatchSite {
            file: self.relative_path.clone(),
            line: self.line(node),
            function: qualified_function.to_string(),
            caught_types,
            is_bare_except,
            reraises,
        });

        if let Some(block) = block {
            self.walk_block(block);
        }
    }

    fn block_has_reraise(&self, body: Node<'a>) -> bool {
        let mut cursor = body.walk();
        body.named_children(&mut cursor)
            .any(|c| c.kind() == "raise_statement")
    }

    fn visit_call(&mut self, node: Node<'a>) {
        let current_function = self.current_qualified_function();
        let func = match node.child_by_field_name("function") {
            Some(f) => f,
            None => return,
        };

        let caller_qualified = function_key(&self.relative_path, &current_function);
        let mut callee_name = String::new();
        let mut callee_qualified = None;
        let mut resolution_kind = ResolutionKind::Unresolved;
        let mut is_method_call = false;

        match func.kind() {
            "attribute" => {
                let attr = match func.child_by_field_name("attribute") {
                    Some(a) => a,
                    None => return,
                };
                callee_name = self.text(attr).to_string();
                is_method_call = true;
                let base = func.child_by_field_name("object");

                if let Some(base) = base {
                    if base.kind() == "identifier" {
                        let base_name = self.text(base).to_string();
                        if base_name == "self" && !self.class_stack.is_empty() {
                            callee_qualified = Some(format!(
                                "{}::{}.{}",
                                self.relative_path,
                                self.class_stack.join("."),
                                callee_name
                            ));
                            resolution_kind = ResolutionKind::SelfMethod;
                        } else if let Some(type_name) = self.local_types.get(&base_name).cloned() {
                            if let Some(module_qualified) = self.import_map.get(&type_name) {
                                callee_qualified =
                                    Some(format!("{module_qualified}.{callee_name}"));
                            } else {
                                callee_qualified = Some(format!(
                                    "{}::{}.{}",
                                    self.relative_path, type_name, callee_name
                                ));
                            }
                            resolution_kind = ResolutionKind::Constructor;
                        } else if let Some(module_qualified) = self.import_map.get(&base_name) {
                            callee_qualified = Some(format!("{module_qualified}.{callee_name}"));
                            resolution_kind = ResolutionKind::ModuleAttribute;
                            is_method_call = false;
                        }
                    }
                }
            }
            "identifier" => {
                callee_name = self.text(func).to_string();
                if let Some(module_qualified) = self.import_map.get(&callee_name) {
                    callee_qualified = Some(module_qualified.clone());
                    resolution_kind = ResolutionKind::Import;
                }
            }
            _ => return,
        }

        self.call_sites.push(CallSite {
            file: self.file_path.clone(),
            line: self.line(node),
            caller_simple: self.function_stack.last().cloned().unwrap_or_else(|| "<module>".into()),
            caller_qualified,
            callee_simple: callee_name,
            callee_qualified: callee_qualified.unwrap_or_default(),
            is_method_call,
            resolution_kind,
        });
    }

    /// FastAPI-style `Depends(f)` default-parameter scan (spec.md §4.1/§3).
    fn extract_depends_calls(
        &mut self,
        params: Node<'a>,
        caller_function: &str,
        caller_qualified: &str,
        line: u32,
    ) {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if param.kind() != "default_parameter" && param.kind() != "typed_default_parameter" {
                continue;
            }
            let Some(default) = param.child_by_field_name("value") else {
                continue;
            };
            if default.kind() != "call" {
                continue;
            }
            let Some(func) = default.child_by_field_name("function") else {
                continue;
            };
            let func_name = self.name_from_expr(func).unwrap_or_default();
            if func_name != "Depends" && func_name != "fastapi.Depends" {
                continue;
            }
            let Some(args) = default.child_by_field_name("arguments") else {
                continue;
            };
            let mut ac = args.walk();
            let Some(first_arg) = args.named_children(&mut ac).next() else {
                continue;
            };
            let dep_name = match self.name_from_expr(first_arg) {
                Some(n) => n,
                None => continue,
            };
            let qualified = self.import_map.get(&dep_name).cloned();

            self.call_sites.push(CallSite {
                file: self.file_path.clone(),
                line,
                caller_simple: caller_function.to_string(),
                caller_qualified: caller_qualified.to_string(),
                callee_simple: dep_name.clone(),
                callee_qualified: qualified.clone().unwrap_or_default(),
                is_method_call: false,
                resolution_kind: ResolutionKind::FastApiDepends,
            });

            self.dependency_edges.push(DependencyEdge {
                file: self.file_path.clone(),
                line,
                dependent_function: caller_qualified.to_string(),
                dependency_callee: qualified.unwrap_or(dep_name),
            });
        }
    }

    fn visit_assignment(&mut self, node: Node<'a>) {
        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        // scan nested calls regardless of whether we can track the type
        self.scan_calls(right);

        if right.kind() != "call" {
            return;
        }
        let Some(func) = right.child_by_field_name("function") else {
            return;
        };
        if func.kind() != "identifier" {
            return;
        }
        let type_name = self.text(func).to_string();

        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        match left.kind() {
            "identifier" => {
                let var_name = self.text(left).to_string();
                self.local_types.insert(var_name, type_name);
            }
            _ => {}
        }
    }
}

/// `f(x)`, `a.b.c`, `a.b(x)` -> dotted name string; returns `None` for
/// non-name-like expressions (literals, subscripts, etc.).
impl<'a> Visitor<'a> {
    fn name_from_expr(&self, node: Node<'a>) -> Option<String> {
        match node.kind() {
            "identifier" => Some(self.text(node).to_string()),
            "attribute" => {
                let object = node.child_by_field_name("object")?;
                let attr = node.child_by_field_name("attribute")?;
                let base = self.name_from_expr(object)?;
                Some(format!("{base}.{}", self.text(attr)))
            }
            "keyword_argument" => {
                let value = node.child_by_field_name("value")?;
                self.name_from_expr(value)
            }
            _ => None,
        }
    }
}

/// Class-based view dispatch injection is file-local: the view class and
/// its HTTP-method handlers live in the same module, so no cross-file data
/// is needed. Used for DRF's `APIView` family as well as any other
/// integration's `ClassRoutePattern`-matched views (e.g. Flask's
/// `MethodView`) — the method-name filter below already covers both
/// DRF's action-method names and the plain HTTP verbs a `MethodView`
/// subclass defines.
pub fn inject_drf_dispatch_calls(extraction: &mut FileExtraction, view_class: &str) {
    let methods: HashSet<&str> = DRF_HTTP_METHODS
        .iter()
        .chain(DRF_ACTION_METHODS.iter())
        .copied()
        .collect();

    let handler_names: Vec<String> = extraction
        .functions
        .iter()
        .filter(|f| {
            f.is_method
                && f.containing_class.as_deref() == Some(view_class)
                && methods.contains(f.name.as_str())
        })
        .map(|f| f.name.clone())
        .collect();

    for name in handler_names {
        let caller_qualified = function_key(&extraction.functions[0].file, view_class);
        let callee_qualified =
            function_key(&extraction.functions[0].file, &format!("{view_class}.{name}"));
        extraction.call_sites.push(CallSite {
            file: extraction.functions[0].file.clone(),
            line: 0,
            caller_simple: view_class.to_string(),
            caller_qualified,
            callee_simple: name.clone(),
            callee_qualified,
            is_method_call: true,
            resolution_kind: ResolutionKind::ImplicitDispatch,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(src: &str) -> FileExtraction {
        extract(src.as_bytes(), "a.py", "a.py")
    }

    #[test]
    fn extracts_simple_function() {
        let e = ex("def f():\n    pass\n");
        assert_eq!(e.functions.len(), 1);
        assert_eq!(e.functions[0].name, "f");
        assert!(!e.functions[0].is_method);
    }

    #[test]
    fn extracts_class_with_method() {
        let e = ex("class C:\n    def m(self):\n        pass\n");
        assert_eq!(e.classes.len(), 1);
        assert_eq!(e.classes[0].name, "C");
        assert_eq!(e.functions.len(), 1);
        assert!(e.functions[0].is_method);
        assert_eq!(e.functions[0].qualified_name, "C.m");
    }

    #[test]
    fn extracts_raise_with_call() {
        let e = ex("def f():\n    raise ValueError(\"bad\")\n");
        assert_eq!(e.raise_sites.len(), 1);
        assert_eq!(e.raise_sites[0].exception_type, "ValueError");
        assert!(!e.raise_sites[0].is_bare_raise);
        assert_eq!(e.raise_sites[0].function, "f");
    }

    #[test]
    fn extracts_bare_raise() {
        let e = ex("def f():\n    try:\n        pass\n    except Exception:\n        raise\n");
        assert_eq!(e.raise_sites.len(), 1);
        assert!(e.raise_sites[0].is_bare_raise);
        assert_eq!(e.raise_sites[0].exception_type, "Unknown");
    }

    #[test]
    fn extracts_except_clause_types() {
        let e = ex("def f():\n    try:\n        pass\n    except (ValueError, TypeError):\n        pass\n");
        assert_eq!(e.catch_sites.len(), 1);
        assert_eq!(e.catch_sites[0].caught_types, vec!["ValueError", "TypeError"]);
        assert!(!e.catch_sites[0].is_bare_except);
    }

    #[test]
    fn bare_except_sets_flag() {
        let e = ex("def f():\n    try:\n        pass\n    except:\n        pass\n");
        assert!(e.catch_sites[0].is_bare_except);
    }

    #[test]
    fn imports_populate_import_map() {
        let e = ex("import os\nfrom typing import Optional\n");
        assert_eq!(e.import_map.get("os").map(String::as_str), Some("os"));
        assert_eq!(
            e.import_map.get("Optional").map(String::as_str),
            Some("typing.Optional")
        );
    }

    #[test]
    fn self_method_call_resolves() {
        let e = ex("class C:\n    def a(self):\n        self.b()\n    def b(self):\n        pass\n");
        let call = e
            .call_sites
            .iter()
            .find(|c| c.callee_simple == "b")
            .unwrap();
        assert_eq!(call.resolution_kind, ResolutionKind::SelfMethod);
    }

    #[test]
    fn import_call_resolves() {
        let e = ex("import requests\ndef f():\n    requests.get(\"x\")\n");
        let call = e
            .call_sites
            .iter()
            .find(|c| c.callee_simple == "get")
            .unwrap();
        assert_eq!(call.resolution_kind, ResolutionKind::ModuleAttribute);
    }

    #[test]
    fn abstract_method_via_decorator() {
        let e = ex("from abc import ABC, abstractmethod\nclass C(ABC):\n    @abstractmethod\n    def m(self):\n        ...\n");
        assert!(e.classes[0].is_abstract);
        assert!(e.classes[0].abstract_methods.contains(&"m".to_string()));
    }

    #[test]
    fn abstract_method_via_not_implemented() {
        let e = ex("class C:\n    def m(self):\n        raise NotImplementedError\n");
        assert!(e.classes[0].abstract_methods.contains(&"m".to_string()));
    }

    #[test]
    fn fastapi_depends_produces_dependency_edge() {
        let e = ex("def get_db():\n    pass\ndef handler(db = Depends(get_db)):\n    pass\n");
        assert_eq!(e.dependency_edges.len(), 1);
        let call = e
            .call_sites
            .iter()
            .find(|c| c.resolution_kind == ResolutionKind::FastApiDepends)
            .unwrap();
        assert_eq!(call.callee_simple, "get_db");
    }

    #[test]
    fn syntax_error_yields_empty_extraction() {
        let e = ex("def f(:::\n    raise ValueError('bad')\n");
        assert_eq!(e, FileExtraction::default());
    }

    #[test]
    fn framework_detection_flask() {
        let e = ex("from flask import Flask\n");
        assert!(e.detected_frameworks.contains(&"flask".to_string()));
    }
}
