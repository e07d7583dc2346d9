use std::collections::{HashMap, HashSet};

use crate::types::{simple_name, ClassDef};

/// Class/exception hierarchy with subtype closure via simple-name matching.
///
/// `parent[name] -> [base names]` and `child[base_simple_name] ->
/// [subclass names]` are inverted maps over *simple* names, per spec.md §3:
/// "The hierarchy distinguishes by simple (unqualified) names to tolerate
/// missing module paths." Seeded at construction with a snapshot of the
/// language's built-in exception hierarchy (ported from
/// `original_source/flow/models.py`).
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    parent: HashMap<String, Vec<String>>,
    child: HashMap<String, Vec<String>>,
    /// Simple name -> full ClassDef, when one was extracted from source.
    classes: HashMap<String, ClassDef>,
}

const BUILTIN_HIERARCHY: &[(&str, &str)] = &[
    ("Exception", "BaseException"),
    ("GeneratorExit", "BaseException"),
    ("KeyboardInterrupt", "BaseException"),
    ("SystemExit", "BaseException"),
    ("ArithmeticError", "Exception"),
    ("AssertionError", "Exception"),
    ("AttributeError", "Exception"),
    ("BufferError", "Exception"),
    ("EOFError", "Exception"),
    ("ImportError", "Exception"),
    ("LookupError", "Exception"),
    ("MemoryError", "Exception"),
    ("NameError", "Exception"),
    ("OSError", "Exception"),
    ("ReferenceError", "Exception"),
    ("RuntimeError", "Exception"),
    ("StopAsyncIteration", "Exception"),
    ("StopIteration", "Exception"),
    ("SyntaxError", "Exception"),
    ("SystemError", "Exception"),
    ("TypeError", "Exception"),
    ("ValueError", "Exception"),
    ("Warning", "Exception"),
    ("FloatingPointError", "ArithmeticError"),
    ("OverflowError", "ArithmeticError"),
    ("ZeroDivisionError", "ArithmeticError"),
    ("ModuleNotFoundError", "ImportError"),
    ("IndexError", "LookupError"),
    ("KeyError", "LookupError"),
    ("UnboundLocalError", "NameError"),
    ("BlockingIOError", "OSError"),
    ("ChildProcessError", "OSError"),
    ("ConnectionError", "OSError"),
    ("FileExistsError", "OSError"),
    ("FileNotFoundError", "OSError"),
    ("InterruptedError", "OSError"),
    ("IsADirectoryError", "OSError"),
    ("NotADirectoryError", "OSError"),
    ("PermissionError", "OSError"),
    ("ProcessLookupError", "OSError"),
    ("TimeoutError", "OSError"),
    ("BrokenPipeError", "ConnectionError"),
    ("ConnectionAbortedError", "ConnectionError"),
    ("ConnectionRefusedError", "ConnectionError"),
    ("ConnectionResetError", "ConnectionError"),
    ("NotImplementedError", "RuntimeError"),
    ("RecursionError", "RuntimeError"),
    ("IndentationError", "SyntaxError"),
    ("TabError", "IndentationError"),
    ("UnicodeError", "ValueError"),
    ("UnicodeDecodeError", "UnicodeError"),
    ("UnicodeEncodeError", "UnicodeError"),
    ("UnicodeTranslateError", "UnicodeError"),
    ("DeprecationWarning", "Warning"),
    ("UserWarning", "Warning"),
];

/// Base class names recognized as abstract-class markers (spec.md §3:
/// "inherits from a recognised abstract marker (e.g. a base named `ABC`)").
pub const ABSTRACT_MARKERS: &[&str] = &["ABC", "Protocol"];

impl ClassHierarchy {
    pub fn new() -> Self {
        let mut h = Self::default();
        for (child, parent) in BUILTIN_HIERARCHY {
            h.add_edge(child, parent);
        }
        h
    }

    fn add_edge(&mut self, name: &str, base: &str) {
        let name = simple_name(name).to_string();
        let base = simple_name(base).to_string();
        let parents = self.parent.entry(name.clone()).or_default();
        if !parents.contains(&base) {
            parents.push(base.clone());
        }
        let children = self.child.entry(base).or_default();
        if !children.contains(&name) {
            children.push(name);
        }
    }

    /// Idempotent: adding the same class twice is a no-op beyond the first.
    pub fn add_class(&mut self, class: &ClassDef) {
        let simple = simple_name(&class.qualified_name).to_string();
        for base in &class.base_names {
            self.add_edge(&simple, base);
        }
        self.classes.insert(simple, class.clone());
        self.parent.entry(simple_name(&class.qualified_name).to_string()).or_default();
    }

    pub fn get_class(&self, simple: &str) -> Option<&ClassDef> {
        self.classes.get(simple_name(simple))
    }

    /// Traverses parent chains by simple name, bounded by an explicit
    /// visited set to tolerate cycles in ill-formed source (spec.md §9).
    pub fn is_subclass_of(&self, name: &str, ancestor: &str) -> bool {
        let name = simple_name(name);
        let ancestor = simple_name(ancestor);
        if name == ancestor {
            return true;
        }
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(cur) = stack.pop() {
            if !visited.insert(cur.clone()) {
                continue;
            }
            if cur == ancestor {
                return true;
            }
            if let Some(parents) = self.parent.get(&cur) {
                for p in parents {
                    if !visited.contains(p) {
                        stack.push(p.clone());
                    }
                }
            }
        }
        false
    }

    /// Transitive closure via the child map; never includes `name` itself
    /// (spec.md §3 invariant).
    pub fn get_all_subclasses(&self, name: &str) -> Vec<String> {
        let name = simple_name(name);
        let mut visited: HashSet<String> = HashSet::new();
        let mut result = Vec::new();
        let mut worklist: Vec<String> = self.child.get(name).cloned().unwrap_or_default();
        while let Some(cur) = worklist.pop() {
            if !visited.insert(cur.clone()) {
                continue;
            }
            result.push(cur.clone());
            if let Some(grandchildren) = self.child.get(&cur) {
                for g in grandchildren {
                    if !visited.contains(g) {
                        worklist.push(g.clone());
                    }
                }
            }
        }
        result
    }

    pub fn is_abstract_class(&self, simple: &str) -> bool {
        self.get_class(simple)
            .map(|c| {
                c.is_abstract
                    || c.base_names
                        .iter()
                        .any(|b| ABSTRACT_MARKERS.contains(&simple_name(b)))
            })
            .unwrap_or(false)
    }

    pub fn is_abstract_method(&self, class_simple: &str, method: &str) -> bool {
        self.get_class(class_simple)
            .map(|c| c.abstract_methods.iter().any(|m| m == method))
            .unwrap_or(false)
    }

    /// For every subclass of `base_class_simple` where `method` is present
    /// and not itself abstract, return `(subclass-name, ClassDef)`.
    pub fn get_concrete_implementations(
        &self,
        base_class_simple: &str,
        method: &str,
    ) -> Vec<(String, ClassDef)> {
        self.get_all_subclasses(base_class_simple)
            .into_iter()
            .filter_map(|sub| {
                let class = self.get_class(&sub)?;
                if self.is_abstract_method(&sub, method) {
                    None
                } else {
                    Some((sub, class.clone()))
                }
            })
            .collect()
    }

    pub fn all_class_names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_subclass_chain() {
        let h = ClassHierarchy::new();
        assert!(h.is_subclass_of("ValueError", "Exception"));
        assert!(h.is_subclass_of("FileNotFoundError", "OSError"));
        assert!(h.is_subclass_of("FileNotFoundError", "Exception"));
        assert!(!h.is_subclass_of("ValueError", "OSError"));
    }

    #[test]
    fn reflexive_but_not_in_subclasses() {
        let h = ClassHierarchy::new();
        assert!(h.is_subclass_of("ValueError", "ValueError"));
        assert!(!h
            .get_all_subclasses("ValueError")
            .contains(&"ValueError".to_string()));
    }

    #[test]
    fn custom_class_subtype_closure() {
        let mut h = ClassHierarchy::new();
        h.add_class(&ClassDef {
            name: "AppError".into(),
            qualified_name: "AppError".into(),
            file: "errors.py".into(),
            line: 1,
            base_names: vec!["Exception".into()],
            is_abstract: false,
            abstract_methods: vec![],
        });
        h.add_class(&ClassDef {
            name: "ValidationError".into(),
            qualified_name: "ValidationError".into(),
            file: "errors.py".into(),
            line: 5,
            base_names: vec!["AppError".into()],
            is_abstract: false,
            abstract_methods: vec![],
        });
        assert!(h.is_subclass_of("ValidationError", "AppError"));
        assert!(h.is_subclass_of("ValidationError", "Exception"));
        let subs = h.get_all_subclasses("AppError");
        assert!(subs.contains(&"ValidationError".to_string()));
    }

    #[test]
    fn cycle_defensive_traversal() {
        let mut h = ClassHierarchy::default();
        h.add_edge("A", "B");
        h.add_edge("B", "A");
        assert!(h.is_subclass_of("A", "B"));
        assert!(h.is_subclass_of("B", "A"));
        assert!(!h.is_subclass_of("A", "C"));
    }

    #[test]
    fn polymorphic_expansion_inputs() {
        let mut h = ClassHierarchy::new();
        h.add_class(&ClassDef {
            name: "Service".into(),
            qualified_name: "Service".into(),
            file: "svc.py".into(),
            line: 1,
            base_names: vec!["ABC".into()],
            is_abstract: true,
            abstract_methods: vec!["process".into()],
        });
        h.add_class(&ClassDef {
            name: "ServiceA".into(),
            qualified_name: "ServiceA".into(),
            file: "svc.py".into(),
            line: 10,
            base_names: vec!["Service".into()],
            is_abstract: false,
            abstract_methods: vec![],
        });
        h.add_class(&ClassDef {
            name: "ServiceB".into(),
            qualified_name: "ServiceB".into(),
            file: "svc.py".into(),
            line: 20,
            base_names: vec!["Service".into()],
            is_abstract: false,
            abstract_methods: vec![],
        });
        assert!(h.is_abstract_method("Service", "process"));
        let impls = h.get_concrete_implementations("Service", "process");
        assert_eq!(impls.len(), 2);
    }

    #[test]
    fn no_concrete_subclass_returns_empty() {
        let mut h = ClassHierarchy::new();
        h.add_class(&ClassDef {
            name: "Service".into(),
            qualified_name: "Service".into(),
            file: "svc.py".into(),
            line: 1,
            base_names: vec!["ABC".into()],
            is_abstract: true,
            abstract_methods: vec!["process".into()],
        });
        let impls = h.get_concrete_implementations("Service", "process");
        assert!(impls.is_empty());
    }

    #[test]
    fn add_class_idempotent() {
        let mut h = ClassHierarchy::new();
        let def = ClassDef {
            name: "Foo".into(),
            qualified_name: "Foo".into(),
            file: "a.py".into(),
            line: 1,
            base_names: vec!["Exception".into()],
            is_abstract: false,
            abstract_methods: vec![],
        };
        h.add_class(&def);
        h.add_class(&def);
        assert_eq!(h.child.get("Exception").unwrap().iter().filter(|n| *n == "Foo").count(), 1);
    }
}
