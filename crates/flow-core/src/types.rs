use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A closed tagged union describing how a call site was bound to its callee.
///
/// The resolver dispatches on this union with no reflective machinery —
/// see `ResolutionKind::confidence_contribution` for the rule §4.5 uses to
/// derive per-path confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    Import,
    SelfMethod,
    Constructor,
    ReturnType,
    ModuleAttribute,
    NameFallback,
    Polymorphic,
    FastApiDepends,
    ImplicitDispatch,
    Stub,
    Unresolved,
}

impl ResolutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionKind::Import => "import",
            ResolutionKind::SelfMethod => "self",
            ResolutionKind::Constructor => "constructor",
            ResolutionKind::ReturnType => "return-type",
            ResolutionKind::ModuleAttribute => "module-attribute",
            ResolutionKind::NameFallback => "name-fallback",
            ResolutionKind::Polymorphic => "polymorphic",
            ResolutionKind::FastApiDepends => "fastapi-depends",
            ResolutionKind::ImplicitDispatch => "implicit-dispatch",
            ResolutionKind::Stub => "stub",
            ResolutionKind::Unresolved => "unresolved",
        }
    }

    /// Whether this kind alone is "exact" (spec.md §4.5 confidence rule).
    pub fn is_exact(&self) -> bool {
        matches!(
            self,
            ResolutionKind::Import
                | ResolutionKind::SelfMethod
                | ResolutionKind::Constructor
                | ResolutionKind::ModuleAttribute
        )
    }
}

impl std::fmt::Display for ResolutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence level attached to a propagated-exception evidence path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// `<relative-file-path>::<qualified-name>` — the stable identity used by
/// every cross-component reference. Qualified names nest class names with
/// `.` (e.g. `UserView.get`).
pub type FunctionKey = String;
pub type ClassKey = String;

pub fn function_key(file: &str, qualified: &str) -> FunctionKey {
    format!("{file}::{qualified}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub qualified_name: String,
    pub file: String,
    pub line: u32,
    pub is_method: bool,
    pub is_async: bool,
    pub containing_class: Option<String>,
    pub return_type: Option<String>,
}

impl FunctionDef {
    pub fn key(&self) -> FunctionKey {
        function_key(&self.file, &self.qualified_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub qualified_name: String,
    pub file: String,
    pub line: u32,
    pub base_names: Vec<String>,
    pub is_abstract: bool,
    pub abstract_methods: Vec<String>,
}

impl ClassDef {
    pub fn key(&self) -> ClassKey {
        function_key(&self.file, &self.qualified_name)
    }
}

/// Identifier strings that mark a raise/raise-expression as "not a specific
/// type" — bare `raise` or re-raise of a caught exception variable. Filtered
/// from user-facing audit output, retained in the raw model (spec.md §9).
pub const RERAISE_IDENTIFIERS: &[&str] =
    &["Unknown", "e", "ex", "err", "exc", "error", "exception"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaiseSite {
    pub file: String,
    pub line: u32,
    pub function: String,
    pub exception_type: String,
    pub is_bare_raise: bool,
    pub snippet: String,
    pub message_expr: Option<String>,
}

impl RaiseSite {
    pub fn is_reraise_pattern(&self) -> bool {
        RERAISE_IDENTIFIERS.contains(&self.exception_type.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchSite {
    pub file: String,
    pub line: u32,
    pub function: String,
    pub caught_types: Vec<String>,
    pub is_bare_except: bool,
    pub reraises: bool,
}

impl CatchSite {
    /// Whether this clause matches `exception_type`, ignoring hierarchy —
    /// exact or bare. Callers combine with `ClassHierarchy::is_subclass_of`
    /// for the full match rule in §4.5.
    pub fn names_directly(&self, exception_type: &str) -> bool {
        self.is_bare_except
            || self
                .caught_types
                .iter()
                .any(|t| simple_name(t) == simple_name(exception_type))
    }
}

/// Strip a dotted/qualified name down to its final segment — the hierarchy
/// and catch-matching logic compares only simple names throughout (spec.md
/// §3 "ClassHierarchy... distinguishes by simple (unqualified) names").
pub fn simple_name(name: &str) -> &str {
    name.rsplit(['.', ':']).next().unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
    pub caller_simple: String,
    pub caller_qualified: String,
    pub callee_simple: String,
    pub callee_qualified: String,
    pub is_method_call: bool,
    pub resolution_kind: ResolutionKind,
}

/// A FastAPI-style `Depends(f)` dependency-injection edge. Kept alongside
/// the synthetic `CallSite` of kind `fastapi-depends` so `get_init_info`
/// style queries can report the raw dependency chain (see
/// `original_source/bubble/queries.py::get_init_info`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub file: String,
    pub line: u32,
    pub dependent_function: String,
    pub dependency_callee: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntrypointKind {
    HttpRoute,
    CliScript,
    QueueHandler,
    ScheduledJob,
    Test,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrypoint {
    pub file: String,
    pub function: String,
    pub line: u32,
    pub kind: EntrypointKind,
    pub metadata: HashMap<String, String>,
}

pub const GENERIC_EXCEPTION_TYPES: &[&str] = &["Exception", "BaseException"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalHandler {
    pub file: String,
    pub line: u32,
    pub function: String,
    pub handled_type: String,
}

impl GlobalHandler {
    pub fn is_generic(&self) -> bool {
        GENERIC_EXCEPTION_TYPES.contains(&simple_name(&self.handled_type))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub file: String,
    pub module: String,
    pub imported_name: String,
    pub alias: Option<String>,
    pub is_from_import: bool,
    pub line: u32,
}

/// The per-file import map: local binding name -> fully-qualified target.
pub type ImportMap = HashMap<String, String>;

/// Everything one file contributes to the program model. Produced by
/// `flow_extract::extract`; merged by `flow_analyze::builder::build`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileExtraction {
    pub functions: Vec<FunctionDef>,
    pub classes: Vec<ClassDef>,
    pub raise_sites: Vec<RaiseSite>,
    pub catch_sites: Vec<CatchSite>,
    pub call_sites: Vec<CallSite>,
    pub dependency_edges: Vec<DependencyEdge>,
    pub imports: Vec<ImportInfo>,
    pub import_map: ImportMap,
    pub entrypoints: Vec<Entrypoint>,
    pub global_handlers: Vec<GlobalHandler>,
    pub detected_frameworks: Vec<String>,
}

/// The merged whole-program model. Built once per invocation; read-only
/// after construction (spec.md §5 "build-then-read").
#[derive(Debug, Clone, Default)]
pub struct ProgramModel {
    pub functions: HashMap<FunctionKey, FunctionDef>,
    pub classes: HashMap<ClassKey, ClassDef>,
    pub raise_sites: Vec<RaiseSite>,
    pub catch_sites: Vec<CatchSite>,
    pub call_sites: Vec<CallSite>,
    pub dependency_edges: Vec<DependencyEdge>,
    pub entrypoints: Vec<Entrypoint>,
    pub global_handlers: Vec<GlobalHandler>,
    /// Per-file import map, keyed by relative file path.
    pub import_maps: HashMap<String, ImportMap>,
    /// function-key -> annotated return type name.
    pub return_types: HashMap<FunctionKey, String>,
    pub detected_frameworks: std::collections::HashSet<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}
