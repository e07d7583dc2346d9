//! Framework integrations: entrypoint and global-handler detection beyond
//! what the bare extractor can see on its own. Each integration runs over
//! every file in the project and contributes `Entrypoint`/`GlobalHandler`
//! records to the whole-program model.
//!
//! The original implementation built one libcst visitor per framework.
//! This port has no libcst, so every detector here walks the same
//! tree-sitter-python tree the extractor uses, grounded on the same
//! grammar vocabulary (`decorator`, `call`, `attribute`, `argument_list`).

pub mod cli;
pub mod detector_config;
pub mod django;
pub mod flask_restful;
pub mod generic;

use flow_core::types::{Entrypoint, GlobalHandler};

/// What one integration contributes for a single file.
#[derive(Debug, Clone, Default)]
pub struct IntegrationData {
    pub entrypoints: Vec<Entrypoint>,
    pub global_handlers: Vec<GlobalHandler>,
}

/// A framework detector run once per file during whole-program building.
pub trait Integration: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, source: &str, file_path: &str) -> IntegrationData;

    /// Exception types this framework converts into a handled HTTP
    /// response on its own (e.g. `fastapi.HTTPException`), so an escape
    /// through a route handler isn't actually left uncaught.
    fn handled_exceptions(&self) -> &[&str] {
        &[]
    }

    /// The HTTP response a framework-handled exception type gets turned
    /// into, e.g. `fastapi.HTTPException` -> `"HTTP {status_code}"`. `None`
    /// when this integration has no specific mapping for `type_name`, even
    /// if it's present in `handled_exceptions()`.
    fn get_exception_response(&self, type_name: &str) -> Option<String> {
        let _ = type_name;
        None
    }

    /// Base classes whose subclasses are class-based views: once the whole
    /// program is built, the model builder synthesizes implicit-dispatch
    /// call edges from each matching class to its HTTP-method handlers.
    /// Empty for integrations with no class-based-view story.
    fn class_view_base_classes(&self) -> &[&str] {
        &[]
    }
}

/// The built-in integrations, in the order the original tries them.
pub fn default_integrations() -> Vec<Box<dyn Integration>> {
    vec![
        Box::new(generic::GenericIntegration::new(generic::FLASK_CONFIG())),
        Box::new(generic::GenericIntegration::new(generic::FASTAPI_CONFIG())),
        Box::new(django::DjangoIntegration),
        Box::new(flask_restful::FlaskRestfulIntegration),
        Box::new(cli::CliIntegration),
    ]
}

/// The built-ins, plus one `GenericIntegration` per `.flow/detectors/*.toml`
/// file found under `flow_dir`. `flow_dir` is a project's `.flow` directory,
/// not its `detectors` subdirectory.
pub fn load_integrations(flow_dir: &std::path::Path) -> Vec<Box<dyn Integration>> {
    let mut all = default_integrations();
    all.extend(detector_config::load_user_detectors(flow_dir));
    all
}

/// Strip one layer of Python string-literal quoting (`'`, `"`, or triple
/// variants) from a `string` node's raw text. Returns `None` for anything
/// that doesn't look like a plain string literal.
pub(crate) fn unquote(raw: &str) -> Option<String> {
    let raw = raw.trim();
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(stripped) = raw.strip_prefix(quote) {
            if let Some(inner) = stripped.strip_suffix(quote) {
                return Some(inner.to_string());
            }
        }
    }
    None
}
