//! Whole-program model builder.
//!
//! Mirrors `extract_from_directory` in the original implementation: walk
//! the project, extract every file in parallel, merge the per-file
//! results into one `ProgramModel`, run the configured integrations over
//! each file to collect entrypoints and global handlers, and finally
//! expand every integration's class-based views (DRF's `APIView` family,
//! Flask's `MethodView`, ...) into per-HTTP-method call edges now that
//! the whole program is in view, and correlate Flask-RESTful
//! `Resource`/`add_resource()` entrypoints across files.

use std::path::Path;
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use rayon::prelude::*;

use flow_core::cache::FileCache;
use flow_core::config::FlowConfig;
use flow_core::hash::content_fingerprint;
use flow_core::types::{simple_name, FileExtraction, ProgramModel, RERAISE_IDENTIFIERS};

use crate::integrations::Integration;

fn mtime_ns_and_size(metadata: &std::fs::Metadata) -> (i64, i64) {
    let mtime_ns = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    (mtime_ns, metadata.len() as i64)
}

/// Read `path` and run the full extraction + resolution pipeline for one
/// file, or `None` if it can't be read (the caller logs and skips it).
/// Consults `cache` first when given, and populates it on a miss — the
/// hit predicate is `(mtime_ns, size)` only, `content_hash` is stored for
/// diagnostics and never consulted on the read path (spec.md §4.2).
fn extract_file(root: &Path, relative_path: &str, cache: Option<&Mutex<FileCache>>) -> Option<FileExtraction> {
    let full_path = root.join(relative_path);
    let metadata = std::fs::metadata(&full_path).ok()?;
    let (mtime_ns, size) = mtime_ns_and_size(&metadata);

    if let Some(cache) = cache {
        if let Ok(guard) = cache.lock() {
            if let Some(cached) = guard.get(relative_path, mtime_ns, size) {
                return Some(cached);
            }
        }
    }

    let source = std::fs::read(&full_path).ok()?;
    let mut extraction = flow_extract::extractor::extract(&source, &full_path.to_string_lossy(), relative_path);
    flow_extract::resolver::apply_return_type_resolution(&mut extraction.call_sites, &extraction.functions);

    if let Some(cache) = cache {
        let fingerprint = content_fingerprint(&source);
        if let Ok(guard) = cache.lock() {
            guard.put(relative_path, mtime_ns, size, &fingerprint, &extraction);
        }
    }

    Some(extraction)
}

/// Build the whole-program model from every `.py` file under `root`,
/// using the given integrations to detect entrypoints and global
/// handlers. Extraction runs in parallel across files, mirroring the
/// original's `ThreadPoolExecutor`-backed `extract_from_directory`; `cache`
/// is consulted/populated under a shared lock (single-writer, matching
/// spec.md §4.2/§5) when given.
pub fn build_with_cache(
    root: &Path,
    integrations: &[Box<dyn Integration>],
    config: &FlowConfig,
    cache: Option<&Mutex<FileCache>>,
) -> ProgramModel {
    let exclude = config.exclude_globs();
    let entries = flow_extract::walker::FileWalker::new(root).walk();

    let extractions: Vec<(String, FileExtraction)> = entries
        .par_iter()
        .filter(|entry| !exclude.is_match(&entry.relative_path))
        .filter_map(|entry| {
            extract_file(root, &entry.relative_path, cache).map(|ext| (entry.relative_path.clone(), ext))
        })
        .collect();

    let mut model = ProgramModel::default();
    let mut dispatch_view_classes: Vec<String> = Vec::new();

    for (relative_path, extraction) in &extractions {
        let source = std::fs::read_to_string(root.join(relative_path)).unwrap_or_default();

        for func in &extraction.functions {
            model.functions.insert(func.key(), func.clone());
            if let Some(rt) = &func.return_type {
                model.return_types.insert(func.key(), rt.clone());
            }
        }
        for class in &extraction.classes {
            model.classes.insert(class.key(), class.clone());
        }
        model.raise_sites.extend(extraction.raise_sites.iter().cloned());
        model.catch_sites.extend(extraction.catch_sites.iter().cloned());
        model.call_sites.extend(extraction.call_sites.iter().cloned());
        model.dependency_edges.extend(extraction.dependency_edges.iter().cloned());
        model.import_maps.insert(relative_path.clone(), extraction.import_map.clone());
        model.detected_frameworks.extend(extraction.detected_frameworks.iter().cloned());

        for integration in integrations {
            let data = integration.detect(&source, relative_path);
            model.entrypoints.extend(data.entrypoints);
            model.global_handlers.extend(data.global_handlers);
        }

        for class in &extraction.classes {
            let is_dispatch_view = integrations.iter().any(|integration| {
                class
                    .base_names
                    .iter()
                    .any(|b| integration.class_view_base_classes().contains(&flow_core::types::simple_name(b)))
            });
            if is_dispatch_view {
                dispatch_view_classes.push(class.qualified_name.clone());
            }
        }
    }

    for view_class in &dispatch_view_classes {
        if let Some(func) =
            model.functions.values().find(|f| f.containing_class.as_deref() == Some(view_class.as_str()))
        {
            let file = func.file.clone();
            if let Some((_, extraction)) = extractions.iter().find(|(p, _)| p == &file) {
                let original_count = extraction.call_sites.len();
                let mut scoped = extraction.clone();
                flow_extract::extractor::inject_drf_dispatch_calls(&mut scoped, view_class);
                model.call_sites.extend(scoped.call_sites.into_iter().skip(original_count));
            }
        }
    }

    model.entrypoints =
        crate::integrations::flask_restful::correlate_entrypoints(std::mem::take(&mut model.entrypoints));

    rewrite_factory_raises(&mut model);

    model
}

/// Rewrite a raise-site's type from a factory function's name to its
/// declared return type, project-wide, e.g. `raise http_exception(404,
/// "not found")` where `def http_exception(...) -> HTTPException` becomes
/// a raise of `HTTPException` (spec.md §8 scenario 4). Only rewrites when
/// exactly one function in the project shares that simple name and
/// declares a return type — an ambiguous name is left alone rather than
/// guessed at.
fn rewrite_factory_raises(model: &mut ProgramModel) {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    let mut return_type_by_name: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();
    for f in model.functions.values() {
        if let Some(rt) = &f.return_type {
            let simple = simple_name(&f.qualified_name);
            *counts.entry(simple).or_insert(0) += 1;
            return_type_by_name.entry(simple).or_insert(rt.as_str());
        }
    }

    for raise in &mut model.raise_sites {
        if raise.is_bare_raise || RERAISE_IDENTIFIERS.contains(&raise.exception_type.as_str()) {
            continue;
        }
        let name = simple_name(&raise.exception_type);
        if counts.get(name) == Some(&1) {
            if let Some(rt) = return_type_by_name.get(name) {
                raise.exception_type = (*rt).to_string();
            }
        }
    }
}

/// Cache-free convenience wrapper, used by tests and one-shot queries that
/// don't want `.flow/cache.db` touched.
pub fn build(root: &Path, integrations: &[Box<dyn Integration>]) -> ProgramModel {
    build_with_cache(root, integrations, &FlowConfig::default(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn builds_model_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("app.py"),
            "def inner():\n    raise ValueError('bad')\n\n\ndef outer():\n    inner()\n",
        )
        .unwrap();

        let model = build(dir.path(), &[]);
        assert_eq!(model.functions.len(), 2);
        assert_eq!(model.raise_sites.len(), 1);
        assert_eq!(model.call_sites.len(), 1);
    }

    #[test]
    fn rewrites_factory_raise_to_declared_return_type() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("app.py"),
            "def http_exception(code, msg) -> HTTPException:\n    pass\n\n\ndef create_user():\n    raise http_exception(404, 'not found')\n",
        )
        .unwrap();

        let model = build(dir.path(), &[]);
        assert_eq!(model.raise_sites.len(), 1);
        assert_eq!(model.raise_sites[0].exception_type, "HTTPException");
    }

    #[test]
    fn leaves_ambiguous_factory_name_alone() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def make() -> ValueError:\n    pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def make() -> OSError:\n    pass\n").unwrap();
        fs::write(dir.path().join("c.py"), "def caller():\n    raise make()\n").unwrap();

        let model = build(dir.path(), &[]);
        let raise = model.raise_sites.iter().find(|r| r.function.ends_with("caller")).unwrap();
        assert_eq!(raise.exception_type, "make");
    }

    #[test]
    fn exclude_globs_skip_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/lib.py"), "def f():\n    raise ValueError()\n").unwrap();
        fs::write(dir.path().join("app.py"), "def g():\n    raise OSError()\n").unwrap();

        let config = FlowConfig { exclude: vec!["vendor/**".to_string()], ..FlowConfig::default() };
        let model = build_with_cache(dir.path(), &[], &config, None);

        assert_eq!(model.functions.len(), 1);
        assert_eq!(model.raise_sites[0].exception_type, "OSError");
    }

    #[test]
    fn flask_restful_resource_and_registration_correlate_across_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("resources.py"),
            "class UserResource(Resource):\n    def get(self):\n        pass\n",
        )
        .unwrap();
        fs::write(dir.path().join("api.py"), "api.add_resource(UserResource, \"/users\")\n").unwrap();

        let integrations = crate::integrations::default_integrations();
        let model = build(dir.path(), &integrations);

        let matching: Vec<_> = model.entrypoints.iter().filter(|e| e.function == "UserResource.get").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].metadata.get("http_path").unwrap(), "/users");
    }

    #[test]
    fn second_build_hits_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "def inner():\n    raise ValueError('bad')\n").unwrap();

        let cache = Mutex::new(FileCache::in_memory().unwrap());
        let config = FlowConfig::default();

        let first = build_with_cache(dir.path(), &[], &config, Some(&cache));
        assert_eq!(cache.lock().unwrap().len(), 1);

        let second = build_with_cache(dir.path(), &[], &config, Some(&cache));
        assert_eq!(first.functions.len(), second.functions.len());
    }
}
