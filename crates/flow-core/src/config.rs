use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    Strict,
    Default,
    Aggressive,
}

impl Default for ResolutionMode {
    fn default() -> Self {
        ResolutionMode::Default
    }
}

/// Typed configuration loaded from `.flow/config.yaml`. Every field is
/// `#[serde(default)]` so a partial or missing file degrades to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub resolution_mode: ResolutionMode,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub handled_base_classes: Vec<String>,
    #[serde(default)]
    pub async_boundaries: Vec<String>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            resolution_mode: ResolutionMode::default(),
            exclude: Vec::new(),
            handled_base_classes: Vec::new(),
            async_boundaries: Vec::new(),
        }
    }
}

impl FlowConfig {
    /// Load configuration from `.flow/config.yaml` inside the given flow
    /// directory. Returns defaults if the file doesn't exist or can't be
    /// parsed (spec.md §7: malformed config is a local, non-aborting
    /// failure).
    pub fn load(flow_dir: &Path) -> Self {
        let config_path = flow_dir.join("config.yaml");
        let content = match std::fs::read_to_string(&config_path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_yaml::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!(
                    "flow: warning: failed to parse {}: {}, using defaults",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Compiled async-boundary glob set; callee patterns matching this set
    /// are excluded from the forward call graph before the fixpoint runs.
    pub fn async_boundary_globs(&self) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.async_boundaries {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
    }

    /// Compiled exclude glob set; files matching it are skipped entirely
    /// during the walk, on top of `.gitignore`/`.flowignore` (spec.md
    /// §4.3).
    pub fn exclude_globs(&self) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
    }

    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.exclude_globs().is_match(relative_path)
    }

    pub fn is_async_boundary(&self, callee_qualified: &str) -> bool {
        self.async_boundary_globs().is_match(callee_qualified)
    }

    pub fn is_handled_base_class(&self, exception_type: &str, hierarchy: &crate::hierarchy::ClassHierarchy) -> bool {
        self.handled_base_classes.iter().any(|base| {
            crate::types::simple_name(base) == crate::types::simple_name(exception_type)
                || hierarchy.is_subclass_of(exception_type, base)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_config() {
        let cfg = FlowConfig::default();
        assert_eq!(cfg.resolution_mode, ResolutionMode::Default);
        assert!(cfg.exclude.is_empty());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let cfg = FlowConfig::load(Path::new("/nonexistent"));
        assert_eq!(cfg.resolution_mode, ResolutionMode::Default);
    }

    #[test]
    fn load_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "resolution_mode: strict\nexclude: [\"vendor/**\"]\nasync_boundaries: [\"*.apply_async\", \"*.delay\"]\n",
        )
        .unwrap();
        let cfg = FlowConfig::load(dir.path());
        assert_eq!(cfg.resolution_mode, ResolutionMode::Strict);
        assert_eq!(cfg.exclude, vec!["vendor/**"]);
        assert!(cfg.is_async_boundary("task.delay"));
        assert!(!cfg.is_async_boundary("task.run"));
    }

    #[test]
    fn load_partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "exclude: [\"build/**\"]\n").unwrap();
        let cfg = FlowConfig::load(dir.path());
        assert_eq!(cfg.resolution_mode, ResolutionMode::Default);
        assert_eq!(cfg.exclude, vec!["build/**"]);
    }

    #[test]
    fn malformed_yaml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "resolution_mode: [not, a, scalar\n").unwrap();
        let cfg = FlowConfig::load(dir.path());
        assert_eq!(cfg, FlowConfig::default());
    }

    #[test]
    fn handled_base_class_matches_subclass() {
        let cfg = FlowConfig {
            handled_base_classes: vec!["ApiError".into()],
            ..FlowConfig::default()
        };
        let mut h = crate::hierarchy::ClassHierarchy::new();
        h.add_class(&crate::types::ClassDef {
            name: "ApiError".into(),
            qualified_name: "ApiError".into(),
            file: "a.py".into(),
            line: 1,
            base_names: vec!["Exception".into()],
            is_abstract: false,
            abstract_methods: vec![],
        });
        h.add_class(&crate::types::ClassDef {
            name: "NotFoundError".into(),
            qualified_name: "NotFoundError".into(),
            file: "a.py".into(),
            line: 5,
            base_names: vec!["ApiError".into()],
            is_abstract: false,
            abstract_methods: vec![],
        });
        assert!(cfg.is_handled_base_class("NotFoundError", &h));
        assert!(!cfg.is_handled_base_class("ValueError", &h));
    }
}
