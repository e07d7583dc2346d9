//! File watcher that triggers a full model rebuild on changes.
//!
//! Uses the `notify` crate with debouncing (100ms) so a save-all in an
//! editor doesn't trigger one rebuild per file. Ignores `.flow/`,
//! `__pycache__`, `.git`, and other non-source directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::FlowServer;

/// Directories to ignore when watching for file changes.
const IGNORED_DIRS: &[&str] = &[
    ".flow",
    ".git",
    "__pycache__",
    "node_modules",
    "venv",
    ".venv",
    "target",
    "dist",
    "build",
];

/// File extensions to watch.
const WATCHED_EXTENSIONS: &[&str] = &["py"];

/// Start watching `server.root_dir`, rebuilding the model on every
/// debounced batch of changes. Runs until the returned watcher is
/// dropped; the background rebuild task runs for the life of the
/// process.
pub fn start_watching(server: Arc<FlowServer>) -> Result<RecommendedWatcher, notify::Error> {
    let root = server.root_dir.clone();
    let (event_tx, mut event_rx) = mpsc::channel::<PathBuf>(256);

    tokio::spawn(async move {
        let mut batch: Vec<PathBuf> = Vec::new();
        let debounce = Duration::from_millis(100);

        loop {
            match tokio::time::timeout(debounce, event_rx.recv()).await {
                Ok(Some(path)) => {
                    if !batch.contains(&path) {
                        batch.push(path);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    if !batch.is_empty() {
                        let n = batch.len();
                        batch.clear();
                        eprintln!("flow: rebuilding model ({n} file(s) changed)");
                        server.rebuild();
                    }
                }
            }
        }
    });

    let root_clone = root.clone();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            if matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                for path in event.paths {
                    if should_watch(&root_clone, &path) {
                        let _ = event_tx.blocking_send(path);
                    }
                }
            }
        }
    })?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

fn should_watch(root: &Path, path: &Path) -> bool {
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| WATCHED_EXTENSIONS.contains(&e))
        .unwrap_or(false);

    if !ext_ok {
        return false;
    }

    if let Ok(rel) = path.strip_prefix(root) {
        for component in rel.components() {
            if let std::path::Component::Normal(name) = component {
                if let Some(name_str) = name.to_str() {
                    if IGNORED_DIRS.contains(&name_str) {
                        return false;
                    }
                }
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watches_python_files() {
        let root = PathBuf::from("/project");
        assert!(should_watch(&root, &PathBuf::from("/project/src/foo.py")));
    }

    #[test]
    fn ignores_non_python_files() {
        let root = PathBuf::from("/project");
        assert!(!should_watch(&root, &PathBuf::from("/project/src/foo.md")));
        assert!(!should_watch(&root, &PathBuf::from("/project/img.png")));
    }

    #[test]
    fn ignores_excluded_dirs() {
        let root = PathBuf::from("/project");
        assert!(!should_watch(&root, &PathBuf::from("/project/.flow/cache.db")));
        assert!(!should_watch(
            &root,
            &PathBuf::from("/project/__pycache__/foo.py")
        ));
        assert!(!should_watch(
            &root,
            &PathBuf::from("/project/.git/hooks/pre-commit.py")
        ));
    }
}
