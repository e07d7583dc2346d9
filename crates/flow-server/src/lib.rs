//! HTTP server for flow, plus a file watcher that keeps its in-memory
//! model current.
//!
//! `flow serve --http` exposes `/health`, `/audit`, `/raises`, `/escapes`,
//! and `/routes-to` over a shared, rebuildable `ProgramModel`. `flow serve
//! --watch` runs the `notify`-based watcher alongside it so edits under
//! the project root trigger a rebuild without restarting the process.

pub mod http;
pub mod watcher;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use flow_core::types::ProgramModel;

pub type SharedModel = Arc<Mutex<ProgramModel>>;

/// Owns the whole-program model backing one running server. Rebuilding
/// replaces the model under the lock rather than mutating it in place —
/// propagation results computed against the old model stay internally
/// consistent for any request already in flight.
pub struct FlowServer {
    pub model: SharedModel,
    pub root_dir: PathBuf,
}

impl FlowServer {
    pub fn build(root_dir: PathBuf) -> Self {
        let model = build_model(&root_dir);
        Self { model: Arc::new(Mutex::new(model)), root_dir }
    }

    pub fn rebuild(&self) {
        let fresh = build_model(&self.root_dir);
        *self.model.lock().unwrap() = fresh;
    }
}

fn build_model(root_dir: &std::path::Path) -> ProgramModel {
    let integrations = flow_analyze::integrations::load_integrations(&root_dir.join(".flow"));
    flow_analyze::builder::build(root_dir, &integrations)
}
