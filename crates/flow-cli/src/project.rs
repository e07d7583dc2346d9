//! Shared project-loading helpers: resolve `.flow/`, load config and
//! stubs, and build the whole-program model with the persistent
//! extraction cache wired in when the project has been initialized.

use std::path::PathBuf;
use std::sync::Mutex;

use flow_core::cache::FileCache;
use flow_core::config::FlowConfig;
use flow_core::stubs::StubLibrary;
use flow_core::types::ProgramModel;

pub struct Project {
    pub root: PathBuf,
    pub flow_dir: PathBuf,
    pub config: FlowConfig,
    pub stubs: StubLibrary,
}

impl Project {
    pub fn discover() -> Result<Self, String> {
        let root = std::env::current_dir().map_err(|e| format!("failed to get current directory: {e}"))?;
        let flow_dir = root.join(".flow");
        let config = FlowConfig::load(&flow_dir);
        let stubs = StubLibrary::load(&flow_dir);
        Ok(Self { root, flow_dir, config, stubs })
    }

    pub fn is_initialized(&self) -> bool {
        self.flow_dir.exists()
    }

    /// Build the whole-program model, consulting `.flow/cache.db` when the
    /// project has been initialized; falls back to an uncached build
    /// otherwise (matches one-shot `flow <cmd>` usage in an uninitialized
    /// repo, which still works — init only persists the cache and config).
    pub fn build_model(&self) -> ProgramModel {
        let integrations = flow_analyze::integrations::load_integrations(&self.flow_dir);
        if !self.is_initialized() {
            return flow_analyze::builder::build(&self.root, &integrations);
        }
        match FileCache::open(&self.flow_dir.join("cache.db")) {
            Ok(cache) => {
                let cache = Mutex::new(cache);
                flow_analyze::builder::build_with_cache(&self.root, &integrations, &self.config, Some(&cache))
            }
            Err(e) => {
                eprintln!("flow: warning: failed to open .flow/cache.db: {e}, analyzing without it");
                flow_analyze::builder::build(&self.root, &integrations)
            }
        }
    }
}
