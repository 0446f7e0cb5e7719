//! Catalog of logic units known to this host.
//!
//! Snapshots persist only the id of the active logic unit; on reload the
//! catalog resolves that id back to a unit. Units come from the built-in
//! baseline, from manifests under `<state_dir>/logic/`, or from explicit
//! registration (tests, embedding hosts).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::ident::LogicId;

use super::{LogicManifest, LogicUnit, RegistryLogic};

#[derive(Clone, Default)]
pub struct LogicCatalog {
    inner: Arc<RwLock<HashMap<LogicId, Arc<dyn LogicUnit>>>>,
}

impl LogicCatalog {
    pub fn new() -> Self { Self::default() }

    /// Catalog preloaded with the baseline registry logic.
    pub fn with_baseline() -> AppResult<Self> {
        let c = Self::new();
        c.register(Arc::new(RegistryLogic::baseline()?));
        Ok(c)
    }

    /// Register (or replace) a unit under its descriptor id.
    pub fn register(&self, unit: Arc<dyn LogicUnit>) -> LogicId {
        let id = unit.descriptor().id;
        debug!(target: "invariance::logic", "catalog register {} ({} v{})", id, unit.descriptor().name, unit.descriptor().version);
        self.inner.write().insert(id, unit);
        id
    }

    pub fn register_manifest(&self, manifest: &LogicManifest) -> AppResult<Arc<dyn LogicUnit>> {
        let unit: Arc<dyn LogicUnit> = Arc::new(RegistryLogic::from_manifest(manifest)?);
        self.register(unit.clone());
        Ok(unit)
    }

    pub fn resolve(&self, id: &LogicId) -> Option<Arc<dyn LogicUnit>> { self.inner.read().get(id).cloned() }

    pub fn contains(&self, id: &LogicId) -> bool { self.inner.read().contains_key(id) }

    pub fn len(&self) -> usize { self.inner.read().len() }
    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }

    /// Register every `*.json` manifest in `dir`. Unreadable or invalid
    /// manifests are skipped with a warning. Returns how many were loaded.
    pub fn load_manifest_dir(&self, dir: &Path) -> Result<usize> {
        if !dir.exists() { return Ok(0); }
        let mut loaded = 0usize;
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        paths.sort();
        for p in paths {
            let manifest = match LogicManifest::load(&p) {
                Ok(m) => m,
                Err(e) => { warn!(target: "invariance::logic", "skipping manifest {}: {:#}", p.display(), e); continue; }
            };
            match self.register_manifest(&manifest) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(target: "invariance::logic", "skipping manifest {}: {}", p.display(), e),
            }
        }
        debug!(target: "invariance::logic", "loaded {} manifest(s) from {}", loaded, dir.display());
        Ok(loaded)
    }
}
