//! Operator tooling around a persisted instance: deploy a fresh instance,
//! upgrade its logic, publish logic manifests for verification. Tools work
//! on a state directory and use `anyhow` errors; core `RegistryError`s pass
//! through unchanged and can be recovered with `downcast_ref`.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::config::InstanceSettings;
use crate::instance::Instance;
use crate::logic::{LogicCatalog, LogicManifest};
use crate::paths;
use crate::storage::snapshot::load_image;

pub mod deploy;
pub mod upgrade;
pub mod verify;

/// Catalog for a state directory: baseline logic plus every stored manifest.
pub fn load_catalog(state_dir: &Path) -> Result<LogicCatalog> {
    let catalog = LogicCatalog::with_baseline()?;
    catalog.load_manifest_dir(&paths::logic_dir(state_dir))?;
    Ok(catalog)
}

/// Load the instance persisted in `state_dir`.
pub fn open_instance(state_dir: &Path, settings: InstanceSettings) -> Result<(Instance, LogicCatalog)> {
    let image = load_image(&paths::snapshot_path(state_dir))?
        .ok_or_else(|| anyhow!("no instance deployed in '{}'", state_dir.display()))?;
    let catalog = load_catalog(state_dir)?;
    let instance = Instance::restore(image, &catalog, settings)?;
    debug!(target: "invariance::tools", "opened {} from '{}'", instance.address(), state_dir.display());
    Ok((instance, catalog))
}

/// Store `manifest` under the logic dir, named by its id.
pub fn store_manifest(state_dir: &Path, manifest: &LogicManifest) -> Result<()> {
    let id = manifest.id()?;
    let stem = id.to_string();
    manifest.save(&paths::logic_manifest_path(state_dir, &stem)).with_context(|| format!("store manifest for {}", id))
}
