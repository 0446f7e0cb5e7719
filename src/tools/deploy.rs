use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::ADMIN;
use crate::config::InstanceSettings;
use crate::context::CallContext;
use crate::ident::{Address, LogicId};
use crate::instance::Instance;
use crate::logic::{LogicManifest, LogicUnit, RegistryLogic};
use crate::paths;

#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Becomes the initial ADMIN holder.
    pub deployer: Address,
    /// Logic to deploy; the baseline manifest when `None`.
    pub manifest: Option<LogicManifest>,
    /// Build and initialize in memory only; nothing is written.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub address: Address,
    pub logic: LogicId,
    pub logic_name: String,
    pub admin: Address,
    pub dry_run: bool,
}

/// Instantiate behind a fresh stable address, initialize with the deployer
/// as admin, check the admin role landed, then persist.
pub fn deploy(state_dir: &Path, settings: InstanceSettings, opts: &DeployOptions) -> Result<DeployReport> {
    opts.deployer.ensure_entity()?;
    if paths::snapshot_path(state_dir).exists() {
        bail!("an instance is already deployed in '{}'", state_dir.display());
    }
    if opts.dry_run {
        warn!(target: "invariance::tools", "DRY_RUN mode: nothing will be written to '{}'", state_dir.display());
    }

    let manifest = opts.manifest.clone().unwrap_or_else(LogicManifest::baseline);
    let logic: Arc<dyn LogicUnit> = Arc::new(RegistryLogic::from_manifest(&manifest)?);

    let mut seed = opts.deployer.as_bytes().to_vec();
    seed.extend_from_slice(Uuid::new_v4().as_bytes());
    let address = Address::derive(&seed);

    let instance = Instance::instantiate(address, logic, settings)?;
    instance.initialize(&CallContext::new(opts.deployer), opts.deployer)?;
    if !instance.has_role(ADMIN, &opts.deployer) {
        bail!("Deployment verification failed: admin role not assigned");
    }

    let status = instance.status();
    if !opts.dry_run {
        std::fs::create_dir_all(state_dir)?;
        if manifest != LogicManifest::baseline() {
            super::store_manifest(state_dir, &manifest)?;
        }
        instance.persist(state_dir)?;
    }
    info!(
        target: "invariance::tools",
        "deployed {} logic={} ({}) admin={} dry_run={}",
        address, status.logic, status.logic_name, opts.deployer, opts.dry_run
    );
    Ok(DeployReport { address, logic: status.logic, logic_name: status.logic_name, admin: opts.deployer, dry_run: opts.dry_run })
}
