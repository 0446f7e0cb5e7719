//! Publish the manifest of an instance's active logic so third parties can
//! check which logic sits behind a stable address. Publishing something
//! that is already published counts as success.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::InstanceSettings;
use crate::ident::{Address, LogicId};
use crate::logic::LogicManifest;
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Published,
    AlreadyPublished,
}

pub trait Publisher {
    fn publish(&self, id: &LogicId, manifest: &LogicManifest) -> Result<PublishStatus>;
}

/// Publishes manifests as `<dir>/<logic id>.json`.
pub struct DirectoryPublisher {
    dir: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }
}

impl Publisher for DirectoryPublisher {
    fn publish(&self, id: &LogicId, manifest: &LogicManifest) -> Result<PublishStatus> {
        let path = self.dir.join(format!("{}.json", id));
        if path.exists() {
            let existing = LogicManifest::load(&path)?;
            if &existing == manifest { return Ok(PublishStatus::AlreadyPublished); }
            bail!("'{}' already holds a different manifest", path.display());
        }
        std::fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir.display()))?;
        manifest.save(&path)?;
        Ok(PublishStatus::Published)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub address: Address,
    pub logic: LogicId,
    pub logic_name: String,
    pub status: PublishStatus,
}

/// Find the manifest for `id`: the baseline, or a stored manifest file.
pub fn find_manifest(state_dir: &Path, id: &LogicId) -> Result<LogicManifest> {
    let baseline = LogicManifest::baseline();
    if baseline.id()? == *id { return Ok(baseline); }
    let path = paths::logic_manifest_path(state_dir, &id.to_string());
    let manifest = LogicManifest::load(&path).map_err(|e| anyhow!("no manifest for logic {}: {:#}", id, e))?;
    if manifest.id()? != *id {
        bail!("manifest '{}' does not hash to {}", path.display(), id);
    }
    Ok(manifest)
}

pub fn verify(state_dir: &Path, settings: InstanceSettings, publisher: &dyn Publisher) -> Result<VerifyReport> {
    let (instance, _) = super::open_instance(state_dir, settings)?;
    let status = instance.status();
    let manifest = find_manifest(state_dir, &status.logic)?;
    let outcome = publisher.publish(&status.logic, &manifest)?;
    info!(target: "invariance::tools", "verify {}: logic {} {:?}", status.address, status.logic, outcome);
    Ok(VerifyReport { address: status.address, logic: status.logic, logic_name: status.logic_name, status: outcome })
}
