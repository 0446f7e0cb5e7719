use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::InstanceSettings;
use crate::context::CallContext;
use crate::ident::{Address, LogicId};
use crate::logic::LogicManifest;

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeOutcome {
    pub address: Address,
    pub old_logic: LogicId,
    pub new_logic: LogicId,
    pub version: u64,
    pub changed: bool,
}

/// Whether a manifest could replace the active logic, found without
/// upgrading anything.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub address: Address,
    pub current: LogicId,
    pub candidate: Option<LogicId>,
    pub already_active: bool,
    pub compatible: bool,
    pub issues: Vec<String>,
}

/// Load the instance in `state_dir`, switch it to the logic described by
/// `manifest` as `operator`, and persist the result.
pub fn upgrade(state_dir: &Path, settings: InstanceSettings, operator: Address, manifest: &LogicManifest) -> Result<UpgradeOutcome> {
    let (instance, catalog) = super::open_instance(state_dir, settings)?;
    let unit = catalog.register_manifest(manifest)?;
    let report = instance.upgrade(&CallContext::new(operator), unit)?;
    if report.changed {
        super::store_manifest(state_dir, manifest)?;
        instance.persist(state_dir)?;
    }
    info!(
        target: "invariance::tools",
        "upgrade {}: {} -> {} (changed={})",
        report.address, report.previous, report.current, report.changed
    );
    Ok(UpgradeOutcome {
        address: report.address,
        old_logic: report.previous,
        new_logic: report.current,
        version: report.version,
        changed: report.changed,
    })
}

/// Check `manifest` against the instance in `state_dir`: descriptor, policy
/// and layout extension. Every failing check is listed; nothing is written.
pub fn validate(state_dir: &Path, settings: InstanceSettings, manifest: &LogicManifest) -> Result<ValidationReport> {
    let (instance, _) = super::open_instance(state_dir, settings)?;
    let current = instance.active_logic();
    let mut issues = Vec::new();

    if manifest.name.trim().is_empty() {
        issues.push("logic name must not be empty".to_string());
    }
    if let Err(e) = manifest.policy.validate() {
        issues.push(e.to_string());
    }
    if let Err(e) = instance.layout().check_extension(&manifest.layout()) {
        issues.push(e.to_string());
    }
    let candidate = manifest.id().ok();

    debug!(target: "invariance::tools", "validate {} against {}: {} issue(s)", instance.address(), current, issues.len());
    Ok(ValidationReport {
        address: instance.address(),
        current,
        candidate,
        already_active: candidate == Some(current),
        compatible: issues.is_empty(),
        issues,
    })
}
