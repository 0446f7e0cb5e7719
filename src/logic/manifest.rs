//! JSON description of a logic unit: name, version, the slots it appends to
//! the base layout, the reserved tail it leaves and the policy it enforces.
//! The logic id is the xxh3-128 of the manifest's canonical JSON, so two
//! manifests with the same content are the same logic unit.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::RegistryPolicy;
use crate::error::{AppResult, RegistryError};
use crate::ident::LogicId;
use crate::storage::layout::BASE_RESERVED_SLOTS;
use crate::storage::{SlotField, StorageLayout};

use super::LogicDescriptor;

pub const BASELINE_NAME: &str = "invariance-registry";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicManifest {
    pub name: String,
    #[serde(default = "LogicManifest::default_version")]
    pub version: u32,
    /// Fields appended after the base slots, in order.
    #[serde(default)]
    pub extra_fields: Vec<SlotField>,
    #[serde(default = "LogicManifest::default_reserved")]
    pub reserved: usize,
    #[serde(default)]
    pub policy: RegistryPolicy,
}

impl LogicManifest {
    fn default_version() -> u32 { 1 }
    fn default_reserved() -> usize { BASE_RESERVED_SLOTS }

    /// The first release: base layout and default policy.
    pub fn baseline() -> Self {
        Self {
            name: BASELINE_NAME.to_string(),
            version: 1,
            extra_fields: Vec::new(),
            reserved: BASE_RESERVED_SLOTS,
            policy: RegistryPolicy::default(),
        }
    }

    pub fn layout(&self) -> StorageLayout { StorageLayout::extended(&self.extra_fields, self.reserved) }

    pub fn id(&self) -> AppResult<LogicId> {
        let canonical = serde_json::to_vec(self).map_err(|e| RegistryError::storage(e.to_string()))?;
        Ok(LogicId::of_bytes(&canonical))
    }

    /// Validate and build the descriptor a logic unit reports.
    pub fn descriptor(&self) -> AppResult<LogicDescriptor> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::invalid_input("logic.name", "must not be empty"));
        }
        let layout = self.layout();
        layout.validate()?;
        self.policy.validate()?;
        Ok(LogicDescriptor { id: self.id()?, name: self.name.clone(), version: self.version, layout, policy: self.policy.clone() })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read logic manifest {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse logic manifest {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() { std::fs::create_dir_all(dir).ok(); }
        std::fs::write(path, serde_json::to_vec_pretty(self)?).with_context(|| format!("write logic manifest {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SlotKind;

    #[test]
    fn id_follows_content() {
        let a = LogicManifest::baseline();
        let mut b = LogicManifest::baseline();
        assert_eq!(a.id().unwrap(), b.id().unwrap());
        b.version = 2;
        assert_ne!(a.id().unwrap(), b.id().unwrap());
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let m: LogicManifest = serde_json::from_str(r#"{"name": "registry-v2", "extra_fields": [{"name": "notes", "kind": "text"}], "reserved": 49}"#).unwrap();
        assert_eq!(m.version, 1);
        assert_eq!(m.policy, RegistryPolicy::default());
        let d = m.descriptor().unwrap();
        assert_eq!(d.layout.fields.last().unwrap().kind, SlotKind::Text);
        assert_eq!(d.layout.slot_count(), StorageLayout::base().slot_count());
    }

    #[test]
    fn malformed_manifests_are_rejected() {
        let m = LogicManifest { name: " ".into(), ..LogicManifest::baseline() };
        assert_eq!(m.descriptor().unwrap_err().code_str(), "invalid_input");
        let m = LogicManifest { reserved: 0, ..LogicManifest::baseline() };
        assert_eq!(m.descriptor().unwrap_err().code_str(), "incompatible_layout");
    }
}
