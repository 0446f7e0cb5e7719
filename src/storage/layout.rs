//! Declared storage layout of a logic unit.
//!
//! The base layout is the fixed-order slot list `initialized`, `roles`,
//! `registry`, followed by a reserved tail. A later logic unit may only
//! append fields: the existing prefix must match exactly (name, kind and
//! position), a reserved tail must remain, and the total slot count never
//! shrinks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, RegistryError};

pub const BASE_RESERVED_SLOTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Flag,
    RoleTable,
    AnalysisTable,
    Counter,
    Text,
    Bytes,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotKind::Flag => "flag",
            SlotKind::RoleTable => "role_table",
            SlotKind::AnalysisTable => "analysis_table",
            SlotKind::Counter => "counter",
            SlotKind::Text => "text",
            SlotKind::Bytes => "bytes",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotField {
    pub name: String,
    pub kind: SlotKind,
}

impl SlotField {
    pub fn new(name: impl Into<String>, kind: SlotKind) -> Self { Self { name: name.into(), kind } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayout {
    pub fields: Vec<SlotField>,
    pub reserved: usize,
}

impl StorageLayout {
    /// Layout of the first logic release.
    pub fn base() -> Self {
        Self {
            fields: vec![
                SlotField::new("initialized", SlotKind::Flag),
                SlotField::new("roles", SlotKind::RoleTable),
                SlotField::new("registry", SlotKind::AnalysisTable),
            ],
            reserved: BASE_RESERVED_SLOTS,
        }
    }

    /// Base layout plus additional fields; each new field consumes one reserved slot.
    pub fn extended(extra: &[SlotField], reserved: usize) -> Self {
        let mut l = Self::base();
        l.fields.extend(extra.iter().cloned());
        l.reserved = reserved;
        l
    }

    pub fn slot_count(&self) -> usize { self.fields.len() + self.reserved }

    /// Structural checks that do not depend on a predecessor.
    pub fn validate(&self) -> AppResult<()> {
        let base = Self::base();
        if self.fields.len() < base.fields.len() || self.fields[..base.fields.len()] != base.fields[..] {
            return Err(RegistryError::incompatible_layout("layout does not start with the base slots"));
        }
        let mut seen = std::collections::HashSet::new();
        for f in self.fields.iter() {
            if f.name.trim().is_empty() {
                return Err(RegistryError::incompatible_layout("slot field with empty name"));
            }
            if !seen.insert(f.name.as_str()) {
                return Err(RegistryError::incompatible_layout(format!("duplicate slot field '{}'", f.name)));
            }
        }
        if self.reserved == 0 {
            return Err(RegistryError::incompatible_layout("reserved tail is missing"));
        }
        Ok(())
    }

    /// Accept `next` only if it is an additive extension of `self`.
    pub fn check_extension(&self, next: &StorageLayout) -> AppResult<()> {
        next.validate()?;
        for (i, cur) in self.fields.iter().enumerate() {
            match next.fields.get(i) {
                None => {
                    return Err(RegistryError::incompatible_layout(format!("slot {} '{}' was removed", i, cur.name)));
                }
                Some(n) if n.name != cur.name => {
                    return Err(RegistryError::incompatible_layout(format!(
                        "slot {} reordered: expected '{}', found '{}'", i, cur.name, n.name
                    )));
                }
                Some(n) if n.kind != cur.kind => {
                    return Err(RegistryError::incompatible_layout(format!(
                        "slot {} '{}' changed kind {} -> {}", i, cur.name, cur.kind, n.kind
                    )));
                }
                Some(_) => {}
            }
        }
        if next.slot_count() < self.slot_count() {
            return Err(RegistryError::incompatible_layout(format!(
                "slot count shrinks from {} to {}", self.slot_count(), next.slot_count()
            )));
        }
        Ok(())
    }
}
