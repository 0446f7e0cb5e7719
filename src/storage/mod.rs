//!
//! invariance storage module
//! -------------------------
//! Logic-independent state of one deployed instance. `Slots` holds the
//! fixed-order fields (initialization flag, role table, registry); logic
//! units interpret it but never own it, so swapping logic never relocates
//! data. `layout` describes the slot order that upgrades must preserve and
//! `snapshot` persists a whole instance image to disk.

use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};

use crate::access::RoleTable;
use crate::error::AppResult;
use crate::registry::AnalysisTable;

pub mod layout;
pub mod snapshot;

pub use layout::{SlotField, SlotKind, StorageLayout};
pub use snapshot::{InstanceImage, LogicRevision};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    /// slot 0: set once by the initialization guard
    pub(crate) initialized: bool,
    /// slot 1
    pub(crate) roles: RoleTable,
    /// slot 2
    pub(crate) registry: AnalysisTable,
}

impl Slots {
    pub fn is_initialized(&self) -> bool { self.initialized }
    pub fn roles(&self) -> &RoleTable { &self.roles }
    pub fn registry(&self) -> &AnalysisTable { &self.registry }

    /// crc32 over the encoded role table and registry, in slot order.
    pub fn fingerprint(&self) -> AppResult<u32> {
        let mut hasher = Crc32::new();
        hasher.update(&[self.initialized as u8]);
        hasher.update(&bincode::serialize(&self.roles)?);
        hasher.update(&bincode::serialize(&self.registry)?);
        Ok(hasher.finalize())
    }
}
