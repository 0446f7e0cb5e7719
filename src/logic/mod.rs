//! Replaceable logic units.
//!
//! A logic unit interprets the instance's `Slots` but never owns them. The
//! instance dispatches every call to whichever unit is active; an upgrade
//! swaps the `Arc<dyn LogicUnit>` and nothing else.

use serde::{Deserialize, Serialize};

use crate::config::RegistryPolicy;
use crate::context::CallContext;
use crate::error::AppResult;
use crate::events::Notification;
use crate::ident::{Address, LogicId, RoleId};
use crate::registry::{AnalysisRecord, RiskLevel, Warning};
use crate::storage::{Slots, StorageLayout};

pub mod catalog;
pub mod manifest;
pub mod registry_logic;

pub use catalog::LogicCatalog;
pub use manifest::LogicManifest;
pub use registry_logic::RegistryLogic;

/// A mutating call routed through the stable address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    Initialize { admin: Address },
    GrantRole { role: RoleId, account: Address },
    RevokeRole { role: RoleId, account: Address },
    RenounceRole { role: RoleId },
    RecordAnalysis { entity: Address, fraud_surface: u8, risk_level: RiskLevel, warnings: Vec<Warning> },
    AddWarning { entity: Address, warning: Warning },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::Initialize { .. } => "initialize",
            Call::GrantRole { .. } => "grant_role",
            Call::RevokeRole { .. } => "revoke_role",
            Call::RenounceRole { .. } => "renounce_role",
            Call::RecordAnalysis { .. } => "record_analysis",
            Call::AddWarning { .. } => "add_warning",
        }
    }
}

/// What a successful call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// membership actually changed
    Membership(bool),
    /// warning count of the entity after the call
    WarningCount(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicDescriptor {
    pub id: LogicId,
    pub name: String,
    pub version: u32,
    pub layout: StorageLayout,
    pub policy: RegistryPolicy,
}

pub trait LogicUnit: Send + Sync {
    fn descriptor(&self) -> &LogicDescriptor;

    /// Run one mutating call against `slots`. The dispatcher hands in a
    /// scratch copy and discards it, along with `out`, on `Err`.
    fn execute(&self, slots: &mut Slots, ctx: &CallContext, call: Call, out: &mut Vec<Notification>) -> AppResult<Outcome>;

    fn has_role(&self, slots: &Slots, role: RoleId, account: &Address) -> bool;
    fn role_admin(&self, slots: &Slots, role: RoleId) -> RoleId;
    fn role_members(&self, slots: &Slots, role: RoleId) -> Vec<Address>;
    fn get_analysis(&self, slots: &Slots, entity: &Address) -> Option<AnalysisRecord>;
    fn analyzed_entities(&self, slots: &Slots) -> Vec<Address>;
}
