//!
//! invariance instance
//! -------------------
//! The stable-address dispatcher. An `Instance` owns the storage slots, the
//! event journal and a reference to the active logic unit. Every mutating
//! call takes the write lock for its whole check-then-mutate round, runs
//! through the active logic unit on a scratch copy of the slots and, only if
//! it succeeds, swaps the copy in and commits the buffered notifications to
//! the journal and the live bus.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::InstanceSettings;
use crate::context::CallContext;
use crate::error::{AppResult, RegistryError};
use crate::events::{Event, EventBus, EventFilter, Journal};
use crate::ident::{Address, LogicId, RoleId};
use crate::logic::{Call, LogicCatalog, LogicUnit, Outcome};
use crate::registry::{AnalysisRecord, RiskLevel, Warning};
use crate::storage::snapshot::save_image;
use crate::storage::{InstanceImage, LogicRevision, Slots, StorageLayout};

pub mod guard;
pub mod upgrade;

pub use upgrade::{UpgradePhase, UpgradeReport};

pub(crate) struct InstanceState {
    pub(crate) logic: Arc<dyn LogicUnit>,
    pub(crate) phase: UpgradePhase,
    pub(crate) layout: StorageLayout,
    pub(crate) slots: Slots,
    pub(crate) history: Vec<LogicRevision>,
    pub(crate) journal: Journal,
}

impl InstanceState {
    pub(crate) fn version(&self) -> u64 { self.history.last().map(|r| r.version).unwrap_or(0) }
}

/// Summary of an instance for operators.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub address: Address,
    pub logic: LogicId,
    pub logic_name: String,
    pub logic_release: u32,
    pub version: u64,
    pub initialized: bool,
    pub slot_count: usize,
    pub reserved_slots: usize,
    pub roles: Vec<RoleId>,
    pub analyzed: usize,
    pub events: usize,
    /// crc32 over the encoded slots; equal across an upgrade.
    pub fingerprint: Option<u32>,
}

pub struct Instance {
    address: Address,
    settings: InstanceSettings,
    state: RwLock<InstanceState>,
    bus: EventBus,
}

impl Instance {
    /// Put `logic` behind a fresh stable address with empty storage.
    pub fn instantiate(address: Address, logic: Arc<dyn LogicUnit>, settings: InstanceSettings) -> AppResult<Self> {
        address.ensure_entity()?;
        let layout = logic.descriptor().layout.clone();
        layout.validate()?;
        let id = logic.descriptor().id;
        info!(target: "invariance::instance", "instantiated {} with logic {} ({})", address, id, logic.descriptor().name);
        let state = InstanceState {
            phase: UpgradePhase::Active { logic: id, version: 1 },
            logic,
            layout,
            slots: Slots::default(),
            history: vec![LogicRevision { logic: id, version: 1, activated_at: Utc::now() }],
            journal: Journal::default(),
        };
        Ok(Self::from_state(address, state, settings))
    }

    fn from_state(address: Address, state: InstanceState, settings: InstanceSettings) -> Self {
        let bus = EventBus::new(settings.event_capacity);
        Self { address, settings, state: RwLock::new(state), bus }
    }

    pub fn address(&self) -> Address { self.address }
    pub fn settings(&self) -> &InstanceSettings { &self.settings }

    // ---- mutating calls ----

    pub fn initialize(&self, ctx: &CallContext, admin: Address) -> AppResult<()> {
        self.execute(ctx, Call::Initialize { admin }).map(|_| ())
    }

    pub fn grant_role(&self, ctx: &CallContext, role: RoleId, account: Address) -> AppResult<bool> {
        self.execute(ctx, Call::GrantRole { role, account }).map(membership)
    }

    pub fn revoke_role(&self, ctx: &CallContext, role: RoleId, account: Address) -> AppResult<bool> {
        self.execute(ctx, Call::RevokeRole { role, account }).map(membership)
    }

    pub fn renounce_role(&self, ctx: &CallContext, role: RoleId) -> AppResult<bool> {
        self.execute(ctx, Call::RenounceRole { role }).map(membership)
    }

    pub fn record_analysis(
        &self,
        ctx: &CallContext,
        entity: Address,
        fraud_surface: u8,
        risk_level: RiskLevel,
        warnings: Vec<Warning>,
    ) -> AppResult<usize> {
        self.execute(ctx, Call::RecordAnalysis { entity, fraud_surface, risk_level, warnings }).map(warning_count)
    }

    pub fn add_warning(&self, ctx: &CallContext, entity: Address, warning: Warning) -> AppResult<usize> {
        self.execute(ctx, Call::AddWarning { entity, warning }).map(warning_count)
    }

    /// The logic unit runs against a scratch copy of the slots, which
    /// replaces the live slots only on success. A unit that writes and then
    /// fails leaves nothing behind. Events reach the bus under the lock, so
    /// subscribers see them in `seq` order.
    fn execute(&self, ctx: &CallContext, call: Call) -> AppResult<Outcome> {
        let name = call.name();
        let mut guard = self.state.write();
        let st = &mut *guard;
        let mut scratch = st.slots.clone();
        let mut out = Vec::new();
        match st.logic.execute(&mut scratch, ctx, call, &mut out) {
            Ok(outcome) => {
                st.slots = scratch;
                let committed = st.journal.commit(self.address, ctx.at, out);
                self.bus.publish(&committed);
                Ok(outcome)
            }
            Err(e) => {
                debug!(target: "invariance::instance", "{} rejected for {}: {}", name, ctx.caller, e);
                Err(e)
            }
        }
    }

    // ---- reads, always through the active logic ----

    pub fn has_role(&self, role: RoleId, account: &Address) -> bool {
        let st = self.state.read();
        st.logic.has_role(&st.slots, role, account)
    }

    pub fn role_admin(&self, role: RoleId) -> RoleId {
        let st = self.state.read();
        st.logic.role_admin(&st.slots, role)
    }

    pub fn role_members(&self, role: RoleId) -> Vec<Address> {
        let st = self.state.read();
        st.logic.role_members(&st.slots, role)
    }

    pub fn get_analysis(&self, entity: &Address) -> Option<AnalysisRecord> {
        let st = self.state.read();
        st.logic.get_analysis(&st.slots, entity)
    }

    pub fn analyzed_entities(&self) -> Vec<Address> {
        let st = self.state.read();
        st.logic.analyzed_entities(&st.slots)
    }

    pub fn is_initialized(&self) -> bool { self.state.read().slots.is_initialized() }

    pub fn active_logic(&self) -> LogicId { self.state.read().logic.descriptor().id }

    pub fn logic_version(&self) -> u64 { self.state.read().version() }

    pub fn phase(&self) -> UpgradePhase { self.state.read().phase }

    pub fn layout(&self) -> StorageLayout { self.state.read().layout.clone() }

    pub fn history(&self) -> Vec<LogicRevision> { self.state.read().history.clone() }

    pub fn events(&self, filter: &EventFilter) -> Vec<Event> { self.state.read().journal.query(filter) }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> { self.bus.subscribe() }

    pub fn status(&self) -> InstanceStatus {
        let st = self.state.read();
        let d = st.logic.descriptor();
        InstanceStatus {
            address: self.address,
            logic: d.id,
            logic_name: d.name.clone(),
            logic_release: d.version,
            version: st.version(),
            initialized: st.slots.is_initialized(),
            slot_count: st.layout.slot_count(),
            reserved_slots: st.layout.reserved,
            roles: st.slots.roles().roles(),
            analyzed: st.slots.registry().len(),
            events: st.journal.len(),
            fingerprint: st.slots.fingerprint().ok(),
        }
    }

    // ---- persistence ----

    pub fn image(&self) -> InstanceImage {
        let st = self.state.read();
        InstanceImage {
            address: self.address,
            layout: st.layout.clone(),
            slots: st.slots.clone(),
            history: st.history.clone(),
            journal: st.journal.clone(),
        }
    }

    /// Rebuild an instance from a persisted image, resolving its active
    /// logic through `catalog`.
    pub fn restore(image: InstanceImage, catalog: &LogicCatalog, settings: InstanceSettings) -> AppResult<Self> {
        let active = image
            .active()
            .cloned()
            .ok_or_else(|| RegistryError::storage("snapshot has no active logic revision"))?;
        let logic = catalog
            .resolve(&active.logic)
            .ok_or_else(|| RegistryError::storage(format!("logic {} is not in the catalog", active.logic)))?;
        if logic.descriptor().layout != image.layout {
            return Err(RegistryError::incompatible_layout(format!(
                "logic {} declares a layout different from the stored one", active.logic
            )));
        }
        debug!(target: "invariance::instance", "restored {} at version {} ({} events)", image.address, active.version, image.journal.len());
        let state = InstanceState {
            logic,
            phase: UpgradePhase::Active { logic: active.logic, version: active.version },
            layout: image.layout,
            slots: image.slots,
            history: image.history,
            journal: image.journal,
        };
        Ok(Self::from_state(image.address, state, settings))
    }

    /// Write the snapshot to `<state_dir>/instance.snap`.
    pub fn persist(&self, state_dir: &Path) -> AppResult<()> {
        let image = self.image();
        save_image(&crate::paths::snapshot_path(state_dir), &image, self.settings.persistence.fsync)?;
        Ok(())
    }
}

fn membership(o: Outcome) -> bool { matches!(o, Outcome::Membership(true)) }

fn warning_count(o: Outcome) -> usize {
    match o {
        Outcome::WarningCount(n) => n,
        _ => 0,
    }
}
