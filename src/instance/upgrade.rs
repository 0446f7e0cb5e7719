//! Logic replacement behind the stable address.
//!
//! `Active{v}` -> `Upgrading{from,to}` -> `Active{v+1}` on commit, or back to
//! `Active{v}` on rollback. The write lock is held across the whole attempt,
//! so callers never observe `Upgrading`. No data is copied: the swap only
//! changes which unit interprets the slots, and the slots themselves are only
//! ever borrowed immutably here. After the swap a deterministic sample of role
//! holders and records is re-read through the new unit and compared with the
//! same sample read through the old one. `InstanceStatus::fingerprint` lets an
//! operator confirm from outside that storage came through unchanged.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::access::ADMIN;
use crate::context::CallContext;
use crate::error::{AppResult, RegistryError};
use crate::events::Notification;
use crate::ident::{Address, LogicId, RoleId};
use crate::logic::LogicUnit;
use crate::registry::AnalysisRecord;
use crate::storage::{LogicRevision, Slots};

use super::{guard, Instance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpgradePhase {
    Active { logic: LogicId, version: u64 },
    Upgrading { from: LogicId, to: LogicId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub address: Address,
    pub previous: LogicId,
    pub current: LogicId,
    pub version: u64,
    pub changed: bool,
}

#[derive(Debug, PartialEq)]
struct RoleSample {
    role: RoleId,
    admin: RoleId,
    holders: Vec<Address>,
    held: Vec<bool>,
}

/// What the verification step compares across the swap.
#[derive(Debug, PartialEq)]
struct StateSample {
    roles: Vec<RoleSample>,
    records: Vec<(Address, Option<AnalysisRecord>)>,
}

impl StateSample {
    /// Read the first `n` holders of every stored role and the first `n`
    /// records through `logic`. The keys come from storage, the values from
    /// the logic, so a unit that misreads the slots shows up as a mismatch.
    fn take(logic: &dyn LogicUnit, slots: &Slots, n: usize) -> Self {
        let roles = slots
            .roles()
            .roles()
            .into_iter()
            .map(|role| {
                let stored: Vec<Address> = slots.roles().members(role).into_iter().take(n).collect();
                let holders: Vec<Address> = logic.role_members(slots, role).into_iter().take(n).collect();
                let held = stored.iter().map(|a| logic.has_role(slots, role, a)).collect();
                RoleSample { role, admin: logic.role_admin(slots, role), holders, held }
            })
            .collect();
        let records = slots
            .registry()
            .entities()
            .into_iter()
            .take(n)
            .map(|e| (e, logic.get_analysis(slots, &e)))
            .collect();
        Self { roles, records }
    }

    fn first_difference(&self, other: &StateSample) -> Option<String> {
        if self.roles.len() != other.roles.len() {
            return Some(format!("role count changed {} -> {}", self.roles.len(), other.roles.len()));
        }
        for (a, b) in self.roles.iter().zip(other.roles.iter()) {
            if a != b { return Some(format!("role {} reads differently", a.role)); }
        }
        for (a, b) in self.records.iter().zip(other.records.iter()) {
            if a != b { return Some(format!("record {} reads differently", a.0)); }
        }
        if self.records.len() != other.records.len() {
            return Some(format!("record count changed {} -> {}", self.records.len(), other.records.len()));
        }
        None
    }
}

impl Instance {
    /// Replace the active logic unit. Requires ADMIN and an initialized
    /// instance; the new unit's layout must be an additive extension of the
    /// current one. On verification mismatch the previous unit and layout
    /// are restored and `UpgradeValidationFailed` is returned.
    pub fn upgrade(&self, ctx: &CallContext, next: Arc<dyn LogicUnit>) -> AppResult<UpgradeReport> {
        let mut lock = self.state.write();
        let st = &mut *lock;

        st.slots.roles().check_role(ADMIN, &ctx.caller)?;
        guard::ensure_initialized(&st.slots)?;

        let desc = next.descriptor().clone();
        if desc.name.trim().is_empty() {
            return Err(RegistryError::invalid_input("logic.name", "must not be empty"));
        }
        desc.policy.validate()?;
        st.layout.check_extension(&desc.layout)?;

        let previous = st.logic.descriptor().id;
        let version = st.version();
        if previous == desc.id {
            info!(target: "invariance::upgrade", "{} already runs logic {}; nothing to do", self.address, previous);
            return Ok(UpgradeReport { address: self.address, previous, current: previous, version, changed: false });
        }

        st.phase = UpgradePhase::Upgrading { from: previous, to: desc.id };
        let sample = self.settings.verification_sample;
        let before = StateSample::take(st.logic.as_ref(), &st.slots, sample);

        let old_logic = std::mem::replace(&mut st.logic, next);
        let old_layout = std::mem::replace(&mut st.layout, desc.layout.clone());

        let after = StateSample::take(st.logic.as_ref(), &st.slots, sample);

        if let Some(reason) = before.first_difference(&after) {
            st.logic = old_logic;
            st.layout = old_layout;
            st.phase = UpgradePhase::Active { logic: previous, version };
            warn!(target: "invariance::upgrade", "upgrade of {} to {} rolled back: {}", self.address, desc.id, reason);
            return Err(RegistryError::validation_failed(reason));
        }

        let version = version + 1;
        st.history.push(LogicRevision { logic: desc.id, version, activated_at: Utc::now() });
        st.phase = UpgradePhase::Active { logic: desc.id, version };
        let committed = st.journal.commit(self.address, ctx.at, vec![Notification::Upgraded { logic: desc.id, version }]);
        info!(
            target: "invariance::upgrade",
            "{} upgraded {} -> {} ({} v{}), version {}",
            self.address, previous, desc.id, desc.name, desc.version, version
        );
        self.bus.publish(&committed);
        Ok(UpgradeReport { address: self.address, previous, current: desc.id, version, changed: true })
    }
}
