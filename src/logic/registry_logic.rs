use tracing::debug;

use crate::context::CallContext;
use crate::error::AppResult;
use crate::events::Notification;
use crate::ident::{Address, RoleId};
use crate::instance::guard;
use crate::registry::{AnalysisRecord, RegistryStore};
use crate::access::AccessControl;
use crate::storage::Slots;

use super::{Call, LogicDescriptor, LogicManifest, LogicUnit, Outcome};

/// The registry logic: initialization guard, role administration and
/// analysis recording over the base slots, parameterised by a manifest.
pub struct RegistryLogic {
    descriptor: LogicDescriptor,
}

impl RegistryLogic {
    pub fn from_manifest(manifest: &LogicManifest) -> AppResult<Self> {
        Ok(Self { descriptor: manifest.descriptor()? })
    }

    pub fn baseline() -> AppResult<Self> { Self::from_manifest(&LogicManifest::baseline()) }
}

impl LogicUnit for RegistryLogic {
    fn descriptor(&self) -> &LogicDescriptor { &self.descriptor }

    fn execute(&self, slots: &mut Slots, ctx: &CallContext, call: Call, out: &mut Vec<Notification>) -> AppResult<Outcome> {
        debug!(target: "invariance::logic", "{} v{}: {} from {}", self.descriptor.name, self.descriptor.version, call.name(), ctx.caller);
        if let Call::Initialize { admin } = call {
            guard::initialize(slots, ctx, admin, out)?;
            return Ok(Outcome::Done);
        }
        guard::ensure_initialized(slots)?;
        let Slots { roles, registry, .. } = slots;
        match call {
            Call::Initialize { .. } => Ok(Outcome::Done),
            Call::GrantRole { role, account } => AccessControl::new(roles, out).grant_role(ctx, role, account).map(Outcome::Membership),
            Call::RevokeRole { role, account } => AccessControl::new(roles, out).revoke_role(ctx, role, account).map(Outcome::Membership),
            Call::RenounceRole { role } => AccessControl::new(roles, out).renounce_role(ctx, role).map(Outcome::Membership),
            Call::RecordAnalysis { entity, fraud_surface, risk_level, warnings } => {
                RegistryStore::new(registry, roles, &self.descriptor.policy, out)
                    .record_analysis(ctx, entity, fraud_surface, risk_level, warnings)
                    .map(Outcome::WarningCount)
            }
            Call::AddWarning { entity, warning } => {
                RegistryStore::new(registry, roles, &self.descriptor.policy, out)
                    .add_warning(ctx, entity, warning)
                    .map(Outcome::WarningCount)
            }
        }
    }

    fn has_role(&self, slots: &Slots, role: RoleId, account: &Address) -> bool { slots.roles().has_role(role, account) }

    fn role_admin(&self, slots: &Slots, role: RoleId) -> RoleId { slots.roles().role_admin(role) }

    fn role_members(&self, slots: &Slots, role: RoleId) -> Vec<Address> { slots.roles().members(role) }

    fn get_analysis(&self, slots: &Slots, entity: &Address) -> Option<AnalysisRecord> { slots.registry().get(entity).cloned() }

    fn analyzed_entities(&self, slots: &Slots) -> Vec<Address> { slots.registry().entities() }
}
