//! Role membership and the authorization gate used by every mutating call.
//! `RoleTable` is the stored state; `AccessControl` wraps a mutable borrow of
//! it for the authorised grant/revoke/renounce operations. Other components
//! authorise explicitly through `RoleTable::check_role`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::CallContext;
use crate::error::{AppResult, RegistryError};
use crate::events::Notification;
use crate::ident::{Address, RoleId};

/// Default admin role. Administers itself and, unless overridden, every other role.
pub const ADMIN: RoleId = RoleId::from_raw(0);
pub const ANALYZER_ROLE_NAME: &str = "ANALYZER_ROLE";
pub const ANALYZER: RoleId = RoleId::from_name(ANALYZER_ROLE_NAME);

/// Resolve a role from user text: `admin`, `analyzer`, a canonical role name
/// like `ANALYZER_ROLE`, or a `0x` id.
pub fn parse_role(text: &str) -> AppResult<RoleId> {
    let t = text.trim();
    if t.starts_with("0x") || t.starts_with("0X") {
        return RoleId::parse_hex(t);
    }
    match t.to_ascii_uppercase().as_str() {
        "ADMIN" | "DEFAULT_ADMIN_ROLE" => Ok(ADMIN),
        "ANALYZER" => Ok(ANALYZER),
        "" => Err(RegistryError::invalid_input("role", "empty role name")),
        name => Ok(RoleId::from_name(name)),
    }
}

/// Human label for well-known roles; the hex id otherwise.
pub fn role_label(role: RoleId) -> String {
    if role == ADMIN { "ADMIN".to_string() }
    else if role == ANALYZER { "ANALYZER".to_string() }
    else { role.to_string() }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTable {
    members: BTreeMap<RoleId, BTreeSet<Address>>,
    /// role -> role that may grant/revoke it; absent means ADMIN
    admins: BTreeMap<RoleId, RoleId>,
}

impl RoleTable {
    pub fn has_role(&self, role: RoleId, account: &Address) -> bool {
        self.members.get(&role).map(|s| s.contains(account)).unwrap_or(false)
    }

    pub fn role_admin(&self, role: RoleId) -> RoleId { self.admins.get(&role).copied().unwrap_or(ADMIN) }

    pub fn members(&self, role: RoleId) -> Vec<Address> {
        self.members.get(&role).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    pub fn member_count(&self, role: RoleId) -> usize { self.members.get(&role).map(|s| s.len()).unwrap_or(0) }

    /// Roles with at least one holder, in id order.
    pub fn roles(&self) -> Vec<RoleId> {
        self.members.iter().filter(|(_, s)| !s.is_empty()).map(|(r, _)| *r).collect()
    }

    /// The authorization gate: `Unauthorized` unless `account` holds `role`.
    pub fn check_role(&self, role: RoleId, account: &Address) -> AppResult<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            debug!(target: "invariance::access", "denied: account={} role={}", account, role_label(role));
            Err(RegistryError::Unauthorized { account: *account, role })
        }
    }

    pub(crate) fn set_role_admin(&mut self, role: RoleId, admin_role: RoleId) {
        if admin_role == ADMIN { self.admins.remove(&role); } else { self.admins.insert(role, admin_role); }
    }

    fn insert(&mut self, role: RoleId, account: Address) -> bool {
        self.members.entry(role).or_default().insert(account)
    }

    fn remove(&mut self, role: RoleId, account: &Address) -> bool {
        let removed = match self.members.get_mut(&role) {
            Some(set) => set.remove(account),
            None => false,
        };
        if removed && self.member_count(role) == 0 { self.members.remove(&role); }
        removed
    }
}

/// Authorised mutations over a role table. Notifications are pushed to `out`;
/// the instance publishes them only if the whole call commits.
pub struct AccessControl<'a> {
    table: &'a mut RoleTable,
    out: &'a mut Vec<Notification>,
}

impl<'a> AccessControl<'a> {
    pub fn new(table: &'a mut RoleTable, out: &'a mut Vec<Notification>) -> Self { Self { table, out } }

    /// Grant `role` to `account`. Granting a held role is a silent success.
    pub fn grant_role(&mut self, ctx: &CallContext, role: RoleId, account: Address) -> AppResult<bool> {
        self.table.check_role(self.table.role_admin(role), &ctx.caller)?;
        account.ensure_entity()?;
        Ok(self.grant_unchecked(role, account, ctx.caller))
    }

    /// Revoke `role` from `account`. Revoking an unheld role is a silent success.
    pub fn revoke_role(&mut self, ctx: &CallContext, role: RoleId, account: Address) -> AppResult<bool> {
        self.table.check_role(self.table.role_admin(role), &ctx.caller)?;
        self.revoke_checked(role, account, ctx.caller)
    }

    /// Drop the caller's own membership. Needs no role beyond the one renounced.
    pub fn renounce_role(&mut self, ctx: &CallContext, role: RoleId) -> AppResult<bool> {
        self.revoke_checked(role, ctx.caller, ctx.caller)
    }

    /// Used once by the initialization guard, before any admin exists.
    pub(crate) fn bootstrap(&mut self, admin: Address, sender: Address) {
        self.table.set_role_admin(ANALYZER, ADMIN);
        self.grant_unchecked(ADMIN, admin, sender);
    }

    fn grant_unchecked(&mut self, role: RoleId, account: Address, sender: Address) -> bool {
        let changed = self.table.insert(role, account);
        if changed {
            info!(target: "invariance::access", "granted role={} account={} sender={}", role_label(role), account, sender);
            self.out.push(Notification::RoleGranted { role, account, sender });
        }
        changed
    }

    fn revoke_checked(&mut self, role: RoleId, account: Address, sender: Address) -> AppResult<bool> {
        if !self.table.has_role(role, &account) { return Ok(false); }
        if role == ADMIN && self.table.member_count(ADMIN) == 1 {
            return Err(RegistryError::LastAdmin { account });
        }
        self.table.remove(role, &account);
        info!(target: "invariance::access", "revoked role={} account={} sender={}", role_label(role), account, sender);
        self.out.push(Notification::RoleRevoked { role, account, sender });
        Ok(true)
    }
}
