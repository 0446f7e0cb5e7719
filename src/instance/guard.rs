//! One-time initialization. The "already run" flag is slot 0 of the
//! instance storage, so it survives every logic replacement.

use tracing::info;

use crate::access::AccessControl;
use crate::context::CallContext;
use crate::error::{AppResult, RegistryError};
use crate::events::Notification;
use crate::ident::Address;
use crate::storage::Slots;

/// Initializer generation recorded in the `Initialized` notification.
pub const INITIALIZER_VERSION: u64 = 1;

pub fn ensure_initialized(slots: &Slots) -> AppResult<()> {
    if slots.initialized { Ok(()) } else { Err(RegistryError::NotInitialized) }
}

/// Grant ADMIN to `admin` and set the flag. Fails without mutation if the
/// flag is already set or `admin` is the null address.
pub fn initialize(slots: &mut Slots, ctx: &CallContext, admin: Address, out: &mut Vec<Notification>) -> AppResult<()> {
    if slots.initialized {
        return Err(RegistryError::AlreadyInitialized);
    }
    admin.ensure_entity()?;
    slots.initialized = true;
    out.push(Notification::Initialized { version: INITIALIZER_VERSION });
    AccessControl::new(&mut slots.roles, out).bootstrap(admin, ctx.caller);
    info!(target: "invariance::instance", "initialized: admin={} by={}", admin, ctx.caller);
    Ok(())
}
