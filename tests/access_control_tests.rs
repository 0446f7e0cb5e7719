//! Role administration through the stable address.

mod common;

use common::{addr, baseline, deployed, test_settings};
use invariance::events::{EventFilter, NotificationKind};
use invariance::{CallContext, Instance, RegistryError, RoleId, ADMIN, ANALYZER};

#[test]
fn admin_grants_and_revokes_analyzer() {
    let h = deployed();
    let y = addr("y");
    assert!(h.instance.grant_role(&h.admin_ctx(), ANALYZER, y).unwrap());
    assert!(h.instance.has_role(ANALYZER, &y));
    assert!(h.instance.revoke_role(&h.admin_ctx(), ANALYZER, y).unwrap());
    assert!(!h.instance.has_role(ANALYZER, &y));
    assert!(h.instance.has_role(ANALYZER, &h.analyzer));
}

#[test]
fn grant_and_revoke_are_idempotent() {
    let h = deployed();
    let before = h.instance.events(&EventFilter::default()).len();
    assert!(!h.instance.grant_role(&h.admin_ctx(), ANALYZER, h.analyzer).unwrap());
    assert!(!h.instance.revoke_role(&h.admin_ctx(), ANALYZER, addr("nobody")).unwrap());
    assert_eq!(h.instance.events(&EventFilter::default()).len(), before);
}

#[test]
fn non_admin_cannot_grant_and_state_is_unchanged() {
    let h = deployed();
    let members_before = h.instance.role_members(ANALYZER);
    let err = h.instance.grant_role(&h.analyzer_ctx(), ANALYZER, addr("z")).unwrap_err();
    assert_eq!(err, RegistryError::Unauthorized { account: h.analyzer, role: ADMIN });
    let err = h.instance.revoke_role(&h.analyzer_ctx(), ADMIN, h.admin).unwrap_err();
    assert_eq!(err.code_str(), "unauthorized");
    assert_eq!(h.instance.role_members(ANALYZER), members_before);
    assert!(h.instance.has_role(ADMIN, &h.admin));
}

#[test]
fn last_admin_cannot_leave() {
    let h = deployed();
    let err = h.instance.renounce_role(&h.admin_ctx(), ADMIN).unwrap_err();
    assert_eq!(err, RegistryError::LastAdmin { account: h.admin });
    let err = h.instance.revoke_role(&h.admin_ctx(), ADMIN, h.admin).unwrap_err();
    assert_eq!(err.code_str(), "last_admin");

    let second = addr("second-admin");
    h.instance.grant_role(&h.admin_ctx(), ADMIN, second).unwrap();
    assert!(h.instance.renounce_role(&h.admin_ctx(), ADMIN).unwrap());
    assert_eq!(h.instance.role_members(ADMIN), vec![second]);
}

#[test]
fn renounce_emits_revoked_with_self_as_sender() {
    let h = deployed();
    assert!(h.instance.renounce_role(&h.analyzer_ctx(), ANALYZER).unwrap());
    let revoked = h.instance.events(&EventFilter::kind(NotificationKind::RoleRevoked));
    assert_eq!(revoked.len(), 1);
    match &revoked[0].notification {
        invariance::events::Notification::RoleRevoked { role, account, sender } => {
            assert_eq!(*role, ANALYZER);
            assert_eq!(*account, h.analyzer);
            assert_eq!(*sender, h.analyzer);
        }
        other => panic!("unexpected {:?}", other),
    }
    // renouncing something not held is a silent no-op
    assert!(!h.instance.renounce_role(&h.analyzer_ctx(), ANALYZER).unwrap());
}

#[test]
fn custom_roles_are_administered_by_admin() {
    let h = deployed();
    let auditor = RoleId::from_name("AUDITOR_ROLE");
    assert_eq!(h.instance.role_admin(auditor), ADMIN);
    assert!(h.instance.grant_role(&h.admin_ctx(), auditor, addr("a")).unwrap());
    assert_eq!(h.instance.role_members(auditor), vec![addr("a")]);
}

#[test]
fn calls_require_initialization() {
    let instance = Instance::instantiate(addr("fresh"), baseline(), test_settings()).unwrap();
    let someone = addr("someone");
    let err = instance.grant_role(&CallContext::new(someone), ANALYZER, someone).unwrap_err();
    assert_eq!(err, RegistryError::NotInitialized);
    assert!(!instance.is_initialized());
    assert!(instance.events(&EventFilter::default()).is_empty());
}

#[test]
fn initialize_runs_once() {
    let h = deployed();
    let err = h.instance.initialize(&CallContext::new(addr("attacker")), addr("attacker")).unwrap_err();
    assert_eq!(err, RegistryError::AlreadyInitialized);
    assert!(!h.instance.has_role(ADMIN, &addr("attacker")));

    let fresh = Instance::instantiate(addr("fresh"), baseline(), test_settings()).unwrap();
    let err = fresh.initialize(&CallContext::new(addr("d")), invariance::Address::ZERO).unwrap_err();
    assert_eq!(err.code_str(), "invalid_entity");
    assert!(!fresh.is_initialized());
}
