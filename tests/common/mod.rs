#![allow(dead_code)]

use std::sync::Arc;

use invariance::config::{InstanceSettings, PersistenceSettings};
use invariance::logic::{Call, LogicDescriptor, LogicManifest, LogicUnit, Outcome, RegistryLogic};
use invariance::registry::AnalysisRecord;
use invariance::storage::Slots;
use invariance::{Address, AppResult, CallContext, Instance, RegistryError, RoleId, ANALYZER};

pub fn addr(tag: &str) -> Address { Address::derive(tag.as_bytes()) }

pub fn test_settings() -> InstanceSettings {
    InstanceSettings { persistence: PersistenceSettings { fsync: false }, ..InstanceSettings::default() }
}

pub fn baseline() -> Arc<dyn LogicUnit> { Arc::new(RegistryLogic::baseline().unwrap()) }

pub fn logic_from(manifest: &LogicManifest) -> Arc<dyn LogicUnit> { Arc::new(RegistryLogic::from_manifest(manifest).unwrap()) }

pub struct Harness {
    pub instance: Instance,
    pub admin: Address,
    pub analyzer: Address,
}

impl Harness {
    pub fn admin_ctx(&self) -> CallContext { CallContext::new(self.admin) }
    pub fn analyzer_ctx(&self) -> CallContext { CallContext::new(self.analyzer) }
}

/// Instance on the baseline logic, initialized by `admin`, with `analyzer` holding ANALYZER.
pub fn deployed() -> Harness {
    let admin = addr("admin");
    let analyzer = addr("analyzer");
    let instance = Instance::instantiate(addr("instance"), baseline(), test_settings()).unwrap();
    instance.initialize(&CallContext::new(admin), admin).unwrap();
    instance.grant_role(&CallContext::new(admin), ANALYZER, analyzer).unwrap();
    Harness { instance, admin, analyzer }
}

/// How a `Faulty` unit misreads storage.
#[derive(Clone, Copy)]
pub enum Fault {
    /// reports every score one higher than stored
    InflatedScores,
    /// forgets the last holder of every role
    DropsHolder,
    /// runs every call to completion, then reports failure
    RejectsAfterWrite,
}

/// Delegates execution to the registry logic but misreads the slots.
pub struct Faulty {
    inner: RegistryLogic,
    descriptor: LogicDescriptor,
    fault: Fault,
}

impl Faulty {
    pub fn new(fault: Fault) -> Arc<dyn LogicUnit> {
        let manifest = LogicManifest { name: "faulty-registry".into(), version: 2, ..LogicManifest::baseline() };
        Arc::new(Self { inner: RegistryLogic::baseline().unwrap(), descriptor: manifest.descriptor().unwrap(), fault })
    }
}

impl LogicUnit for Faulty {
    fn descriptor(&self) -> &LogicDescriptor { &self.descriptor }

    fn execute(&self, slots: &mut Slots, ctx: &CallContext, call: Call, out: &mut Vec<invariance::events::Notification>) -> AppResult<Outcome> {
        let outcome = self.inner.execute(slots, ctx, call, out)?;
        match self.fault {
            Fault::RejectsAfterWrite => Err(RegistryError::invalid_input("call", "rejected after write")),
            _ => Ok(outcome),
        }
    }

    fn has_role(&self, slots: &Slots, role: RoleId, account: &Address) -> bool {
        match self.fault {
            Fault::DropsHolder => self.role_members(slots, role).contains(account),
            _ => self.inner.has_role(slots, role, account),
        }
    }

    fn role_admin(&self, slots: &Slots, role: RoleId) -> RoleId { self.inner.role_admin(slots, role) }

    fn role_members(&self, slots: &Slots, role: RoleId) -> Vec<Address> {
        let mut m = self.inner.role_members(slots, role);
        if let Fault::DropsHolder = self.fault { m.pop(); }
        m
    }

    fn get_analysis(&self, slots: &Slots, entity: &Address) -> Option<AnalysisRecord> {
        let mut rec = self.inner.get_analysis(slots, entity)?;
        if let Fault::InflatedScores = self.fault { rec.fraud_surface = rec.fraud_surface.saturating_add(1); }
        Some(rec)
    }

    fn analyzed_entities(&self, slots: &Slots) -> Vec<Address> { self.inner.analyzed_entities(slots) }
}
