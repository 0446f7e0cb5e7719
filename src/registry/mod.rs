//! Per-entity analysis records with bounded, append-only warning lists.
//!
//! Score, tier, timestamp and analyzer are a live assessment and are
//! overwritten by every `record_analysis`. Warnings are an audit trail: they
//! are only ever appended, up to `RegistryPolicy::max_warnings`. Every
//! operation validates fully before touching the table, so a rejected call
//! leaves no partial append behind.

mod model;

pub use model::{AnalysisRecord, AnalysisTable, RiskLevel, Warning, WarningCategory};

use tracing::{info, warn};

use crate::access::{RoleTable, ANALYZER};
use crate::config::RegistryPolicy;
use crate::context::CallContext;
use crate::error::{AppResult, RegistryError};
use crate::events::Notification;
use crate::ident::Address;

pub struct RegistryStore<'a> {
    table: &'a mut AnalysisTable,
    roles: &'a RoleTable,
    policy: &'a RegistryPolicy,
    out: &'a mut Vec<Notification>,
}

impl<'a> RegistryStore<'a> {
    pub fn new(table: &'a mut AnalysisTable, roles: &'a RoleTable, policy: &'a RegistryPolicy, out: &'a mut Vec<Notification>) -> Self {
        Self { table, roles, policy, out }
    }

    /// Record (or refresh) an analysis. Returns the entity's warning count afterwards.
    pub fn record_analysis(
        &mut self,
        ctx: &CallContext,
        entity: Address,
        fraud_surface: u8,
        risk_level: RiskLevel,
        warnings: Vec<Warning>,
    ) -> AppResult<usize> {
        self.roles.check_role(ANALYZER, &ctx.caller)?;
        entity.ensure_entity()?;
        self.policy.check_score(fraud_surface)?;
        for w in warnings.iter() { self.policy.check_warning(w)?; }
        self.check_capacity(entity, warnings.len())?;

        let appended = warnings.len();
        let timestamp = ctx.timestamp();
        let rec = self.table.upsert(entity, fraud_surface, risk_level, timestamp, ctx.caller);
        rec.warnings.extend(warnings);
        let count = rec.warnings.len();

        info!(
            target: "invariance::registry",
            "analysis recorded: entity={} fraud_surface={} risk_level={} analyzer={} warnings={}",
            entity, fraud_surface, risk_level, ctx.caller, count
        );
        self.out.push(Notification::ContractAnalyzed { entity, fraud_surface, risk_level, timestamp, analyzer: ctx.caller });
        if self.policy.is_high_risk(fraud_surface) {
            warn!(target: "invariance::registry", "high risk: entity={} fraud_surface={} threshold={}", entity, fraud_surface, self.policy.high_risk_threshold);
            self.out.push(Notification::HighRiskDetected { entity, fraud_surface });
        }
        if appended > 0 {
            self.out.push(Notification::WarningsUpdated { entity, count });
        }
        Ok(count)
    }

    /// Append one warning to an already analysed entity. Returns the new count.
    pub fn add_warning(&mut self, ctx: &CallContext, entity: Address, warning: Warning) -> AppResult<usize> {
        self.roles.check_role(ANALYZER, &ctx.caller)?;
        entity.ensure_entity()?;
        self.policy.check_warning(&warning)?;
        if self.table.get(&entity).is_none() {
            return Err(RegistryError::NotAnalyzed { entity });
        }
        self.check_capacity(entity, 1)?;

        let rec = self.table.get_mut(&entity).ok_or(RegistryError::NotAnalyzed { entity })?;
        rec.warnings.push(warning);
        let count = rec.warnings.len();
        info!(target: "invariance::registry", "warning added: entity={} count={}", entity, count);
        self.out.push(Notification::WarningsUpdated { entity, count });
        Ok(count)
    }

    fn check_capacity(&self, entity: Address, attempted: usize) -> AppResult<()> {
        let current = self.table.warning_count(&entity);
        let max = self.policy.max_warnings;
        if attempted > max || current + attempted > max {
            return Err(RegistryError::WarningLimitExceeded { entity, current, attempted, max });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
