use super::*;
use crate::access::{AccessControl, ADMIN};
use chrono::{TimeZone, Utc};

fn addr(tag: &str) -> Address { Address::derive(tag.as_bytes()) }

struct Fixture {
    roles: RoleTable,
    table: AnalysisTable,
    policy: RegistryPolicy,
    analyzer: Address,
}

fn fixture() -> Fixture {
    let admin = addr("admin");
    let analyzer = addr("analyzer");
    let mut roles = RoleTable::default();
    let mut out = Vec::new();
    let mut ac = AccessControl::new(&mut roles, &mut out);
    ac.bootstrap(admin, admin);
    ac.grant_role(&CallContext::new(admin), ANALYZER, analyzer).unwrap();
    Fixture { roles, table: AnalysisTable::default(), policy: RegistryPolicy::default(), analyzer }
}

fn warn_n(n: usize) -> Vec<Warning> {
    (0..n).map(|i| Warning::new(WarningCategory::Other, format!("finding {}", i))).collect()
}

#[test]
fn record_analysis_emits_analyzed_and_high_risk() {
    let mut f = fixture();
    let e = addr("entity");
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let ctx = CallContext::at(f.analyzer, at);
    let mut out = Vec::new();
    let count = RegistryStore::new(&mut f.table, &f.roles, &f.policy, &mut out)
        .record_analysis(&ctx, e, 85, RiskLevel::High, vec![])
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(out, vec![
        Notification::ContractAnalyzed { entity: e, fraud_surface: 85, risk_level: RiskLevel::High, timestamp: at.timestamp(), analyzer: f.analyzer },
        Notification::HighRiskDetected { entity: e, fraud_surface: 85 },
    ]);
    let rec = f.table.get(&e).unwrap();
    assert_eq!(rec.analyzer, f.analyzer);
    assert_eq!(rec.timestamp, at.timestamp());
}

#[test]
fn threshold_is_strict() {
    let mut f = fixture();
    let mut out = Vec::new();
    RegistryStore::new(&mut f.table, &f.roles, &f.policy, &mut out)
        .record_analysis(&CallContext::new(f.analyzer), addr("e"), 80, RiskLevel::Medium, vec![])
        .unwrap();
    assert!(!out.iter().any(|n| matches!(n, Notification::HighRiskDetected { .. })));
}

#[test]
fn later_analysis_overwrites_scalars_and_appends_warnings() {
    let mut f = fixture();
    let e = addr("e");
    let ctx = CallContext::new(f.analyzer);
    let mut out = Vec::new();
    let mut rs = RegistryStore::new(&mut f.table, &f.roles, &f.policy, &mut out);
    rs.record_analysis(&ctx, e, 40, RiskLevel::Medium, warn_n(2)).unwrap();
    let count = rs.record_analysis(&ctx, e, 10, RiskLevel::Low, warn_n(3)).unwrap();
    assert_eq!(count, 5);
    let rec = f.table.get(&e).unwrap();
    assert_eq!(rec.fraud_surface, 10);
    assert_eq!(rec.risk_level, RiskLevel::Low);
    assert_eq!(rec.warnings[0].message, "finding 0");
    assert_eq!(rec.warnings[2].message, "finding 0");
    assert!(out.contains(&Notification::WarningsUpdated { entity: e, count: 5 }));
}

#[test]
fn excess_append_is_rejected_without_partial_append() {
    let mut f = fixture();
    let e = addr("e");
    let ctx = CallContext::new(f.analyzer);
    let mut out = Vec::new();
    let mut rs = RegistryStore::new(&mut f.table, &f.roles, &f.policy, &mut out);
    rs.record_analysis(&ctx, e, 50, RiskLevel::Medium, warn_n(8)).unwrap();
    let err = rs.record_analysis(&ctx, e, 99, RiskLevel::Critical, warn_n(3)).unwrap_err();
    assert_eq!(err, RegistryError::WarningLimitExceeded { entity: e, current: 8, attempted: 3, max: 10 });
    let rec = f.table.get(&e).unwrap();
    assert_eq!(rec.warnings.len(), 8);
    assert_eq!(rec.fraud_surface, 50, "scalars untouched on rejection");
}

#[test]
fn oversized_initial_list_is_rejected() {
    let mut f = fixture();
    let mut out = Vec::new();
    let err = RegistryStore::new(&mut f.table, &f.roles, &f.policy, &mut out)
        .record_analysis(&CallContext::new(f.analyzer), addr("e"), 1, RiskLevel::Low, warn_n(11))
        .unwrap_err();
    assert_eq!(err.code_str(), "warning_limit_exceeded");
    assert!(f.table.is_empty());
    assert!(out.is_empty());
}

#[test]
fn add_warning_requires_existing_record_and_respects_cap() {
    let mut f = fixture();
    let e = addr("e");
    let ctx = CallContext::new(f.analyzer);
    let mut out = Vec::new();
    let mut rs = RegistryStore::new(&mut f.table, &f.roles, &f.policy, &mut out);
    let err = rs.add_warning(&ctx, e, Warning::new(WarningCategory::Proxy, "proxy")).unwrap_err();
    assert_eq!(err, RegistryError::NotAnalyzed { entity: e });

    rs.record_analysis(&ctx, e, 20, RiskLevel::Low, vec![]).unwrap();
    for i in 1..=10 {
        assert_eq!(rs.add_warning(&ctx, e, Warning::new(WarningCategory::Proxy, "proxy")).unwrap(), i);
    }
    let err = rs.add_warning(&ctx, e, Warning::new(WarningCategory::Proxy, "proxy")).unwrap_err();
    assert_eq!(err.code_str(), "warning_limit_exceeded");
    assert_eq!(f.table.warning_count(&e), 10);
}

#[test]
fn callers_without_analyzer_are_rejected() {
    let mut f = fixture();
    let before = f.table.clone();
    let mut out = Vec::new();
    let stranger = addr("stranger");
    let err = RegistryStore::new(&mut f.table, &f.roles, &f.policy, &mut out)
        .record_analysis(&CallContext::new(stranger), addr("e"), 10, RiskLevel::Low, vec![])
        .unwrap_err();
    assert_eq!(err, RegistryError::Unauthorized { account: stranger, role: ANALYZER });
    assert_eq!(f.table, before);
    // holding ADMIN alone is not enough either
    assert!(!f.roles.has_role(ANALYZER, &addr("admin")));
    assert!(f.roles.has_role(ADMIN, &addr("admin")));
}

#[test]
fn null_entity_and_bad_score_are_rejected() {
    let mut f = fixture();
    let ctx = CallContext::new(f.analyzer);
    let mut out = Vec::new();
    let mut rs = RegistryStore::new(&mut f.table, &f.roles, &f.policy, &mut out);
    assert_eq!(rs.record_analysis(&ctx, Address::ZERO, 1, RiskLevel::Low, vec![]).unwrap_err().code_str(), "invalid_entity");
    assert_eq!(rs.record_analysis(&ctx, addr("e"), 101, RiskLevel::Low, vec![]).unwrap_err().code_str(), "invalid_input");
    assert!(f.table.is_empty());
}

#[test]
fn enum_text_forms() {
    assert_eq!("high".parse::<RiskLevel>().unwrap(), RiskLevel::High);
    assert_eq!("external-call".parse::<WarningCategory>().unwrap(), WarningCategory::ExternalCall);
    assert_eq!(serde_json::to_string(&WarningCategory::ExternalCall).unwrap(), "\"EXTERNAL_CALL\"");
    assert!("severe".parse::<RiskLevel>().is_err());
}
