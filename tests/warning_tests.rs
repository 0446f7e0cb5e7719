//! Bounded, append-only warning lists.

mod common;

use rand::{rngs::StdRng, Rng, SeedableRng};

use common::{addr, deployed};
use invariance::registry::{RiskLevel, Warning, WarningCategory};
use invariance::RegistryError;

fn warning(i: usize) -> Warning { Warning::new(WarningCategory::Other, format!("finding {}", i)) }

#[test]
fn tenth_warning_fits_and_eleventh_fails() {
    let h = deployed();
    let e = addr("entity");
    h.instance.record_analysis(&h.analyzer_ctx(), e, 85, RiskLevel::High, vec![]).unwrap();
    for i in 1..=10 {
        assert_eq!(h.instance.add_warning(&h.analyzer_ctx(), e, warning(i)).unwrap(), i);
    }
    let err = h.instance.add_warning(&h.analyzer_ctx(), e, warning(11)).unwrap_err();
    assert_eq!(err, RegistryError::WarningLimitExceeded { entity: e, current: 10, attempted: 1, max: 10 });
    let rec = h.instance.get_analysis(&e).unwrap();
    assert_eq!(rec.warnings.len(), 10);
    assert_eq!(rec.warnings[0].message, "finding 1");
    assert_eq!(rec.warnings[9].message, "finding 10");
}

#[test]
fn warnings_survive_rescoring() {
    let h = deployed();
    let e = addr("entity");
    h.instance
        .record_analysis(&h.analyzer_ctx(), e, 70, RiskLevel::Medium, vec![Warning::new(WarningCategory::Proxy, "delegatecall proxy").with_reference("ipfs://report")])
        .unwrap();
    h.instance.record_analysis(&h.analyzer_ctx(), e, 20, RiskLevel::Low, vec![]).unwrap();
    let rec = h.instance.get_analysis(&e).unwrap();
    assert_eq!(rec.fraud_surface, 20);
    assert_eq!(rec.risk_level, RiskLevel::Low);
    assert_eq!(rec.warnings.len(), 1);
    assert_eq!(rec.warnings[0].reference.as_deref(), Some("ipfs://report"));
}

#[test]
fn add_warning_needs_a_record_and_the_analyzer_role() {
    let h = deployed();
    let e = addr("never-analysed");
    let err = h.instance.add_warning(&h.analyzer_ctx(), e, warning(0)).unwrap_err();
    assert_eq!(err.code_str(), "not_analyzed");
    let err = h.instance.add_warning(&h.admin_ctx(), e, warning(0)).unwrap_err();
    assert_eq!(err.code_str(), "unauthorized");
    assert!(h.instance.get_analysis(&e).is_none());
}

#[test]
fn malformed_warnings_are_rejected() {
    let h = deployed();
    let e = addr("entity");
    h.instance.record_analysis(&h.analyzer_ctx(), e, 10, RiskLevel::Low, vec![]).unwrap();
    let err = h.instance.add_warning(&h.analyzer_ctx(), e, Warning::new(WarningCategory::Other, "")).unwrap_err();
    assert_eq!(err.code_str(), "invalid_input");
    let long = "x".repeat(1000);
    let err = h.instance.add_warning(&h.analyzer_ctx(), e, Warning::new(WarningCategory::Other, long)).unwrap_err();
    assert_eq!(err.code_str(), "invalid_input");
    assert_eq!(h.instance.get_analysis(&e).unwrap().warnings.len(), 0);
}

/// Random mixes of batch and single appends never exceed the cap, and a
/// rejected call never changes the stored list.
#[test]
fn random_sequences_respect_the_cap() {
    let mut rng = StdRng::seed_from_u64(0x1a7e_57ed);
    for round in 0..20 {
        let h = deployed();
        let e = addr(&format!("entity-{}", round));
        let mut model: usize = 0;
        let mut analysed = false;
        for step in 0..40 {
            let before = h.instance.get_analysis(&e);
            if rng.gen_bool(0.4) {
                let n = rng.gen_range(0..6);
                let batch: Vec<Warning> = (0..n).map(|i| warning(step * 10 + i)).collect();
                let score = rng.gen_range(0..=100u8);
                match h.instance.record_analysis(&h.analyzer_ctx(), e, score, RiskLevel::Medium, batch) {
                    Ok(count) => {
                        model += n;
                        analysed = true;
                        assert_eq!(count, model);
                    }
                    Err(err) => {
                        assert!(model + n > 10, "round {} step {}: unexpected {}", round, step, err);
                        assert_eq!(h.instance.get_analysis(&e), before);
                    }
                }
            } else {
                match h.instance.add_warning(&h.analyzer_ctx(), e, warning(step)) {
                    Ok(count) => {
                        model += 1;
                        assert_eq!(count, model);
                    }
                    Err(RegistryError::NotAnalyzed { .. }) => assert!(!analysed),
                    Err(RegistryError::WarningLimitExceeded { current, .. }) => assert_eq!(current, 10),
                    Err(other) => panic!("unexpected {}", other),
                }
            }
            assert!(model <= 10);
            assert_eq!(h.instance.get_analysis(&e).map(|r| r.warnings.len()).unwrap_or(0), model);
        }
    }
}
