use super::*;

#[test]
fn exit_code_mapping() {
    let who = Address::derive(b"who");
    assert_eq!(RegistryError::Unauthorized { account: who, role: RoleId::from_raw(0) }.exit_code(), 77);
    assert_eq!(RegistryError::invalid_entity("null").exit_code(), 65);
    assert_eq!(RegistryError::invalid_input("score", "too big").exit_code(), 65);
    assert_eq!(RegistryError::NotAnalyzed { entity: who }.exit_code(), 66);
    assert_eq!(RegistryError::AlreadyInitialized.exit_code(), 75);
    assert_eq!(RegistryError::LastAdmin { account: who }.exit_code(), 75);
    assert_eq!(RegistryError::validation_failed("mismatch").exit_code(), 76);
    assert_eq!(RegistryError::storage("disk").exit_code(), 74);
}

#[test]
fn display_includes_context() {
    let who = Address::derive(b"who");
    let e = RegistryError::WarningLimitExceeded { entity: who, current: 10, attempted: 1, max: 10 };
    let text = e.to_string();
    assert!(text.contains("10 stored + 1 new > 10"), "{}", text);
    assert_eq!(e.code_str(), "warning_limit_exceeded");
}

#[test]
fn anyhow_maps_to_storage() {
    let e: RegistryError = anyhow::anyhow!("snapshot crc mismatch").into();
    assert_eq!(e.code_str(), "storage");
    assert!(e.to_string().contains("crc mismatch"));
}

#[test]
fn serializes_with_type_tag() {
    let v = serde_json::to_value(RegistryError::AlreadyInitialized).unwrap();
    assert_eq!(v["type"], "already_initialized");
}
