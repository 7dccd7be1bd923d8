use std::time::Duration;

use slicetriage_core::config::{load_config, TriageConfig};
use slicetriage_core::services::ResolutionPolicy;
use slicetriage_core::warnings::WarningKind;
use tempfile::tempdir;

#[test]
fn defaults_are_permissive() {
    let config = TriageConfig::default();
    assert!(config.ignore.is_empty());
    assert!(config.build_root.is_none());
    assert_eq!(config.timeout(), Duration::from_secs(5));
    assert_eq!(config.on_resolution_error, ResolutionPolicy::Abort);
    assert!(config.classifier().ignored().is_empty());
}

#[test]
fn loads_json_with_partial_fields() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("triage.json");
    std::fs::write(
        &path,
        r#"{"ignore":["misaligned-read","misaligned-write"],"build_root":"/home/build/","on_resolution_error":"skip"}"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.ignore, vec![WarningKind::MisalignedRead, WarningKind::MisalignedWrite]);
    assert_eq!(config.build_root.as_deref(), Some("/home/build/"));
    assert_eq!(config.on_resolution_error, ResolutionPolicy::Skip);
    assert_eq!(config.timeout_ms, 5000);
    assert!(config.classifier().is_ignored(WarningKind::MisalignedWrite));
}

#[test]
fn loads_yaml_by_extension() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("triage.yaml");
    std::fs::write(
        &path,
        "ignore:\n  - null-deref-read\ntimeout_ms: 250\naddr2line: /opt/binutils/bin/addr2line\nregister_aliases:\n  \"R1:4[0x4,0x8]\": EBX\n",
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.ignore, vec![WarningKind::NullDerefRead]);
    assert_eq!(config.timeout(), Duration::from_millis(250));
    assert_eq!(
        config.addr2line.as_deref(),
        Some(std::path::Path::new("/opt/binutils/bin/addr2line"))
    );

    let aliases = config.alias_table().unwrap();
    assert_eq!(aliases.canonicalize("R1:4[0x4,0x8]"), "EBX");
    assert_eq!(aliases.canonicalize("R1:4[0,0x4]"), "EAX");
}

#[test]
fn rejects_unknown_kind_names() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("bad.json");
    std::fs::write(&path, r#"{"ignore":["stack-smash"]}"#).unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config JSON"), "unexpected error: {err}");
}

#[test]
fn rejects_chained_register_aliases() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("chained.json");
    std::fs::write(&path, r#"{"register_aliases":{"EAX":"RAX"}}"#).unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Invalid register_aliases"), "unexpected error: {err}");

    let config = TriageConfig {
        register_aliases: [("EAX".to_string(), "RAX".to_string())].into_iter().collect(),
        ..TriageConfig::default()
    };
    assert!(config.alias_table().is_err());
}

#[test]
fn missing_file_reports_path() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to read config"), "unexpected error: {err}");
}
