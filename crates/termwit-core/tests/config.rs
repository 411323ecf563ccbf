use std::io::Write;

use termwit_core::{EngineConfig, TermwitError};

#[test]
fn missing_fields_take_defaults() {
    let config = EngineConfig::from_yaml_str("max_root_degree: 12\n").unwrap();
    assert_eq!(config.max_root_degree, 12);
    assert_eq!(config.max_bound_depth, 32);
    assert_eq!(config.max_candidates, 256);
    assert_eq!(config.root_tolerance, 1e-9);
    assert_eq!(EngineConfig::from_yaml_str("{}").unwrap(), EngineConfig::default());
}

#[test]
fn invalid_values_are_rejected() {
    match EngineConfig::from_yaml_str("root_tolerance: -1.0\n") {
        Err(TermwitError::Serde(info)) => assert_eq!(info.code, "invalid_tolerance"),
        other => panic!("unexpected result: {other:?}"),
    }
    match EngineConfig::from_yaml_str("max_bound_depth: many\n") {
        Err(TermwitError::Serde(info)) => assert_eq!(info.code, "yaml_deserialize"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn load_reads_yaml_files() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_candidates: 8\nmax_bound_depth: 4").unwrap();
    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.max_candidates, 8);
    assert_eq!(config.max_bound_depth, 4);

    let missing = file.path().with_extension("absent");
    match EngineConfig::load(&missing) {
        Err(TermwitError::Serde(info)) => assert_eq!(info.code, "config_read"),
        other => panic!("unexpected result: {other:?}"),
    }
}
