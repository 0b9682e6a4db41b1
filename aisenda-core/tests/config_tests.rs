//! Integration tests for configuration loading and validation

use aisenda_core::config::{
    load, load_from_json, load_from_yaml, ConfigError, ValidationErrorKind, DEFAULT_BASE_URL,
    DEFAULT_MODEL,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Helper to create a test config file
fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_valid_yaml_config() {
    std::env::set_var("AISENDA_TEST_YAML_KEY", "sk-yaml");

    let yaml = r#"
base_url: https://gateway.example.com/v1
api_key: ${AISENDA_TEST_YAML_KEY}
default_model: gpt-4o-mini
timeout_secs: 120
stream:
  incremental: false
  replay_chunk_chars: 4
  replay_delay_ms: 15
history:
  path: /tmp/aisenda-history
"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "config.yaml", yaml);

    let config = load_from_yaml(path).expect("valid config");
    assert_eq!(config.base_url, "https://gateway.example.com/v1");
    assert_eq!(config.api_key.expose_secret(), "sk-yaml");
    assert_eq!(config.default_model, "gpt-4o-mini");
    assert_eq!(config.timeout(), Duration::from_secs(120));
    assert!(!config.stream.incremental);
    assert_eq!(config.stream.replay().slice_chars, 4);
    assert_eq!(config.stream.replay().delay, Duration::from_millis(15));
    // Unset fields keep their defaults
    assert_eq!(config.connect_timeout_secs, 10);
    assert_eq!(config.stream.snapshot_every_chars, 500);
    assert_eq!(config.history.path, PathBuf::from("/tmp/aisenda-history"));

    std::env::remove_var("AISENDA_TEST_YAML_KEY");
}

#[test]
fn test_load_valid_json_config() {
    let json = r#"{
        "api_key": "${AISENDA_TEST_UNSET_KEY:-sk-fallback}",
        "image_model": "gemini-3-pro-image-preview"
    }"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "config.json", json);

    let config = load_from_json(&path).expect("valid config");
    assert_eq!(config.api_key.expose_secret(), "sk-fallback");
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.default_model, DEFAULT_MODEL);
    assert_eq!(config.timeout(), Duration::from_secs(300));

    // `load` picks the parser from the extension
    assert_eq!(load(&path).unwrap(), config);
}

#[test]
fn test_missing_env_var() {
    let yaml = "api_key: ${AISENDA_TEST_NEVER_SET}\n";
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "config.yaml", yaml);

    match load_from_yaml(path) {
        Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "AISENDA_TEST_NEVER_SET"),
        other => panic!("Expected EnvVarNotFound, got {:?}", other),
    }
}

#[test]
fn test_missing_api_key_field() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "config.yaml", "default_model: gpt-4o\n");

    let err = load_from_yaml(path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
    assert!(err.to_string().contains("api_key"));
}

#[test]
fn test_unknown_field_rejected() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "config.yaml", "api_key: sk\nretries: 3\n");

    let err = load_from_yaml(path).unwrap_err();
    assert!(err.to_string().contains("retries"));
}

#[test]
fn test_invalid_json_reports_position() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "config.json", "{\n  \"api_key\": \n}");

    match load_from_json(path) {
        Err(ConfigError::ParseError { line, .. }) => assert_eq!(line, Some(3)),
        other => panic!("Expected ParseError, got {:?}", other),
    }
}

#[test]
fn test_validation_reports_field_path() {
    let dir = TempDir::new().unwrap();
    let yaml = "api_key: sk\nstream:\n  replay_chunk_chars: 0\n";
    let path = create_test_file(&dir, "config.yaml", yaml);

    match load_from_yaml(path) {
        Err(ConfigError::ValidationError(e)) => {
            assert_eq!(e.field_path, "stream.replay_chunk_chars");
            assert!(matches!(e.kind, ValidationErrorKind::OutOfRange { .. }));
        }
        other => panic!("Expected ValidationError, got {:?}", other),
    }
}

#[test]
fn test_invalid_base_url() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "config.yaml", "api_key: sk\nbase_url: gateway\n");

    match load_from_yaml(path) {
        Err(ConfigError::ValidationError(e)) => assert_eq!(e.field_path, "base_url"),
        other => panic!("Expected ValidationError, got {:?}", other),
    }
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::IoError { .. }));
}

#[test]
fn test_api_key_not_leaked_in_debug() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "config.yaml", "api_key: sk-very-secret\n");

    let config = load_from_yaml(path).unwrap();
    let debug = format!("{:?}", config);
    assert!(!debug.contains("sk-very-secret"));
    assert!(debug.contains("[REDACTED]"));
}
