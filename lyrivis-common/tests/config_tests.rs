//! Tests for configuration resolution and the service TOML

use lyrivis_common::config::{
    self, load_toml_config, resolve_root_folder, write_toml_config, TomlConfig,
};
use serial_test::serial;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_arg_takes_priority_over_env() {
    std::env::set_var("LYRIVIS_TEST_ROOT", "/from/env");
    let resolved = resolve_root_folder(Some("/from/cli"), "LYRIVIS_TEST_ROOT").unwrap();
    assert_eq!(resolved, std::path::PathBuf::from("/from/cli"));
    std::env::remove_var("LYRIVIS_TEST_ROOT");
}

#[test]
#[serial]
fn test_env_var_resolution() {
    std::env::set_var("LYRIVIS_TEST_ROOT", "/from/env");
    let resolved = resolve_root_folder(None, "LYRIVIS_TEST_ROOT").unwrap();
    assert_eq!(resolved, std::path::PathBuf::from("/from/env"));
    std::env::remove_var("LYRIVIS_TEST_ROOT");
}

#[test]
#[serial]
fn test_fallback_root_is_nonempty() {
    std::env::remove_var("LYRIVIS_TEST_ROOT");
    let resolved = resolve_root_folder(None, "LYRIVIS_TEST_ROOT").unwrap();
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
fn test_missing_toml_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let config = load_toml_config(temp.path(), "lyrivis-gen").unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.throttle_phrases_per_interval, 3);
    assert_eq!(config.throttle_interval_secs, 10);
    assert_eq!(config.inactivity_timeout_secs, 120);
}

#[test]
fn test_toml_roundtrip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("lyrivis-gen.toml");

    let mut config = TomlConfig::default();
    config.generator_api_key = Some("test-key".to_string());
    config.inactivity_timeout_secs = 30;
    config.logging.level = "debug".to_string();

    write_toml_config(&config, &path).unwrap();
    let loaded = load_toml_config(temp.path(), "lyrivis-gen").unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("lyrivis-gen.toml");
    std::fs::write(&path, "generator_endpoint = \"http://gen.example/api\"\n").unwrap();

    let loaded = load_toml_config(temp.path(), "lyrivis-gen").unwrap();
    assert_eq!(loaded.generator_endpoint, "http://gen.example/api");
    assert_eq!(loaded.bind, TomlConfig::default().bind);
    assert_eq!(loaded.logging.level, "info");
}

#[test]
fn test_database_path_inside_root() {
    let temp = TempDir::new().unwrap();
    let db = config::database_path(temp.path());
    assert!(db.starts_with(temp.path()));
    assert_eq!(db.file_name().unwrap(), "lyrivis.db");
}
