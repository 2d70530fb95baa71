//! Unit tests for configuration and graceful degradation
//!
//! Tests cover:
//! - Defaults when no config file is present
//! - Partial TOML files (missing keys fall back to defaults)
//! - Invalid TOML and invalid values degrade to defaults
//! - Root folder priority: CLI > environment > TOML > compiled default
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PATAK_ROOT_FOLDER are marked with #[serial].

use patak_common::config::{
    default_root_folder, load_config, resolve_root_folder, LiveConfig, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[test]
fn test_defaults() {
    let config = TomlConfig::default();

    assert_eq!(config.port, 4000);
    assert_eq!(config.bind_addr, "0.0.0.0");
    assert_eq!(config.database_file, "patak.db");
    assert_eq!(config.live.retention_secs, 30);
    assert_eq!(config.live.sweep_interval_secs, 5);
    assert_eq!(config.live.online_window_secs, 300);
    assert_eq!(config.billing.web_cycles, 2);
    assert_eq!(config.billing.mobile_cycles, 12);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = TomlConfig::from_toml_str(
        r#"
        port = 8080

        [billing]
        mobile_cycles = 6
        "#,
    )
    .expect("partial config should parse");

    assert_eq!(config.port, 8080);
    assert_eq!(config.billing.mobile_cycles, 6);
    assert_eq!(config.billing.web_cycles, 2);
    assert_eq!(config.live, LiveConfig::default());
}

#[test]
fn test_zero_retention_rejected() {
    let result = TomlConfig::from_toml_str(
        r#"
        [live]
        retention_secs = 0
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_load_config_from_explicit_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 5050\nlog_level = \"debug\"").unwrap();

    let config = load_config(Some(file.path()));
    assert_eq!(config.port, 5050);
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_load_config_invalid_file_degrades_to_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number\"").unwrap();

    let config = load_config(Some(file.path()));
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_load_config_missing_file_degrades_to_defaults() {
    let config = load_config(Some(Path::new("/nonexistent/patak/config.toml")));
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_database_path_joins_root() {
    let config = TomlConfig::default();
    assert_eq!(
        config.database_path(Path::new("/srv/patak")),
        PathBuf::from("/srv/patak/patak.db")
    );
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/patak-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/patak-toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/tmp/patak-cli")), ROOT_FOLDER_ENV, &config);
    assert_eq!(resolved, PathBuf::from("/tmp/patak-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/patak-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/patak-toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(resolved, PathBuf::from("/tmp/patak-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_beats_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/patak-toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(resolved, PathBuf::from("/tmp/patak-toml"));
}

#[test]
#[serial]
fn test_no_overrides_uses_compiled_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, &TomlConfig::default());
    assert_eq!(resolved, default_root_folder());
    assert!(!resolved.as_os_str().is_empty());
}
