//! Tests for configuration loading and data folder resolution
//!
//! Uses serial_test to prevent environment variable races: tests that touch
//! CASA_DATA_FOLDER are marked #[serial].

use casa_common::config::{
    default_data_folder, load_toml_config, resolve_data_folder, TomlConfig, DATA_FOLDER_ENV,
};
use casa_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(DATA_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    let folder = resolve_data_folder(Some(Path::new("/from/cli")), DATA_FOLDER_ENV, &toml);
    assert_eq!(folder, PathBuf::from("/from/cli"));

    env::remove_var(DATA_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(DATA_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    let folder = resolve_data_folder(None, DATA_FOLDER_ENV, &toml);
    assert_eq!(folder, PathBuf::from("/from/env"));

    env::remove_var(DATA_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_no_cli_or_env() {
    env::remove_var(DATA_FOLDER_ENV);
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    let folder = resolve_data_folder(None, DATA_FOLDER_ENV, &toml);
    assert_eq!(folder, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_falls_back_to_compiled_default() {
    env::remove_var(DATA_FOLDER_ENV);

    let folder = resolve_data_folder(None, DATA_FOLDER_ENV, &TomlConfig::default());
    assert_eq!(folder, default_data_folder());
    assert!(!folder.as_os_str().is_empty());
}

#[test]
fn test_load_explicit_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("casa.toml");
    std::fs::write(
        &path,
        "data_folder = \"/srv/casa\"\n\n[logging]\nlevel = \"debug\"\n\n[limits]\nclustering_default = 10\n",
    )
    .unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.data_folder, Some(PathBuf::from("/srv/casa")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.limits.clustering_default, 10);
    assert_eq!(config.limits.listing_cap, 2000);
}

#[test]
fn test_missing_explicit_config_is_error() {
    let dir = TempDir::new().unwrap();
    let result = load_toml_config(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_config_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "data_folder = [unclosed").unwrap();

    assert!(matches!(load_toml_config(Some(&path)), Err(Error::Config(_))));
}

#[test]
fn test_config_with_inconsistent_limits_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.toml");
    std::fs::write(&path, "[limits]\nclustering_default = 9000\n").unwrap();

    assert!(matches!(load_toml_config(Some(&path)), Err(Error::Config(_))));
}
