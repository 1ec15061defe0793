//! Integration tests for configuration resolution and atomic writes
//!
//! Tests that manipulate CLEANVIEW_CONFIG are marked with #[serial] so they
//! never race on the process environment.

use cleanview_common::config::{
    load_toml_config, write_atomic, write_toml_config, ConfigResolver, ConfigSource,
    LoggingConfig, CONFIG_ENV_VAR,
};
use serde::{Deserialize, Serialize};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    logging: LoggingConfig,
    segment_gap: f64,
    max_workers: usize,
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/etc/cleanview/from-env.toml");

    let resolver = ConfigResolver::default().with_platform_path(None);
    let (path, source) = resolver.resolve(None).unwrap();

    assert_eq!(path, PathBuf::from("/etc/cleanview/from-env.toml"));
    assert_eq!(source, ConfigSource::Environment);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_arg_overrides_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/etc/cleanview/from-env.toml");

    let resolver = ConfigResolver::default().with_platform_path(None);
    let (path, source) = resolver.resolve(Some(Path::new("/cli/cleanview.toml"))).unwrap();

    assert_eq!(path, PathBuf::from("/cli/cleanview.toml"));
    assert_eq!(source, ConfigSource::CommandLine);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_platform_path_used_only_when_present() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let platform = temp_dir.path().join("cleanview.toml");

    let resolver = ConfigResolver::default().with_platform_path(Some(platform.clone()));
    assert!(resolver.resolve(None).is_none());

    std::fs::write(&platform, "segment_gap = 2.0\n").unwrap();
    let (path, source) = resolver.resolve(None).unwrap();
    assert_eq!(path, platform);
    assert_eq!(source, ConfigSource::PlatformDefault);
}

#[test]
fn test_write_then_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("cleanview.toml");

    let config = AppConfig {
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        segment_gap: 1.5,
        max_workers: 2,
    };
    write_toml_config(&config, &target).unwrap();

    let loaded: AppConfig = load_toml_config(Some(&target)).unwrap();
    assert_eq!(loaded, config);
    assert!(!temp_dir.path().join("cleanview.toml.tmp").exists());
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("cleanview.toml");
    std::fs::write(&target, "max_workers = 1\n").unwrap();

    let loaded: AppConfig = load_toml_config(Some(&target)).unwrap();
    assert_eq!(loaded.max_workers, 1);
    assert_eq!(loaded.logging.level, "info");
}

#[test]
fn test_invalid_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("cleanview.toml");
    std::fs::write(&target, "max_workers = [not toml").unwrap();

    let result: cleanview_common::Result<AppConfig> = load_toml_config(Some(&target));
    assert!(result.is_err());
}

#[test]
fn test_write_atomic_creates_parent_dirs() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("nested").join("dir").join("project.json");

    write_atomic(&target, b"{}").unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "{}");
}

#[test]
fn test_write_atomic_replaces_existing() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("project.json");

    write_atomic(&target, b"old").unwrap();
    write_atomic(&target, b"new").unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
}
