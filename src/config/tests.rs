//! Unit tests for configuration module
//!
//! Tests configuration parsing, validation, serialization/deserialization,
//! and runtime directory resolution.

use super::*;
use anyhow::Result;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = ToolkitConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.cursor.size, 32);
    assert!(config.cursor.theme.is_none());
    assert_eq!(config.shm.file_prefix, "axiom-toolkit-shared-");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_configuration_serialization_roundtrip() -> Result<()> {
    let mut original_config = ToolkitConfig::default();
    original_config.cursor.theme = Some("Adwaita".to_string());
    original_config.shm.runtime_dir = Some(PathBuf::from("/run/user/1000"));

    let toml_string = toml::to_string(&original_config)?;
    let deserialized_config: ToolkitConfig = toml::from_str(&toml_string)?;

    assert_eq!(original_config, deserialized_config);
    Ok(())
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("toolkit.toml");

    let test_config = r#"
[cursor]
theme = "breeze_cursors"
size = 48

[shm]
runtime_dir = "/tmp/toolkit-runtime"
file_prefix = "term-shared-"

[logging]
level = "debug"
"#;
    fs::write(&file_path, test_config)?;

    let config = ToolkitConfig::load(&file_path)?;
    assert_eq!(config.cursor.theme.as_deref(), Some("breeze_cursors"));
    assert_eq!(config.cursor.size, 48);
    assert_eq!(config.shm.runtime_dir, Some(PathBuf::from("/tmp/toolkit-runtime")));
    assert_eq!(config.shm.file_prefix, "term-shared-");
    assert_eq!(config.logging.level, "debug");

    Ok(())
}

#[test]
fn test_partial_configuration_uses_defaults() -> Result<()> {
    let config: ToolkitConfig = toml::from_str("[cursor]\nsize = 24\n")?;

    assert_eq!(config.cursor.size, 24);
    assert!(config.cursor.theme.is_none());
    assert_eq!(config.shm, ShmConfig::default());
    assert_eq!(config.logging, LoggingConfig::default());

    let empty: ToolkitConfig = toml::from_str("")?;
    assert_eq!(empty, ToolkitConfig::default());
    Ok(())
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let mut config = ToolkitConfig::default();
    config.cursor.size = 0;
    assert!(config.validate().is_err());

    let mut config = ToolkitConfig::default();
    config.cursor.size = 1024;
    assert!(config.validate().is_err());

    let mut config = ToolkitConfig::default();
    config.shm.file_prefix = "nested/prefix".to_string();
    assert!(config.validate().is_err());

    let mut config = ToolkitConfig::default();
    config.shm.file_prefix.clear();
    assert!(config.validate().is_err());

    let mut config = ToolkitConfig::default();
    config.logging.level = "loud".to_string();
    assert!(config.validate().is_err());

    let mut config = ToolkitConfig::default();
    config.cursor.theme = Some("   ".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_load_rejects_invalid_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("bad.toml");
    fs::write(&file_path, "[cursor]\nsize = 0\n")?;

    assert!(ToolkitConfig::load(&file_path).is_err());
    assert!(ToolkitConfig::load(dir.path().join("missing.toml")).is_err());
    Ok(())
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = ToolkitConfig::default();
    config.cursor.size = 64;
    config.save(&file_path)?;

    let reloaded = ToolkitConfig::load(&file_path)?;
    assert_eq!(reloaded, config);
    Ok(())
}

#[test]
fn test_runtime_dir_override_wins() {
    let config = ShmConfig {
        runtime_dir: Some(PathBuf::from("/custom/runtime")),
        ..ShmConfig::default()
    };

    assert_eq!(config.runtime_dir().ok(), Some(PathBuf::from("/custom/runtime")));
}

#[test]
#[serial]
fn test_runtime_dir_from_environment() {
    let saved = std::env::var_os("XDG_RUNTIME_DIR");

    std::env::set_var("XDG_RUNTIME_DIR", "/run/user/4242");
    let resolved = ShmConfig::default().runtime_dir();
    assert_eq!(resolved.ok(), Some(PathBuf::from("/run/user/4242")));

    std::env::remove_var("XDG_RUNTIME_DIR");
    let missing = ShmConfig::default().runtime_dir();
    assert!(matches!(missing, Err(ToolkitError::Config(_))));

    match saved {
        Some(value) => std::env::set_var("XDG_RUNTIME_DIR", value),
        None => std::env::remove_var("XDG_RUNTIME_DIR"),
    }
}
