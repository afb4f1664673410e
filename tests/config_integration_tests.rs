//! Integration tests for ConfigManager and settings file handling
//!
//! These tests verify:
//! - Defaults when no settings file exists
//! - Loading partial and complete settings files
//! - Save/load round trips
//! - Rejection of malformed settings files

use camino::Utf8PathBuf;
use iosapplist::ConfigManager;
use iosapplist::models::Settings;
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path);

    assert_eq!(manager.config_dir(), config_path.as_path());
    assert_eq!(
        manager.settings_path(),
        config_path.join("iosapplist.yaml").as_path()
    );
}

#[test]
fn test_load_defaults_without_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path);

    let settings = manager.load_settings().unwrap();

    assert_eq!(settings.root, "/var/mobile");
    assert!(settings.log_dir.is_none());
}

#[test]
fn test_load_partial_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join("iosapplist.yaml"),
        "root: /private/var/mobile\njson: true\n",
    )
    .unwrap();

    let settings = ConfigManager::new(&config_path).load_settings().unwrap();

    assert_eq!(settings.root, "/private/var/mobile");
    assert!(settings.json);
    assert!(settings.log_dir.is_none());
}

#[test]
fn test_save_and_load_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path);

    let settings = Settings {
        root: Utf8PathBuf::from("/tmp/device/mobile"),
        log_dir: Some(config_path.join("logs")),
        debug: true,
        json: false,
    };
    manager.save_settings(&settings).unwrap();

    let saved = fs::read_to_string(manager.settings_path()).unwrap();
    assert!(saved.contains("root: /tmp/device/mobile"));

    let loaded = manager.load_settings().unwrap();
    assert_eq!(loaded.root, settings.root);
    assert_eq!(loaded.log_dir, settings.log_dir);
    assert_eq!(loaded.debug, settings.debug);
}

#[test]
fn test_malformed_file_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join("iosapplist.yaml"), "root: [unclosed\n").unwrap();

    let result = ConfigManager::new(&config_path).load_settings();
    assert!(result.is_err());
}
