//! Integration tests for the config.json executable store
//!
//! These tests verify:
//! - First access creates `{ "blenders": [] }`
//! - Duplicate inserts fail and leave the file untouched
//! - Save/load round-trips, including unknown keys
//! - Corrupt files recover to an empty document
//! - Remove and title updates on present and missing entries

use blender_launcher::models::ConfigDocument;
use blender_launcher::{ConfigManager, ExecutableEntry, LauncherError};
use camino::Utf8PathBuf;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn create_test_config() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root.join("config.json"))
}

fn blender_entry(path: &str) -> ExecutableEntry {
    ExecutableEntry::new(path, "blender.exe", "Blender 4.3")
}

#[test]
fn test_first_access_creates_empty_document() {
    let (_temp_dir, config_path) = create_test_config();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert!(config_path.exists());
    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_eq!(on_disk, json!({ "blenders": [] }));
    assert!(manager.load().blenders.is_empty());
}

#[test]
fn test_written_file_uses_two_space_indent() {
    let (_temp_dir, config_path) = create_test_config();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager.add_executable(blender_entry("C:/Blender/blender.exe")).unwrap();

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("\n  \"blenders\": ["));
}

#[test]
fn test_duplicate_add_leaves_file_unchanged() {
    let (_temp_dir, config_path) = create_test_config();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager.add_executable(blender_entry("C:/Blender/blender.exe")).unwrap();
    let before = fs::read_to_string(&config_path).unwrap();

    let result = manager.add_executable(ExecutableEntry::new(
        "C:/Blender/blender.exe",
        "blender.exe",
        "Another title",
    ));

    assert!(matches!(result, Err(LauncherError::DuplicateEntry(_))));
    assert_eq!(fs::read_to_string(&config_path).unwrap(), before);
}

#[test]
fn test_round_trip_keeps_unknown_keys() {
    let (_temp_dir, config_path) = create_test_config();
    fs::write(
        &config_path,
        r#"{
  "blenders": [
    { "path": "/opt/blender/blender", "name": "blender", "title": "Blender", "icon": "icon.png", "favorite": true }
  ],
  "theme": "dark",
  "version": 2
}"#,
    )
    .unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let doc = manager.load();
    manager.save(&doc).unwrap();
    let reloaded = manager.load();

    assert_eq!(reloaded, doc);
    assert_eq!(reloaded.extra["theme"], json!("dark"));
    assert_eq!(reloaded.blenders[0].icon.as_deref(), Some("icon.png"));
    assert_eq!(reloaded.blenders[0].extra["favorite"], json!(true));
}

#[test]
fn test_corrupt_file_loads_as_empty() {
    let (_temp_dir, config_path) = create_test_config();
    fs::write(&config_path, "{ not json").unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.load(), ConfigDocument::default());

    // The next mutation rewrites the file in full
    manager.add_executable(blender_entry("/opt/blender/blender")).unwrap();
    assert_eq!(manager.load().blenders.len(), 1);
}

#[test]
fn test_find_index() {
    let (_temp_dir, config_path) = create_test_config();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager.add_executable(blender_entry("/a/blender")).unwrap();
    manager.add_executable(blender_entry("/b/blender")).unwrap();

    assert_eq!(manager.find_index("/b/blender"), Some(1));
    assert_eq!(manager.find_index("/c/blender"), None);
}

#[test]
fn test_remove_executable() {
    let (_temp_dir, config_path) = create_test_config();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager.add_executable(blender_entry("/a/blender")).unwrap();

    let removed = manager.remove_executable("/a/blender").unwrap();
    assert_eq!(removed.path, "/a/blender");
    assert!(manager.load().blenders.is_empty());

    let missing = manager.remove_executable("/a/blender");
    assert!(matches!(missing, Err(LauncherError::NotFound(_))));
}

#[test]
fn test_update_title() {
    let (_temp_dir, config_path) = create_test_config();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager.add_executable(blender_entry("/a/blender")).unwrap();

    let update = manager.update_title("/a/blender", "Studio build").unwrap();
    assert_eq!(update.old_title, "Blender 4.3");
    assert_eq!(update.new_title, "Studio build");
    assert_eq!(manager.load().blenders[0].title, "Studio build");

    let missing = manager.update_title("/nope", "x");
    assert!(matches!(missing, Err(LauncherError::NotFound(_))));
}

#[test]
fn test_register_if_absent() {
    let (_temp_dir, config_path) = create_test_config();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert!(manager.register_if_absent(blender_entry("/a/blender")).unwrap());
    assert!(!manager.register_if_absent(blender_entry("/a/blender")).unwrap());
    assert_eq!(manager.load().blenders.len(), 1);
}

#[test]
fn test_stale_entries_are_kept() {
    let (_temp_dir, config_path) = create_test_config();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager
        .add_executable(blender_entry("/gone/forever/blender"))
        .unwrap();

    let executables = manager.executables();
    assert_eq!(executables.len(), 1);
    assert!(!Utf8PathBuf::from(&executables[0].path).exists());
}
