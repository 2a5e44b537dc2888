//! Integration tests for `diagpost config` command.
//!
//! Tests config validation and display with real TOML files.

use std::fs;

use diagpost_cli::commands::config::{show, validate};
use diagpost_core::config::DiagpostConfig;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("diagpost.toml");
    fs::write(&path, contents).expect("should write config");
    path
}

#[tokio::test]
async fn test_config_validate_valid_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_config(
        &temp_dir,
        r#"
[general]
log_level = "debug"
log_format = "pretty"

[storage]
root_dir = "/tmp/diagpost"
log_category = "game"
utc_offset_hours = 9

[filter]
watch = false
reload_delay_ms = 250

[escalation]
online_webhook = "https://hooks.example.com/online"
timeout_secs = 5

[escalation.mentions]
alice = "ou_alice"
"#,
    );

    let report = validate(&path).await;
    assert!(report.valid, "valid config should pass: {:?}", report.errors);

    let config = DiagpostConfig::load(&path).await.expect("should load");
    assert_eq!(config.storage.log_category, "game");
    assert_eq!(config.escalation.mentions.get("alice").map(String::as_str), Some("ou_alice"));
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&temp_dir, "[storage\nroot_dir = ");

    let report = validate(&path).await;
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("absent.toml");

    let report = validate(&path).await;
    assert!(!report.valid);
    assert!(report.errors[0].contains("absent.toml"));
}

#[tokio::test]
async fn test_config_validate_empty_file_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&temp_dir, "");

    assert!(validate(&path).await.valid);
}

#[tokio::test]
async fn test_config_validate_rejects_category_with_separator() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&temp_dir, "[storage]\nlog_category = \"a/b\"\n");

    let report = validate(&path).await;
    assert!(!report.valid);
    assert!(report.errors[0].contains("storage.log_category"));
}

#[tokio::test]
async fn test_config_show_full_config_lists_every_section() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&temp_dir, "[storage]\nroot_dir = \"/srv/diag\"\n");

    let report = show(&path, None).await.expect("show should succeed");
    assert!(report.section.is_none());
    for section in ["[general]", "[storage]", "[filter]", "[escalation]"] {
        assert!(report.config_toml.contains(section), "missing {section}");
    }
    assert!(report.config_toml.contains("/srv/diag"));
}

#[tokio::test]
async fn test_config_show_output_parses_back() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&temp_dir, "[filter]\nreload_delay_ms = 750\n");

    let report = show(&path, None).await.expect("show should succeed");
    let reparsed = DiagpostConfig::parse(&report.config_toml).expect("rendered TOML should parse");
    assert_eq!(reparsed.filter.reload_delay_ms, 750);
}

#[tokio::test]
async fn test_config_unicode_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_config(
        &temp_dir,
        "[storage]\nroot_dir = \"/데이터/진단\"\n\n[escalation.mentions]\n\"김철수\" = \"ou_kim\"\n",
    );

    let report = show(&path, None).await.expect("show should succeed");
    assert!(report.config_toml.contains("/데이터/진단"));
    assert!(report.config_toml.contains("김철수"));
}
