// crates/stowage-config/src/config/tests.rs
// ============================================================================
// Module: Storage Config Unit Tests
// Description: Unit tests for defaults, discriminators, and path limits.
// Purpose: Keep parsing strict and defaults explicit.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::expect_used,
    reason = "Unit tests use expect and panic for setup clarity."
)]

use std::path::PathBuf;
use std::time::Duration;

use stowage_store_sqlite::SqliteJournalMode;

use super::ConfigError;
use super::MAX_CONFIG_FILE_SIZE;
use super::StorageBackend;
use super::StorageConfig;
use super::validate_path;

#[test]
fn empty_document_yields_validated_defaults() {
    let config = StorageConfig::from_toml_str("").expect("defaults");
    assert_eq!(config, StorageConfig::default());
    assert_eq!(config.backend, StorageBackend::Sqlite);
    let options = config.manager_options();
    assert_eq!(options.cleanup_interval, Duration::from_secs(300));
    assert_eq!(options.cleanup_batch_limit, 1_000);
    assert!(options.cleanup_enabled);
}

#[test]
fn backend_sections_fill_omitted_fields() {
    let config = StorageConfig::from_toml_str(
        r#"
        [storage]
        backend = "sqlite"
        namespace = "chat"

        [storage.sqlite]
        path = "var/chat.db"
        journal_mode = "delete"
        "#,
    )
    .expect("config");
    assert_eq!(config.namespace, "chat");
    assert_eq!(config.sqlite.path, PathBuf::from("var/chat.db"));
    assert_eq!(config.sqlite.journal_mode, SqliteJournalMode::Delete);
    assert_eq!(config.sqlite.pool_max_size, 8);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = StorageConfig::from_toml_str("[storage]\nbakend = \"memory\"\n")
        .expect_err("typo");
    assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    let err = StorageConfig::from_toml_str("[storage]\nbackend = \"redis\"\n")
        .expect_err("unknown backend");
    assert!(matches!(err, ConfigError::Parse(_)), "{err}");
}

#[test]
fn only_the_selected_section_is_validated() {
    let toml = r#"
        [storage]
        backend = "memory"

        [storage.postgres]
        schema = "not valid!"
    "#;
    StorageConfig::from_toml_str(toml).expect("postgres section unused");

    let toml = toml.replace("\"memory\"", "\"postgres\"");
    let err = StorageConfig::from_toml_str(&toml).expect_err("postgres selected");
    assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
}

#[test]
fn zero_cleanup_interval_is_invalid() {
    let err = StorageConfig::from_toml_str("[storage]\ncleanup_interval_ms = 0\n")
        .expect_err("zero interval");
    match err {
        ConfigError::Invalid(message) => assert!(message.contains("cleanup_interval")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn oversized_documents_are_rejected_before_parsing() {
    let padding = "#".repeat(MAX_CONFIG_FILE_SIZE + 1);
    let err = StorageConfig::from_toml_str(&padding).expect_err("oversized");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn long_path_components_are_rejected() {
    let path = PathBuf::from("config").join("x".repeat(300)).join("stowage.toml");
    assert!(matches!(validate_path(&path), Err(ConfigError::Invalid(_))));
    assert!(validate_path(&PathBuf::from("config/stowage.toml")).is_ok());
}
