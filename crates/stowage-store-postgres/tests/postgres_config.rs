// crates/stowage-store-postgres/tests/postgres_config.rs
// ============================================================================
// Module: Postgres Config Tests
// Description: Offline validation tests for the relational engine.
// Purpose: Reject bad settings before any connection is attempted.
// ============================================================================

//! ## Overview
//! These tests never reach a server: every failure they assert is raised
//! during configuration validation or store construction.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use stowage_core::ErrorKind;
use stowage_core::ManagerOptions;
use stowage_core::ManagerState;
use stowage_store_postgres::PostgresBackend;
use stowage_store_postgres::PostgresStore;
use stowage_store_postgres::PostgresStoreConfig;

#[test]
fn defaults_validate() {
    let config = PostgresStoreConfig::default();
    config.validate().expect("defaults");
    assert!(config.prepared_statements);
    assert!(!config.tls_enabled);
}

#[test]
fn unsafe_schema_names_are_rejected() {
    for schema in ["", "1tenant", "tenant-a", "tenant\"; DROP SCHEMA public; --"] {
        let config = PostgresStoreConfig {
            schema: schema.to_string(),
            ..PostgresStoreConfig::default()
        };
        let err = config.validate().expect_err(schema);
        assert_eq!(err.kind(), ErrorKind::Validation, "{schema}");
    }
}

#[test]
fn pool_bounds_are_checked() {
    let config = PostgresStoreConfig {
        pool_max_size: 2,
        pool_min_idle: 3,
        ..PostgresStoreConfig::default()
    };
    assert_eq!(config.validate().expect_err("min idle").kind(), ErrorKind::Validation);

    let config = PostgresStoreConfig {
        statement_timeout_ms: 0,
        ..PostgresStoreConfig::default()
    };
    let err = config.validate().expect_err("zero timeout");
    assert!(err.message().contains("statement_timeout_ms"));
}

#[test]
fn malformed_connection_strings_fail_validation() {
    let config = PostgresStoreConfig::for_connection("postgres://user@host:notaport/db");
    let err = config.validate().expect_err("bad port");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.cause().is_some());
    assert!(PostgresStore::new(config, ManagerOptions::default()).is_err());
}

#[test]
fn client_config_carries_timeouts() {
    let config = PostgresStoreConfig {
        connect_timeout_ms: 750,
        statement_timeout_ms: 1_500,
        ..PostgresStoreConfig::default()
    };
    let client = config.client_config().expect("client config");
    assert_eq!(client.get_connect_timeout(), Some(&std::time::Duration::from_millis(750)));
    assert_eq!(client.get_options(), Some("-c statement_timeout=1500"));
}

#[test]
fn debug_output_redacts_credentials() {
    let config = PostgresStoreConfig::for_connection("postgres://admin:hunter2@db/prod");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn construction_is_lazy() {
    // Nothing listens on port 1; construction still succeeds.
    let config = PostgresStoreConfig::for_connection("postgres://stowage@127.0.0.1:1/stowage");
    let store = PostgresStore::new(config, ManagerOptions::default()).expect("lazy store");
    assert_eq!(store.manager().state(), ManagerState::Uninitialized);
}

#[test]
fn backend_exposes_schema_qualified_sql() {
    let config = PostgresStoreConfig {
        schema: "Tenant_7".to_string(),
        ..PostgresStoreConfig::default()
    };
    let backend = PostgresBackend::new(config).expect("backend");
    assert_eq!(backend.schema().schema().as_str(), "tenant_7");
    assert!(backend.schema().ddl().contains("\"tenant_7\".\"kv\""));
    assert!(backend.schema().ddl().contains("\"tenant_7\".\"list\""));
}
