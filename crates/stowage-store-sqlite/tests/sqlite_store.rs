// crates/stowage-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: End-to-end tests for the file engine.
// Purpose: Validate values, expiry, ordered lists, concurrency, and
//          lifecycle against real database files.
// ============================================================================

//! ## Overview
//! Integration tests for [`SqliteStore`]:
//! - set/get/delete and metadata round trips
//! - TTL filtering and background expiry sweeps
//! - ordered-list positions and concurrent appends
//! - idempotent provisioning and shutdown

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use serde_json::json;
use stowage_core::ErrorKind;
use stowage_core::ManagerOptions;
use stowage_core::ManagerState;
use stowage_core::SetOptions;
use stowage_core::StorageError;
use stowage_core::Store;
use stowage_store_sqlite::SqliteStore;
use stowage_store_sqlite::SqliteStoreConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_in(dir: &TempDir, options: ManagerOptions) -> SqliteStore {
    let config = SqliteStoreConfig::for_path(dir.path().join("nested").join("store.db"));
    SqliteStore::new(config, options).expect("store")
}

fn quiet_options() -> ManagerOptions {
    ManagerOptions {
        cleanup_enabled: false,
        ..ManagerOptions::default()
    }
}

fn append_with_retry(store: &SqliteStore, key: &str, value: &[u8]) -> u64 {
    let mut attempts = 0;
    loop {
        match store.list_append(key, value, None) {
            Ok(position) => return position,
            Err(err) if err.retryable() && attempts < 50 => {
                attempts += 1;
                thread::sleep(Duration::from_millis(2));
            }
            Err(err) => panic!("append failed: {err}"),
        }
    }
}

// ============================================================================
// SECTION: Key-Value
// ============================================================================

#[test]
fn set_get_delete_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    store.set("user:1", b"alice", &SetOptions::new()).expect("set");
    assert_eq!(store.get("user:1").expect("get"), Some(b"alice".to_vec()));
    assert!(store.exists("user:1").expect("exists"));

    store.set("user:1", b"bob", &SetOptions::new()).expect("overwrite");
    assert_eq!(store.fetch("user:1").expect("fetch"), b"bob".to_vec());

    assert!(store.delete("user:1").expect("delete"));
    assert!(!store.delete("user:1").expect("second delete"));
    assert_eq!(store.get("user:1").expect("get after delete"), None);
    let err = store.fetch("user:1").expect_err("fetch absent");
    assert!(err.is_not_found());
}

#[test]
fn entry_carries_namespace_metadata_and_timestamps() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    let options =
        SetOptions::new().with_namespace("sessions").with_metadata(json!({"owner": "ops"}));
    store.set("s1", b"payload", &options).expect("set");
    let first = store.get_entry("s1").expect("entry").expect("present");
    assert_eq!(first.namespace, "sessions");
    assert_eq!(first.metadata, Some(json!({"owner": "ops"})));
    assert_eq!(first.expires_at, None);
    assert_eq!(first.created_at, first.updated_at);

    thread::sleep(Duration::from_millis(5));
    store.set("s1", b"payload-2", &SetOptions::new()).expect("update");
    let second = store.get_entry("s1").expect("entry").expect("present");
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(second.namespace, "default");
    assert_eq!(second.metadata, None);
}

#[test]
fn keys_are_scoped_to_namespace_and_sorted() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    let chat = SetOptions::new().with_namespace("chat");
    for key in ["c", "a", "b"] {
        store.set(key, b"v", &chat).expect("set");
    }
    store.set("z", b"v", &SetOptions::new()).expect("set default");
    assert_eq!(store.keys("chat", 10).expect("keys"), vec!["a", "b", "c"]);
    assert_eq!(store.keys("chat", 2).expect("keys"), vec!["a", "b"]);
    assert_eq!(store.keys("default", 10).expect("keys"), vec!["z"]);
}

#[test]
fn invalid_keys_are_rejected_before_io() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    let err: StorageError = store.set("", b"v", &SetOptions::new()).expect_err("empty key");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.manager().state(), ManagerState::Uninitialized);
}

#[test]
fn in_memory_databases_are_rejected_at_construction() {
    for raw in [":memory:", "file:shared?mode=memory&cache=shared"] {
        let Err(err) = SqliteStore::new(SqliteStoreConfig::for_path(raw), quiet_options()) else {
            panic!("{raw} should not build a store");
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

// ============================================================================
// SECTION: Expiry
// ============================================================================

#[test]
fn expired_entries_are_invisible_before_the_sweep() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    let ttl = SetOptions::new().with_ttl(Duration::from_millis(1));
    store.set("short", b"v", &ttl).expect("set");
    thread::sleep(Duration::from_millis(10));
    assert_eq!(store.get("short").expect("get"), None);
    assert!(store.keys("default", 10).expect("keys").is_empty());
    assert_eq!(store.purge_expired().expect("purge"), 1);
    assert!(!store.delete("short").expect("row is gone"));
}

#[test]
fn background_sweep_removes_expired_rows() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(
        &dir,
        ManagerOptions {
            cleanup_interval: Duration::from_millis(20),
            ..ManagerOptions::default()
        },
    );
    let ttl = SetOptions::new().with_ttl(Duration::from_millis(1));
    store.set("k", b"v", &ttl).expect("set");
    store.set("durable", b"v", &SetOptions::new()).expect("set");
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let handle = store.manager().get_connection().expect("handle");
        if handle.cleanup_sweeps().unwrap_or(0) >= 2 {
            break;
        }
        assert!(Instant::now() < deadline, "cleanup never ran");
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(store.get("k").expect("get"), None);
    assert_eq!(store.purge_expired().expect("purge"), 0);
    assert_eq!(store.get("durable").expect("get"), Some(b"v".to_vec()));
    store.close();
}

#[test]
fn overwriting_an_expired_row_resets_created_at() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    let ttl = SetOptions::new().with_ttl(Duration::from_millis(1));
    store.set("session", b"old", &ttl).expect("set");
    thread::sleep(Duration::from_millis(10));
    store.set("session", b"new", &SetOptions::new()).expect("overwrite");
    let entry = store.get_entry("session").expect("get").expect("present");
    assert_eq!(entry.value, b"new".to_vec());
    assert_eq!(entry.created_at, entry.updated_at);
}

#[test]
fn overwriting_a_live_row_keeps_created_at() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    store.set("profile", b"v1", &SetOptions::new()).expect("set");
    let created = store.get_entry("profile").expect("get").expect("present").created_at;
    thread::sleep(Duration::from_millis(5));
    store.set("profile", b"v2", &SetOptions::new()).expect("overwrite");
    let entry = store.get_entry("profile").expect("get").expect("present");
    assert_eq!(entry.created_at, created);
    assert!(entry.updated_at > created);
}

#[test]
fn zero_ttl_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    let ttl = SetOptions::new().with_ttl(Duration::ZERO);
    let err = store.set("k", b"v", &ttl).expect_err("zero ttl");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ============================================================================
// SECTION: Lists
// ============================================================================

#[test]
fn list_append_assigns_sequential_positions() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    for (expected, value) in [b"v1", b"v2", b"v3"].iter().enumerate() {
        let position = store.list_append("log", *value, Some("audit")).expect("append");
        assert_eq!(position, expected as u64);
    }
    let entries = store.list_read("log").expect("read");
    let positions: Vec<u64> = entries.iter().map(|entry| entry.position).collect();
    let values: Vec<&[u8]> = entries.iter().map(|entry| entry.value.as_slice()).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(values, vec![b"v1".as_slice(), b"v2".as_slice(), b"v3".as_slice()]);
    assert!(entries.iter().all(|entry| entry.namespace == "audit"));
    assert_eq!(store.list_len("log").expect("len"), 3);
}

#[test]
fn list_clear_resets_positions() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    store.list_append("q", b"a", None).expect("append");
    store.list_append("q", b"b", None).expect("append");
    assert_eq!(store.list_clear("q").expect("clear"), 2);
    assert!(store.list_read("q").expect("read").is_empty());
    assert_eq!(store.list_append("q", b"c", None).expect("append"), 0);
}

#[test]
fn set_leaves_lists_under_the_same_key() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    store.list_append("shared", b"item", None).expect("append");
    store.set("shared", b"value", &SetOptions::new()).expect("set");
    assert_eq!(store.list_len("shared").expect("len"), 1);
    assert_eq!(store.get("shared").expect("get"), Some(b"value".to_vec()));
}

#[test]
fn concurrent_appends_produce_distinct_positions() {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(store_in(&dir, quiet_options()));
    let mut handles = Vec::new();
    for worker in 0 .. 8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            (0 .. 25)
                .map(|index| append_with_retry(&store, "events", format!("{worker}-{index}").as_bytes()))
                .collect::<Vec<u64>>()
        }));
    }
    let mut positions: Vec<u64> =
        handles.into_iter().flat_map(|handle| handle.join().expect("join")).collect();
    positions.sort_unstable();
    assert_eq!(positions, (0 .. 200).collect::<Vec<u64>>());
    assert_eq!(store.list_len("events").expect("len"), 200);
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

#[test]
fn reopening_the_same_file_reprovisions_idempotently() {
    let dir = TempDir::new().expect("tempdir");
    let first = store_in(&dir, quiet_options());
    first.set("persisted", b"v", &SetOptions::new()).expect("set");
    first.close();

    let second = store_in(&dir, quiet_options());
    second.readiness().expect("ready");
    assert_eq!(second.get("persisted").expect("get"), Some(b"v".to_vec()));
}

#[test]
fn closed_store_reports_connection_errors() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_in(&dir, quiet_options());
    store.readiness().expect("ready");
    store.close();
    store.close();
    let err = store.get("k").expect_err("closed");
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(store.manager().state(), ManagerState::Closed);
}

#[test]
fn table_prefixes_isolate_stores_in_one_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("shared.db");
    let left = SqliteStore::new(
        SqliteStoreConfig {
            table_prefix: "left".to_string(),
            ..SqliteStoreConfig::for_path(&path)
        },
        quiet_options(),
    )
    .expect("left");
    let right = SqliteStore::new(
        SqliteStoreConfig {
            table_prefix: "right".to_string(),
            ..SqliteStoreConfig::for_path(&path)
        },
        quiet_options(),
    )
    .expect("right");
    left.set("k", b"left", &SetOptions::new()).expect("set");
    assert_eq!(right.get("k").expect("get"), None);
}
